//! IAM user, access key and group membership calls

use crate::error::{AwsError, AwsResult};
use crate::paging::Page;
use async_trait::async_trait;
use aws_sdk_iam::Client as IamClient;
use std::fmt;

/// An IAM user as listed by the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamUser {
    pub user_name: String,
    pub user_id: String,
    pub arn: String,
}

/// A freshly created access key; the secret is only ever returned once
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub user_name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("user_name", &self.user_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// The IAM calls user management needs
#[async_trait]
pub trait IamApi: Send + Sync {
    async fn create_user(&self, user_name: &str) -> AwsResult<IamUser>;

    async fn delete_user(&self, user_name: &str) -> AwsResult<()>;

    async fn create_access_key(&self, user_name: &str) -> AwsResult<AccessKey>;

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> AwsResult<()>;

    /// One page of the user's access key IDs
    async fn list_access_keys_page(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<String>>;

    async fn add_user_to_group(&self, group_name: &str, user_name: &str) -> AwsResult<()>;

    async fn remove_user_from_group(&self, group_name: &str, user_name: &str) -> AwsResult<()>;

    async fn list_users_page(&self, marker: Option<String>) -> AwsResult<Page<IamUser>>;
}

/// IAM marker pagination: a marker is only meaningful while truncated
fn next_marker(is_truncated: bool, marker: Option<&str>) -> Option<String> {
    if is_truncated {
        marker.map(str::to_string)
    } else {
        None
    }
}

/// [`IamApi`] backed by the AWS SDK
#[derive(Clone)]
pub struct SdkIam {
    client: IamClient,
}

impl SdkIam {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IamApi for SdkIam {
    async fn create_user(&self, user_name: &str) -> AwsResult<IamUser> {
        let output = self
            .client
            .create_user()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("CreateUser {user_name}"), e))?;

        let user = output
            .user()
            .ok_or_else(|| AwsError::missing("CreateUser", "User"))?;
        Ok(IamUser {
            user_name: user.user_name().to_string(),
            user_id: user.user_id().to_string(),
            arn: user.arn().to_string(),
        })
    }

    async fn delete_user(&self, user_name: &str) -> AwsResult<()> {
        self.client
            .delete_user()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("DeleteUser {user_name}"), e))?;
        Ok(())
    }

    async fn create_access_key(&self, user_name: &str) -> AwsResult<AccessKey> {
        let output = self
            .client
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("CreateAccessKey {user_name}"), e))?;

        let key = output
            .access_key()
            .ok_or_else(|| AwsError::missing("CreateAccessKey", "AccessKey"))?;
        Ok(AccessKey {
            user_name: key.user_name().to_string(),
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: key.secret_access_key().to_string(),
        })
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> AwsResult<()> {
        self.client
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("DeleteAccessKey {access_key_id}"), e))?;
        Ok(())
    }

    async fn list_access_keys_page(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<String>> {
        let output = self
            .client
            .list_access_keys()
            .user_name(user_name)
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("ListAccessKeys {user_name}"), e))?;

        let ids = output
            .access_key_metadata()
            .iter()
            .filter_map(|meta| meta.access_key_id().map(str::to_string))
            .collect();
        Ok(Page::new(
            ids,
            next_marker(output.is_truncated(), output.marker()),
        ))
    }

    async fn add_user_to_group(&self, group_name: &str, user_name: &str) -> AwsResult<()> {
        self.client
            .add_user_to_group()
            .group_name(group_name)
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::from_sdk(format!("AddUserToGroup {user_name} -> {group_name}"), e)
            })?;
        Ok(())
    }

    async fn remove_user_from_group(&self, group_name: &str, user_name: &str) -> AwsResult<()> {
        self.client
            .remove_user_from_group()
            .group_name(group_name)
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| {
                AwsError::from_sdk(format!("RemoveUserFromGroup {user_name} <- {group_name}"), e)
            })?;
        Ok(())
    }

    async fn list_users_page(&self, marker: Option<String>) -> AwsResult<Page<IamUser>> {
        let output = self
            .client
            .list_users()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("ListUsers", e))?;

        let users = output
            .users()
            .iter()
            .map(|user| IamUser {
                user_name: user.user_name().to_string(),
                user_id: user.user_id().to_string(),
                arn: user.arn().to_string(),
            })
            .collect();
        Ok(Page::new(
            users,
            next_marker(output.is_truncated(), output.marker()),
        ))
    }
}

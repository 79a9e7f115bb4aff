//! Uploader accounts: IAM users with one access key, members of the uploader group

use crate::error::AwsResult;
use crate::iam::{AccessKey, IamApi, IamUser};
use crate::paging::paginate;
use cytoskel_cloud::Saga;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;

/// A user created by [`UserManager::create_user`]
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub user: IamUser,
    pub access_key: AccessKey,
}

/// Creates and removes uploader users
pub struct UserManager<'a> {
    iam: &'a dyn IamApi,
    group: &'a str,
}

impl<'a> UserManager<'a> {
    pub fn new(iam: &'a dyn IamApi, group: &'a str) -> Self {
        Self { iam, group }
    }

    /// Create a user with one access key and add it to the uploader group.
    ///
    /// If a later step fails, the earlier ones are undone.
    pub async fn create_user(&self, user_name: &str) -> AwsResult<CreatedUser> {
        let iam = self.iam;
        let group = self.group;
        let mut saga = Saga::new(format!("create-user {user_name}"));

        let user = saga.step("create user", iam.create_user(user_name)).await?;
        saga.on_undo("create user", async move { iam.delete_user(user_name).await });

        let access_key = saga
            .step("create access key", iam.create_access_key(user_name))
            .await?;
        let key_id = access_key.access_key_id.clone();
        saga.on_undo("create access key", async move {
            iam.delete_access_key(user_name, &key_id).await
        });

        saga.step("add to group", iam.add_user_to_group(group, user_name))
            .await?;
        saga.commit();

        tracing::info!("Created user {} in group {}", user.arn, group);
        Ok(CreatedUser { user, access_key })
    }

    /// Remove a user: group membership first, then every access key, then the user.
    ///
    /// Only the membership removal can be undone; deleted keys are gone for good.
    pub async fn delete_user(&self, user_name: &str) -> AwsResult<()> {
        let iam = self.iam;
        let group = self.group;
        let mut saga = Saga::new(format!("delete-user {user_name}"));

        saga.step("remove from group", iam.remove_user_from_group(group, user_name))
            .await?;
        saga.on_undo("remove from group", async move {
            iam.add_user_to_group(group, user_name).await
        });

        let keys: Vec<String> = saga
            .step("list access keys", self.access_keys(user_name).try_collect())
            .await?;

        for key in &keys {
            let label = format!("delete access key {key}");
            saga.step(&label, iam.delete_access_key(user_name, key)).await?;
            saga.irreversible(label);
        }

        saga.step("delete user", iam.delete_user(user_name)).await?;
        saga.commit();

        tracing::info!("Deleted user {} and {} access key(s)", user_name, keys.len());
        Ok(())
    }

    /// IDs of every access key of a user
    pub fn access_keys<'s>(&self, user_name: &'s str) -> BoxStream<'s, AwsResult<String>>
    where
        'a: 's,
    {
        let iam: &'s dyn IamApi = self.iam;
        paginate(move |marker| iam.list_access_keys_page(user_name, marker))
    }

    /// Every IAM user of the account
    pub fn list_users(&self) -> BoxStream<'a, AwsResult<IamUser>> {
        let iam = self.iam;
        paginate(move |marker| iam.list_users_page(marker))
    }
}

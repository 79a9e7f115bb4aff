//! S3 Control calls for access grants and their locations

use crate::client::AwsContext;
use crate::error::{AwsError, AwsResult};
use crate::paging::Page;
use async_trait::async_trait;
use aws_sdk_s3control::types::{
    AccessGrantsLocationConfiguration, Grantee, GranteeType, Permission,
};
use std::fmt;
use std::sync::Arc;

/// A registered Access Grants location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantsLocation {
    pub location_id: String,
    pub location_scope: String,
    pub iam_role_arn: Option<String>,
}

impl fmt::Display for GrantsLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location: {}, Id: {}", self.location_scope, self.location_id)
    }
}

/// An access grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub grant_id: String,
    pub grant_arn: Option<String>,
    pub location_id: Option<String>,
    pub grantee: Option<String>,
    pub sub_prefix: Option<String>,
    pub permission: Option<String>,
}

/// A read-write grant to request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub grantee_arn: String,
    pub location_id: String,
    pub sub_prefix: String,
}

/// The S3 Control calls grant management needs
#[async_trait]
pub trait AccessGrantsApi: Send + Sync {
    async fn create_access_grant(&self, grant: &NewGrant) -> AwsResult<AccessGrant>;

    async fn delete_access_grant(&self, grant_id: &str) -> AwsResult<()>;

    async fn list_access_grants_page(&self, next_token: Option<String>)
    -> AwsResult<Page<AccessGrant>>;

    async fn list_locations_page(&self, next_token: Option<String>)
    -> AwsResult<Page<GrantsLocation>>;
}

fn next_token(token: Option<&str>) -> Option<String> {
    token.filter(|t| !t.is_empty()).map(str::to_string)
}

/// [`AccessGrantsApi`] backed by the AWS SDK, scoped to the caller's account
#[derive(Clone)]
pub struct SdkAccessGrants {
    ctx: Arc<AwsContext>,
}

impl SdkAccessGrants {
    pub fn new(ctx: Arc<AwsContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl AccessGrantsApi for SdkAccessGrants {
    async fn create_access_grant(&self, grant: &NewGrant) -> AwsResult<AccessGrant> {
        let account_id = self.ctx.account_id().await?;
        let output = self
            .ctx
            .s3control()
            .create_access_grant()
            .account_id(account_id)
            .access_grants_location_id(&grant.location_id)
            .access_grants_location_configuration(
                AccessGrantsLocationConfiguration::builder()
                    .s3_sub_prefix(&grant.sub_prefix)
                    .build(),
            )
            .grantee(
                Grantee::builder()
                    .grantee_type(GranteeType::Iam)
                    .grantee_identifier(&grant.grantee_arn)
                    .build(),
            )
            .permission(Permission::Readwrite)
            .send()
            .await
            .map_err(|e| {
                AwsError::from_sdk(format!("CreateAccessGrant in {}", grant.location_id), e)
            })?;

        Ok(AccessGrant {
            grant_id: output
                .access_grant_id()
                .ok_or_else(|| AwsError::missing("CreateAccessGrant", "AccessGrantId"))?
                .to_string(),
            grant_arn: output.access_grant_arn().map(str::to_string),
            location_id: Some(grant.location_id.clone()),
            grantee: Some(grant.grantee_arn.clone()),
            sub_prefix: Some(grant.sub_prefix.clone()),
            permission: Some(Permission::Readwrite.as_str().to_string()),
        })
    }

    async fn delete_access_grant(&self, grant_id: &str) -> AwsResult<()> {
        let account_id = self.ctx.account_id().await?;
        self.ctx
            .s3control()
            .delete_access_grant()
            .account_id(account_id)
            .access_grant_id(grant_id)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("DeleteAccessGrant {grant_id}"), e))?;
        Ok(())
    }

    async fn list_access_grants_page(
        &self,
        next: Option<String>,
    ) -> AwsResult<Page<AccessGrant>> {
        let account_id = self.ctx.account_id().await?;
        let output = self
            .ctx
            .s3control()
            .list_access_grants()
            .account_id(account_id)
            .set_next_token(next)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("ListAccessGrants", e))?;

        let grants = output
            .access_grants_list()
            .iter()
            .filter_map(|entry| {
                Some(AccessGrant {
                    grant_id: entry.access_grant_id()?.to_string(),
                    grant_arn: entry.access_grant_arn().map(str::to_string),
                    location_id: entry.access_grants_location_id().map(str::to_string),
                    grantee: entry
                        .grantee()
                        .and_then(|g| g.grantee_identifier())
                        .map(str::to_string),
                    sub_prefix: entry
                        .access_grants_location_configuration()
                        .and_then(|c| c.s3_sub_prefix())
                        .map(str::to_string),
                    permission: entry.permission().map(|p| p.as_str().to_string()),
                })
            })
            .collect();
        Ok(Page::new(grants, next_token(output.next_token())))
    }

    async fn list_locations_page(
        &self,
        next: Option<String>,
    ) -> AwsResult<Page<GrantsLocation>> {
        let account_id = self.ctx.account_id().await?;
        let output = self
            .ctx
            .s3control()
            .list_access_grants_locations()
            .account_id(account_id)
            .set_next_token(next)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("ListAccessGrantsLocations", e))?;

        let locations = output
            .access_grants_locations_list()
            .iter()
            .filter_map(|entry| {
                Some(GrantsLocation {
                    location_id: entry.access_grants_location_id()?.to_string(),
                    location_scope: entry.location_scope().unwrap_or_default().to_string(),
                    iam_role_arn: entry.iam_role_arn().map(str::to_string),
                })
            })
            .collect();
        Ok(Page::new(locations, next_token(output.next_token())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let location = GrantsLocation {
            location_id: "a1b2c3".into(),
            location_scope: "s3://staging-cellpainting-gallery/".into(),
            iam_role_arn: None,
        };
        assert_eq!(
            location.to_string(),
            "Location: s3://staging-cellpainting-gallery/, Id: a1b2c3"
        );
    }

    #[test]
    fn test_empty_next_token_ends_listing() {
        assert_eq!(next_token(Some("")), None);
        assert_eq!(next_token(Some("t")), Some("t".to_string()));
        assert_eq!(next_token(None), None);
    }
}

//! Access grants on registered locations

use crate::error::{AwsError, AwsResult};
use crate::paging::paginate;
use crate::s3control::{AccessGrant, AccessGrantsApi, GrantsLocation, NewGrant};
use futures_util::stream::BoxStream;

/// Sub-prefix granting access to everything under a location
pub const ALL_OBJECTS: &str = "*";

/// Creates, deletes and lists grants and locations
pub struct GrantManager<'a> {
    api: &'a dyn AccessGrantsApi,
}

impl<'a> GrantManager<'a> {
    pub fn new(api: &'a dyn AccessGrantsApi) -> Self {
        Self { api }
    }

    /// Grant `grantee_arn` read-write access to `prefix` under a location
    pub async fn create_grant(
        &self,
        grantee_arn: &str,
        location_id: &str,
        prefix: &str,
    ) -> AwsResult<AccessGrant> {
        if !grantee_arn.starts_with("arn:") {
            return Err(AwsError::InvalidRequest(format!(
                "grantee must be an IAM ARN, got '{grantee_arn}'"
            )));
        }
        if location_id.trim().is_empty() {
            return Err(AwsError::InvalidRequest(
                "location id must not be empty".to_string(),
            ));
        }

        let grant = self
            .api
            .create_access_grant(&NewGrant {
                grantee_arn: grantee_arn.to_string(),
                location_id: location_id.to_string(),
                sub_prefix: if prefix.is_empty() { ALL_OBJECTS } else { prefix }.to_string(),
            })
            .await?;

        tracing::info!(
            "Created grant {} for {} on {}",
            grant.grant_id,
            grantee_arn,
            location_id
        );
        Ok(grant)
    }

    pub async fn delete_grant(&self, grant_id: &str) -> AwsResult<()> {
        self.api.delete_access_grant(grant_id).await?;
        tracing::info!("Deleted grant {}", grant_id);
        Ok(())
    }

    pub fn list_grants(&self) -> BoxStream<'a, AwsResult<AccessGrant>> {
        let api = self.api;
        paginate(move |token| api.list_access_grants_page(token))
    }

    pub fn list_locations(&self) -> BoxStream<'a, AwsResult<GrantsLocation>> {
        let api = self.api;
        paginate(move |token| api.list_locations_page(token))
    }
}

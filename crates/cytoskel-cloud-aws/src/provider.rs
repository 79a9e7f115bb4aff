//! AWS implementation of the cloud provider trait
//!
//! Buckets come from S3, grants instances and locations from S3 Control, and
//! roles, groups, policies and attachments from IAM.

use crate::client::AwsContext;
use crate::error::{AwsError, AwsResult};
use crate::resources::*;
use async_trait::async_trait;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3control::types::Tag;
use cytoskel_cloud::{
    AuthStatus, CloudError, CloudProvider, ResourceConfig, ResourceOutputs, ResourceState,
    Result as CloudResult, RetryConfig, Saga,
};
use std::sync::Arc;
use std::time::Duration;

/// IAM keeps at most this many versions of a managed policy
const MAX_POLICY_VERSIONS: usize = 5;

/// Retries absorbing IAM propagation delay before a new role can be used
pub fn location_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
    }
}

/// Treat a missing resource as already deleted
fn ignore_not_found(result: AwsResult<()>, what: &str) -> AwsResult<()> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::warn!("{} was already gone", what);
            Ok(())
        }
        other => other,
    }
}

fn bucket_outputs(bucket: &str, adopted: bool) -> ResourceOutputs {
    let outputs = ResourceOutputs::new(bucket)
        .with_attribute("bucket", bucket)
        .with_attribute("arn", format!("arn:aws:s3:::{bucket}"));
    if adopted { outputs.adopted() } else { outputs }
}

fn instance_outputs(
    id: Option<&str>,
    arn: Option<&str>,
    adopted: bool,
) -> AwsResult<ResourceOutputs> {
    let arn = arn
        .ok_or_else(|| AwsError::missing("AccessGrantsInstance", "AccessGrantsInstanceArn"))?;
    let outputs = ResourceOutputs::new(id.unwrap_or("default")).with_attribute("arn", arn);
    Ok(if adopted { outputs.adopted() } else { outputs })
}

fn tags(spec: &GrantsInstanceSpec) -> AwsResult<Vec<Tag>> {
    spec.tags
        .iter()
        .map(|(key, value)| {
            Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| AwsError::InvalidRequest(format!("tag {key}: {e}")))
        })
        .collect()
}

fn attribute(current: &ResourceState, name: &str) -> CloudResult<String> {
    current.get_attribute(name).ok_or_else(|| {
        CloudError::StateError(format!("{} has no recorded {}", current.key, name))
    })
}

async fn put_role_policy(iam: &IamClient, role_name: &str, inline: &InlinePolicy) -> AwsResult<()> {
    iam.put_role_policy()
        .role_name(role_name)
        .policy_name(&inline.name)
        .policy_document(inline.policy.to_string())
        .send()
        .await
        .map_err(|e| {
            AwsError::from_sdk(format!("PutRolePolicy {} on {}", inline.name, role_name), e)
        })?;
    Ok(())
}

async fn delete_role_policy(iam: &IamClient, role_name: &str, policy_name: &str) -> AwsResult<()> {
    let result = iam
        .delete_role_policy()
        .role_name(role_name)
        .policy_name(policy_name)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| {
            AwsError::from_sdk(format!("DeleteRolePolicy {policy_name} on {role_name}"), e)
        });
    ignore_not_found(result, policy_name)
}

async fn delete_role_only(iam: &IamClient, role_name: &str) -> AwsResult<()> {
    let result = iam
        .delete_role()
        .role_name(role_name)
        .send()
        .await
        .map(|_| ())
        .map_err(|e| AwsError::from_sdk(format!("DeleteRole {role_name}"), e));
    ignore_not_found(result, role_name)
}

/// Provider for the S3 Access Grants staging infrastructure
pub struct AccessGrantsProvider {
    ctx: Arc<AwsContext>,
    location_retry: RetryConfig,
}

impl AccessGrantsProvider {
    pub fn new(ctx: Arc<AwsContext>) -> Self {
        Self {
            ctx,
            location_retry: location_retry(),
        }
    }

    pub fn context(&self) -> &Arc<AwsContext> {
        &self.ctx
    }

    // S3 bucket

    async fn create_bucket(&self, spec: &BucketSpec) -> CloudResult<ResourceOutputs> {
        let region = self.ctx.require_region()?;
        let mut request = self.ctx.s3().create_bucket().bucket(&spec.bucket);
        if region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        let adopted = match request
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("CreateBucket {}", spec.bucket), e))
        {
            Ok(_) => false,
            Err(AwsError::Conflict { ref code, .. }) if code == "BucketAlreadyOwnedByYou" => {
                tracing::info!(
                    "Bucket {} already exists in this account, adopting it",
                    spec.bucket
                );
                true
            }
            Err(e) => return Err(e.into()),
        };

        Ok(bucket_outputs(&spec.bucket, adopted))
    }

    async fn delete_bucket(&self, current: &ResourceState) -> CloudResult<()> {
        let result = self
            .ctx
            .s3()
            .delete_bucket()
            .bucket(&current.id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AwsError::from_sdk(format!("DeleteBucket {}", current.id), e));
        Ok(ignore_not_found(result, &current.key)?)
    }

    // Access Grants instance

    async fn create_instance(&self, spec: &GrantsInstanceSpec) -> CloudResult<ResourceOutputs> {
        let account_id = self.ctx.account_id().await?;
        let created = self
            .ctx
            .s3control()
            .create_access_grants_instance()
            .account_id(account_id)
            .set_tags(Some(tags(spec)?))
            .send()
            .await
            .map_err(|e| AwsError::from_sdk("CreateAccessGrantsInstance", e));

        match created {
            Ok(output) => Ok(instance_outputs(
                output.access_grants_instance_id(),
                output.access_grants_instance_arn(),
                false,
            )?),
            Err(e) if e.is_conflict() => {
                // one instance per account and region
                tracing::info!("Access Grants instance already exists, adopting it");
                let existing = self
                    .ctx
                    .s3control()
                    .get_access_grants_instance()
                    .account_id(account_id)
                    .send()
                    .await
                    .map_err(|e| AwsError::from_sdk("GetAccessGrantsInstance", e))?;
                let outputs = instance_outputs(
                    existing.access_grants_instance_id(),
                    existing.access_grants_instance_arn(),
                    true,
                )?;
                let arn = outputs.attributes["arn"].as_str().unwrap_or_default().to_string();
                self.tag_instance(&arn, spec, &[]).await?;
                Ok(outputs)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn tag_instance(
        &self,
        arn: &str,
        spec: &GrantsInstanceSpec,
        removed: &[String],
    ) -> CloudResult<()> {
        let account_id = self.ctx.account_id().await?;
        let s3control = self.ctx.s3control();

        if !removed.is_empty() {
            s3control
                .untag_resource()
                .account_id(account_id)
                .resource_arn(arn)
                .set_tag_keys(Some(removed.to_vec()))
                .send()
                .await
                .map_err(|e| AwsError::from_sdk("UntagResource", e))?;
        }

        if !spec.tags.is_empty() {
            s3control
                .tag_resource()
                .account_id(account_id)
                .resource_arn(arn)
                .set_tags(Some(tags(spec)?))
                .send()
                .await
                .map_err(|e| AwsError::from_sdk("TagResource", e))?;
        }
        Ok(())
    }

    async fn update_instance(
        &self,
        spec: &GrantsInstanceSpec,
        current: &ResourceState,
    ) -> CloudResult<ResourceOutputs> {
        let old = GrantsInstanceSpec::from_inputs(&current.key, &current.inputs)?;
        let removed: Vec<String> = old
            .tags
            .keys()
            .filter(|k| !spec.tags.contains_key(*k))
            .cloned()
            .collect();

        self.tag_instance(&attribute(current, "arn")?, spec, &removed)
            .await?;
        Ok(ResourceOutputs::new(current.id.clone()))
    }

    async fn delete_instance(&self, current: &ResourceState) -> CloudResult<()> {
        let account_id = self.ctx.account_id().await?;
        let result = self
            .ctx
            .s3control()
            .delete_access_grants_instance()
            .account_id(account_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AwsError::from_sdk("DeleteAccessGrantsInstance", e));
        Ok(ignore_not_found(result, &current.key)?)
    }

    // IAM role

    async fn create_role(&self, spec: &RoleSpec) -> CloudResult<ResourceOutputs> {
        let iam = self.ctx.iam();
        let role_name = spec.role_name.as_str();
        let mut saga = Saga::new(format!("create-role {role_name}"));

        let output = saga
            .step("create role", async {
                iam.create_role()
                    .role_name(role_name)
                    .assume_role_policy_document(spec.assume_role_policy.to_string())
                    .max_session_duration(spec.max_session_duration)
                    .send()
                    .await
                    .map_err(|e| AwsError::from_sdk(format!("CreateRole {role_name}"), e))
            })
            .await
            .map_err(AwsError::from)?;
        saga.on_undo("create role", delete_role_only(iam, role_name));

        let role = output
            .role()
            .ok_or_else(|| AwsError::missing("CreateRole", "Role"))?;
        let outputs = ResourceOutputs::new(role.role_name())
            .with_attribute("name", role.role_name())
            .with_attribute("arn", role.arn())
            .with_attribute("role_id", role.role_id());

        for inline in &spec.inline_policies {
            let label = format!("put role policy {}", inline.name);
            saga.step(&label, put_role_policy(iam, role_name, inline))
                .await
                .map_err(AwsError::from)?;
            saga.on_undo(label, delete_role_policy(iam, role_name, &inline.name));
        }

        saga.commit();
        Ok(outputs)
    }

    async fn update_role(
        &self,
        spec: &RoleSpec,
        current: &ResourceState,
    ) -> CloudResult<ResourceOutputs> {
        let old = RoleSpec::from_inputs(&current.key, &current.inputs)?;
        if old.role_name != spec.role_name {
            tracing::info!("Role renamed from {} to {}, recreating", old.role_name, spec.role_name);
            self.delete_role(&old).await?;
            return self.create_role(spec).await;
        }

        let iam = self.ctx.iam();
        let role_name = spec.role_name.as_str();

        if old.assume_role_policy != spec.assume_role_policy {
            iam.update_assume_role_policy()
                .role_name(role_name)
                .policy_document(spec.assume_role_policy.to_string())
                .send()
                .await
                .map_err(|e| AwsError::from_sdk(format!("UpdateAssumeRolePolicy {role_name}"), e))?;
        }

        if old.max_session_duration != spec.max_session_duration {
            iam.update_role()
                .role_name(role_name)
                .max_session_duration(spec.max_session_duration)
                .send()
                .await
                .map_err(|e| AwsError::from_sdk(format!("UpdateRole {role_name}"), e))?;
        }

        for inline in &spec.inline_policies {
            if !old.inline_policies.contains(inline) {
                put_role_policy(iam, role_name, inline).await?;
            }
        }

        for stale in &old.inline_policies {
            if !spec.inline_policies.iter().any(|p| p.name == stale.name) {
                delete_role_policy(iam, role_name, &stale.name).await?;
            }
        }

        Ok(ResourceOutputs::new(current.id.clone()))
    }

    async fn delete_role(&self, spec: &RoleSpec) -> CloudResult<()> {
        let iam = self.ctx.iam();
        for inline in &spec.inline_policies {
            delete_role_policy(iam, &spec.role_name, &inline.name).await?;
        }
        delete_role_only(iam, &spec.role_name).await?;
        Ok(())
    }

    // Access Grants location

    async fn create_location(&self, spec: &LocationSpec) -> CloudResult<ResourceOutputs> {
        let account_id = self.ctx.account_id().await?;
        let s3control = self.ctx.s3control();

        let output = self
            .location_retry
            .run("CreateAccessGrantsLocation", move || async move {
                s3control
                    .create_access_grants_location()
                    .account_id(account_id)
                    .location_scope(&spec.location_scope)
                    .iam_role_arn(&spec.iam_role_arn)
                    .send()
                    .await
                    .map_err(|e| {
                        AwsError::from_sdk(
                            format!("CreateAccessGrantsLocation {}", spec.location_scope),
                            e,
                        )
                    })
            })
            .await?;

        let id = output
            .access_grants_location_id()
            .ok_or_else(|| {
                AwsError::missing("CreateAccessGrantsLocation", "AccessGrantsLocationId")
            })?;
        Ok(ResourceOutputs::new(id)
            .with_attribute("id", id)
            .with_attribute("arn", output.access_grants_location_arn().unwrap_or_default())
            .with_attribute("location_scope", spec.location_scope.as_str()))
    }

    async fn update_location(
        &self,
        spec: &LocationSpec,
        current: &ResourceState,
    ) -> CloudResult<ResourceOutputs> {
        let old = LocationSpec::from_inputs(&current.key, &current.inputs)?;
        if old.location_scope != spec.location_scope {
            tracing::info!(
                "Location scope changed from {} to {}, recreating",
                old.location_scope,
                spec.location_scope
            );
            self.delete_location(current).await?;
            return self.create_location(spec).await;
        }

        if old.iam_role_arn != spec.iam_role_arn {
            let account_id = self.ctx.account_id().await?;
            self.ctx
                .s3control()
                .update_access_grants_location()
                .account_id(account_id)
                .access_grants_location_id(&current.id)
                .iam_role_arn(&spec.iam_role_arn)
                .send()
                .await
                .map_err(|e| {
                    AwsError::from_sdk(format!("UpdateAccessGrantsLocation {}", current.id), e)
                })?;
        }

        Ok(ResourceOutputs::new(current.id.clone()))
    }

    async fn delete_location(&self, current: &ResourceState) -> CloudResult<()> {
        let account_id = self.ctx.account_id().await?;
        let result = self
            .ctx
            .s3control()
            .delete_access_grants_location()
            .account_id(account_id)
            .access_grants_location_id(&current.id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                AwsError::from_sdk(format!("DeleteAccessGrantsLocation {}", current.id), e)
            });
        Ok(ignore_not_found(result, &current.key)?)
    }

    // IAM group

    async fn create_group(&self, spec: &GroupSpec) -> CloudResult<ResourceOutputs> {
        let output = self
            .ctx
            .iam()
            .create_group()
            .group_name(&spec.group_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("CreateGroup {}", spec.group_name), e))?;

        let group = output
            .group()
            .ok_or_else(|| AwsError::missing("CreateGroup", "Group"))?;
        Ok(ResourceOutputs::new(group.group_name())
            .with_attribute("name", group.group_name())
            .with_attribute("arn", group.arn()))
    }

    async fn delete_group(&self, current: &ResourceState) -> CloudResult<()> {
        let result = self
            .ctx
            .iam()
            .delete_group()
            .group_name(&current.id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AwsError::from_sdk(format!("DeleteGroup {}", current.id), e));
        Ok(ignore_not_found(result, &current.key)?)
    }

    // IAM managed policy

    async fn create_policy(&self, spec: &PolicySpec) -> CloudResult<ResourceOutputs> {
        let output = self
            .ctx
            .iam()
            .create_policy()
            .policy_name(&spec.policy_name)
            .path(&spec.path)
            .description(&spec.description)
            .policy_document(spec.policy.to_string())
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("CreatePolicy {}", spec.policy_name), e))?;

        let arn = output
            .policy()
            .and_then(|p| p.arn())
            .ok_or_else(|| AwsError::missing("CreatePolicy", "Policy.Arn"))?;
        Ok(ResourceOutputs::new(arn)
            .with_attribute("arn", arn)
            .with_attribute("name", spec.policy_name.as_str()))
    }

    /// Non-default versions of a policy, oldest first
    async fn old_policy_versions(&self, policy_arn: &str) -> AwsResult<(usize, Vec<String>)> {
        let output = self
            .ctx
            .iam()
            .list_policy_versions()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("ListPolicyVersions {policy_arn}"), e))?;

        let mut versions: Vec<_> = output
            .versions()
            .iter()
            .filter(|v| !v.is_default_version())
            .filter_map(|v| {
                let created = v.create_date().map_or(0, |d| d.secs());
                v.version_id().map(|id| (created, id.to_string()))
            })
            .collect();
        versions.sort();
        Ok((
            output.versions().len(),
            versions.into_iter().map(|(_, id)| id).collect(),
        ))
    }

    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> AwsResult<()> {
        self.ctx
            .iam()
            .delete_policy_version()
            .policy_arn(policy_arn)
            .version_id(version_id)
            .send()
            .await
            .map_err(|e| {
                AwsError::from_sdk(format!("DeletePolicyVersion {version_id} of {policy_arn}"), e)
            })?;
        Ok(())
    }

    async fn update_policy(
        &self,
        spec: &PolicySpec,
        current: &ResourceState,
    ) -> CloudResult<ResourceOutputs> {
        let old = PolicySpec::from_inputs(&current.key, &current.inputs)?;
        if old.policy_name != spec.policy_name
            || old.path != spec.path
            || old.description != spec.description
        {
            tracing::info!("Policy {} changed identity, recreating", old.policy_name);
            self.delete_policy(current).await?;
            return self.create_policy(spec).await;
        }

        let policy_arn = current.id.as_str();
        let (total, old_versions) = self.old_policy_versions(policy_arn).await?;
        if total >= MAX_POLICY_VERSIONS {
            if let Some(oldest) = old_versions.first() {
                tracing::info!("Pruning version {} of {}", oldest, policy_arn);
                self.delete_policy_version(policy_arn, oldest).await?;
            }
        }

        self.ctx
            .iam()
            .create_policy_version()
            .policy_arn(policy_arn)
            .policy_document(spec.policy.to_string())
            .set_as_default(true)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(format!("CreatePolicyVersion {policy_arn}"), e))?;

        Ok(ResourceOutputs::new(current.id.clone()))
    }

    async fn delete_policy(&self, current: &ResourceState) -> CloudResult<()> {
        let policy_arn = current.id.as_str();
        let versions = match self.old_policy_versions(policy_arn).await {
            Ok((_, versions)) => versions,
            Err(e) if e.is_not_found() => {
                tracing::warn!("{} was already gone", current.key);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        for version in &versions {
            self.delete_policy_version(policy_arn, version).await?;
        }

        let result = self
            .ctx
            .iam()
            .delete_policy()
            .policy_arn(policy_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AwsError::from_sdk(format!("DeletePolicy {policy_arn}"), e));
        Ok(ignore_not_found(result, &current.key)?)
    }

    // Group policy attachment

    async fn attach_group_policy(
        &self,
        spec: &GroupPolicyAttachmentSpec,
    ) -> CloudResult<ResourceOutputs> {
        self.ctx
            .iam()
            .attach_group_policy()
            .group_name(&spec.group_name)
            .policy_arn(&spec.policy_arn)
            .send()
            .await
            .map_err(|e| {
                AwsError::from_sdk(format!("AttachGroupPolicy {}", spec.group_name), e)
            })?;
        Ok(ResourceOutputs::new(format!("{}/{}", spec.group_name, spec.policy_arn)))
    }

    async fn detach_group_policy(&self, current: &ResourceState) -> CloudResult<()> {
        let spec = GroupPolicyAttachmentSpec::from_inputs(&current.key, &current.inputs)?;
        let result = self
            .ctx
            .iam()
            .detach_group_policy()
            .group_name(&spec.group_name)
            .policy_arn(&spec.policy_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AwsError::from_sdk(format!("DetachGroupPolicy {}", spec.group_name), e));
        Ok(ignore_not_found(result, &current.key)?)
    }
}

#[async_trait]
impl CloudProvider for AccessGrantsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        "AWS"
    }

    async fn check_auth(&self) -> CloudResult<AuthStatus> {
        if self.ctx.region().is_none() {
            return Ok(AuthStatus::failed(
                "no AWS region configured (set AWS_REGION or aws.region in cytoskel.yaml)",
            ));
        }
        match self.ctx.caller().await {
            Ok(caller) => Ok(AuthStatus::ok(format!(
                "{} (account {})",
                caller.arn, caller.account_id
            ))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    fn supports_update(&self, resource_type: &str) -> bool {
        UPDATABLE.contains(&resource_type)
    }

    async fn create(&self, resource: &ResourceConfig) -> CloudResult<ResourceOutputs> {
        match resource.resource_type.as_str() {
            S3_BUCKET => self.create_bucket(&BucketSpec::from_config(resource)?).await,
            GRANTS_INSTANCE => {
                self.create_instance(&GrantsInstanceSpec::from_config(resource)?)
                    .await
            }
            IAM_ROLE => self.create_role(&RoleSpec::from_config(resource)?).await,
            GRANTS_LOCATION => {
                self.create_location(&LocationSpec::from_config(resource)?)
                    .await
            }
            IAM_GROUP => self.create_group(&GroupSpec::from_config(resource)?).await,
            IAM_POLICY => self.create_policy(&PolicySpec::from_config(resource)?).await,
            IAM_GROUP_POLICY_ATTACHMENT => {
                self.attach_group_policy(&GroupPolicyAttachmentSpec::from_config(resource)?)
                    .await
            }
            other => Err(CloudError::UnsupportedResource(other.to_string())),
        }
    }

    async fn update(
        &self,
        resource: &ResourceConfig,
        current: &ResourceState,
    ) -> CloudResult<ResourceOutputs> {
        match resource.resource_type.as_str() {
            GRANTS_INSTANCE => {
                self.update_instance(&GrantsInstanceSpec::from_config(resource)?, current)
                    .await
            }
            IAM_ROLE => {
                self.update_role(&RoleSpec::from_config(resource)?, current)
                    .await
            }
            GRANTS_LOCATION => {
                self.update_location(&LocationSpec::from_config(resource)?, current)
                    .await
            }
            IAM_POLICY => {
                self.update_policy(&PolicySpec::from_config(resource)?, current)
                    .await
            }
            other => Err(CloudError::UnsupportedResource(format!(
                "{other} cannot be updated in place"
            ))),
        }
    }

    async fn delete(&self, current: &ResourceState) -> CloudResult<()> {
        tracing::debug!("Deleting {} ({})", current.key, current.id);
        match current.resource_type.as_str() {
            S3_BUCKET => self.delete_bucket(current).await,
            GRANTS_INSTANCE => self.delete_instance(current).await,
            IAM_ROLE => {
                self.delete_role(&RoleSpec::from_inputs(&current.key, &current.inputs)?)
                    .await
            }
            GRANTS_LOCATION => self.delete_location(current).await,
            IAM_GROUP => self.delete_group(current).await,
            IAM_POLICY => self.delete_policy(current).await,
            IAM_GROUP_POLICY_ATTACHMENT => self.detach_group_policy(current).await,
            other => Err(CloudError::UnsupportedResource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cytoskel_cloud::ADOPTED_ATTRIBUTE;
    use serde_json::json;

    #[test]
    fn test_location_retry_schedule() {
        let retry = location_retry();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.delay_for(1), Duration::from_secs(2));
        assert_eq!(retry.delay_for(4), Duration::from_secs(16));
        assert_eq!(retry.delay_for(5), Duration::from_secs(30));
    }

    #[test]
    fn test_ignore_not_found() {
        let gone = Err(AwsError::NotFound {
            operation: "DeleteGroup".into(),
            code: "NoSuchEntity".into(),
            message: "gone".into(),
        });
        assert!(ignore_not_found(gone, "iam-group:g").is_ok());

        let denied = Err(AwsError::AccessDenied {
            operation: "DeleteGroup".into(),
            code: "AccessDenied".into(),
            message: "no".into(),
        });
        assert!(ignore_not_found(denied, "iam-group:g").is_err());
    }

    #[test]
    fn test_bucket_outputs() {
        let outputs = bucket_outputs("staging-cellpainting-gallery", false);
        assert_eq!(outputs.id, "staging-cellpainting-gallery");
        assert_eq!(
            outputs.attributes["arn"],
            "arn:aws:s3:::staging-cellpainting-gallery"
        );
        assert!(!outputs.attributes.contains_key(ADOPTED_ATTRIBUTE));
    }

    fn recorded(resource_type: &str, outputs: ResourceOutputs) -> ResourceState {
        let config = ResourceConfig::new(resource_type, "staging", PROVIDER_NAME, json!({}));
        ResourceState::created(&config, outputs)
    }

    #[test]
    fn test_existing_bucket_is_adopted() {
        let state = recorded(S3_BUCKET, bucket_outputs("staging-cellpainting-gallery", true));
        assert!(state.is_adopted());
        assert!(!recorded(S3_BUCKET, bucket_outputs("fresh", false)).is_adopted());
    }

    #[test]
    fn test_existing_instance_is_adopted() {
        let arn = "arn:aws:s3:us-east-1:123456789012:access-grants/default";
        let adopted = instance_outputs(Some("default"), Some(arn), true).unwrap();
        assert!(recorded(GRANTS_INSTANCE, adopted).is_adopted());

        let created = instance_outputs(None, Some(arn), false).unwrap();
        assert_eq!(created.id, "default");
        assert!(!recorded(GRANTS_INSTANCE, created).is_adopted());

        assert!(instance_outputs(Some("default"), None, true).is_err());
    }

    #[test]
    fn test_instance_tags() {
        let mut spec = GrantsInstanceSpec::default();
        spec.tags.insert("managed-by".into(), "cytoskel".into());
        spec.tags.insert("environment".into(), "test".into());

        let tags = tags(&spec).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].key(), "environment");
        assert_eq!(tags[0].value(), "test");
    }
}

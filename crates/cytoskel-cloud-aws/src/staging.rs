//! The staging stack: bucket, grants instance, location role and uploader group

use crate::client::{AwsContext, CallerIdentity};
use crate::error::AwsResult;
use crate::grants::GrantManager;
use crate::iam::SdkIam;
use crate::policy::AccessGrantsPolicies;
use crate::provider::AccessGrantsProvider;
use crate::resources::*;
use crate::s3control::SdkAccessGrants;
use crate::users::UserManager;
use cytoskel_cloud::{
    CloudError, Declarations, Hook, Program, ProgramBuilder, Result as CloudResult, Stack,
    StackIdentity, StackState, StateManager, Workspace, ensure_provider,
};
use cytoskel_config::{Settings, StagingNames};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const STAGING_HOOK: &str = "staging-bucket";

/// Declares the staging infrastructure of one account
///
/// Declaration order is dependency order: the bucket and grants instance
/// first, then the uploader group and its data-access policy, then the
/// location role and finally the location itself.
#[derive(Debug, Clone)]
pub struct StagingHook {
    names: StagingNames,
    account_id: String,
    environment: String,
}

impl StagingHook {
    pub fn new(
        names: StagingNames,
        account_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            names,
            account_id: account_id.into(),
            environment: environment.into(),
        }
    }
}

impl Hook for StagingHook {
    fn name(&self) -> &str {
        STAGING_HOOK
    }

    fn declare(&self, d: &mut Declarations) -> CloudResult<()> {
        let n = &self.names;

        let bucket = d.resource(
            BucketSpec {
                bucket: n.bucket_name.clone(),
            }
            .declare(&n.bucket_name)?
            .protected(n.protect_bucket),
        )?;

        let tags = BTreeMap::from([
            ("managed-by".to_string(), "cytoskel".to_string()),
            ("environment".to_string(), self.environment.clone()),
        ]);
        let instance = d.resource(GrantsInstanceSpec { tags }.declare(&n.grants_instance)?)?;

        let bucket_arn = bucket.output_token("arn");
        let instance_arn = instance.output_token("arn");
        let policies = AccessGrantsPolicies::new(&bucket_arn, &self.account_id, &instance_arn);

        let data_access = d.resource(
            PolicySpec {
                policy_name: n.data_access_policy.clone(),
                path: "/".to_string(),
                description: format!("Policy for {}", n.uploader_group),
                policy: policies.data_access_policy().to_value()?,
            }
            .declare(&n.data_access_policy)?,
        )?;

        let group = d.resource(
            GroupSpec {
                group_name: n.uploader_group.clone(),
            }
            .declare(&n.uploader_group)?,
        )?;

        d.resource(
            GroupPolicyAttachmentSpec {
                group_name: group.output_token("name"),
                policy_arn: data_access.output_token("arn"),
            }
            .declare(&n.group_policy_attachment)?,
        )?;

        let role = d.resource(
            RoleSpec {
                role_name: n.role_name.clone(),
                max_session_duration: n.max_session_duration,
                assume_role_policy: policies.trust_policy().to_value()?,
                inline_policies: vec![InlinePolicy {
                    name: n.role_policy_name.clone(),
                    policy: policies.permissions_policy().to_value()?,
                }],
            }
            .declare(&n.role)?,
        )?;

        let location = d.resource(
            LocationSpec {
                location_scope: format!("s3://{}/", bucket.output_token("bucket")),
                iam_role_arn: role.output_token("arn"),
            }
            .declare(&n.location)?,
        )?;

        d.export("grant_location_id", location.output_token("id"))?;
        d.export("bucket_arn", bucket_arn)?;
        d.export("access_grants_instance_arn", instance_arn)?;
        d.export("uploader_group", group.output_token("name"))?;
        Ok(())
    }
}

/// Entry point for everything the CLI does against one account
pub struct StagingStack {
    settings: Settings,
    ctx: Arc<AwsContext>,
    provider: AccessGrantsProvider,
    iam: SdkIam,
    grants_api: SdkAccessGrants,
}

impl StagingStack {
    /// Load AWS configuration for the given settings
    pub async fn connect(settings: Settings) -> Self {
        let ctx = Arc::new(AwsContext::load(&settings.aws).await);
        Self::with_context(settings, ctx)
    }

    pub fn with_context(settings: Settings, ctx: Arc<AwsContext>) -> Self {
        Self {
            provider: AccessGrantsProvider::new(ctx.clone()),
            iam: SdkIam::new(ctx.iam().clone()),
            grants_api: SdkAccessGrants::new(ctx.clone()),
            settings,
            ctx,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn identity(&self) -> StackIdentity {
        StackIdentity::new(
            &self.settings.project,
            &self.settings.stack,
            &self.settings.environment,
        )
    }

    fn workspace(&self) -> Workspace {
        Workspace::new(self.settings.state_dir())
    }

    pub async fn caller(&self) -> AwsResult<&CallerIdentity> {
        self.ctx.caller().await
    }

    /// The staging hook followed by `extra_hooks`, built into one program
    pub async fn program(&self, extra_hooks: Vec<Box<dyn Hook>>) -> CloudResult<Program> {
        let account_id = self.ctx.account_id().await?;
        ProgramBuilder::new()
            .hook(Box::new(StagingHook::new(
                self.settings.staging.clone(),
                account_id,
                &self.settings.environment,
            )))
            .hooks(extra_hooks)
            .build()
    }

    /// Create the stack on first use, or select it
    pub async fn create_stack(&self, extra_hooks: Vec<Box<dyn Hook>>) -> CloudResult<Stack<'_>> {
        ensure_provider(&self.provider).await?;
        let program = self.program(extra_hooks).await?;
        self.workspace()
            .create_or_select_stack(self.identity(), program, &self.provider)
            .await
    }

    /// Open the stack for previewing, without recording it
    pub async fn open_stack(&self, extra_hooks: Vec<Box<dyn Hook>>) -> CloudResult<Stack<'_>> {
        ensure_provider(&self.provider).await?;
        let program = self.program(extra_hooks).await?;
        self.workspace()
            .open_stack(self.identity(), program, &self.provider)
            .await
    }

    /// Select a stack that was created before
    pub async fn select_stack(&self, extra_hooks: Vec<Box<dyn Hook>>) -> CloudResult<Stack<'_>> {
        let identity = self.identity();
        if !StateManager::new(self.settings.state_dir(), identity.clone()).exists() {
            return Err(CloudError::StackNotFound {
                project: identity.project_name,
                stack: identity.stack_name,
            });
        }

        ensure_provider(&self.provider).await?;
        let program = self.program(extra_hooks).await?;
        self.workspace()
            .select_stack(identity, program, &self.provider)
            .await
    }

    /// Recorded state, read without contacting AWS
    pub async fn state(&self) -> CloudResult<Option<StackState>> {
        let manager = StateManager::new(self.settings.state_dir(), self.identity());
        if !manager.exists() {
            return Ok(None);
        }
        Ok(Some(manager.load().await?))
    }

    pub fn users(&self) -> UserManager<'_> {
        UserManager::new(&self.iam, &self.settings.staging.uploader_group)
    }

    pub fn grants(&self) -> GrantManager<'_> {
        GrantManager::new(&self.grants_api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ACCOUNT;
    use async_trait::async_trait;
    use cytoskel_cloud::{
        ApplyOptions, AuthStatus, CloudProvider, ResourceConfig, ResourceOutputs, ResourceState,
    };
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Stands in for AWS, answering with predictable identifiers
    #[derive(Default)]
    struct FakeAws {
        created: Mutex<Vec<ResourceConfig>>,
    }

    #[async_trait]
    impl CloudProvider for FakeAws {
        fn name(&self) -> &str {
            PROVIDER_NAME
        }

        fn display_name(&self) -> &str {
            "Fake AWS"
        }

        async fn check_auth(&self) -> CloudResult<AuthStatus> {
            Ok(AuthStatus::ok(ACCOUNT))
        }

        fn supports_update(&self, resource_type: &str) -> bool {
            UPDATABLE.contains(&resource_type)
        }

        async fn create(&self, resource: &ResourceConfig) -> CloudResult<ResourceOutputs> {
            self.created.lock().unwrap().push(resource.clone());
            Ok(ResourceOutputs::new(resource.name.clone())
                .with_attribute("arn", format!("arn:fake:{}", resource.key()))
                .with_attribute("name", resource.name.clone())
                .with_attribute("bucket", resource.name.clone())
                .with_attribute("id", format!("loc-{}", resource.name)))
        }

        async fn update(
            &self,
            _resource: &ResourceConfig,
            current: &ResourceState,
        ) -> CloudResult<ResourceOutputs> {
            Ok(ResourceOutputs::new(current.id.clone()))
        }

        async fn delete(&self, _current: &ResourceState) -> CloudResult<()> {
            Ok(())
        }
    }

    fn hook() -> StagingHook {
        StagingHook::new(StagingNames::default(), ACCOUNT, "test")
    }

    fn program() -> Program {
        ProgramBuilder::new().hook(Box::new(hook())).build().unwrap()
    }

    #[test]
    fn test_hook_declares_in_dependency_order() {
        let program = program();
        let keys: Vec<String> = program.resources.iter().map(|r| r.key()).collect();

        assert_eq!(
            keys,
            vec![
                "s3-bucket:staging-cellpainting-gallery",
                "access-grants-instance:grant_instance",
                "iam-policy:staging_cpg_creds_data_access",
                "iam-group:staging_cpg_uploaders",
                "iam-group-policy-attachment:s3_access_grants_group_policy_attach",
                "iam-role:cpg_staging_access_grant",
                "access-grants-location:demo-staging",
            ]
        );
        assert!(program.resources.iter().next().unwrap().protect);
        assert_eq!(
            program.exports.keys().collect::<Vec<_>>(),
            vec![
                "access_grants_instance_arn",
                "bucket_arn",
                "grant_location_id",
                "uploader_group"
            ]
        );
    }

    #[test]
    fn test_extra_hooks_follow_staging() {
        let extra = cytoskel_cloud::hook_fn("extra", |d| {
            d.resource(
                GroupSpec {
                    group_name: "reviewers".into(),
                }
                .declare("reviewers")?,
            )?;
            Ok(())
        });
        let program = ProgramBuilder::new()
            .hook(Box::new(hook()))
            .hook(extra)
            .build()
            .unwrap();

        assert_eq!(program.hooks, vec![STAGING_HOOK, "extra"]);
        assert_eq!(
            program.resources.iter().last().unwrap().key(),
            "iam-group:reviewers"
        );
    }

    #[test]
    fn test_staging_hook_runs_once_per_program() {
        let result = ProgramBuilder::new()
            .hook(Box::new(hook()))
            .hook(Box::new(hook()))
            .build();

        assert!(matches!(result, Err(CloudError::DuplicateResource(_))));
    }

    #[tokio::test]
    async fn test_up_resolves_references_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let provider = FakeAws::default();
        let stack = Workspace::new(dir.path())
            .create_or_select_stack(
                StackIdentity::new("CPG-Staging", "S3GrantsAccess", "test"),
                program(),
                &provider,
            )
            .await
            .unwrap();

        let first = stack.up(ApplyOptions::default()).await.unwrap();
        assert_eq!(first.plan.summary().create, 7);
        assert!(first.result.is_success());

        let created = provider.created.lock().unwrap().clone();
        let location = created.last().unwrap();
        assert_eq!(
            location.config,
            json!({
                "location_scope": "s3://staging-cellpainting-gallery/",
                "iam_role_arn": "arn:fake:iam-role:cpg_staging_access_grant",
            })
        );

        let role = RoleSpec::from_config(&created[5]).unwrap();
        let trust = role.assume_role_policy.to_string();
        assert!(trust.contains("arn:fake:access-grants-instance:grant_instance"));
        assert!(trust.contains(&format!("\"{ACCOUNT}\"")));
        assert!(!trust.contains("${output:"));

        let attachment = GroupPolicyAttachmentSpec::from_config(&created[4]).unwrap();
        assert_eq!(attachment.group_name, "staging_cpg_uploaders");
        assert_eq!(
            attachment.policy_arn,
            "arn:fake:iam-policy:staging_cpg_creds_data_access"
        );

        assert_eq!(
            first.outputs["grant_location_id"],
            "loc-demo-staging"
        );
        assert_eq!(first.outputs["uploader_group"], "staging_cpg_uploaders");

        let second = stack.up(ApplyOptions::default()).await.unwrap();
        assert_eq!(second.plan.summary().no_change, 7);
        assert_eq!(provider.created.lock().unwrap().len(), 7);
    }
}

//! Named stacks: a program, the state it was applied to, and a provider

use crate::action::{ApplyResult, Plan};
use crate::engine::{self, ApplyOptions, DestroyOptions};
use crate::error::{CloudError, Result};
use crate::program::Program;
use crate::provider::{AuthStatus, CloudProvider};
use crate::state::{ResourceState, StackIdentity, StackState, StateManager};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fail unless the provider reports valid credentials
pub async fn ensure_provider(provider: &dyn CloudProvider) -> Result<AuthStatus> {
    let status = provider.check_auth().await?;
    if !status.authenticated {
        return Err(CloudError::ProviderNotReady(format!(
            "{}: {}",
            provider.display_name(),
            status.error.as_deref().unwrap_or("not authenticated")
        )));
    }
    tracing::debug!(
        "{} authenticated as {}",
        provider.display_name(),
        status.account_info.as_deref().unwrap_or("unknown")
    );
    Ok(status)
}

/// Directory holding the state of every stack
#[derive(Debug, Clone)]
pub struct Workspace {
    state_dir: PathBuf,
}

impl Workspace {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Select a stack, creating an empty one on first use
    pub async fn create_or_select_stack<'p>(
        &self,
        identity: StackIdentity,
        program: Program,
        provider: &'p dyn CloudProvider,
    ) -> Result<Stack<'p>> {
        ensure_provider(provider).await?;

        let manager = StateManager::new(&self.state_dir, identity);
        if !manager.exists() {
            manager
                .save(&StackState::new(manager.identity().clone()))
                .await?;
            tracing::info!("Created stack {}", manager.identity());
        }

        Ok(Stack {
            manager,
            program,
            provider,
        })
    }

    /// Open a stack without creating it; one that was never applied has empty state
    pub async fn open_stack<'p>(
        &self,
        identity: StackIdentity,
        program: Program,
        provider: &'p dyn CloudProvider,
    ) -> Result<Stack<'p>> {
        ensure_provider(provider).await?;

        Ok(Stack {
            manager: StateManager::new(&self.state_dir, identity),
            program,
            provider,
        })
    }

    /// Select an existing stack
    pub async fn select_stack<'p>(
        &self,
        identity: StackIdentity,
        program: Program,
        provider: &'p dyn CloudProvider,
    ) -> Result<Stack<'p>> {
        let manager = StateManager::new(&self.state_dir, identity);
        if !manager.exists() {
            let identity = manager.identity();
            return Err(CloudError::StackNotFound {
                project: identity.project_name.clone(),
                stack: identity.stack_name.clone(),
            });
        }

        ensure_provider(provider).await?;

        Ok(Stack {
            manager,
            program,
            provider,
        })
    }
}

/// Outcome of `Stack::up`
#[derive(Debug, Clone)]
pub struct UpResult {
    pub plan: Plan,
    pub result: ApplyResult,
    pub outputs: BTreeMap<String, Value>,
}

/// A selected stack
pub struct Stack<'p> {
    manager: StateManager,
    program: Program,
    provider: &'p dyn CloudProvider,
}

impl<'p> Stack<'p> {
    pub fn identity(&self) -> &StackIdentity {
        self.manager.identity()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Recorded state of the stack
    pub async fn state(&self) -> Result<StackState> {
        self.manager.load().await
    }

    /// Exported outputs of the last successful `up`
    pub async fn outputs(&self) -> Result<BTreeMap<String, Value>> {
        Ok(self.manager.load().await?.outputs)
    }

    /// Recorded resources, in creation order
    pub async fn resources(&self) -> Result<Vec<ResourceState>> {
        Ok(self.manager.load().await?.resources)
    }

    /// Compute what `up` would do, without changing anything
    pub async fn preview(&self) -> Result<Plan> {
        let state = self.manager.load().await?;
        engine::plan(self.provider, &self.program.resources, &state)
    }

    /// Apply the program
    pub async fn up(&self, options: ApplyOptions) -> Result<UpResult> {
        let lock = self.manager.acquire_lock().await?;
        let mut state = self.manager.load().await?;

        let plan = engine::plan(self.provider, &self.program.resources, &state)?;
        tracing::info!("Plan for {}: {}", self.identity(), plan.summary());

        let result = engine::apply(
            self.provider,
            &self.program.resources,
            &plan,
            &mut state,
            &self.manager,
            options,
        )
        .await?;

        if result.is_success() {
            state.outputs = engine::resolve_exports(&self.program.exports, &state)?;
            self.manager.save(&state).await?;
        }

        lock.release().await?;
        Ok(UpResult {
            plan,
            result,
            outputs: state.outputs,
        })
    }

    /// Compute what `destroy` would do
    pub async fn preview_destroy(&self, options: DestroyOptions) -> Result<Plan> {
        let state = self.manager.load().await?;
        engine::plan_destroy(&state, options)
    }

    /// Delete every resource of the stack
    pub async fn destroy(&self, options: DestroyOptions) -> Result<ApplyResult> {
        let lock = self.manager.acquire_lock().await?;
        let mut state = self.manager.load().await?;

        let plan = engine::plan_destroy(&state, options)?;
        let result = engine::destroy(self.provider, &plan, &mut state, &self.manager).await?;

        lock.release().await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{FakeProvider, declarations};
    use crate::program::{ProgramBuilder, hook_fn};
    use crate::resource::OutputRef;
    use tempfile::tempdir;

    fn identity() -> StackIdentity {
        StackIdentity::new("proj", "stack", "test")
    }

    fn program() -> Program {
        ProgramBuilder::new()
            .hook(hook_fn("fixture", |d| {
                for resource in declarations("v1").iter() {
                    d.resource(resource.clone())?;
                }
                d.export(
                    "role_arn",
                    OutputRef::new("role", "reader", "arn").to_string(),
                )
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_select_missing_stack() {
        let dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let workspace = Workspace::new(dir.path());

        let result = workspace.select_stack(identity(), program(), &provider).await;
        assert!(matches!(
            result,
            Err(CloudError::StackNotFound { ref stack, .. }) if stack == "stack"
        ));
    }

    #[tokio::test]
    async fn test_up_records_outputs() {
        let dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let workspace = Workspace::new(dir.path());

        let stack = workspace
            .create_or_select_stack(identity(), program(), &provider)
            .await
            .unwrap();
        let up = stack.up(ApplyOptions::default()).await.unwrap();

        assert!(up.result.is_success());
        assert_eq!(up.outputs["role_arn"], "arn:fake:reader");
        assert_eq!(stack.outputs().await.unwrap()["role_arn"], "arn:fake:reader");
        let keys: Vec<String> = stack
            .resources()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["bucket:data", "role:reader", "location:prefix"]);

        // the stack now exists and a second run changes nothing
        let again = workspace
            .select_stack(identity(), program(), &provider)
            .await
            .unwrap();
        assert!(!again.preview().await.unwrap().has_changes);
    }

    #[tokio::test]
    async fn test_preview_of_new_stack_saves_nothing() {
        let dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let workspace = Workspace::new(dir.path());

        let stack = workspace
            .open_stack(identity(), program(), &provider)
            .await
            .unwrap();
        let plan = stack.preview().await.unwrap();

        assert_eq!(plan.summary().create, 3);
        assert!(provider.calls().is_empty());
        assert!(!StateManager::new(dir.path(), identity()).exists());
        assert!(matches!(
            workspace.select_stack(identity(), program(), &provider).await,
            Err(CloudError::StackNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_destroy_keeps_protected_when_excluded() {
        let dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let workspace = Workspace::new(dir.path());
        let stack = workspace
            .create_or_select_stack(identity(), program(), &provider)
            .await
            .unwrap();
        stack.up(ApplyOptions::default()).await.unwrap();

        assert!(stack.destroy(DestroyOptions::default()).await.is_err());

        let result = stack
            .destroy(DestroyOptions {
                exclude_protected: true,
            })
            .await
            .unwrap();
        assert!(result.is_success());

        let state = stack.state().await.unwrap();
        assert_eq!(state.resources.len(), 1);
        assert!(state.outputs.is_empty());
    }
}

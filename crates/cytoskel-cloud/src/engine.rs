//! Diffing declarations against recorded state, and applying the result
//!
//! `plan` never touches the cloud: it compares each declaration, with output
//! references resolved from the recorded state, against the inputs the
//! resource was last applied with. `apply` then walks the plan in order,
//! saving state after every action so that an interrupted run only records
//! what actually happened.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::provider::CloudProvider;
use crate::resource::{OutputRef, ResourceConfig, ResourceSet, resolve_outputs};
use crate::saga::Saga;
use crate::state::{ResourceState, ResourceStatus, StackState, StateManager};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Options for `apply`
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Delete resources created during a run that later fails
    pub rollback_on_failure: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
        }
    }
}

/// Options for `destroy`
#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyOptions {
    /// Leave protected resources in place instead of refusing to run
    pub exclude_protected: bool,
}

fn lookup(state: &StackState, requester: &str, reference: &OutputRef) -> Result<Value> {
    state
        .attribute(&reference.resource_key, &reference.attribute)
        .cloned()
        .ok_or_else(|| CloudError::UnresolvedReference {
            resource: requester.to_string(),
            reference: reference.to_string(),
        })
}

/// Resolve a declaration's output references against the recorded state
pub fn resolve(desired: &ResourceConfig, state: &StackState) -> Result<ResourceConfig> {
    let key = desired.key();
    let config = resolve_outputs(&desired.config, &|r: &OutputRef| lookup(state, &key, r))?;
    Ok(ResourceConfig {
        config,
        ..desired.clone()
    })
}

/// Resolve exported values against the recorded state
pub fn resolve_exports(
    exports: &BTreeMap<String, Value>,
    state: &StackState,
) -> Result<BTreeMap<String, Value>> {
    exports
        .iter()
        .map(|(name, value)| {
            let requester = format!("export {}", name);
            let resolved = resolve_outputs(value, &|r: &OutputRef| lookup(state, &requester, r))?;
            Ok((name.clone(), resolved))
        })
        .collect()
}

/// Compute the actions that bring the recorded state to the declared one
pub fn plan(
    provider: &dyn CloudProvider,
    desired: &ResourceSet,
    state: &StackState,
) -> Result<Plan> {
    let mut actions = Vec::new();
    // Resources whose attributes may change during this run
    let mut changing: HashSet<String> = HashSet::new();

    for resource in desired.iter() {
        if resource.provider != provider.name() {
            return Err(CloudError::UnsupportedResource(format!(
                "{} belongs to provider {}, not {}",
                resource.key(),
                resource.provider,
                provider.name()
            )));
        }

        let key = resource.key();
        let Some(current) = state.get_resource(&key) else {
            actions.push(Action::new(ActionType::Create, &resource.resource_type, &key));
            changing.insert(key);
            continue;
        };

        let upstream_changing = resource
            .references()?
            .iter()
            .any(|r| changing.contains(&r.resource_key));

        let changed = upstream_changing
            || current.status == ResourceStatus::Error
            || resolve(resource, state)?.config != current.inputs;

        if !changed {
            let mut action = Action::new(ActionType::NoOp, &resource.resource_type, &key);
            if current.protect != resource.protect {
                action = action.with_detail("protect", Value::Bool(resource.protect));
            }
            actions.push(action);
        } else if provider.supports_update(&resource.resource_type) {
            actions.push(Action::new(ActionType::Update, &resource.resource_type, &key));
            changing.insert(key);
        } else {
            if current.protect {
                return Err(CloudError::Protected(key));
            }
            actions.push(Action::new(ActionType::Replace, &resource.resource_type, &key));
            changing.insert(key);
        }
    }

    // Resources no longer declared go away, newest first
    for current in state.resources.iter().rev() {
        if desired.contains(&current.key) {
            continue;
        }
        if current.protect {
            return Err(CloudError::Protected(current.key.clone()));
        }
        actions.push(Action::new(ActionType::Delete, &current.resource_type, &current.key));
    }

    Ok(Plan::new(actions))
}

/// Plan the removal of every recorded resource, newest first
pub fn plan_destroy(state: &StackState, options: DestroyOptions) -> Result<Plan> {
    let protected: Vec<&str> = state
        .resources
        .iter()
        .filter(|r| r.protect)
        .map(|r| r.key.as_str())
        .collect();

    if !protected.is_empty() && !options.exclude_protected {
        return Err(CloudError::Protected(protected.join(", ")));
    }

    let actions = state
        .resources
        .iter()
        .rev()
        .map(|r| {
            let action_type = if r.protect {
                ActionType::NoOp
            } else {
                ActionType::Delete
            };
            Action::new(action_type, &r.resource_type, &r.key)
        })
        .collect();

    Ok(Plan::new(actions))
}

/// Apply a plan produced by [`plan`], persisting state after every action
pub async fn apply(
    provider: &dyn CloudProvider,
    desired: &ResourceSet,
    plan: &Plan,
    state: &mut StackState,
    manager: &StateManager,
    options: ApplyOptions,
) -> Result<ApplyResult> {
    let start = std::time::Instant::now();
    let mut result = ApplyResult::new();
    let mut saga: Saga<'_, CloudError> = Saga::new(format!("apply {}", state.identity));

    for action in &plan.actions {
        match apply_action(provider, desired, action, state).await {
            Ok(created) => {
                if action.action_type != ActionType::NoOp {
                    result.add_success(action.id.clone(), action.description.clone());
                }
                match created {
                    Some(created) if created.is_adopted() => {
                        saga.irreversible(format!("{} (adopted)", created.key))
                    }
                    Some(created) if !created.protect => {
                        let label = created.key.clone();
                        saga.on_undo(label, async move { provider.delete(&created).await });
                    }
                    Some(created) => saga.irreversible(format!("{} (protected)", created.key)),
                    None if action.action_type == ActionType::NoOp => {}
                    None => saga.irreversible(action.description.clone()),
                }
                manager.save(state).await?;
            }
            Err(e) => {
                tracing::error!("{} failed: {}", action.description, e);
                result.add_failure(action.id.clone(), e.to_string());

                if options.rollback_on_failure {
                    let failure = saga.abort(&action.id, e).await;
                    for key in &failure.compensated {
                        state.remove_resource(key);
                    }
                    result.rolled_back = failure.compensated;
                    result.uncompensated = failure.uncompensated;
                }

                manager.save(state).await?;
                break;
            }
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    Ok(result)
}

fn declared<'d>(desired: &'d ResourceSet, key: &str) -> Result<&'d ResourceConfig> {
    desired
        .get_by_key(key)
        .ok_or_else(|| CloudError::ResourceNotFound(key.to_string()))
}

fn recorded(state: &StackState, key: &str) -> Result<ResourceState> {
    state
        .get_resource(key)
        .cloned()
        .ok_or_else(|| CloudError::ResourceNotFound(key.to_string()))
}

/// Planned because an upstream resource changed, but its outputs did not
fn unchanged(resolved: &ResourceConfig, current: &ResourceState) -> bool {
    let same = current.status == ResourceStatus::Ready && resolved.config == current.inputs;
    if same {
        tracing::debug!("{} is unaffected by upstream changes", current.key);
    }
    same
}

fn mark_error(state: &mut StackState, key: &str) {
    if let Some(mut resource) = state.get_resource(key).cloned() {
        resource.status = ResourceStatus::Error;
        state.set_resource(resource);
    }
}

/// Delete a resource, or only forget it when the stack adopted it
async fn delete_unless_adopted(
    provider: &dyn CloudProvider,
    current: &ResourceState,
) -> Result<()> {
    if current.is_adopted() {
        tracing::warn!(
            "{} ({}) existed before this stack, leaving it in place",
            current.key,
            current.id
        );
        return Ok(());
    }
    provider.delete(current).await
}

/// Apply one action; returns the new state of a created resource
async fn apply_action(
    provider: &dyn CloudProvider,
    desired: &ResourceSet,
    action: &Action,
    state: &mut StackState,
) -> Result<Option<ResourceState>> {
    let key = action.resource_key.as_str();

    match action.action_type {
        ActionType::NoOp => {
            if let Some(Value::Bool(protect)) = action.details.get("protect") {
                let mut current = recorded(state, key)?;
                current.protect = *protect;
                state.set_resource(current);
            }
            Ok(None)
        }
        ActionType::Create => {
            let resolved = resolve(declared(desired, key)?, state)?;
            tracing::info!("Creating {}", key);
            let outputs = provider.create(&resolved).await?;
            let created = ResourceState::created(&resolved, outputs);
            state.set_resource(created.clone());
            Ok(Some(created))
        }
        ActionType::Update => {
            let resolved = resolve(declared(desired, key)?, state)?;
            let current = recorded(state, key)?;
            if unchanged(&resolved, &current) {
                return Ok(None);
            }
            tracing::info!("Updating {}", key);
            match provider.update(&resolved, &current).await {
                Ok(outputs) => {
                    state.set_resource(current.updated(&resolved, outputs));
                    Ok(None)
                }
                Err(e) => {
                    mark_error(state, key);
                    Err(e)
                }
            }
        }
        ActionType::Replace => {
            let resolved = resolve(declared(desired, key)?, state)?;
            let current = recorded(state, key)?;
            if unchanged(&resolved, &current) {
                return Ok(None);
            }
            if current.protect {
                return Err(CloudError::Protected(key.to_string()));
            }
            tracing::info!("Replacing {}", key);
            delete_unless_adopted(provider, &current).await?;
            state.remove_resource(key);
            let outputs = provider.create(&resolved).await?;
            state.set_resource(ResourceState::created(&resolved, outputs));
            Ok(None)
        }
        ActionType::Delete => {
            let current = recorded(state, key)?;
            if current.protect {
                return Err(CloudError::Protected(key.to_string()));
            }
            tracing::info!("Deleting {}", key);
            if let Err(e) = delete_unless_adopted(provider, &current).await {
                mark_error(state, key);
                return Err(e);
            }
            state.remove_resource(key);
            Ok(None)
        }
    }
}

/// Delete recorded resources according to a plan from [`plan_destroy`]
pub async fn destroy(
    provider: &dyn CloudProvider,
    plan: &Plan,
    state: &mut StackState,
    manager: &StateManager,
) -> Result<ApplyResult> {
    let start = std::time::Instant::now();
    let mut result = ApplyResult::new();
    let nothing_declared = ResourceSet::new();

    for action in plan.actions_by_type(ActionType::Delete) {
        let outcome = apply_action(provider, &nothing_declared, action, state).await;
        manager.save(state).await?;
        match outcome {
            Ok(_) => result.add_success(action.id.clone(), action.description.clone()),
            Err(e) => {
                tracing::error!("{} failed: {}", action.description, e);
                result.add_failure(action.id.clone(), e.to_string());
                break;
            }
        }
    }

    if result.is_success() {
        state.outputs.clear();
        manager.save(state).await?;
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    Ok(result)
}

//! cytoskel provisioning engine
//!
//! Declarative management of cloud resources for cytoskel stacks. Hooks
//! declare the desired resources of a stack, the engine diffs them against
//! the recorded state, and a provider applies the resulting plan.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  cytoskel CLI                    │
//! │           (up / preview / destroy)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               cytoskel-cloud                     │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │   Program    │  │    Engine    │             │
//! │  │ (hooks)      │  │ plan / apply │             │
//! │  └──────────────┘  └──────────────┘             │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  State Mgmt  │  │     Saga     │             │
//! │  └──────────────┘  └──────────────┘             │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait CloudProvider
//!           ┌───────▼───────┐
//!           │  cytoskel-    │
//!           │  cloud-aws    │
//!           └───────────────┘
//! ```

pub mod action;
pub mod engine;
pub mod error;
pub mod program;
pub mod provider;
pub mod resource;
pub mod saga;
pub mod stack;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use engine::{ApplyOptions, DestroyOptions};
pub use error::{CloudError, Result};
pub use program::{Declarations, DeclaredResource, Hook, Program, ProgramBuilder, hook_fn};
pub use provider::{ADOPTED_ATTRIBUTE, AuthStatus, CloudProvider, ResourceOutputs, RetryConfig};
pub use resource::{OutputRef, ResourceConfig, ResourceSet, resource_key};
pub use saga::{Saga, SagaError};
pub use stack::{Stack, UpResult, Workspace, ensure_provider};
pub use state::{
    ResourceState, ResourceStatus, StackIdentity, StackState, StateLock, StateManager,
};

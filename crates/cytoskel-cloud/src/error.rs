//! Engine error types

use thiserror::Error;

/// Provisioning engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Duplicate resource declaration: {0}")]
    DuplicateResource(String),

    #[error("Invalid output reference: {0}")]
    InvalidReference(String),

    #[error("Unresolved output reference {reference} (required by {resource})")]
    UnresolvedReference { resource: String, reference: String },

    #[error("Resource {0} is protected and cannot be deleted or replaced")]
    Protected(String),

    #[error("Stack not found: {project}/{stack}")]
    StackNotFound { project: String, stack: String },

    #[error("Provider not ready: {0}")]
    ProviderNotReady(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedResource(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

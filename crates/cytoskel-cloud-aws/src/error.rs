//! AWS error classification

use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata};
use cytoskel_cloud::{CloudError, SagaError};
use thiserror::Error;

/// Errors from AWS calls and the operations built on them
#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS configuration error: {0}")]
    Config(String),

    #[error("{operation}: {code}: {message}")]
    Conflict {
        operation: String,
        code: String,
        message: String,
    },

    #[error("{operation}: {code}: {message}")]
    NotFound {
        operation: String,
        code: String,
        message: String,
    },

    #[error("{operation}: {code}: {message}")]
    AccessDenied {
        operation: String,
        code: String,
        message: String,
    },

    #[error("{operation}: {code}: {message}")]
    Api {
        operation: String,
        code: String,
        message: String,
    },

    #[error("{operation}: response is missing {field}")]
    MissingField {
        operation: String,
        field: &'static str,
    },

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Saga(#[from] Box<SagaError<AwsError>>),
}

pub type AwsResult<T> = std::result::Result<T, AwsError>;

impl AwsError {
    /// Classify an SDK error by its service error code
    pub fn from_sdk<E>(operation: impl Into<String>, err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        let operation = operation.into();
        tracing::debug!("{} failed: {}", operation, DisplayErrorContext(&err));

        let Some(code) = err.code().map(str::to_string) else {
            return AwsError::Api {
                operation,
                code: "Unknown".to_string(),
                message: DisplayErrorContext(&err).to_string(),
            };
        };
        let message = err.message().unwrap_or("no message").to_string();

        if is_not_found_code(&code) {
            AwsError::NotFound { operation, code, message }
        } else if is_conflict_code(&code) {
            AwsError::Conflict { operation, code, message }
        } else if code.contains("AccessDenied") || code == "UnauthorizedOperation" {
            AwsError::AccessDenied { operation, code, message }
        } else {
            AwsError::Api { operation, code, message }
        }
    }

    pub fn missing(operation: impl Into<String>, field: &'static str) -> Self {
        AwsError::MissingField {
            operation: operation.into(),
            field,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            AwsError::NotFound { .. } => true,
            AwsError::Saga(saga) => saga.source.is_not_found(),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            AwsError::Conflict { .. } => true,
            AwsError::Saga(saga) => saga.source.is_conflict(),
            _ => false,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        match self {
            AwsError::AccessDenied { .. } => true,
            AwsError::Saga(saga) => saga.source.is_access_denied(),
            _ => false,
        }
    }
}

impl From<SagaError<AwsError>> for AwsError {
    /// A saga that failed before changing anything reports its cause directly
    fn from(err: SagaError<AwsError>) -> Self {
        if err.compensated.is_empty() && err.uncompensated.is_empty() {
            return err.into_source();
        }
        AwsError::Saga(Box::new(err))
    }
}

fn is_not_found_code(code: &str) -> bool {
    code.contains("NotFound") || code.starts_with("NoSuch") || code.contains("NotExist")
}

fn is_conflict_code(code: &str) -> bool {
    matches!(
        code,
        "EntityAlreadyExists"
            | "BucketAlreadyExists"
            | "BucketAlreadyOwnedByYou"
            | "AccessGrantAlreadyExists"
            | "AccessGrantsInstanceAlreadyExists"
            | "AccessGrantsLocationAlreadyExists"
            | "DeleteConflict"
            | "ConcurrentModification"
    )
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Config(msg) => CloudError::ProviderNotReady(msg),
            AwsError::Conflict { .. } => CloudError::ResourceAlreadyExists(err.to_string()),
            AwsError::NotFound { .. } => CloudError::ResourceNotFound(err.to_string()),
            AwsError::AccessDenied { .. } => CloudError::AuthenticationFailed(err.to_string()),
            AwsError::Policy(msg) | AwsError::InvalidRequest(msg) => CloudError::InvalidConfig(msg),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classification() {
        assert!(is_not_found_code("NoSuchEntity"));
        assert!(is_not_found_code("NoSuchBucket"));
        assert!(is_not_found_code("AccessGrantsLocationNotFound"));
        assert!(is_not_found_code("AccessGrantsInstanceNotExistsError"));
        assert!(!is_not_found_code("EntityAlreadyExists"));

        assert!(is_conflict_code("EntityAlreadyExists"));
        assert!(is_conflict_code("BucketAlreadyOwnedByYou"));
        assert!(!is_conflict_code("Throttling"));
    }

    #[test]
    fn test_saga_error_keeps_classification() {
        let source = AwsError::NotFound {
            operation: "DeleteUser".into(),
            code: "NoSuchEntity".into(),
            message: "user bob not found".into(),
        };
        let saga = SagaError {
            saga: "delete-user bob".into(),
            step: "delete user".into(),
            source,
            compensated: vec!["group membership".into()],
            uncompensated: vec![],
        };
        let err = AwsError::from(saga);

        assert!(err.is_not_found());
        assert!(err.to_string().contains("NoSuchEntity"));
        assert!(matches!(err, AwsError::Saga(_)));
    }

    #[test]
    fn test_saga_error_without_progress_is_unwrapped() {
        let saga = SagaError {
            saga: "create-user alice".into(),
            step: "create user".into(),
            source: AwsError::Conflict {
                operation: "CreateUser".into(),
                code: "EntityAlreadyExists".into(),
                message: "alice exists".into(),
            },
            compensated: vec![],
            uncompensated: vec![],
        };
        assert!(matches!(AwsError::from(saga), AwsError::Conflict { .. }));
    }

    #[test]
    fn test_into_cloud_error() {
        let err = AwsError::Conflict {
            operation: "CreateRole".into(),
            code: "EntityAlreadyExists".into(),
            message: "role exists".into(),
        };
        assert!(matches!(
            CloudError::from(err),
            CloudError::ResourceAlreadyExists(msg) if msg.contains("CreateRole")
        ));
    }
}

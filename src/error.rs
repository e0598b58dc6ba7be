//! Error types for the cloudpilot deployment kernel.
//!
//! Errors that abort an operation (configuration, plan validation, history
//! storage, broken contracts) live in [`CloudPilotError`]. Failures that happen
//! while a plan runs are values: a failed step is an [`ExecutionError`], a
//! failed compensation is a [`RollbackError`], and both end up in the
//! execution report instead of being propagated.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for cloudpilot.
#[derive(Debug, Error)]
pub enum CloudPilotError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plan parsing and validation errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Provider errors that escaped an execution (client construction).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Deployment history errors.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// A programming contract was broken; the operation must not continue.
    #[error("Precondition violated: {message}")]
    PreconditionViolation {
        /// Description of the broken contract.
        message: String,
    },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Plan errors. All of them are raised before any provider call is made.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The plan document could not be read or decoded.
    #[error("Failed to parse plan: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// The plan is structurally invalid.
    #[error("Plan validation failed: {message}")]
    Validation {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Failures reported by a provider client.
///
/// These are returned as values by [`crate::provider::ProviderClient::invoke`];
/// a provider never panics to report a failed call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The operation ran and the provider rejected it.
    #[error("{service}.{operation} failed: {message}")]
    OperationFailed {
        /// Target service.
        service: String,
        /// Operation that failed.
        operation: String,
        /// Provider-supplied failure detail.
        message: String,
    },

    /// No handler exists for the `(service, operation)` pair.
    #[error("Unsupported operation: {service}.{operation}")]
    Unsupported {
        /// Requested service.
        service: String,
        /// Requested operation.
        operation: String,
    },

    /// Authentication failed.
    #[error("Provider authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Provider request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Provider rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, from `Retry-After`; 0 when the
        /// gateway gave no hint.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with provider: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from provider: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Why a single plan step did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The provider reported a failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider call did not finish within the step timeout.
    #[error("Provider call timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The caller requested cancellation before the step started.
    #[error("Deployment cancelled before step started")]
    Cancelled,

    /// A placeholder could not be resolved from earlier step payloads.
    #[error("Unresolved placeholder {placeholder}")]
    UnresolvedPlaceholder {
        /// The placeholder text, e.g. `${network.SubnetId}`.
        placeholder: String,
    },
}

/// A compensating call that failed during the rollback sweep.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Rollback of step '{step}' ({operation}) failed: {message}")]
pub struct RollbackError {
    /// Step whose compensation failed.
    pub step: String,
    /// Compensating operation that was invoked.
    pub operation: String,
    /// Failure detail.
    pub message: String,
}

/// Deployment history errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// No record exists for the deployment.
    #[error("No history record for deployment {deployment_id}")]
    NotFound {
        /// The deployment identifier that was requested.
        deployment_id: String,
    },

    /// A history file is corrupted.
    #[error("History is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Writing to the history directory failed.
    #[error("Failed to write history: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire history lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// The lock is held by another process.
    #[error("History is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("History serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Result type alias for cloudpilot operations.
pub type Result<T> = std::result::Result<T, CloudPilotError>;

impl CloudPilotError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a precondition violation.
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            message: message.into(),
        }
    }

    /// Returns true if this error rejected a plan before execution.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Plan(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl PlanError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::Parse {
            message: message.into(),
            location,
        }
    }
}

impl ProviderError {
    /// Creates an operation failure.
    #[must_use]
    pub fn failed(
        service: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::OperationFailed {
            service: service.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Returns true if the call may succeed when repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::NetworkError { .. } => true,
            Self::ApiRequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl HistoryError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_provider_errors() {
        assert!(ProviderError::network("reset").is_retryable());
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(ProviderError::api_error(503, "unavailable").is_retryable());
        assert!(!ProviderError::api_error(400, "bad request").is_retryable());
        assert!(!ProviderError::failed("ec2", "run_instances", "quota").is_retryable());
    }

    #[test]
    fn test_execution_error_display_keeps_provider_detail() {
        let err = ExecutionError::from(ProviderError::failed("s3", "create_bucket", "BucketAlreadyExists"));
        assert_eq!(err.to_string(), "s3.create_bucket failed: BucketAlreadyExists");
    }

    #[test]
    fn test_plan_errors_are_validation() {
        let err = CloudPilotError::from(PlanError::validation("unknown step", "deploymentOrder[0]"));
        assert!(err.is_validation());
        assert!(!CloudPilotError::precondition("bad ledger entry").is_validation());
    }
}

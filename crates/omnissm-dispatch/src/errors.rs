//! Dispatcher error types.

use omnissm_registry::RegistryError;
use omnissm_ssm::SsmError;
use thiserror::Error;

/// Dispatcher and overflow-queue errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Terminal downstream failure
    #[error(transparent)]
    Ssm(#[from] SsmError),

    /// Terminal registry failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Overflow queue failure
    #[error("queue error: {0}")]
    Queue(String),

    /// Message could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Retry budget exhausted with no overflow queue configured
    #[error("max retries exceeded: {0}")]
    MaxRetriesExceeded(String),

    /// The enclosing operation was cancelled mid-backoff
    #[error("cancelled")]
    Cancelled,
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors the dispatcher knows how to retry.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for SsmError {
    fn is_retryable(&self) -> bool {
        SsmError::is_retryable(self)
    }
}

impl RetryableError for RegistryError {
    fn is_retryable(&self) -> bool {
        RegistryError::is_retryable(self)
    }
}

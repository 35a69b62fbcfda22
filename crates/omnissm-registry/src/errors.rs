//! Registry error types.

use thiserror::Error;

/// Registry storage errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(String),

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Conditional update targeted a key that does not exist
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Storage asked us to back off; surfaced so the dispatcher can
    /// absorb it
    #[error("throttled: {0}")]
    Throttled(String),
}

impl RegistryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Throttled(_))
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

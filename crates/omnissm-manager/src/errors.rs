//! Manager error types.

use omnissm_dispatch::DispatchError;
use omnissm_registry::RegistryError;
use thiserror::Error;

/// Errors from the manager, change processor and reconciler.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Activation mint exhausted its retries and was parked on the
    /// overflow queue; the caller has no credentials to return yet.
    #[error("activation deferred to overflow queue")]
    ActivationDeferred,

    /// Event carried a messageType we do not handle
    #[error("unknown message type: {0:?}")]
    UnknownMessageType(String),

    /// Event payload is structurally unusable
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Oversized item could not be fetched or re-parsed
    #[error("oversized item fetch failed: {0}")]
    OversizedFetch(String),

    /// Batched configuration fetch failed
    #[error("configuration fetch failed: {0}")]
    ConfigurationFetch(String),

    /// Object store failure
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Configuration file or environment problem
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for manager operations
pub type Result<T> = std::result::Result<T, ManagerError>;

//! Fleet-management client error types.

use thiserror::Error;

/// Errors from the fleet-management service.
#[derive(Debug, Error)]
pub enum SsmError {
    /// The service asked us to slow down (HTTP 429)
    #[error("throttled: {0}")]
    Throttled(String),

    /// Transient failure worth retrying (5xx, connection loss, timeout)
    #[error("retryable: {0}")]
    Retryable(String),

    /// Terminal API failure
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Malformed response body
    #[error("bad response: {0}")]
    BadResponse(String),
}

impl SsmError {
    /// Whether the dispatcher should retry this failure. Everything
    /// that is not an explicit throttle or retryable signal is
    /// terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SsmError::Throttled(_) | SsmError::Retryable(_))
    }
}

/// Result type for fleet-management operations
pub type Result<T> = std::result::Result<T, SsmError>;

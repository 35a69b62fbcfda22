//! Identity verification error types.

use thiserror::Error;

/// Identity verification errors
///
/// The variants map one-to-one onto the error kinds surfaced by the
/// registration endpoint, so handlers can translate them without
/// string matching.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Request envelope or document is not valid JSON
    #[error("malformed json")]
    MalformedJson(#[source] serde_json::Error),

    /// Provider tag is not recognized
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Signature is not valid base64
    #[error("malformed rsa signature")]
    MalformedRsaSignature(#[source] base64::DecodeError),

    /// Signature does not verify, or the document cannot be parsed
    /// after verification
    #[error("invalid identity")]
    InvalidIdentity,
}

/// Result type for identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;

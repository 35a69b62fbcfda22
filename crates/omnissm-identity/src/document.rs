//! Identity document model and registry key derivation.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

use crate::errors::IdentityError;

/// Cloud providers whose identity documents are accepted.
///
/// Each provider ships a signing certificate; the matching public key is
/// compiled into [`crate::Verifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
}

impl FromStr for Provider {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Provider::Aws),
            other => Err(IdentityError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Aws => write!(f, "aws"),
        }
    }
}

/// Canonical identity record extracted from a verified document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub account_id: String,
    pub region: String,
    pub instance_id: String,
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub private_ip: String,
}

impl Document {
    /// Registration name for this instance, unique across accounts.
    pub fn name(&self) -> String {
        format!("{}-{}", self.account_id, self.instance_id)
    }

    /// Registry key for this instance.
    pub fn registration_id(&self) -> String {
        registration_id(&self.name())
    }
}

/// Derive the stable registry key from a registration name.
///
/// Two registrations for the same `(account, instance)` pair collapse to
/// the same key.
pub fn registration_id(name: &str) -> String {
    let digest = Sha1::digest(name.as_bytes());
    hex::encode_upper(digest)
}

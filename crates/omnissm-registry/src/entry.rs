//! Registration entry model and the monotonic patch applied to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single instance registration.
///
/// `id` is derived from the identity document and never changes;
/// `activation_id`/`activation_code` are written once when the entry is
/// minted; everything else only advances (see [`EntryPatch`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub activation_id: String,
    #[serde(default)]
    pub activation_code: String,
    #[serde(default)]
    pub managed_id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub is_tagged: bool,
    #[serde(default)]
    pub is_inventoried: bool,
    #[serde(default)]
    pub enriched: bool,
}

impl RegistrationEntry {
    /// Entry for a freshly registered instance, before any enrichment.
    pub fn new(id: String, account_id: String, region: String, instance_id: String) -> Self {
        RegistrationEntry {
            id,
            created_at: Utc::now(),
            activation_id: String::new(),
            activation_code: String::new(),
            managed_id: String::new(),
            account_id,
            region,
            instance_id,
            is_tagged: false,
            is_inventoried: false,
            enriched: false,
        }
    }
}

/// Advance-only mutation of a registration entry.
///
/// A patch can fill blank fields and raise flags; it cannot clear
/// anything. Re-applying a patch is a no-op, which keeps overlapping
/// reconciliation runs safe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub managed_id: Option<String>,
    pub activation_id: Option<String>,
    pub activation_code: Option<String>,
    pub is_tagged: bool,
    pub is_inventoried: bool,
    pub enriched: bool,
}

impl EntryPatch {
    pub fn new() -> Self {
        EntryPatch::default()
    }

    pub fn managed_id(mut self, managed_id: &str) -> Self {
        self.managed_id = Some(managed_id.to_string());
        self
    }

    pub fn activation(mut self, activation_id: &str, activation_code: &str) -> Self {
        self.activation_id = Some(activation_id.to_string());
        self.activation_code = Some(activation_code.to_string());
        self
    }

    pub fn tagged(mut self) -> Self {
        self.is_tagged = true;
        self
    }

    pub fn inventoried(mut self) -> Self {
        self.is_inventoried = true;
        self
    }

    pub fn enriched(mut self) -> Self {
        self.enriched = true;
        self
    }

    /// Apply the patch, honoring the monotonicity rules.
    pub fn apply(&self, entry: &mut RegistrationEntry) {
        if let Some(managed_id) = &self.managed_id {
            if !managed_id.is_empty() {
                entry.managed_id = managed_id.clone();
            }
        }
        // Activation credentials are written exactly once.
        if entry.activation_id.is_empty() {
            if let (Some(id), Some(code)) = (&self.activation_id, &self.activation_code) {
                entry.activation_id = id.clone();
                entry.activation_code = code.clone();
            }
        }
        entry.is_tagged |= self.is_tagged;
        entry.is_inventoried |= self.is_inventoried;
        entry.enriched |= self.enriched;
    }
}

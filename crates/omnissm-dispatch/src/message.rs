//! Deferred-action message format.
//!
//! The queue format is a tagged variant per downstream mutation; the
//! body carries exactly the parameters needed to resume the action
//! later, with no reference back to in-process state.

use omnissm_registry::RegistrationEntry;
use omnissm_ssm::{CustomInventory, ResourceTags};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A downstream mutation, expressed as data.
///
/// `CreateActivation` carries the pending registration entry so a
/// drainer can mint the activation and complete the registry write
/// without the original caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Body")]
pub enum DeferredAction {
    CreateActivation(RegistrationEntry),
    AddTagsToResource(ResourceTags),
    PutInventory(CustomInventory),
    #[serde(rename_all = "PascalCase")]
    DeregisterManagedInstance { managed_id: String },
}

impl DeferredAction {
    /// Tag name, used for logging and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            DeferredAction::CreateActivation(_) => "CreateActivation",
            DeferredAction::AddTagsToResource(_) => "AddTagsToResource",
            DeferredAction::PutInventory(_) => "PutInventory",
            DeferredAction::DeregisterManagedInstance { .. } => "DeregisterManagedInstance",
        }
    }
}

/// Envelope persisted on the overflow queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredActionMessage {
    /// Random id, also used as the queue deduplication id.
    #[serde(rename = "MessageId")]
    pub message_id: Uuid,
    #[serde(flatten)]
    pub action: DeferredAction,
}

impl DeferredActionMessage {
    pub fn new(action: DeferredAction) -> Self {
        DeferredActionMessage {
            message_id: Uuid::new_v4(),
            action,
        }
    }
}

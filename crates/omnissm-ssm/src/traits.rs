//! Fleet-management API trait.

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{Activation, ActivationRequest, CustomInventory, ResourceTags};

/// The four mutations the control plane performs downstream.
///
/// All calls are idempotent from the caller's perspective: re-applying
/// tags or inventory for the same instance converges to the same state,
/// and deregistering an already-deregistered instance is a terminal
/// error the caller logs and drops.
#[async_trait]
pub trait SsmApi: Send + Sync {
    /// Mint one-shot activation credentials for a registering instance.
    async fn create_activation(&self, request: &ActivationRequest) -> Result<Activation>;

    /// Mirror resource tags onto a managed instance.
    async fn add_tags_to_resource(&self, tags: &ResourceTags) -> Result<()>;

    /// Push a custom inventory record for a managed instance.
    async fn put_inventory(&self, inventory: &CustomInventory) -> Result<()>;

    /// Tear down a managed instance.
    async fn deregister_managed_instance(&self, managed_id: &str) -> Result<()>;
}

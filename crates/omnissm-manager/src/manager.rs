//! The manager drives registrations and enrichment against the
//! fleet-management service, keeping the registry's monotonic flags in
//! step with what actually completed downstream.

use omnissm_dispatch::{Dispatched, Dispatcher};
use omnissm_identity::Document;
use omnissm_registry::{EntryPatch, RegistrationEntry, RegistryStore};
use omnissm_ssm::{ActivationRequest, CustomInventory, InventoryContent, ResourceTags, Tag};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::errors::{ManagerError, Result};
use crate::event::ConfigurationItem;

const INVENTORY_TYPE_NAME: &str = "Custom:CloudInfo";
const INVENTORY_SCHEMA_VERSION: &str = "1.0";
const DEFAULT_PLATFORM: &str = "Linux";

pub struct Manager {
    registry: Arc<dyn RegistryStore>,
    dispatcher: Arc<Dispatcher>,
    resource_tags: HashSet<String>,
    instance_role: String,
    delete_entry_on_resource_deleted: bool,
}

impl Manager {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        dispatcher: Arc<Dispatcher>,
        config: &Config,
    ) -> Self {
        Manager {
            registry,
            dispatcher,
            resource_tags: config.resource_tags.iter().cloned().collect(),
            instance_role: config.instance_role.clone(),
            delete_entry_on_resource_deleted: config.delete_entry_on_resource_deleted,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<RegistrationEntry>> {
        Ok(self.registry.get(id).await?)
    }

    /// Mint an activation for a verified identity and persist the new
    /// entry. Callers are responsible for the create-or-return check;
    /// this always registers.
    pub async fn register(&self, doc: &Document) -> Result<RegistrationEntry> {
        let mut entry = RegistrationEntry::new(
            doc.registration_id(),
            doc.account_id.clone(),
            doc.region.clone(),
            doc.instance_id.clone(),
        );
        let request = ActivationRequest::new(&doc.name(), &self.instance_role);
        match self.dispatcher.create_activation(&request, &entry).await? {
            Dispatched::Completed(activation) => {
                entry.activation_id = activation.activation_id;
                entry.activation_code = activation.activation_code;
            }
            Dispatched::Deferred(_) => return Err(ManagerError::ActivationDeferred),
        }
        self.dispatcher
            .with_backoff(|| self.registry.put(&entry))
            .await?;
        info!(id = %entry.id, name = %doc.name(), "registration created");
        Ok(entry)
    }

    /// Bind the fleet-assigned managed id to an existing entry.
    pub async fn bind_managed_id(&self, id: &str, managed_id: &str) -> Result<RegistrationEntry> {
        let patch = EntryPatch::new().managed_id(managed_id);
        let entry = self
            .dispatcher
            .with_backoff(|| self.registry.update(id, &patch))
            .await?;
        info!(id, managed_id, "managed id bound");
        Ok(entry)
    }

    /// Mirror tags and inventory for an instance, advancing the entry's
    /// flags as each mutation completes. A deferred mutation leaves its
    /// flag down; the next reconciliation pass picks the entry up
    /// again. Returns the entry's final state.
    pub async fn update(
        &self,
        entry: &RegistrationEntry,
        item: &ConfigurationItem,
    ) -> Result<RegistrationEntry> {
        // Entries whose agent never completed enrollment fall back to
        // the instance id downstream.
        let resource_id = if entry.managed_id.is_empty() {
            entry.instance_id.clone()
        } else {
            entry.managed_id.clone()
        };

        let tags = self.allowed_tags(item);
        let applied = self
            .dispatcher
            .add_tags_to_resource(&ResourceTags {
                resource_id: resource_id.clone(),
                tags,
            })
            .await?;
        let mut current = if applied.is_deferred() {
            entry.clone()
        } else {
            let patch = EntryPatch::new().tagged();
            self.dispatcher
                .with_backoff(|| self.registry.update(&entry.id, &patch))
                .await?
        };

        let inventory = build_inventory(&resource_id, item);
        let pushed = self.dispatcher.put_inventory(&inventory).await?;
        if !pushed.is_deferred() {
            let patch = EntryPatch::new().inventoried();
            current = self
                .dispatcher
                .with_backoff(|| self.registry.update(&entry.id, &patch))
                .await?;
        }

        if current.is_tagged && current.is_inventoried && !current.enriched {
            let patch = EntryPatch::new().enriched();
            current = self
                .dispatcher
                .with_backoff(|| self.registry.update(&entry.id, &patch))
                .await?;
            info!(id = %entry.id, "entry enriched");
        }
        Ok(current)
    }

    /// Tear down a deleted instance: deregister downstream, then remove
    /// or retain the registry row per policy.
    pub async fn delete(&self, entry: &RegistrationEntry) -> Result<()> {
        if !entry.managed_id.is_empty() {
            self.dispatcher
                .deregister_managed_instance(&entry.managed_id)
                .await?;
        }
        if self.delete_entry_on_resource_deleted {
            self.dispatcher
                .with_backoff(|| self.registry.delete(&entry.id))
                .await?;
        }
        info!(id = %entry.id, managed_id = %entry.managed_id, "registration deleted");
        Ok(())
    }

    /// Intersect the item's tags with the configured allow-list. Sorted
    /// by key so downstream requests are deterministic.
    fn allowed_tags(&self, item: &ConfigurationItem) -> Vec<Tag> {
        let mut tags: Vec<Tag> = item
            .tags
            .iter()
            .filter(|(key, _)| self.resource_tags.contains(*key))
            .map(|(key, value)| Tag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        tags.sort_by(|a, b| a.key.cmp(&b.key));
        tags
    }
}

fn build_inventory(resource_id: &str, item: &ConfigurationItem) -> CustomInventory {
    let platform = if item.configuration.platform.is_empty() {
        DEFAULT_PLATFORM.to_string()
    } else {
        item.configuration.platform.clone()
    };
    CustomInventory {
        managed_id: resource_id.to_string(),
        type_name: INVENTORY_TYPE_NAME.to_string(),
        schema_version: INVENTORY_SCHEMA_VERSION.to_string(),
        capture_time: item.configuration_item_capture_time.clone(),
        content: InventoryContent {
            region: item.aws_region.clone(),
            account_id: item.aws_account_id.clone(),
            created: item.resource_creation_time.clone(),
            instance_id: item.resource_id.clone(),
            instance_type: item.configuration.instance_type.clone(),
            instance_role: item.configuration.iam_instance_profile.arn.clone(),
            vpc_id: item.configuration.vpc_id.clone(),
            image_id: item.configuration.image_id.clone(),
            key_name: item.configuration.key_name.clone(),
            subnet_id: item.configuration.subnet_id.clone(),
            platform,
            state: item.configuration.state.0.clone(),
        },
    }
}

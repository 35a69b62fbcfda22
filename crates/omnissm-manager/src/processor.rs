//! Change processor for configuration-change notifications.

use omnissm_identity::registration_id;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{ManagerError, Result};
use crate::event::{
    ConfigurationEvent, ConfigurationItem, CONFIGURATION_ITEM_CHANGE, CONFIG_EVENT_SOURCE,
    HANDLED_STATUSES, INSTANCE_RESOURCE_TYPE, OVERSIZED_CONFIGURATION_ITEM_CHANGE,
};
use crate::manager::Manager;
use crate::objectstore::ObjectStore;

/// What the processor did with an event.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Tag/inventory enrichment was driven for the instance
    Updated,
    /// The instance was torn down
    Deleted,
    /// The event was filtered out or targets an unregistered instance
    Skipped(&'static str),
}

pub struct ChangeProcessor {
    manager: Arc<Manager>,
    object_store: Arc<dyn ObjectStore>,
}

impl ChangeProcessor {
    pub fn new(manager: Arc<Manager>, object_store: Arc<dyn ObjectStore>) -> Self {
        ChangeProcessor {
            manager,
            object_store,
        }
    }

    pub async fn process(&self, event: &ConfigurationEvent) -> Result<Outcome> {
        if event.source != CONFIG_EVENT_SOURCE {
            debug!(source = %event.source, "event source ignored");
            return Ok(Outcome::Skipped("source"));
        }
        if event.resource_type() != INSTANCE_RESOURCE_TYPE {
            debug!(resource_type = %event.resource_type(), "resource type ignored");
            return Ok(Outcome::Skipped("resource type"));
        }
        if !HANDLED_STATUSES.contains(&event.status()) {
            debug!(status = %event.status(), "status ignored");
            return Ok(Outcome::Skipped("status"));
        }

        let item = self.resolve_item(event).await?;

        let id = registration_id(&item.name());
        let entry = match self.manager.get(&id).await? {
            Some(entry) => entry,
            None => {
                info!(name = %item.name(), id, "instance not registered, event ignored");
                return Ok(Outcome::Skipped("unregistered"));
            }
        };

        match item.configuration_item_status.as_str() {
            "ResourceDiscovered" | "OK" => {
                self.manager.update(&entry, &item).await?;
                Ok(Outcome::Updated)
            }
            "ResourceDeleted" => {
                self.manager.delete(&entry).await?;
                Ok(Outcome::Deleted)
            }
            // Oversized payloads can carry a different status than the
            // summary that passed the filter.
            _ => Ok(Outcome::Skipped("status")),
        }
    }

    /// Inline item, or the full item fetched through the object store
    /// for oversized notifications.
    async fn resolve_item(&self, event: &ConfigurationEvent) -> Result<ConfigurationItem> {
        match event.detail.message_type.as_str() {
            CONFIGURATION_ITEM_CHANGE => event
                .detail
                .configuration_item
                .clone()
                .ok_or_else(|| ManagerError::MalformedEvent("missing configurationItem".to_string())),
            OVERSIZED_CONFIGURATION_ITEM_CHANGE => {
                let location = event
                    .detail
                    .s3_delivery_summary
                    .as_ref()
                    .map(|s| s.s3_bucket_location.as_str())
                    .filter(|l| !l.is_empty())
                    .ok_or_else(|| {
                        ManagerError::OversizedFetch("missing s3 delivery location".to_string())
                    })?;
                let bytes = self
                    .object_store
                    .get_object(location)
                    .await
                    .map_err(|e| ManagerError::OversizedFetch(e.to_string()))?;
                serde_json::from_slice(&bytes)
                    .map_err(|e| ManagerError::OversizedFetch(format!("cannot parse item: {e}")))
            }
            other => Err(ManagerError::UnknownMessageType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::event::EventDetail;
    use crate::testutil::{make_entry, make_item, recording_manager, RecordingSsm};
    use async_trait::async_trait;
    use omnissm_registry::{MemoryRegistry, RegistryStore};
    use std::collections::HashMap;

    struct MapObjectStore(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl ObjectStore for MapObjectStore {
        async fn get_object(&self, location: &str) -> Result<Vec<u8>> {
            self.0
                .get(location)
                .cloned()
                .ok_or_else(|| ManagerError::ObjectStore(format!("no such object: {location}")))
        }
    }

    fn processor(
        config: Config,
        objects: HashMap<String, Vec<u8>>,
    ) -> (ChangeProcessor, Arc<RecordingSsm>, Arc<MemoryRegistry>) {
        let (manager, ssm, registry) = recording_manager(config);
        let processor = ChangeProcessor::new(Arc::new(manager), Arc::new(MapObjectStore(objects)));
        (processor, ssm, registry)
    }

    fn change_event(item: ConfigurationItem) -> ConfigurationEvent {
        ConfigurationEvent {
            source: CONFIG_EVENT_SOURCE.to_string(),
            account: item.aws_account_id.clone(),
            region: item.aws_region.clone(),
            detail: EventDetail {
                message_type: CONFIGURATION_ITEM_CHANGE.to_string(),
                configuration_item: Some(item),
                configuration_item_summary: None,
                s3_delivery_summary: None,
            },
        }
    }

    fn oversized_event(item: &ConfigurationItem, location: &str) -> ConfigurationEvent {
        ConfigurationEvent {
            source: CONFIG_EVENT_SOURCE.to_string(),
            account: item.aws_account_id.clone(),
            region: item.aws_region.clone(),
            detail: EventDetail {
                message_type: OVERSIZED_CONFIGURATION_ITEM_CHANGE.to_string(),
                configuration_item: None,
                configuration_item_summary: Some(serde_json::from_value(serde_json::json!({
                    "resourceType": item.resource_type,
                    "resourceId": item.resource_id,
                    "configurationItemStatus": item.configuration_item_status,
                    "awsAccountId": item.aws_account_id,
                    "awsRegion": item.aws_region,
                }))
                .unwrap()),
                s3_delivery_summary: Some(serde_json::from_value(serde_json::json!({
                    "s3BucketLocation": location,
                }))
                .unwrap()),
            },
        }
    }

    #[tokio::test]
    async fn test_wrong_source_is_skipped() {
        let (processor, ssm, _registry) = processor(Config::default(), HashMap::new());
        let mut event = change_event(make_item("i-1234"));
        event.source = "aws.ec2".to_string();

        let outcome = processor.process(&event).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped("source"));
        assert!(ssm.tag_calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_resource_type_is_skipped() {
        let (processor, ssm, _registry) = processor(Config::default(), HashMap::new());
        let mut item = make_item("i-1234");
        item.resource_type = "AWS::S3::Bucket".to_string();

        let outcome = processor.process(&change_event(item)).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped("resource type"));
        assert!(ssm.tag_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_status_is_skipped() {
        let (processor, ssm, _registry) = processor(Config::default(), HashMap::new());
        let mut item = make_item("i-1234");
        item.configuration_item_status = "ResourceNotRecorded".to_string();

        let outcome = processor.process(&change_event(item)).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped("status"));
        assert!(ssm.tag_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_message_type_is_an_error() {
        let (processor, _ssm, _registry) = processor(Config::default(), HashMap::new());
        let mut event = change_event(make_item("i-1234"));
        event.detail.message_type = "ScheduledNotification".to_string();

        let err = processor.process(&event).await.unwrap_err();
        assert!(matches!(err, ManagerError::UnknownMessageType(_)));
    }

    #[tokio::test]
    async fn test_unregistered_instance_is_skipped() {
        let (processor, ssm, _registry) = processor(Config::default(), HashMap::new());
        let outcome = processor
            .process(&change_event(make_item("i-1234")))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped("unregistered"));
        assert!(ssm.tag_calls().is_empty());
    }

    #[tokio::test]
    async fn test_discovered_instance_is_tagged_and_inventoried() {
        let (processor, ssm, registry) = processor(Config::default(), HashMap::new());
        let entry = make_entry("i-1234", "mi-1234");
        registry.put(&entry).await.unwrap();

        let mut item = make_item("i-1234");
        item.tags.insert("App".to_string(), "x".to_string());
        item.tags.insert("Secret".to_string(), "y".to_string());
        item.configuration.platform.clear();

        let outcome = processor.process(&change_event(item)).await.unwrap();
        assert_eq!(outcome, Outcome::Updated);

        let tag_calls = ssm.tag_calls();
        assert_eq!(tag_calls.len(), 1);
        assert_eq!(tag_calls[0].tags.len(), 1);
        assert_eq!(tag_calls[0].tags[0].key, "App");
        assert_eq!(ssm.inventory_calls()[0].content.platform, "Linux");

        let stored = registry.get(&entry.id).await.unwrap().unwrap();
        assert!(stored.is_tagged && stored.is_inventoried && stored.enriched);
    }

    #[tokio::test]
    async fn test_deleted_instance_is_deregistered() {
        let (processor, ssm, registry) = processor(Config::default(), HashMap::new());
        let entry = make_entry("i-1234", "mi-1234");
        registry.put(&entry).await.unwrap();

        let mut item = make_item("i-1234");
        item.configuration_item_status = "ResourceDeleted".to_string();

        let outcome = processor.process(&change_event(item)).await.unwrap();
        assert_eq!(outcome, Outcome::Deleted);
        assert_eq!(ssm.deregister_calls(), vec!["mi-1234"]);
        assert!(registry.get(&entry.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_event_fetches_full_item() {
        let mut item = make_item("i-1234");
        item.tags.insert("App".to_string(), "x".to_string());
        let location = "config-bucket/items/i-1234.json";
        let objects = HashMap::from([(
            location.to_string(),
            serde_json::to_vec(&item).unwrap(),
        )]);

        let (processor, ssm, registry) = processor(Config::default(), objects);
        let entry = make_entry("i-1234", "mi-1234");
        registry.put(&entry).await.unwrap();

        let outcome = processor
            .process(&oversized_event(&item, location))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(ssm.tag_calls()[0].tags[0].key, "App");

        let stored = registry.get(&entry.id).await.unwrap().unwrap();
        assert!(stored.enriched);
    }

    #[tokio::test]
    async fn test_oversized_fetch_failure_is_terminal() {
        let (processor, ssm, registry) = processor(Config::default(), HashMap::new());
        let entry = make_entry("i-1234", "mi-1234");
        registry.put(&entry).await.unwrap();

        let item = make_item("i-1234");
        let err = processor
            .process(&oversized_event(&item, "missing/object.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::OversizedFetch(_)));
        assert!(ssm.tag_calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_parse_failure_is_terminal() {
        let location = "config-bucket/garbage.json";
        let objects = HashMap::from([(location.to_string(), b"not json".to_vec())]);
        let (processor, _ssm, registry) = processor(Config::default(), objects);
        let entry = make_entry("i-1234", "mi-1234");
        registry.put(&entry).await.unwrap();

        let item = make_item("i-1234");
        let err = processor
            .process(&oversized_event(&item, location))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::OversizedFetch(_)));
    }
}

//! Shared fixtures for the crate's tests.

use async_trait::async_trait;
use omnissm_dispatch::{Dispatcher, RetryPolicy};
use omnissm_identity::registration_id;
use omnissm_registry::{MemoryRegistry, RegistrationEntry};
use omnissm_ssm::{
    Activation, ActivationRequest, CustomInventory, ResourceTags, SsmApi, SsmError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::event::ConfigurationItem;
use crate::manager::Manager;

pub const TEST_ACCOUNT: &str = "123456789012";
pub const TEST_REGION: &str = "us-east-1";

/// SSM stub recording every call; optionally throttles the first `n`.
#[derive(Default)]
pub struct RecordingSsm {
    throttle_remaining: AtomicUsize,
    activations: Mutex<Vec<ActivationRequest>>,
    tags: Mutex<Vec<ResourceTags>>,
    inventories: Mutex<Vec<CustomInventory>>,
    deregistered: Mutex<Vec<String>>,
}

impl RecordingSsm {
    pub fn new() -> Self {
        RecordingSsm::default()
    }

    pub fn throttle_next(&self, n: usize) {
        self.throttle_remaining.store(n, Ordering::SeqCst);
    }

    fn check_throttle(&self) -> Result<(), SsmError> {
        let remaining = self.throttle_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.throttle_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(SsmError::Throttled("simulated throttle".to_string()));
        }
        Ok(())
    }

    pub fn activation_requests(&self) -> Vec<ActivationRequest> {
        self.activations.lock().unwrap().clone()
    }

    pub fn tag_calls(&self) -> Vec<ResourceTags> {
        self.tags.lock().unwrap().clone()
    }

    pub fn inventory_calls(&self) -> Vec<CustomInventory> {
        self.inventories.lock().unwrap().clone()
    }

    pub fn deregister_calls(&self) -> Vec<String> {
        self.deregistered.lock().unwrap().clone()
    }
}

#[async_trait]
impl SsmApi for RecordingSsm {
    async fn create_activation(
        &self,
        request: &ActivationRequest,
    ) -> Result<Activation, SsmError> {
        self.check_throttle()?;
        self.activations.lock().unwrap().push(request.clone());
        Ok(Activation {
            activation_id: "a-1".to_string(),
            activation_code: "code".to_string(),
        })
    }

    async fn add_tags_to_resource(&self, tags: &ResourceTags) -> Result<(), SsmError> {
        self.check_throttle()?;
        self.tags.lock().unwrap().push(tags.clone());
        Ok(())
    }

    async fn put_inventory(&self, inventory: &CustomInventory) -> Result<(), SsmError> {
        self.check_throttle()?;
        self.inventories.lock().unwrap().push(inventory.clone());
        Ok(())
    }

    async fn deregister_managed_instance(&self, managed_id: &str) -> Result<(), SsmError> {
        self.check_throttle()?;
        self.deregistered.lock().unwrap().push(managed_id.to_string());
        Ok(())
    }
}

pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        factor: 2.0,
        jitter: false,
    }
}

/// Manager wired to a recording SSM stub and an in-memory registry.
pub fn recording_manager(config: Config) -> (Manager, Arc<RecordingSsm>, Arc<MemoryRegistry>) {
    let ssm = Arc::new(RecordingSsm::new());
    let registry = Arc::new(MemoryRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(ssm.clone(), fast_policy(config.max_retries)));
    let manager = Manager::new(registry.clone(), dispatcher, &config);
    (manager, ssm, registry)
}

pub fn make_entry(instance_id: &str, managed_id: &str) -> RegistrationEntry {
    let name = format!("{TEST_ACCOUNT}-{instance_id}");
    let mut entry = RegistrationEntry::new(
        registration_id(&name),
        TEST_ACCOUNT.to_string(),
        TEST_REGION.to_string(),
        instance_id.to_string(),
    );
    entry.managed_id = managed_id.to_string();
    entry
}

pub fn make_item(instance_id: &str) -> ConfigurationItem {
    let mut item = ConfigurationItem {
        resource_type: "AWS::EC2::Instance".to_string(),
        resource_id: instance_id.to_string(),
        configuration_item_status: "ResourceDiscovered".to_string(),
        configuration_item_capture_time: "2018-05-02T16:20:55Z".to_string(),
        resource_creation_time: "2018-05-02T16:18:05Z".to_string(),
        aws_account_id: TEST_ACCOUNT.to_string(),
        aws_region: TEST_REGION.to_string(),
        ..ConfigurationItem::default()
    };
    item.configuration.image_id = "ami-12345678".to_string();
    item.configuration.instance_type = "t2.small".to_string();
    item.configuration.platform = "Linux".to_string();
    item
}

//! Overflow queue drainer.
//!
//! Pops deferred-action messages and replays them through the same
//! dispatcher that parked them. A replay that throttles out again is
//! re-deferred under a fresh message id, so the original can be
//! acknowledged either way; only terminal errors leave the message
//! unacked to reappear after the visibility timeout.

use omnissm_registry::RegistryStore;
use omnissm_ssm::ActivationRequest;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dispatcher::{Dispatched, Dispatcher};
use crate::errors::Result;
use crate::message::{DeferredAction, DeferredActionMessage};
use crate::queue::OverflowQueue;

pub struct Drainer {
    queue: Arc<dyn OverflowQueue>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<dyn RegistryStore>,
    instance_role: String,
}

impl Drainer {
    pub fn new(
        queue: Arc<dyn OverflowQueue>,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<dyn RegistryStore>,
        instance_role: &str,
    ) -> Self {
        Drainer {
            queue,
            dispatcher,
            registry,
            instance_role: instance_role.to_string(),
        }
    }

    /// Drain up to `max` messages, returning how many were replayed and
    /// acknowledged.
    pub async fn run_once(&self, max: usize) -> Result<usize> {
        let batch = self.queue.receive(max).await?;
        let mut drained = 0;
        for received in batch {
            match self.replay(&received.message).await {
                Ok(()) => {
                    self.queue.delete(&received.receipt).await?;
                    drained += 1;
                }
                Err(err) => {
                    warn!(
                        message_id = %received.message.message_id,
                        kind = received.message.action.kind(),
                        %err,
                        "deferred action replay failed"
                    );
                }
            }
        }
        if drained > 0 {
            info!(drained, "overflow queue drained");
        }
        Ok(drained)
    }

    async fn replay(&self, message: &DeferredActionMessage) -> Result<()> {
        match &message.action {
            DeferredAction::CreateActivation(entry) => {
                let name = format!("{}-{}", entry.account_id, entry.instance_id);
                let request = ActivationRequest::new(&name, &self.instance_role);
                if let Dispatched::Completed(activation) =
                    self.dispatcher.create_activation(&request, entry).await?
                {
                    let mut entry = entry.clone();
                    entry.activation_id = activation.activation_id;
                    entry.activation_code = activation.activation_code;
                    self.dispatcher
                        .with_backoff(|| self.registry.put(&entry))
                        .await?;
                }
                Ok(())
            }
            DeferredAction::AddTagsToResource(tags) => {
                self.dispatcher.add_tags_to_resource(tags).await?;
                Ok(())
            }
            DeferredAction::PutInventory(inventory) => {
                self.dispatcher.put_inventory(inventory).await?;
                Ok(())
            }
            DeferredAction::DeregisterManagedInstance { managed_id } => {
                self.dispatcher
                    .deregister_managed_instance(managed_id)
                    .await?;
                Ok(())
            }
        }
    }
}

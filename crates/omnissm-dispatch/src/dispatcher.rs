//! Retry-with-backoff execution of downstream actions.

use omnissm_registry::RegistrationEntry;
use omnissm_ssm::{Activation, ActivationRequest, CustomInventory, ResourceTags, SsmApi, SsmError};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{DispatchError, Result, RetryableError};
use crate::message::{DeferredAction, DeferredActionMessage};
use crate::queue::OverflowQueue;
use crate::retry::RetryPolicy;

/// Outcome of a dispatched action.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched<T> {
    /// The downstream call went through.
    Completed(T),
    /// Retry budget exhausted; the action is durably parked on the
    /// overflow queue under the given message id. The mutation will
    /// happen, just not now.
    Deferred(Uuid),
}

impl<T> Dispatched<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Dispatched::Completed(v) => Some(v),
            Dispatched::Deferred(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Dispatched::Deferred(_))
    }
}

/// Executes downstream mutations under bounded exponential backoff,
/// converting exhausted retries into deferred-action messages.
pub struct Dispatcher {
    ssm: Arc<dyn SsmApi>,
    queue: Option<Arc<dyn OverflowQueue>>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Dispatcher without an overflow queue: exhausted retries surface
    /// as errors.
    pub fn new(ssm: Arc<dyn SsmApi>, policy: RetryPolicy) -> Self {
        Dispatcher {
            ssm,
            queue: None,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_queue(mut self, queue: Arc<dyn OverflowQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Tie backoff sleeps to an external cancellation token. On
    /// cancellation the in-progress dispatch returns immediately
    /// without enqueueing anything.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn ssm(&self) -> &Arc<dyn SsmApi> {
        &self.ssm
    }

    /// Mint activation credentials. `entry` is the pending registration
    /// carried into the deferred message if the mint cannot complete.
    pub async fn create_activation(
        &self,
        request: &ActivationRequest,
        entry: &RegistrationEntry,
    ) -> Result<Dispatched<Activation>> {
        self.dispatch(
            || self.ssm.create_activation(request),
            DeferredAction::CreateActivation(entry.clone()),
        )
        .await
    }

    pub async fn add_tags_to_resource(&self, tags: &ResourceTags) -> Result<Dispatched<()>> {
        self.dispatch(
            || self.ssm.add_tags_to_resource(tags),
            DeferredAction::AddTagsToResource(tags.clone()),
        )
        .await
    }

    pub async fn put_inventory(&self, inventory: &CustomInventory) -> Result<Dispatched<()>> {
        self.dispatch(
            || self.ssm.put_inventory(inventory),
            DeferredAction::PutInventory(inventory.clone()),
        )
        .await
    }

    pub async fn deregister_managed_instance(&self, managed_id: &str) -> Result<Dispatched<()>> {
        self.dispatch(
            || self.ssm.deregister_managed_instance(managed_id),
            DeferredAction::DeregisterManagedInstance {
                managed_id: managed_id.to_string(),
            },
        )
        .await
    }

    /// Retry an arbitrary operation under the dispatcher's backoff
    /// schedule. Used for registry writes, which have no deferred
    /// representation: exhaustion is an error.
    pub async fn with_backoff<T, E, F, Fut>(&self, op: F) -> Result<T>
    where
        E: RetryableError + Into<DispatchError> + std::fmt::Display,
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    if attempt == self.policy.max_retries {
                        return Err(DispatchError::MaxRetriesExceeded(err.to_string()));
                    }
                    attempt += 1;
                    warn!(attempt, %err, "retryable failure, backing off");
                    self.backoff(attempt).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn dispatch<T, F, Fut>(&self, op: F, action: DeferredAction) -> Result<Dispatched<T>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, SsmError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(Dispatched::Completed(value)),
                Err(err) if err.is_retryable() => {
                    if attempt == self.policy.max_retries {
                        return self.defer(&action, err).await;
                    }
                    attempt += 1;
                    warn!(attempt, kind = action.kind(), %err, "throttled, backing off");
                    self.backoff(attempt).await?;
                }
                Err(err) => return Err(DispatchError::Ssm(err)),
            }
        }
    }

    async fn defer<T>(&self, action: &DeferredAction, last: SsmError) -> Result<Dispatched<T>> {
        let queue = match &self.queue {
            Some(queue) => queue,
            None => return Err(DispatchError::MaxRetriesExceeded(last.to_string())),
        };
        let message = DeferredActionMessage::new(action.clone());
        queue.send(&message).await?;
        info!(
            message_id = %message.message_id,
            kind = action.kind(),
            "max retries exceeded, action deferred to overflow queue"
        );
        Ok(Dispatched::Deferred(message.message_id))
    }

    async fn backoff(&self, attempt: u32) -> Result<()> {
        let delay = self.policy.sleep_for_attempt(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.cancel.cancelled() => Err(DispatchError::Cancelled),
        }
    }
}

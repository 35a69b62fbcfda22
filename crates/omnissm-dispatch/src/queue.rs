//! Overflow queue trait definition.

use async_trait::async_trait;

use crate::errors::Result;
use crate::message::DeferredActionMessage;

/// Opaque receipt identifying one delivery of a message. Passing it to
/// [`OverflowQueue::delete`] acknowledges the message; an
/// unacknowledged delivery reappears after the visibility timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle(pub(crate) u64);

/// A delivered message plus its receipt.
#[derive(Debug)]
pub struct ReceivedMessage {
    pub message: DeferredActionMessage,
    pub receipt: ReceiptHandle,
}

/// Durable FIFO queue absorbing mutations the dispatcher could not
/// complete within its retry budget.
///
/// Contract: first-in-first-out within the single `omnissm` message
/// group; exactly-once enqueue within the deduplication window keyed by
/// `message_id`; at-least-once delivery with in-flight messages
/// blocking the group until acknowledged or timed out.
#[async_trait]
pub trait OverflowQueue: Send + Sync {
    /// Enqueue a message. Re-sending a message id inside the dedup
    /// window is silently dropped.
    async fn send(&self, message: &DeferredActionMessage) -> Result<()>;

    /// Receive up to `max` messages from the head of the queue. Returns
    /// an empty batch while an earlier delivery is still in flight.
    async fn receive(&self, max: usize) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledge a delivery, removing the message for good.
    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()>;
}

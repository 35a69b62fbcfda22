//! # omnissm-dispatch
//!
//! Throttle-absorbing dispatcher for downstream mutations.
//!
//! Every mutation against the fleet-management service goes through
//! [`Dispatcher`], which retries throttled calls under bounded
//! exponential backoff. When the retry budget runs out the mutation is
//! not lost: it is converted into a [`DeferredActionMessage`] and parked
//! on a durable FIFO queue, from which [`Drainer`] later replays it
//! through the same dispatcher.

#![warn(clippy::all)]

pub mod dispatcher;
pub mod drain;
pub mod errors;
pub mod fifo;
pub mod message;
pub mod queue;
pub mod retry;

pub use dispatcher::{Dispatched, Dispatcher};
pub use drain::Drainer;
pub use errors::{DispatchError, Result, RetryableError};
pub use fifo::FifoQueue;
pub use message::{DeferredAction, DeferredActionMessage};
pub use queue::{OverflowQueue, ReceiptHandle, ReceivedMessage};
pub use retry::RetryPolicy;

/// Message group shared by every deferred action, so the queue drains
/// strictly in order.
pub const MESSAGE_GROUP_ID: &str = "omnissm";

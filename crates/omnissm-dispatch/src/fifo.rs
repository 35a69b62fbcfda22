//! Durable FIFO queue over RocksDB.

use async_trait::async_trait;
use rocksdb::{IteratorMode, Options, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{DispatchError, Result};
use crate::message::DeferredActionMessage;
use crate::queue::{OverflowQueue, ReceiptHandle, ReceivedMessage};

const CF_MESSAGES: &str = "messages";
const CF_DEDUP: &str = "dedup";

const DEDUP_WINDOW: Duration = Duration::from_secs(5 * 60);
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

struct QueueState {
    next_seq: u64,
    // seq -> when the delivery becomes visible again
    in_flight: HashMap<u64, Instant>,
}

/// RocksDB-backed FIFO queue.
///
/// Messages are keyed by a monotonic sequence number, so iteration
/// order is arrival order. Every message belongs to the single
/// [`crate::MESSAGE_GROUP_ID`] group. The dedup index maps message ids
/// to their enqueue time; in-flight tracking is in memory, which means
/// a restart makes every unacknowledged message visible again
/// (at-least-once).
pub struct FifoQueue {
    db: Arc<DB>,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
}

impl FifoQueue {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, &path, [CF_MESSAGES, CF_DEDUP])
            .map_err(|e| DispatchError::Queue(e.to_string()))?;

        // Resume the sequence after the highest persisted key.
        let cf = db
            .cf_handle(CF_MESSAGES)
            .ok_or_else(|| DispatchError::Queue("missing messages column family".to_string()))?;
        let next_seq = db
            .iterator_cf(cf, IteratorMode::End)
            .next()
            .transpose()
            .map_err(|e| DispatchError::Queue(e.to_string()))?
            .map(|(key, _)| decode_seq(&key) + 1)
            .unwrap_or(0);

        debug!(path = ?path.as_ref(), next_seq, "opened overflow queue");
        Ok(FifoQueue {
            db: Arc::new(db),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            state: Mutex::new(QueueState {
                next_seq,
                in_flight: HashMap::new(),
            }),
        })
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| DispatchError::Queue(format!("missing column family: {name}")))
    }

    /// True if this message id was already enqueued within the dedup
    /// window.
    fn is_duplicate(&self, message: &DeferredActionMessage) -> Result<bool> {
        let cf = self.cf(CF_DEDUP)?;
        if let Some(bytes) = self
            .db
            .get_cf(cf, message.message_id.as_bytes())
            .map_err(|e| DispatchError::Queue(e.to_string()))?
        {
            let enqueued_at = u64::from_be_bytes(
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| DispatchError::Queue("corrupt dedup record".to_string()))?,
            );
            if unix_seconds().saturating_sub(enqueued_at) < DEDUP_WINDOW.as_secs() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn record_dedup(&self, message: &DeferredActionMessage) -> Result<()> {
        self.db
            .put_cf(
                self.cf(CF_DEDUP)?,
                message.message_id.as_bytes(),
                unix_seconds().to_be_bytes(),
            )
            .map_err(|e| DispatchError::Queue(e.to_string()))
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn decode_seq(key: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = key.len().min(8);
    buf[..len].copy_from_slice(&key[..len]);
    u64::from_be_bytes(buf)
}

#[async_trait]
impl OverflowQueue for FifoQueue {
    async fn send(&self, message: &DeferredActionMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        if self.is_duplicate(message)? {
            debug!(message_id = %message.message_id, "duplicate message dropped");
            return Ok(());
        }
        let body = serde_json::to_vec(message)
            .map_err(|e| DispatchError::Serialization(e.to_string()))?;
        let seq = state.next_seq;
        self.db
            .put_cf(self.cf(CF_MESSAGES)?, seq.to_be_bytes(), body)
            .map_err(|e| DispatchError::Queue(e.to_string()))?;
        self.record_dedup(message)?;
        state.next_seq += 1;
        debug!(
            message_id = %message.message_id,
            seq,
            group = crate::MESSAGE_GROUP_ID,
            kind = message.action.kind(),
            "message enqueued"
        );
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<ReceivedMessage>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.in_flight.retain(|_, visible_at| *visible_at > now);

        // The single message group is blocked while any delivery is
        // outstanding.
        if !state.in_flight.is_empty() {
            return Ok(Vec::new());
        }

        let cf = self.cf(CF_MESSAGES)?;
        let mut batch = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            if batch.len() >= max {
                break;
            }
            let (key, value) = item.map_err(|e| DispatchError::Queue(e.to_string()))?;
            let seq = decode_seq(&key);
            let message: DeferredActionMessage = serde_json::from_slice(&value)
                .map_err(|e| DispatchError::Serialization(e.to_string()))?;
            state.in_flight.insert(seq, now + self.visibility_timeout);
            batch.push(ReceivedMessage {
                message,
                receipt: ReceiptHandle(seq),
            });
        }
        Ok(batch)
    }

    async fn delete(&self, receipt: &ReceiptHandle) -> Result<()> {
        let mut state = self.state.lock().await;
        self.db
            .delete_cf(self.cf(CF_MESSAGES)?, receipt.0.to_be_bytes())
            .map_err(|e| DispatchError::Queue(e.to_string()))?;
        state.in_flight.remove(&receipt.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::DeferredAction;

    fn open_test() -> (tempfile::TempDir, FifoQueue) {
        let dir = tempfile::TempDir::new().unwrap();
        let queue = FifoQueue::open(dir.path()).unwrap();
        (dir, queue)
    }

    fn deregister(managed_id: &str) -> DeferredActionMessage {
        DeferredActionMessage::new(DeferredAction::DeregisterManagedInstance {
            managed_id: managed_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (_dir, queue) = open_test();
        for i in 0..3 {
            queue.send(&deregister(&format!("mi-{i}"))).await.unwrap();
        }
        let batch = queue.receive(10).await.unwrap();
        let ids: Vec<String> = batch
            .iter()
            .map(|m| match &m.message.action {
                DeferredAction::DeregisterManagedInstance { managed_id } => managed_id.clone(),
                other => panic!("unexpected action: {}", other.kind()),
            })
            .collect();
        assert_eq!(ids, vec!["mi-0", "mi-1", "mi-2"]);
    }

    #[tokio::test]
    async fn test_in_flight_blocks_group() {
        let (_dir, queue) = open_test();
        queue.send(&deregister("mi-0")).await.unwrap();
        queue.send(&deregister("mi-1")).await.unwrap();

        let first = queue.receive(1).await.unwrap();
        assert_eq!(first.len(), 1);

        // mi-1 stays hidden until mi-0 is acknowledged.
        assert!(queue.receive(1).await.unwrap().is_empty());

        queue.delete(&first[0].receipt).await.unwrap();
        let second = queue.receive(1).await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_unacked_message_reappears_after_visibility_timeout() {
        let (_dir, queue) = open_test();
        let queue = queue.with_visibility_timeout(Duration::from_millis(20));
        queue.send(&deregister("mi-0")).await.unwrap();

        let first = queue.receive(1).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(queue.receive(1).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(40)).await;
        let again = queue.receive(1).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].message.message_id, first[0].message.message_id);
    }

    #[tokio::test]
    async fn test_dedup_window_drops_duplicates() {
        let (_dir, queue) = open_test();
        let message = deregister("mi-0");
        queue.send(&message).await.unwrap();
        queue.send(&message).await.unwrap();
        let batch = queue.receive(10).await.unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_permanent() {
        let (_dir, queue) = open_test();
        let queue = queue.with_visibility_timeout(Duration::from_millis(10));
        queue.send(&deregister("mi-0")).await.unwrap();
        let batch = queue.receive(1).await.unwrap();
        queue.delete(&batch[0].receipt).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(queue.receive(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sequence_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let queue = FifoQueue::open(dir.path()).unwrap();
            queue.send(&deregister("mi-0")).await.unwrap();
        }
        let queue = FifoQueue::open(dir.path()).unwrap();
        queue.send(&deregister("mi-1")).await.unwrap();
        let batch = queue.receive(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].receipt, ReceiptHandle(0));
        assert_eq!(batch[1].receipt, ReceiptHandle(1));
    }
}

//! Registry store trait definition.

use async_trait::async_trait;

use crate::entry::{EntryPatch, RegistrationEntry};
use crate::errors::Result;

/// Keyed persistence for registration entries.
///
/// Implementations must provide per-key linearizability: `get` after a
/// completed `put`/`update` for the same key observes the write. No
/// ordering is guaranteed across keys.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Point lookup. A missing key is `Ok(None)`, not an error.
    async fn get(&self, id: &str) -> Result<Option<RegistrationEntry>>;

    /// Create or replace the whole entry. Only used at registration
    /// time; everything afterwards goes through `update`.
    async fn put(&self, entry: &RegistrationEntry) -> Result<()>;

    /// Conditionally advance an existing entry. Fails with
    /// `EntryNotFound` if the key is absent. The patch semantics
    /// guarantee no field is ever cleared, even under concurrent
    /// writers.
    async fn update(&self, id: &str, patch: &EntryPatch) -> Result<RegistrationEntry>;

    /// Snapshot of all entries still awaiting enrichment
    /// (`enriched == false`). Callers must not treat the result as a
    /// live view.
    async fn scan(&self) -> Result<Vec<RegistrationEntry>>;

    /// Remove an entry. Deleting a missing key succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}

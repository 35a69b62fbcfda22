//! RocksDB-backed registry store.

use async_trait::async_trait;
use rocksdb::{IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::entry::{EntryPatch, RegistrationEntry};
use crate::errors::{RegistryError, Result};
use crate::traits::RegistryStore;

/// Durable registry store over a single RocksDB column family.
///
/// The column family is named after the configured registrations table
/// so multiple logical tables can share one database directory.
pub struct RocksDbRegistry {
    db: Arc<DB>,
    table: String,
    // Serializes read-modify-write updates so monotonicity holds under
    // concurrent writers.
    update_lock: Mutex<()>,
}

impl RocksDbRegistry {
    /// Open (or create) the registry at `path`.
    pub fn open<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, &path, [table])
            .map_err(|e| RegistryError::Database(e.to_string()))?;
        debug!(path = ?path.as_ref(), table, "opened registry");

        Ok(RocksDbRegistry {
            db: Arc::new(db),
            table: table.to_string(),
            update_lock: Mutex::new(()),
        })
    }

    fn cf_handle(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(&self.table)
            .ok_or_else(|| RegistryError::Database(format!("missing column family: {}", self.table)))
    }

    fn decode(bytes: &[u8]) -> Result<RegistrationEntry> {
        bincode::deserialize(bytes).map_err(|e| RegistryError::Serialization(e.to_string()))
    }

    fn encode(entry: &RegistrationEntry) -> Result<Vec<u8>> {
        bincode::serialize(entry).map_err(|e| RegistryError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl RegistryStore for RocksDbRegistry {
    async fn get(&self, id: &str) -> Result<Option<RegistrationEntry>> {
        let cf = self.cf_handle()?;
        let bytes = self
            .db
            .get_cf(cf, id.as_bytes())
            .map_err(|e| RegistryError::Database(e.to_string()))?;
        match bytes {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &RegistrationEntry) -> Result<()> {
        let cf = self.cf_handle()?;
        self.db
            .put_cf(cf, entry.id.as_bytes(), Self::encode(entry)?)
            .map_err(|e| RegistryError::Database(e.to_string()))
    }

    async fn update(&self, id: &str, patch: &EntryPatch) -> Result<RegistrationEntry> {
        let _guard = self.update_lock.lock().await;
        let cf = self.cf_handle()?;
        let bytes = self
            .db
            .get_cf(cf, id.as_bytes())
            .map_err(|e| RegistryError::Database(e.to_string()))?
            .ok_or_else(|| RegistryError::EntryNotFound(id.to_string()))?;
        let mut entry = Self::decode(&bytes)?;
        patch.apply(&mut entry);
        self.db
            .put_cf(cf, id.as_bytes(), Self::encode(&entry)?)
            .map_err(|e| RegistryError::Database(e.to_string()))?;
        Ok(entry)
    }

    async fn scan(&self) -> Result<Vec<RegistrationEntry>> {
        let cf = self.cf_handle()?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| RegistryError::Database(e.to_string()))?;
            let entry = Self::decode(&value)?;
            if !entry.enriched {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let cf = self.cf_handle()?;
        self.db
            .delete_cf(cf, id.as_bytes())
            .map_err(|e| RegistryError::Database(e.to_string()))
    }
}

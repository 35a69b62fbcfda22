//! In-memory registry store for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::entry::{EntryPatch, RegistrationEntry};
use crate::errors::{RegistryError, Result};
use crate::traits::RegistryStore;

/// Registry store backed by a map. Same semantics as the RocksDB
/// implementation, plus throttle fault injection for dispatcher tests.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: Mutex<HashMap<String, RegistrationEntry>>,
    throttle_remaining: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        MemoryRegistry::default()
    }

    /// Fail the next `n` write operations with a throttle error.
    pub fn throttle_next(&self, n: usize) {
        self.throttle_remaining.store(n, Ordering::SeqCst);
    }

    fn check_throttle(&self) -> Result<()> {
        let remaining = self.throttle_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.throttle_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(RegistryError::Throttled("simulated throttle".to_string()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn get(&self, id: &str) -> Result<Option<RegistrationEntry>> {
        Ok(self.entries.lock().expect("registry lock").get(id).cloned())
    }

    async fn put(&self, entry: &RegistrationEntry) -> Result<()> {
        self.check_throttle()?;
        self.entries
            .lock()
            .expect("registry lock")
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn update(&self, id: &str, patch: &EntryPatch) -> Result<RegistrationEntry> {
        self.check_throttle()?;
        let mut entries = self.entries.lock().expect("registry lock");
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::EntryNotFound(id.to_string()))?;
        patch.apply(entry);
        Ok(entry.clone())
    }

    async fn scan(&self) -> Result<Vec<RegistrationEntry>> {
        Ok(self
            .entries
            .lock()
            .expect("registry lock")
            .values()
            .filter(|e| !e.enriched)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.entries.lock().expect("registry lock").remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_registry_roundtrip() {
        let registry = MemoryRegistry::new();
        let entry = RegistrationEntry::new(
            "id-1".to_string(),
            "123456789012".to_string(),
            "us-east-1".to_string(),
            "i-1".to_string(),
        );
        registry.put(&entry).await.unwrap();
        assert_eq!(registry.get("id-1").await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn test_throttle_injection() {
        let registry = MemoryRegistry::new();
        let entry = RegistrationEntry::new(
            "id-1".to_string(),
            "123456789012".to_string(),
            "us-east-1".to_string(),
            "i-1".to_string(),
        );
        registry.throttle_next(2);
        assert!(matches!(
            registry.put(&entry).await,
            Err(RegistryError::Throttled(_))
        ));
        assert!(matches!(
            registry.put(&entry).await,
            Err(RegistryError::Throttled(_))
        ));
        registry.put(&entry).await.unwrap();
    }
}

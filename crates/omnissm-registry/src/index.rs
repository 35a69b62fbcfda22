//! In-memory secondary indexes over a scan snapshot.

use std::collections::HashMap;

use crate::entry::RegistrationEntry;

/// Immutable view over a scan result with O(1) joins by instance id and
/// managed id. Built once per reconciliation partition; never updated.
pub struct RegistrationEntries {
    entries: Vec<RegistrationEntry>,
    by_instance_id: HashMap<String, usize>,
    by_managed_id: HashMap<String, usize>,
}

impl RegistrationEntries {
    pub fn new(entries: Vec<RegistrationEntry>) -> Self {
        let mut by_instance_id = HashMap::with_capacity(entries.len());
        let mut by_managed_id = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if !entry.instance_id.is_empty() {
                by_instance_id.insert(entry.instance_id.clone(), i);
            }
            if !entry.managed_id.is_empty() {
                by_managed_id.insert(entry.managed_id.clone(), i);
            }
        }
        RegistrationEntries {
            entries,
            by_instance_id,
            by_managed_id,
        }
    }

    pub fn all(&self) -> &[RegistrationEntry] {
        &self.entries
    }

    pub fn by_instance_id(&self, instance_id: &str) -> Option<&RegistrationEntry> {
        self.by_instance_id.get(instance_id).map(|&i| &self.entries[i])
    }

    pub fn by_managed_id(&self, managed_id: &str) -> Option<&RegistrationEntry> {
        self.by_managed_id.get(managed_id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

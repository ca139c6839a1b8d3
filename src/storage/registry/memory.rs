//! Process-local registry store.

use crate::Result;
use crate::models::{RecordId, RegistryRecord};
use crate::storage::acquire_lock;
use crate::storage::traits::RegistryStore;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Registry store that keeps records in memory only.
///
/// Used when no registry path is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    records: Mutex<BTreeMap<RecordId, RegistryRecord>>,
}

impl MemoryRegistryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        acquire_lock(&self.records).len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load_all(&self) -> Result<Vec<RegistryRecord>> {
        Ok(acquire_lock(&self.records).values().cloned().collect())
    }

    fn save(&self, record: &RegistryRecord) -> Result<()> {
        acquire_lock(&self.records).insert(record.id.clone(), record.clone());
        Ok(())
    }
}

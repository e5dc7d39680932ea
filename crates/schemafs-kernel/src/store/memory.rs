//! In-memory store.
//!
//! Used for tests and ephemeral setups. All data is lost when dropped.

use std::collections::{BTreeMap, HashMap};

use crate::partition::Partition;
use crate::store::{Store, StoreResult};

/// In-memory partitioned store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: HashMap<Partition, BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .partitions
            .get(&partition)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn put(&mut self, partition: Partition, key: &str, value: &[u8]) -> StoreResult<()> {
        self.partitions
            .entry(partition)
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, partition: Partition, key: &str) -> StoreResult<()> {
        if let Some(entries) = self.partitions.get_mut(&partition) {
            entries.remove(key);
        }
        Ok(())
    }

    fn keys(&self, partition: Partition, prefix: Option<&str>) -> StoreResult<Vec<String>> {
        let Some(entries) = self.partitions.get(&partition) else {
            return Ok(Vec::new());
        };

        let keys = match prefix {
            Some(prefix) => entries
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, _)| key.clone())
                .collect(),
            None => entries.keys().cloned().collect(),
        };
        Ok(keys)
    }
}

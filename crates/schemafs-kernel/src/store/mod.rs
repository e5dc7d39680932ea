//! Key-value store collaborator.
//!
//! The translation layer only needs whole-value get/put/delete plus a sorted
//! key listing per partition. Implementations do not lock on their own: the
//! handler owns the store behind its concurrency guard, so mutating calls
//! take `&mut self`.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

use crate::partition::Partition;

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Store returned data that makes no sense.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;

/// Partitioned key-value store.
pub trait Store: Send {
    /// Fetch the whole value under `key`.
    fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the whole value under `key`.
    fn put(&mut self, partition: Partition, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&mut self, partition: Partition, key: &str) -> StoreResult<()>;

    /// Keys in `partition`, optionally restricted to a prefix, sorted ascending.
    fn keys(&self, partition: Partition, prefix: Option<&str>) -> StoreResult<Vec<String>>;

    /// Check whether `key` has a value.
    fn contains(&self, partition: Partition, key: &str) -> StoreResult<bool> {
        Ok(self.get(partition, key)?.is_some())
    }
}

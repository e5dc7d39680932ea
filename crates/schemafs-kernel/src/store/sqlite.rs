//! SQLite-backed store.
//!
//! One table keyed by `(cf, key)`, where `cf` is the partition name. Values
//! are whole-file blobs.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::partition::Partition;
use crate::store::{Store, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    cf TEXT NOT NULL,
    key TEXT NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (cf, key)
);
"#;

/// Persistent partitioned store.
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %path.as_ref().display(), "opened sqlite store");
        Ok(Self { conn })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Number of entries in a partition.
    pub fn count(&self, partition: Partition) -> StoreResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE cf = ?1",
            params![partition.as_str()],
            |row| row.get(0),
        )?;
        usize::try_from(n).map_err(|_| StoreError::Corrupt(format!("negative count {n}")))
    }
}

impl Store for SqliteStore {
    fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE cf = ?1 AND key = ?2",
                params![partition.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, partition: Partition, key: &str, value: &[u8]) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO entries (cf, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(cf, key) DO UPDATE SET value = excluded.value",
            params![partition.as_str(), key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, partition: Partition, key: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM entries WHERE cf = ?1 AND key = ?2",
            params![partition.as_str(), key],
        )?;
        Ok(())
    }

    fn keys(&self, partition: Partition, prefix: Option<&str>) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM entries
             WHERE cf = ?1 AND (?2 IS NULL OR substr(key, 1, length(?2)) = ?2)
             ORDER BY key",
        )?;

        let rows = stmt.query_map(params![partition.as_str(), prefix], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>().map_err(StoreError::from)
    }
}

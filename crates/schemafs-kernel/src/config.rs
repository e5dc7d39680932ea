//! Runtime configuration.
//!
//! Loaded from a RON file:
//!
//! ```ron
//! (
//!     mount_prefix: "/data/",
//!     staging_root: "/var/lib/engine",
//!     store: Sqlite(path: "/var/lib/engine/schema.db"),
//!     max_handles: 256,
//! )
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handler::SchemaFs;
use crate::handles::{Fd, HandleTable};
use crate::path::{DEFAULT_MOUNT_PREFIX, Namespace};
use crate::staging::HostStaging;
use crate::store::{MemoryStore, SqliteStore, StoreError};

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("opening store: {0}")]
    Store(#[from] StoreError),
}

/// Which store backend to use.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreConfig {
    /// Ephemeral in-memory store.
    #[default]
    Memory,
    /// SQLite database file.
    Sqlite { path: PathBuf },
}

/// Translation layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaFsConfig {
    /// Mount prefix of the engine's data directory.
    pub mount_prefix: String,
    /// Host directory that staged `./<db>/<table>.frm~` paths resolve under.
    pub staging_root: PathBuf,
    /// Store backend.
    pub store: StoreConfig,
    /// Maximum simultaneously open descriptors.
    pub max_handles: usize,
    /// First descriptor number handed out.
    pub first_handle: Fd,
}

impl Default for SchemaFsConfig {
    fn default() -> Self {
        Self {
            mount_prefix: DEFAULT_MOUNT_PREFIX.to_string(),
            staging_root: PathBuf::from("."),
            store: StoreConfig::Memory,
            max_handles: HandleTable::DEFAULT_CAPACITY,
            first_handle: HandleTable::DEFAULT_FIRST,
        }
    }
}

impl SchemaFsConfig {
    /// Parse RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text)
    }

    /// Point the store at a SQLite file.
    pub fn with_sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = StoreConfig::Sqlite { path: path.into() };
        self
    }

    /// Build the emulation and its descriptor table.
    pub fn build(&self) -> Result<(SchemaFs, Arc<HandleTable>), ConfigError> {
        let handles = Arc::new(HandleTable::new(self.first_handle, self.max_handles));
        let builder = SchemaFs::builder()
            .namespace(Namespace::new(self.mount_prefix.as_str()))
            .staging(Arc::new(HostStaging::new(&self.staging_root)))
            .redirector(handles.clone());

        let fs = match &self.store {
            StoreConfig::Memory => builder.build(MemoryStore::new()),
            StoreConfig::Sqlite { path } => builder.build(SqliteStore::open(path)?),
        };
        Ok((fs, handles))
    }
}

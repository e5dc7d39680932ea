//! # schemafs-kernel
//!
//! Filesystem emulation that keeps a storage engine's schema metadata in a
//! key-value store instead of on disk.
//!
//! The engine keeps:
//! - a `db.opt` per database, marking that the database exists
//! - a `<table>.frm` per table, holding its definition
//!
//! Calls the engine makes against those paths are intercepted, classified and
//! answered from a partitioned [`Store`]. Everything else is declined so the
//! real filesystem can answer it. New table definitions are written to a
//! staged `<table>.frm~` on disk and move into the store when renamed over
//! their final name.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod handles;
pub mod partition;
pub mod path;
pub mod staging;
pub mod store;
pub mod vfs;

pub use config::{ConfigError, SchemaFsConfig, StoreConfig};
pub use dispatch::{Reply, Request, Syscall, SyscallArg};
pub use error::{Errno, FsError, FsResult, Outcome};
pub use handler::{SchemaFs, SchemaFsBuilder, StatBuf, WeakSchemaFs};
pub use handles::{Fd, HandleTable, Redirector};
pub use partition::Partition;
pub use path::{ClassifiedPath, FileClass, Namespace};
pub use staging::{HostStaging, Staging};
pub use store::{MemoryStore, SqliteStore, Store, StoreError, StoreResult};
pub use vfs::{DirEntry, FileAttr, FileType, StoreBackend, VfsOps};

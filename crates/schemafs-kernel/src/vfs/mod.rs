//! Async filesystem view over the store.
//!
//! - [`VfsOps`] - path-based filesystem operations
//! - [`StoreBackend`] - serves them from a [`SchemaFs`](crate::SchemaFs)
//!
//! Paths are relative to the data directory: `""` is the root, `test` a
//! database and `test/t1.frm` one of its table definitions.

mod backend;
mod ops;
mod types;

pub use backend::StoreBackend;
pub use ops::VfsOps;
pub use types::{DirEntry, FileAttr, FileType};

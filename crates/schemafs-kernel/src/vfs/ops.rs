//! VFS operations trait.

use async_trait::async_trait;
use std::path::Path;

use super::types::{DirEntry, FileAttr};
use crate::error::FsResult;

/// Path-based filesystem operations.
///
/// Read and write take an explicit offset, so no handle state is needed.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> FsResult<FileAttr>;

    /// Read directory entries, sorted by name.
    async fn readdir(&self, path: &Path) -> FsResult<Vec<DirEntry>>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes if the end is reached.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> FsResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset` into an existing file.
    ///
    /// Returns the number of bytes written.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> FsResult<u32>;

    /// Create a file, or leave an existing one as is.
    async fn create(&self, path: &Path) -> FsResult<FileAttr>;

    /// Remove a file.
    async fn unlink(&self, path: &Path) -> FsResult<()>;

    /// Rename a file.
    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;

    // ========================================================================
    // Convenience methods
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Read entire file contents.
    async fn read_all(&self, path: &Path) -> FsResult<Vec<u8>> {
        let attr = self.getattr(path).await?;
        let size = u32::try_from(attr.size).unwrap_or(u32::MAX);
        self.read(path, 0, size).await
    }
}

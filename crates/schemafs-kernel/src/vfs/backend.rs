//! Store-backed VFS backend.

use async_trait::async_trait;
use std::io;
use std::path::Path;

use super::ops::VfsOps;
use super::types::{DirEntry, FileAttr};
use crate::error::{FsError, FsResult, Outcome};
use crate::handler::SchemaFs;
use crate::path::{FileClass, ROOT};

/// Serves [`VfsOps`] from a [`SchemaFs`].
///
/// The emulation is synchronous and holds its store guard for each call, so
/// every operation runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct StoreBackend {
    fs: SchemaFs,
}

impl StoreBackend {
    pub fn new(fs: SchemaFs) -> Self {
        Self { fs }
    }

    /// Get the underlying emulation.
    pub fn fs(&self) -> &SchemaFs {
        &self.fs
    }

    /// Map a relative path to its normalized form.
    fn key(path: &Path) -> FsResult<String> {
        let text = path
            .to_str()
            .ok_or_else(|| FsError::invalid_path(path.to_string_lossy()))?;
        let relative = text.trim_matches('/');
        if relative.is_empty() {
            Ok(ROOT.to_string())
        } else {
            Ok(format!("./{relative}"))
        }
    }

    async fn blocking<T, F>(&self, f: F) -> FsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SchemaFs) -> FsResult<T> + Send + 'static,
    {
        let fs = self.fs.clone();
        tokio::task::spawn_blocking(move || f(&fs))
            .await
            .map_err(|e| FsError::Io(io::Error::other(e)))?
    }
}

fn attr(fs: &SchemaFs, key: &str) -> FsResult<FileAttr> {
    let classified = fs.namespace().classify(key)?;
    match classified.class() {
        FileClass::DatabaseRoot => Ok(FileAttr::directory()),
        FileClass::DatabaseDirectory => match fs.access(key)? {
            Outcome::Done(()) => Ok(FileAttr::directory()),
            _ => Err(FsError::not_found(key)),
        },
        FileClass::DatabaseOption | FileClass::TableDefinition => match fs.stat(key)? {
            Outcome::Done(stat) => Ok(FileAttr::file(stat.size)),
            _ => Err(FsError::not_found(key)),
        },
        _ => Err(FsError::not_found(key)),
    }
}

#[async_trait]
impl VfsOps for StoreBackend {
    async fn getattr(&self, path: &Path) -> FsResult<FileAttr> {
        let key = Self::key(path)?;
        self.blocking(move |fs| attr(fs, &key)).await
    }

    async fn readdir(&self, path: &Path) -> FsResult<Vec<DirEntry>> {
        let key = Self::key(path)?;
        self.blocking(move |fs| {
            let root = key == ROOT;
            if !root {
                attr(fs, &key)?;
            }
            let entries = fs
                .dir(&key)?
                .into_iter()
                .map(|name| {
                    if root {
                        DirEntry::directory(name)
                    } else {
                        DirEntry::file(name)
                    }
                })
                .collect();
            Ok(entries)
        })
        .await
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        let key = Self::key(path)?;
        self.blocking(move |fs| {
            let available = fs.size(&key)?.saturating_sub(offset);
            let len = available.min(u64::from(size));
            let mut buf = vec![0u8; usize::try_from(len).unwrap_or(usize::MAX)];
            let n = fs.read(&key, &mut buf, offset)?;
            buf.truncate(n);
            Ok(buf)
        })
        .await
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> FsResult<u32> {
        let key = Self::key(path)?;
        let data = data.to_vec();
        self.blocking(move |fs| {
            let written = u32::try_from(data.len()).map_err(|_| FsError::Overflow {
                offset,
                len: data.len(),
            })?;
            match fs.write_existing(&key, &data, offset)? {
                Outcome::Done(()) => Ok(written),
                _ => Err(FsError::not_found(&key)),
            }
        })
        .await
    }

    async fn create(&self, path: &Path) -> FsResult<FileAttr> {
        let key = Self::key(path)?;
        self.blocking(move |fs| match fs.create(&key)? {
            Outcome::Done(()) => attr(fs, &key),
            // Table definitions need their database first
            Outcome::Failed(_) => Err(FsError::not_found(&key)),
            Outcome::NotHandled => Err(FsError::invalid_path(&key)),
        })
        .await
    }

    async fn unlink(&self, path: &Path) -> FsResult<()> {
        let key = Self::key(path)?;
        self.blocking(move |fs| match fs.unlink(&key)? {
            Outcome::Done(()) => Ok(()),
            Outcome::Failed(_) => Err(FsError::not_found(&key)),
            Outcome::NotHandled => Err(FsError::invalid_path(&key)),
        })
        .await
    }

    async fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        let from = Self::key(from)?;
        let to = Self::key(to)?;
        self.blocking(move |fs| match fs.rename(&from, &to)? {
            Outcome::Done(()) => Ok(()),
            Outcome::Failed(_) => Err(FsError::not_found(&from)),
            Outcome::NotHandled => Err(FsError::invalid_path(&from)),
        })
        .await
    }
}

//! Filesystem emulation over the partitioned store.
//!
//! [`SchemaFs`] answers the engine's open/stat/access/rename/unlink calls for
//! table definitions and database markers, and serves sized reads, writes
//! and directory listings for descriptors that were redirected to it.
//!
//! ## Concurrency
//!
//! The store lives inside a single mutex. Every operation does all of its
//! store reads and writes under one acquisition, so existence-gated creation,
//! rename and read-modify-write never interleave with each other. The lock is
//! only held for a bounded number of store calls (plus one staging read during
//! promotion).

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Errno, FsError, FsResult, Outcome};
use crate::handles::{Fd, HandleTable, Redirector};
use crate::partition::Partition;
use crate::path::{
    self, ClassifiedPath, FileClass, Namespace, OPTION_FILE_NAME, has_recognized_extension,
};
use crate::staging::{HostStaging, Staging};
use crate::store::{MemoryStore, Store};

/// Minimal stat record. Only `size` is ever populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatBuf {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl StatBuf {
    fn with_size(size: u64) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

struct Inner {
    namespace: Namespace,
    store: Mutex<Box<dyn Store>>,
    staging: Arc<dyn Staging>,
    redirector: Arc<dyn Redirector>,
}

/// Store-backed filesystem emulation.
///
/// Cheap to clone; clones share the store and its guard.
#[derive(Clone)]
pub struct SchemaFs {
    inner: Arc<Inner>,
}

/// Non-owning handle to a [`SchemaFs`].
///
/// Open descriptors hold one of these so they never keep the store alive.
#[derive(Clone)]
pub struct WeakSchemaFs {
    inner: Weak<Inner>,
}

impl WeakSchemaFs {
    /// Get the filesystem back, if it is still alive.
    pub fn upgrade(&self) -> Option<SchemaFs> {
        self.inner.upgrade().map(|inner| SchemaFs { inner })
    }
}

impl std::fmt::Debug for SchemaFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaFs")
            .field("mount_prefix", &self.inner.namespace.mount_prefix())
            .field("store", &"<locked>")
            .finish()
    }
}

/// Builder for [`SchemaFs`].
pub struct SchemaFsBuilder {
    namespace: Namespace,
    staging: Option<Arc<dyn Staging>>,
    redirector: Option<Arc<dyn Redirector>>,
}

impl SchemaFsBuilder {
    /// Set the mount namespace (default `/data/`).
    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Set the staging area (default: host filesystem at `.`).
    pub fn staging(mut self, staging: Arc<dyn Staging>) -> Self {
        self.staging = Some(staging);
        self
    }

    /// Set the descriptor collaborator (default: a fresh [`HandleTable`]).
    pub fn redirector(mut self, redirector: Arc<dyn Redirector>) -> Self {
        self.redirector = Some(redirector);
        self
    }

    /// Build around the given store.
    pub fn build(self, store: impl Store + 'static) -> SchemaFs {
        SchemaFs {
            inner: Arc::new(Inner {
                namespace: self.namespace,
                store: Mutex::new(Box::new(store)),
                staging: self
                    .staging
                    .unwrap_or_else(|| Arc::new(HostStaging::new("."))),
                redirector: self
                    .redirector
                    .unwrap_or_else(|| Arc::new(HandleTable::default())),
            }),
        }
    }
}

impl SchemaFs {
    pub fn builder() -> SchemaFsBuilder {
        SchemaFsBuilder {
            namespace: Namespace::default(),
            staging: None,
            redirector: None,
        }
    }

    /// In-memory store with default collaborators.
    pub fn in_memory() -> Self {
        Self::builder().build(MemoryStore::new())
    }

    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    pub fn downgrade(&self) -> WeakSchemaFs {
        WeakSchemaFs {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Acquire the concurrency guard.
    fn lock(&self) -> MutexGuard<'_, Box<dyn Store>> {
        self.inner.store.lock()
    }

    /// Normalize and classify, logging contract violations.
    fn classify(&self, path: &str) -> FsResult<ClassifiedPath> {
        self.inner
            .namespace
            .classify(path)
            .inspect_err(|e| tracing::warn!(path, error = %e, "rejected path"))
    }

    /// Classify a path for the handle-layer calls.
    ///
    /// Paths without `.frm`/`.opt` are `UnexpectedExtension`. A managed
    /// extension outside the one-level shape is `InvalidPath`.
    fn stored(&self, path: &str) -> FsResult<(ClassifiedPath, Partition)> {
        let key = self.inner.namespace.normalize(path);
        Partition::for_path(&key)?;
        let classified = self.classify(&key)?;
        if !classified.class().has_partition() {
            return Err(FsError::invalid_path(key));
        }
        let partition = Partition::for_class(classified.class())?;
        Ok((classified, partition))
    }

    /// True unless `classified` is a table definition whose database has no
    /// `db.opt`.
    fn has_marker(store: &dyn Store, classified: &ClassifiedPath) -> FsResult<bool> {
        if classified.class() != FileClass::TableDefinition {
            return Ok(true);
        }
        let marker = classified
            .option_file_key()
            .ok_or_else(|| FsError::invalid_path(classified.path()))?;
        Ok(store.contains(Partition::Db, &marker)?)
    }

    // ========================================================================
    // Emulated syscalls
    // ========================================================================

    /// Existence gate shared by `open` and `create`, run under the guard.
    ///
    /// Returns whether the entry was created, or the errno to report.
    fn admit(
        store: &mut dyn Store,
        classified: &ClassifiedPath,
        partition: Partition,
        create: bool,
    ) -> FsResult<Result<bool, Errno>> {
        let key = classified.path();
        let exists = store.contains(partition, key)?;
        if !create && !exists {
            tracing::debug!(path = key, "no entry");
            return Ok(Err(Errno::NoEnt));
        }

        if !Self::has_marker(store, classified)? {
            tracing::debug!(path = key, "database does not exist");
            return Ok(Err(Errno::NoEnt));
        }

        if !exists {
            store.put(partition, key, &[])?;
        }
        Ok(Ok(!exists))
    }

    /// Emulate `open`.
    ///
    /// Table definitions may only be opened while their database's `db.opt`
    /// exists. With `create`, an absent entry is created empty before the
    /// descriptor is bound. The guard is released before the redirector
    /// runs, so it may call back into this filesystem.
    pub fn open(&self, path: &str, create: bool) -> FsResult<Outcome<Fd>> {
        let classified = self.classify(path)?;

        match classified.class() {
            FileClass::TemporaryTableDefinition => {
                // Staged files stay on the real filesystem, but their
                // directory has to exist there.
                if let Some(db) = classified.database() {
                    if let Err(e) = self.inner.staging.create_dir(&format!("./{db}")) {
                        tracing::warn!(path, error = %e, "failed to create staging directory");
                    }
                }
                return Ok(Outcome::NotHandled);
            }
            class if !class.has_partition() => return Ok(Outcome::NotHandled),
            _ => {}
        }

        let partition = Partition::for_class(classified.class())?;
        let key = classified.path();

        let created = {
            let mut store = self.lock();
            match Self::admit(&mut **store, &classified, partition, create)? {
                Ok(created) => created,
                Err(errno) => return Ok(Outcome::Failed(errno)),
            }
        };

        match self.inner.redirector.redirect(key, self) {
            Ok(fd) => {
                tracing::debug!(path = key, %partition, fd, created, "open");
                Ok(Outcome::Done(fd))
            }
            Err(e) => {
                if created {
                    // Only undo our own empty entry, not a write that landed since.
                    let mut store = self.lock();
                    if store.get(partition, key)?.is_some_and(|v| v.is_empty()) {
                        store.delete(partition, key)?;
                    }
                }
                match e {
                    FsError::HandlesExhausted => Ok(Outcome::Failed(Errno::MFile)),
                    other => Err(other),
                }
            }
        }
    }

    /// Create an entry under the same rules as `open` with create, without
    /// binding a descriptor. An existing entry is left untouched.
    pub fn create(&self, path: &str) -> FsResult<Outcome<()>> {
        let classified = self.classify(path)?;
        if !classified.class().has_partition() {
            return Ok(Outcome::NotHandled);
        }

        let partition = Partition::for_class(classified.class())?;
        let mut store = self.lock();
        Ok(match Self::admit(&mut **store, &classified, partition, true)? {
            Ok(_) => Outcome::Done(()),
            Err(errno) => Outcome::Failed(errno),
        })
    }

    /// Emulate `stat`. Only the size is reported.
    pub fn stat(&self, path: &str) -> FsResult<Outcome<StatBuf>> {
        let classified = self.classify(path)?;
        if !classified.class().has_partition() {
            return Ok(Outcome::NotHandled);
        }

        let partition = Partition::for_class(classified.class())?;
        let value = self.lock().get(partition, classified.path())?;

        Ok(match value {
            Some(value) => Outcome::Done(StatBuf::with_size(value.len() as u64)),
            None => Outcome::Failed(Errno::NoEnt),
        })
    }

    /// Emulate `access` as an existence check.
    ///
    /// A managed file path missing the `./` prefix is retried once with it.
    /// A database directory is answered by its `db.opt`; when that is absent
    /// the real filesystem gets to answer.
    pub fn access(&self, path: &str) -> FsResult<Outcome<()>> {
        let normalized = self.inner.namespace.normalize(path);
        let classified = match path::classify(&normalized) {
            Err(FsError::InvalidPath(_)) if has_recognized_extension(&normalized) => {
                self.classify(&format!("./{normalized}"))?
            }
            other => other.inspect_err(|e| tracing::warn!(path, error = %e, "rejected path"))?,
        };

        match classified.class() {
            FileClass::DatabaseOption | FileClass::TableDefinition => {
                let partition = Partition::for_class(classified.class())?;
                if self.lock().contains(partition, classified.path())? {
                    Ok(Outcome::Done(()))
                } else {
                    Ok(Outcome::Failed(Errno::NoEnt))
                }
            }
            FileClass::DatabaseDirectory => {
                let marker = classified
                    .option_file_key()
                    .ok_or_else(|| FsError::invalid_path(classified.path()))?;
                if self.lock().contains(Partition::Db, &marker)? {
                    Ok(Outcome::Done(()))
                } else {
                    Ok(Outcome::NotHandled)
                }
            }
            _ => Ok(Outcome::NotHandled),
        }
    }

    /// Emulate `rename`.
    ///
    /// Two transitions are supported: table definition to table definition
    /// inside the store, and staged file to table definition (promotion into
    /// the store). Anything else is left to the real filesystem.
    #[tracing::instrument(skip(self), name = "schemafs.rename")]
    pub fn rename(&self, from: &str, to: &str) -> FsResult<Outcome<()>> {
        let old = self.classify(from)?;
        let new = self.classify(to)?;

        match (old.class(), new.class()) {
            (FileClass::TableDefinition, FileClass::TableDefinition) => {
                if old.path() == new.path() {
                    return Ok(Outcome::Done(()));
                }
                let mut store = self.lock();
                let value = store
                    .get(Partition::Frm, old.path())?
                    .ok_or_else(|| FsError::not_found(old.path()))?;
                store.put(Partition::Frm, new.path(), &value)?;
                store.delete(Partition::Frm, old.path())?;
                tracing::debug!(len = value.len(), "renamed within store");
                Ok(Outcome::Done(()))
            }
            (FileClass::TemporaryTableDefinition, FileClass::TableDefinition) => {
                let mut store = self.lock();
                let value = self.inner.staging.read(old.path())?;
                store.put(Partition::Frm, new.path(), &value)?;
                // The store now holds the data; a leftover staged copy is harmless.
                if let Err(e) = self.inner.staging.remove(old.path()) {
                    tracing::warn!(path = old.path(), error = %e, "failed to remove staged file");
                }
                tracing::debug!(len = value.len(), "promoted staged file");
                Ok(Outcome::Done(()))
            }
            (FileClass::TemporaryTableDefinition, _) => Err(FsError::invalid_path(new.path())),
            _ => Ok(Outcome::NotHandled),
        }
    }

    /// Emulate `unlink`. Removing an absent entry succeeds.
    pub fn unlink(&self, path: &str) -> FsResult<Outcome<()>> {
        let classified = self.classify(path)?;
        if !classified.class().has_partition() {
            return Ok(Outcome::NotHandled);
        }

        let partition = Partition::for_class(classified.class())?;
        self.lock().delete(partition, classified.path())?;
        tracing::debug!(path = classified.path(), %partition, "unlink");
        Ok(Outcome::Done(()))
    }

    // ========================================================================
    // Handle-layer queries
    // ========================================================================

    /// List a directory.
    ///
    /// The root lists database names (those with a `db.opt`). A database
    /// directory lists the file names of its table definitions.
    pub fn dir(&self, path: &str) -> FsResult<Vec<String>> {
        let classified = self.classify(path)?;

        match classified.class() {
            FileClass::DatabaseRoot => {
                let keys = self.lock().keys(Partition::Db, None)?;
                let suffix = format!("/{OPTION_FILE_NAME}");
                Ok(keys
                    .iter()
                    .filter_map(|key| key.strip_prefix("./")?.strip_suffix(suffix.as_str()))
                    .map(str::to_string)
                    .collect())
            }
            FileClass::DatabaseDirectory => {
                let db = classified
                    .database()
                    .ok_or_else(|| FsError::invalid_path(classified.path()))?;
                let keys = self
                    .lock()
                    .keys(Partition::Frm, Some(&path::table_prefix(db)))?;
                Ok(keys
                    .iter()
                    .filter_map(|key| key.rsplit_once('/').map(|(_, name)| name.to_string()))
                    .collect())
            }
            _ => Err(FsError::invalid_path(classified.path())),
        }
    }

    /// Read up to `buf.len()` bytes at `offset`.
    ///
    /// Reading at or past the end returns 0.
    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        let (classified, partition) = self.stored(path)?;
        let key = classified.path();
        let value = self
            .lock()
            .get(partition, key)?
            .ok_or_else(|| FsError::not_found(key))?;

        let start = match usize::try_from(offset) {
            Ok(start) if start < value.len() => start,
            _ => return Ok(0),
        };
        let count = buf.len().min(value.len() - start);
        buf[..count].copy_from_slice(&value[start..start + count]);
        tracing::trace!(path = key, offset, count, "read");
        Ok(count)
    }

    /// End offset of a write, or `Overflow` when it is not addressable.
    fn write_end(offset: u64, len: usize) -> FsResult<usize> {
        offset
            .checked_add(len as u64)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or(FsError::Overflow { offset, len })
    }

    /// Read-modify-write of one entry, run under the guard.
    fn write_locked(
        store: &mut dyn Store,
        classified: &ClassifiedPath,
        partition: Partition,
        data: &[u8],
        end: usize,
    ) -> FsResult<()> {
        let key = classified.path();
        let mut value = match store.get(partition, key)? {
            Some(value) => value,
            None if Self::has_marker(store, classified)? => Vec::new(),
            None => {
                tracing::debug!(path = key, "database does not exist");
                return Err(FsError::not_found(key));
            }
        };

        if value.len() < end {
            value.resize(end, 0);
        }
        value[end - data.len()..end].copy_from_slice(data);
        store.put(partition, key, &value)?;
        tracing::trace!(path = key, end, len = data.len(), "write");
        Ok(())
    }

    /// Write `data` at `offset`, zero-filling any gap past the current end.
    ///
    /// An absent entry is created, except for a table definition whose
    /// database has no `db.opt`.
    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<()> {
        let (classified, partition) = self.stored(path)?;
        let end = Self::write_end(offset, data.len())?;
        let mut store = self.lock();
        Self::write_locked(&mut **store, &classified, partition, data, end)
    }

    /// Like [`write`](Self::write), but only into an entry that exists.
    ///
    /// The existence check and the write happen under one guard acquisition.
    pub fn write_existing(&self, path: &str, data: &[u8], offset: u64) -> FsResult<Outcome<()>> {
        let (classified, partition) = self.stored(path)?;
        let end = Self::write_end(offset, data.len())?;
        let mut store = self.lock();
        if !store.contains(partition, classified.path())? {
            return Ok(Outcome::Failed(Errno::NoEnt));
        }
        Self::write_locked(&mut **store, &classified, partition, data, end)?;
        Ok(Outcome::Done(()))
    }

    /// Stored length, or 0 when there is no entry.
    pub fn size(&self, path: &str) -> FsResult<u64> {
        let (classified, partition) = self.stored(path)?;
        let value = self.lock().get(partition, classified.path())?;
        Ok(value.map_or(0, |v| v.len() as u64))
    }
}

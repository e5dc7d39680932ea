//! Descriptor table for redirected opens.
//!
//! When an open is accepted, the handler asks a [`Redirector`] to bind the
//! store-backed path to something the host can use as a file descriptor.
//! [`HandleTable`] is the in-process implementation: it hands out descriptor
//! numbers from a bounded range and keeps a cursor per descriptor so that
//! plain read/write/seek calls can be served from the store.

use std::collections::BTreeMap;
use std::io::SeekFrom;

use parking_lot::Mutex;

use crate::error::{FsError, FsResult};
use crate::handler::{SchemaFs, WeakSchemaFs};

/// Descriptor number visible to the host.
pub type Fd = i32;

/// Binds an accepted path to a host-visible descriptor.
pub trait Redirector: Send + Sync {
    /// Bind `path` (normalized) served by `fs`.
    ///
    /// Fails with `HandlesExhausted` when no descriptor is available.
    fn redirect(&self, path: &str, fs: &SchemaFs) -> FsResult<Fd>;
}

struct Handle {
    path: String,
    fs: WeakSchemaFs,
    cursor: u64,
}

/// Bounded table of store-backed descriptors.
pub struct HandleTable {
    first: Fd,
    capacity: usize,
    handles: Mutex<BTreeMap<Fd, Handle>>,
}

impl std::fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleTable")
            .field("first", &self.first)
            .field("capacity", &self.capacity)
            .field("open", &self.handles.lock().len())
            .finish()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FIRST, Self::DEFAULT_CAPACITY)
    }
}

impl HandleTable {
    /// Default first descriptor, well above what a process opens on its own.
    pub const DEFAULT_FIRST: Fd = 1000;

    /// Default number of simultaneously open descriptors.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a table handing out `capacity` descriptors starting at `first`.
    pub fn new(first: Fd, capacity: usize) -> Self {
        Self {
            first,
            capacity,
            handles: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of open descriptors.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lowest free descriptor, if any is left.
    fn allocate(&self, handles: &BTreeMap<Fd, Handle>) -> Option<Fd> {
        let mut candidate = self.first;
        for &fd in handles.keys() {
            if fd != candidate {
                break;
            }
            candidate = candidate.checked_add(1)?;
        }
        let used = usize::try_from(candidate - self.first).ok()?;
        (used < self.capacity).then_some(candidate)
    }

    /// Snapshot of a handle's path, cursor and filesystem.
    ///
    /// A descriptor whose filesystem has been dropped is `BadHandle`.
    fn snapshot(&self, fd: Fd) -> FsResult<(String, u64, SchemaFs)> {
        let handles = self.handles.lock();
        let handle = handles.get(&fd).ok_or(FsError::BadHandle(fd))?;
        let fs = handle.fs.upgrade().ok_or(FsError::BadHandle(fd))?;
        Ok((handle.path.clone(), handle.cursor, fs))
    }

    fn set_cursor(&self, fd: Fd, cursor: u64) {
        if let Some(handle) = self.handles.lock().get_mut(&fd) {
            handle.cursor = cursor;
        }
    }

    /// Normalized path bound to `fd`.
    pub fn path(&self, fd: Fd) -> FsResult<String> {
        self.snapshot(fd).map(|(path, _, _)| path)
    }

    /// Read at the cursor and advance it.
    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> FsResult<usize> {
        let (path, cursor, fs) = self.snapshot(fd)?;
        let n = fs.read(&path, buf, cursor)?;
        self.set_cursor(fd, cursor + n as u64);
        Ok(n)
    }

    /// Write at the cursor and advance it.
    pub fn write(&self, fd: Fd, data: &[u8]) -> FsResult<usize> {
        let (path, cursor, fs) = self.snapshot(fd)?;
        fs.write(&path, data, cursor)?;
        self.set_cursor(fd, cursor + data.len() as u64);
        Ok(data.len())
    }

    /// Move the cursor. Returns the new position.
    pub fn seek(&self, fd: Fd, pos: SeekFrom) -> FsResult<u64> {
        let (path, cursor, fs) = self.snapshot(fd)?;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => cursor.checked_add_signed(delta),
            SeekFrom::End(delta) => fs.size(&path)?.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| FsError::bad_argument("seek before start of file"))?;
        self.set_cursor(fd, target);
        Ok(target)
    }

    /// Current stored length of the file bound to `fd`.
    pub fn size(&self, fd: Fd) -> FsResult<u64> {
        let (path, _, fs) = self.snapshot(fd)?;
        fs.size(&path)
    }

    /// Release `fd`.
    pub fn close(&self, fd: Fd) -> FsResult<()> {
        self.handles
            .lock()
            .remove(&fd)
            .map(|_| ())
            .ok_or(FsError::BadHandle(fd))
    }
}

impl Redirector for HandleTable {
    fn redirect(&self, path: &str, fs: &SchemaFs) -> FsResult<Fd> {
        let mut handles = self.handles.lock();
        let fd = self.allocate(&handles).ok_or(FsError::HandlesExhausted)?;
        handles.insert(
            fd,
            Handle {
                path: path.to_string(),
                fs: fs.downgrade(),
                cursor: 0,
            },
        );
        tracing::debug!(fd, path, "bound descriptor");
        Ok(fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Outcome;
    use std::sync::Arc;

    fn setup(capacity: usize) -> (SchemaFs, Arc<HandleTable>) {
        let table = Arc::new(HandleTable::new(10, capacity));
        let fs = SchemaFs::builder()
            .redirector(table.clone())
            .build(crate::store::MemoryStore::new());
        fs.write("./test/db.opt", b"", 0).unwrap();
        (fs, table)
    }

    fn open(fs: &SchemaFs, path: &str) -> Fd {
        match fs.open(path, true).unwrap() {
            Outcome::Done(fd) => fd,
            other => panic!("open {path}: {other:?}"),
        }
    }

    #[test]
    fn test_descriptors_start_at_first_and_reuse_lowest() {
        let (fs, table) = setup(8);
        let a = open(&fs, "/data/test/a.frm");
        let b = open(&fs, "/data/test/b.frm");
        assert_eq!((a, b), (10, 11));

        table.close(a).unwrap();
        let c = open(&fs, "/data/test/c.frm");
        assert_eq!(c, 10);
        assert_eq!(table.path(c).unwrap(), "./test/c.frm");
    }

    #[test]
    fn test_exhaustion() {
        let (fs, table) = setup(2);
        open(&fs, "/data/test/a.frm");
        open(&fs, "/data/test/b.frm");
        assert!(matches!(
            table.redirect("./test/c.frm", &fs),
            Err(FsError::HandlesExhausted)
        ));
    }

    #[test]
    fn test_cursor_read_write_seek() {
        let (fs, table) = setup(4);
        let fd = open(&fs, "/data/test/t.frm");

        assert_eq!(table.write(fd, b"hello ").unwrap(), 6);
        assert_eq!(table.write(fd, b"world").unwrap(), 5);
        assert_eq!(table.size(fd).unwrap(), 11);

        assert_eq!(table.seek(fd, SeekFrom::Start(0)).unwrap(), 0);
        let mut buf = [0u8; 5];
        assert_eq!(table.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");

        assert_eq!(table.seek(fd, SeekFrom::End(-5)).unwrap(), 6);
        let mut rest = [0u8; 16];
        let n = table.read(fd, &mut rest).unwrap();
        assert_eq!(&rest[..n], b"world");

        // At end of data
        assert_eq!(table.read(fd, &mut rest).unwrap(), 0);

        assert!(table.seek(fd, SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_descriptor_does_not_keep_fs_alive() {
        let (fs, table) = setup(4);
        let fd = open(&fs, "/data/test/t.frm");
        table.write(fd, b"def").unwrap();

        let weak = fs.downgrade();
        drop(fs);
        assert!(weak.upgrade().is_none());

        let mut buf = [0u8; 4];
        assert!(matches!(table.read(fd, &mut buf), Err(FsError::BadHandle(_))));
        table.close(fd).unwrap();
    }

    #[test]
    fn test_bad_descriptor() {
        let (_fs, table) = setup(4);
        let mut buf = [0u8; 4];
        assert!(matches!(table.read(99, &mut buf), Err(FsError::BadHandle(99))));
        assert!(matches!(table.close(99), Err(FsError::BadHandle(99))));
    }
}

//! End-to-end tests of the emulation through its public surface.
//!
//! These drive `SchemaFs` the way the host does: opens and renames through
//! the syscall entry point, data through the handle-layer calls, with both
//! store backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use schemafs_kernel::{
    Errno, FsError, HandleTable, HostStaging, MemoryStore, Outcome, Partition, Reply, SchemaFs,
    SqliteStore, Store, StoreResult, SyscallArg,
};

// ============================================================================
// Shared test setup
// ============================================================================

fn open_create(fs: &SchemaFs, path: &str) -> Outcome<i32> {
    fs.open(path, true).unwrap()
}

fn read_all(fs: &SchemaFs, path: &str) -> Vec<u8> {
    let mut buf = vec![0u8; fs.size(path).unwrap() as usize];
    let n = fs.read(path, &mut buf, 0).unwrap();
    buf.truncate(n);
    buf
}

/// Store wrapper that counts every call.
struct CountingStore {
    inner: MemoryStore,
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner: MemoryStore::new(),
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Store for CountingStore {
    fn get(&self, partition: Partition, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.tick();
        self.inner.get(partition, key)
    }

    fn put(&mut self, partition: Partition, key: &str, value: &[u8]) -> StoreResult<()> {
        self.tick();
        self.inner.put(partition, key, value)
    }

    fn delete(&mut self, partition: Partition, key: &str) -> StoreResult<()> {
        self.tick();
        self.inner.delete(partition, key)
    }

    fn keys(&self, partition: Partition, prefix: Option<&str>) -> StoreResult<Vec<String>> {
        self.tick();
        self.inner.keys(partition, prefix)
    }
}

// ============================================================================
// Database lifecycle
// ============================================================================

#[test]
fn test_table_creation_follows_database_marker() {
    let fs = SchemaFs::in_memory();

    assert!(matches!(
        open_create(&fs, "/data/test/db.opt"),
        Outcome::Done(_)
    ));
    assert!(matches!(
        open_create(&fs, "/data/test/t1.frm"),
        Outcome::Done(_)
    ));

    assert_eq!(
        fs.unlink("/data/test/db.opt").unwrap(),
        Outcome::Done(())
    );
    assert_eq!(
        open_create(&fs, "/data/test/t2.frm"),
        Outcome::Failed(Errno::NoEnt)
    );
}

#[test]
fn test_marker_required_for_every_database() {
    let fs = SchemaFs::in_memory();
    for db in ["alpha", "beta", "gamma_1"] {
        let table = format!("/data/{db}/orders.frm");
        assert_eq!(open_create(&fs, &table), Outcome::Failed(Errno::NoEnt), "{db}");
        assert!(open_create(&fs, &format!("/data/{db}/db.opt")).is_handled());
        assert!(matches!(open_create(&fs, &table), Outcome::Done(_)), "{db}");
    }
}

#[test]
fn test_syscall_path_scenario() {
    let fs = SchemaFs::in_memory();
    let o_creat = i64::from(libc::O_CREAT);

    let opened = fs
        .syscall(
            libc::SYS_open,
            SyscallArg::Path("/data/test/db.opt"),
            SyscallArg::Int(o_creat),
        )
        .unwrap();
    assert!(matches!(opened, Outcome::Done(Reply::Fd(_))));

    let denied = fs
        .syscall(
            libc::SYS_open,
            SyscallArg::Path("/data/other/t1.frm"),
            SyscallArg::Int(o_creat),
        )
        .unwrap();
    assert_eq!(denied.return_code(), Some((-1, Some(libc::ENOENT))));

    let passthrough = fs
        .syscall(
            libc::SYS_open,
            SyscallArg::Path("/data/test/t1.ibd"),
            SyscallArg::Int(o_creat),
        )
        .unwrap();
    assert_eq!(passthrough.return_code(), None);
}

// ============================================================================
// Sized read and write
// ============================================================================

#[test]
fn test_write_read_round_trip_at_offset() {
    let fs = SchemaFs::in_memory();
    open_create(&fs, "/data/test/db.opt");
    open_create(&fs, "/data/test/t1.frm");

    let payload = b"table definition bytes";
    fs.write("/data/test/t1.frm", payload, 17).unwrap();

    let mut buf = vec![0u8; payload.len()];
    let n = fs.read("/data/test/t1.frm", &mut buf, 17).unwrap();
    assert_eq!(n, payload.len());
    assert_eq!(&buf, payload);
}

#[test]
fn test_write_past_end_zero_fills() {
    let fs = SchemaFs::in_memory();
    open_create(&fs, "/data/test/db.opt");
    open_create(&fs, "/data/test/t1.frm");

    fs.write("./test/t1.frm", b"tail", 9).unwrap();
    assert_eq!(fs.size("./test/t1.frm").unwrap(), 13);

    let mut gap = [0xffu8; 9];
    assert_eq!(fs.read("./test/t1.frm", &mut gap, 0).unwrap(), 9);
    assert_eq!(gap, [0u8; 9]);
}

#[test]
fn test_read_past_end_is_empty() {
    let fs = SchemaFs::in_memory();
    open_create(&fs, "/data/test/db.opt");
    fs.write("./test/db.opt", b"charset=utf8", 0).unwrap();

    let mut buf = [0u8; 8];
    for offset in [12, 13, 4096, u64::MAX] {
        assert_eq!(fs.read("./test/db.opt", &mut buf, offset).unwrap(), 0, "{offset}");
    }
}

#[test]
fn test_write_overflow() {
    let fs = SchemaFs::in_memory();
    assert!(matches!(
        fs.write("./test/db.opt", b"x", u64::MAX),
        Err(FsError::Overflow { .. })
    ));
    assert_eq!(fs.size("./test/db.opt").unwrap(), 0);
}

// ============================================================================
// Unlink and rename
// ============================================================================

#[test]
fn test_unlink_is_idempotent() {
    let fs = SchemaFs::in_memory();
    for _ in 0..2 {
        assert_eq!(fs.unlink("/data/test/ghost.frm").unwrap(), Outcome::Done(()));
        assert_eq!(fs.unlink("/data/test/db.opt").unwrap(), Outcome::Done(()));
    }
}

#[test]
fn test_rename_moves_contents() {
    let fs = SchemaFs::in_memory();
    open_create(&fs, "/data/test/db.opt");
    open_create(&fs, "/data/test/old.frm");
    fs.write("./test/old.frm", b"definition", 0).unwrap();

    assert_eq!(
        fs.rename("/data/test/old.frm", "/data/test/new.frm").unwrap(),
        Outcome::Done(())
    );
    assert_eq!(fs.stat("./test/old.frm").unwrap(), Outcome::Failed(Errno::NoEnt));
    assert_eq!(read_all(&fs, "./test/new.frm"), b"definition");
}

#[test]
fn test_rename_is_atomic_to_concurrent_readers() {
    let fs = SchemaFs::in_memory();
    open_create(&fs, "/data/test/db.opt");
    fs.write("./test/a.frm", b"payload", 0).unwrap();

    let renamer = {
        let fs = fs.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                fs.rename("./test/a.frm", "./test/b.frm").unwrap();
                fs.rename("./test/b.frm", "./test/a.frm").unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let fs = fs.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let tables = fs.dir("./test").unwrap();
                    assert_eq!(tables.len(), 1, "saw {tables:?}");
                    for path in ["./test/a.frm", "./test/b.frm"] {
                        let size = fs.size(path).unwrap();
                        assert!(size == 0 || size == 7, "{path} had {size} bytes");
                    }
                }
            })
        })
        .collect();

    renamer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(read_all(&fs, "./test/a.frm"), b"payload");
}

#[test]
fn test_concurrent_writers_do_not_lose_updates() {
    let fs = SchemaFs::in_memory();
    open_create(&fs, "/data/test/db.opt");

    let writers: Vec<_> = (0..8u64)
        .map(|i| {
            let fs = fs.clone();
            thread::spawn(move || {
                fs.write("./test/t.frm", &[b'a' + i as u8; 4], i * 4).unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let data = read_all(&fs, "./test/t.frm");
    assert_eq!(data.len(), 32);
    for (i, chunk) in data.chunks(4).enumerate() {
        assert_eq!(chunk, [b'a' + i as u8; 4]);
    }
}

#[test]
fn test_staged_definition_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let fs = SchemaFs::builder()
        .staging(Arc::new(HostStaging::new(dir.path())))
        .build(MemoryStore::new());
    open_create(&fs, "/data/test/db.opt");

    // Opening the staged name only prepares its directory
    assert_eq!(open_create(&fs, "/data/test/t1.frm~"), Outcome::NotHandled);
    std::fs::write(dir.path().join("test/t1.frm~"), b"staged definition").unwrap();

    assert_eq!(
        fs.rename("/data/test/t1.frm~", "/data/test/t1.frm").unwrap(),
        Outcome::Done(())
    );
    assert_eq!(read_all(&fs, "./test/t1.frm"), b"staged definition");
    assert!(!dir.path().join("test/t1.frm~").exists());
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_listing_matches_stored_entries() {
    let fs = SchemaFs::in_memory();
    for db in ["shop", "shop2", "logs"] {
        open_create(&fs, &format!("/data/{db}/db.opt"));
    }
    for table in ["orders", "items"] {
        open_create(&fs, &format!("/data/shop/{table}.frm"));
    }
    open_create(&fs, "/data/shop2/carts.frm");

    assert_eq!(fs.dir("/data/").unwrap(), vec!["logs", "shop", "shop2"]);
    assert_eq!(fs.dir("/data/shop").unwrap(), vec!["items.frm", "orders.frm"]);
    assert_eq!(fs.dir("/data/shop2/").unwrap(), vec!["carts.frm"]);
    assert!(fs.dir("/data/logs").unwrap().is_empty());

    fs.unlink("/data/shop/orders.frm").unwrap();
    fs.unlink("/data/logs/db.opt").unwrap();
    assert_eq!(fs.dir("/data/").unwrap(), vec!["shop", "shop2"]);
    assert_eq!(fs.dir("/data/shop").unwrap(), vec!["items.frm"]);
}

// ============================================================================
// Paths outside the contract
// ============================================================================

#[test]
fn test_unrecognized_paths_never_touch_store() {
    let (store, calls) = CountingStore::new();
    let fs = SchemaFs::builder().build(store);

    for path in [
        "/etc/passwd",
        "/data/test/t1.ibd",
        "/data/test/t1.MYD",
        "/data/a/b/c",
        "relative/file.txt",
    ] {
        assert_eq!(fs.open(path, true).unwrap(), Outcome::NotHandled, "{path}");
        assert_eq!(fs.stat(path).unwrap(), Outcome::NotHandled, "{path}");
        assert_eq!(fs.access(path).unwrap(), Outcome::NotHandled, "{path}");
        assert_eq!(fs.unlink(path).unwrap(), Outcome::NotHandled, "{path}");
        assert_eq!(
            fs.rename(path, "/data/test/t1.frm").unwrap(),
            Outcome::NotHandled,
            "{path}"
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_malformed_managed_paths_fail_without_touching_store() {
    let (store, calls) = CountingStore::new();
    let fs = SchemaFs::builder().build(store);

    for path in ["/data/a/b/t1.frm", "/data/t1.frm", "/data/test/x.opt", "/data/../t1.frm"] {
        assert!(
            matches!(fs.open(path, true), Err(FsError::InvalidPath(_))),
            "{path}"
        );
        assert!(
            matches!(fs.unlink(path), Err(FsError::InvalidPath(_))),
            "{path}"
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_sqlite_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("schema.db");

    {
        let handles = Arc::new(HandleTable::default());
        let fs = SchemaFs::builder()
            .redirector(handles.clone())
            .build(SqliteStore::open(&db_path).unwrap());
        let Outcome::Done(fd) = open_create(&fs, "/data/test/db.opt") else {
            panic!("create database failed");
        };
        handles.write(fd, b"default-character-set=utf8").unwrap();
        handles.close(fd).unwrap();
        let Outcome::Done(fd) = open_create(&fs, "/data/test/t1.frm") else {
            panic!("create table failed");
        };
        handles.close(fd).unwrap();
    }

    let fs = SchemaFs::builder().build(SqliteStore::open(&db_path).unwrap());
    assert_eq!(fs.dir("/data/").unwrap(), vec!["test"]);
    assert_eq!(fs.dir("/data/test").unwrap(), vec!["t1.frm"]);
    assert_eq!(read_all(&fs, "/data/test/db.opt"), b"default-character-set=utf8");
}

//! Staging area for temporary table definition files.
//!
//! The engine writes a new table definition to `<table>.frm~` on a real
//! filesystem and then renames it over `<table>.frm`. The rename is where the
//! bytes move into the store; until then the staged file lives here.

use std::io;
use std::path::{Path, PathBuf};

/// Filesystem operations needed for staged files.
///
/// Paths are in normalized form (`./<db>/<table>.frm~`, or `./<db>` for
/// directories).
pub trait Staging: Send + Sync {
    /// Make sure a directory exists. An existing directory is not an error.
    fn create_dir(&self, path: &str) -> io::Result<()>;

    /// Read a whole staged file.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Remove a staged file.
    fn remove(&self, path: &str) -> io::Result<()>;
}

/// Staging on the host filesystem.
///
/// Normalized paths resolve under `root`. For example, with `root` at
/// `/var/lib/engine`, `./test/t1.frm~` is `/var/lib/engine/test/t1.frm~`.
#[derive(Debug, Clone)]
pub struct HostStaging {
    root: PathBuf,
}

impl HostStaging {
    /// Create a staging area rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a normalized path under the root.
    ///
    /// Only plain segments are accepted, so nothing escapes the root.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = path.strip_prefix("./").unwrap_or(path);
        let mut full = self.root.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("staging path escapes root: {path}"),
                ));
            }
            full.push(segment);
        }
        Ok(full)
    }
}

impl Staging for HostStaging {
    fn create_dir(&self, path: &str) -> io::Result<()> {
        let full = self.resolve(path)?;
        match std::fs::create_dir(&full) {
            Ok(()) => {
                tracing::debug!(dir = %full.display(), "created staging directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(self.resolve(path)?)
    }
}

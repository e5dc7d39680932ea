//! File attribute and directory entry types.

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes.
///
/// The store keeps no ownership or timestamps, so only size, type and fixed
/// permissions are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions.
    pub perm: u32,
    /// Number of hard links.
    pub nlink: u32,
}

impl FileAttr {
    pub const FILE_PERM: u32 = 0o644;
    pub const DIR_PERM: u32 = 0o755;

    /// Attributes for a stored file.
    pub fn file(size: u64) -> Self {
        Self {
            size,
            kind: FileType::File,
            perm: Self::FILE_PERM,
            nlink: 1,
        }
    }

    /// Attributes for the root or a database directory.
    pub fn directory() -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            perm: Self::DIR_PERM,
            nlink: 2, // . and ..
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

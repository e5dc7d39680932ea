//! Path normalization and classification.
//!
//! The database engine only ever touches a handful of shapes under its data
//! directory:
//!
//! ```text
//! /data/                  database root            -> "."
//! /data/<db>/             database directory       -> "./<db>/"
//! /data/<db>/db.opt       database option marker   -> "./<db>/db.opt"
//! /data/<db>/<t>.frm      table definition         -> "./<db>/<t>.frm"
//! /data/<db>/<t>.frm~     staged table definition  -> "./<db>/<t>.frm~"
//! ```
//!
//! Everything is reasoned about in the normalized `./` form. A path that
//! carries a recognized extension but breaks the one-level shape is a
//! contract violation, not a pass-through.

use crate::error::{FsError, FsResult};

/// Mount prefix the engine uses for its data directory.
pub const DEFAULT_MOUNT_PREFIX: &str = "/data/";

/// File name of the per-database option marker.
pub const OPTION_FILE_NAME: &str = "db.opt";

/// Extension of table definition files.
pub const TABLE_EXTENSION: &str = ".frm";

/// Extension of database option files.
pub const OPTION_EXTENSION: &str = ".opt";

/// Suffix of staged table definition files.
pub const STAGING_SUFFIX: &str = ".frm~";

/// Normalized form of the database root.
pub const ROOT: &str = ".";

/// The mount point the engine's paths are rooted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    mount_prefix: String,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT_PREFIX)
    }
}

impl Namespace {
    /// Create a namespace for the given mount prefix.
    ///
    /// The prefix is stored with exactly one trailing slash.
    pub fn new(mount_prefix: impl Into<String>) -> Self {
        let prefix = mount_prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            mount_prefix: format!("{}/", trimmed),
        }
    }

    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    /// Convert an external path into the relative `./` form.
    ///
    /// Paths outside the mount are returned unchanged. The bare mount root
    /// becomes `.`.
    pub fn normalize(&self, path: &str) -> String {
        let bare_root = self.mount_prefix.trim_end_matches('/');
        if path == self.mount_prefix || path == bare_root {
            return ROOT.to_string();
        }
        match path.strip_prefix(self.mount_prefix.as_str()) {
            Some(rest) => format!("./{}", rest),
            None => path.to_string(),
        }
    }

    /// Convert a normalized path back to its external form.
    pub fn to_external(&self, normalized: &str) -> String {
        if normalized == ROOT {
            return self.mount_prefix.clone();
        }
        match normalized.strip_prefix("./") {
            Some(rest) => format!("{}{}", self.mount_prefix, rest),
            None => normalized.to_string(),
        }
    }

    /// Normalize and classify in one step.
    pub fn classify(&self, path: &str) -> FsResult<ClassifiedPath> {
        classify(&self.normalize(path))
    }
}

/// What a normalized path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// The namespace root (`.`).
    DatabaseRoot,
    /// `./<db>` or `./<db>/`. Only used by access checks and listings.
    DatabaseDirectory,
    /// `./<db>/db.opt`.
    DatabaseOption,
    /// `./<db>/<table>.frm`.
    TableDefinition,
    /// `./<db>/<table>.frm~`, lives in staging rather than the store.
    TemporaryTableDefinition,
    /// Anything else. Never touches the store.
    Unrecognized,
}

impl FileClass {
    /// True for the classes stored in a partition.
    pub fn has_partition(self) -> bool {
        matches!(self, FileClass::DatabaseOption | FileClass::TableDefinition)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileClass::DatabaseRoot => "database_root",
            FileClass::DatabaseDirectory => "database_directory",
            FileClass::DatabaseOption => "database_option",
            FileClass::TableDefinition => "table_definition",
            FileClass::TemporaryTableDefinition => "temporary_table_definition",
            FileClass::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for FileClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized path together with its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPath {
    path: String,
    class: FileClass,
}

impl ClassifiedPath {
    /// The normalized path. Doubles as the store key.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn class(&self) -> FileClass {
        self.class
    }

    pub fn into_path(self) -> String {
        self.path
    }

    /// Database segment, for every class below the root.
    pub fn database(&self) -> Option<&str> {
        match self.class {
            FileClass::DatabaseRoot | FileClass::Unrecognized => None,
            _ => self
                .path
                .strip_prefix("./")
                .and_then(|rest| rest.split('/').next()),
        }
    }

    /// Final segment for file classes.
    pub fn file_name(&self) -> Option<&str> {
        match self.class {
            FileClass::DatabaseOption
            | FileClass::TableDefinition
            | FileClass::TemporaryTableDefinition => {
                self.path.rsplit_once('/').map(|(_, name)| name)
            }
            _ => None,
        }
    }

    /// Store key of the option marker governing this path's database.
    pub fn option_file_key(&self) -> Option<String> {
        self.database().map(option_file_key)
    }
}

/// Store key of the option marker for `db`.
pub fn option_file_key(db: &str) -> String {
    format!("./{}/{}", db, OPTION_FILE_NAME)
}

/// Store key of table `table` in `db`.
pub fn table_file_key(db: &str, table: &str) -> String {
    format!("./{}/{}{}", db, table, TABLE_EXTENSION)
}

/// Listing prefix of the tables in `db`.
pub fn table_prefix(db: &str) -> String {
    format!("./{}/", db)
}

/// True when the path ends with `.frm` or `.opt`.
pub fn has_recognized_extension(path: &str) -> bool {
    path.ends_with(TABLE_EXTENSION) || path.ends_with(OPTION_EXTENSION)
}

/// True for a non-empty segment with no `.` or `/`.
pub fn is_plain_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains(['.', '/'])
}

/// Split `./<dir>/<name>` into its two segments.
fn split_file(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix("./")?;
    let (dir, name) = rest.split_once('/')?;
    if !is_plain_segment(dir) || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((dir, name))
}

fn is_staging_shape(path: &str) -> bool {
    split_file(path)
        .and_then(|(_, name)| name.strip_suffix(STAGING_SUFFIX))
        .is_some_and(is_plain_segment)
}

fn known_file_class(path: &str) -> Option<FileClass> {
    let (_, name) = split_file(path)?;
    if name == OPTION_FILE_NAME {
        return Some(FileClass::DatabaseOption);
    }
    name.strip_suffix(TABLE_EXTENSION)
        .filter(|stem| is_plain_segment(stem))
        .map(|_| FileClass::TableDefinition)
}

fn is_directory_shape(path: &str) -> bool {
    path.strip_prefix("./")
        .map(|rest| rest.strip_suffix('/').unwrap_or(rest))
        .is_some_and(is_plain_segment)
}

/// Classify a normalized path.
///
/// Fails with `InvalidPath` when the path carries the staging suffix or a
/// recognized extension but not the one-level shape that goes with it.
/// Absolute paths are outside the namespace and always `Unrecognized`.
pub fn classify(path: &str) -> FsResult<ClassifiedPath> {
    let class = if path == ROOT {
        FileClass::DatabaseRoot
    } else if path.starts_with('/') {
        FileClass::Unrecognized
    } else if path.ends_with(STAGING_SUFFIX) {
        if !is_staging_shape(path) {
            return Err(FsError::invalid_path(path));
        }
        FileClass::TemporaryTableDefinition
    } else if has_recognized_extension(path) {
        known_file_class(path).ok_or_else(|| FsError::invalid_path(path))?
    } else if is_directory_shape(path) {
        FileClass::DatabaseDirectory
    } else {
        FileClass::Unrecognized
    };

    Ok(ClassifiedPath {
        path: path.to_string(),
        class,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(path: &str) -> FileClass {
        classify(path).unwrap().class()
    }

    #[test]
    fn test_normalize() {
        let ns = Namespace::default();
        assert_eq!(ns.normalize("/data/"), ".");
        assert_eq!(ns.normalize("/data"), ".");
        assert_eq!(ns.normalize("/data/test/db.opt"), "./test/db.opt");
        assert_eq!(ns.normalize("/data/test/"), "./test/");
        assert_eq!(ns.normalize("./test/t1.frm"), "./test/t1.frm");
        assert_eq!(ns.normalize("/tmp/x.frm"), "/tmp/x.frm");
        assert_eq!(ns.normalize("/database/x"), "/database/x");
    }

    #[test]
    fn test_custom_prefix() {
        let ns = Namespace::new("/srv/mysql");
        assert_eq!(ns.mount_prefix(), "/srv/mysql/");
        assert_eq!(ns.normalize("/srv/mysql/a/t.frm"), "./a/t.frm");
        assert_eq!(ns.to_external("./a/t.frm"), "/srv/mysql/a/t.frm");
        assert_eq!(ns.to_external("."), "/srv/mysql/");
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(class_of("."), FileClass::DatabaseRoot);
        assert_eq!(class_of("./test"), FileClass::DatabaseDirectory);
        assert_eq!(class_of("./test/"), FileClass::DatabaseDirectory);
        assert_eq!(class_of("./test/db.opt"), FileClass::DatabaseOption);
        assert_eq!(class_of("./test/t1.frm"), FileClass::TableDefinition);
        assert_eq!(class_of("./test/t1.frm~"), FileClass::TemporaryTableDefinition);
        assert_eq!(class_of("./test/t1.ibd"), FileClass::Unrecognized);
        assert_eq!(class_of("./a/b/c.txt"), FileClass::Unrecognized);
        assert_eq!(class_of("/etc/my.cnf"), FileClass::Unrecognized);
        assert_eq!(class_of("/usr/share/x.frm"), FileClass::Unrecognized);
    }

    #[test]
    fn test_classify_rejects_bad_shapes() {
        for bad in [
            "./a/b/t.frm",
            "./test/t.1.frm",
            "./test/.frm",
            "./test/other.opt",
            "test/t1.frm",
            "./.hidden/t1.frm",
            "./test/t1.x.frm~",
            "./a/b/t.frm~",
        ] {
            let err = classify(bad).unwrap_err();
            assert!(matches!(err, FsError::InvalidPath(_)), "{bad}");
        }
    }

    #[test]
    fn test_classified_parts() {
        let c = classify("./test/t1.frm").unwrap();
        assert_eq!(c.database(), Some("test"));
        assert_eq!(c.file_name(), Some("t1.frm"));
        assert_eq!(c.option_file_key().as_deref(), Some("./test/db.opt"));

        let d = classify("./test/").unwrap();
        assert_eq!(d.database(), Some("test"));
        assert_eq!(d.file_name(), None);

        assert_eq!(classify(".").unwrap().database(), None);
    }

    #[test]
    fn test_partition_bearing_classes() {
        assert!(FileClass::DatabaseOption.has_partition());
        assert!(FileClass::TableDefinition.has_partition());
        assert!(!FileClass::TemporaryTableDefinition.has_partition());
        assert!(!FileClass::DatabaseDirectory.has_partition());
        assert!(!FileClass::Unrecognized.has_partition());
    }
}

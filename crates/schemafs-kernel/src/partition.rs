//! Store partitions (column families).

use std::str::FromStr;

use crate::error::{FsError, FsResult};
use crate::path::{FileClass, OPTION_EXTENSION, TABLE_EXTENSION};

/// A named keyspace in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    /// Table definition file contents, keyed `./<db>/<table>.frm`.
    Frm,
    /// Database option marker contents, keyed `./<db>/db.opt`.
    Db,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Frm, Partition::Db];

    /// Partition name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Frm => "frm",
            Partition::Db => "db",
        }
    }

    /// Partition for a classified file.
    ///
    /// Only `DatabaseOption` and `TableDefinition` have one; asking for any
    /// other class is a caller bug.
    pub fn for_class(class: FileClass) -> FsResult<Self> {
        match class {
            FileClass::TableDefinition => Ok(Partition::Frm),
            FileClass::DatabaseOption => Ok(Partition::Db),
            other => Err(FsError::unexpected_class(other.as_str())),
        }
    }

    /// Partition implied by a path's extension alone.
    pub fn for_path(path: &str) -> FsResult<Self> {
        if path.ends_with(TABLE_EXTENSION) {
            Ok(Partition::Frm)
        } else if path.ends_with(OPTION_EXTENSION) {
            Ok(Partition::Db)
        } else {
            Err(FsError::unexpected_extension(path))
        }
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frm" => Ok(Partition::Frm),
            "db" => Ok(Partition::Db),
            other => Err(format!("unknown partition: {other}")),
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_class() {
        assert_eq!(Partition::for_class(FileClass::TableDefinition).unwrap(), Partition::Frm);
        assert_eq!(Partition::for_class(FileClass::DatabaseOption).unwrap(), Partition::Db);
        for class in [
            FileClass::DatabaseRoot,
            FileClass::DatabaseDirectory,
            FileClass::TemporaryTableDefinition,
            FileClass::Unrecognized,
        ] {
            assert!(matches!(
                Partition::for_class(class),
                Err(FsError::UnexpectedClass(_))
            ));
        }
    }

    #[test]
    fn test_for_path() {
        assert_eq!(Partition::for_path("./a/t.frm").unwrap(), Partition::Frm);
        assert_eq!(Partition::for_path("./a/db.opt").unwrap(), Partition::Db);
        assert!(matches!(
            Partition::for_path("./a/t.frm~"),
            Err(FsError::UnexpectedExtension(_))
        ));
    }

    #[test]
    fn test_names_round_trip() {
        for p in Partition::ALL {
            assert_eq!(p.as_str().parse::<Partition>().unwrap(), p);
        }
        assert!("ibd".parse::<Partition>().is_err());
    }
}

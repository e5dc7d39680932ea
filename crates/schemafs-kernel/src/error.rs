//! Error types for the translation layer.
//!
//! Two kinds of failure flow out of this crate. Contract violations
//! (`InvalidPath`, `UnexpectedExtension`, `UnexpectedClass`, `BadArgument`)
//! mean the caller handed over something outside the narrow path convention
//! and must be treated as hard failures. Everything else maps onto an errno
//! the host can report through its normal error channel.

use std::io;
use thiserror::Error;

use crate::store::StoreError;

/// Translation layer error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path looks like a managed file but breaks the one-level shape.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Path reached a partition-bearing operation without `.frm`/`.opt`.
    #[error("unexpected extension: {0}")]
    UnexpectedExtension(String),

    /// A file class without a partition was asked for one.
    #[error("file class has no partition: {0}")]
    UnexpectedClass(String),

    /// No stored entry for the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// `offset + len` does not fit the addressable size.
    #[error("write at offset {offset} with length {len} overflows")]
    Overflow { offset: u64, len: usize },

    /// Descriptor table is full.
    #[error("no free descriptors")]
    HandlesExhausted,

    /// Descriptor is not bound to a stored file.
    #[error("bad descriptor: {0}")]
    BadHandle(i32),

    /// Syscall arguments did not have the expected kinds.
    #[error("bad syscall argument: {0}")]
    BadArgument(String),

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Staging I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an UnexpectedExtension error.
    pub fn unexpected_extension(path: impl Into<String>) -> Self {
        Self::UnexpectedExtension(path.into())
    }

    /// Create an UnexpectedClass error.
    pub fn unexpected_class(class: impl Into<String>) -> Self {
        Self::UnexpectedClass(class.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a BadArgument error.
    pub fn bad_argument(msg: impl Into<String>) -> Self {
        Self::BadArgument(msg.into())
    }

    /// True when the caller broke the path contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            FsError::InvalidPath(_)
                | FsError::UnexpectedExtension(_)
                | FsError::UnexpectedClass(_)
                | FsError::BadArgument(_)
        )
    }

    /// POSIX errno reported to the host for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::InvalidPath(_)
            | FsError::UnexpectedExtension(_)
            | FsError::UnexpectedClass(_)
            | FsError::BadArgument(_) => libc::EINVAL,
            FsError::NotFound(_) => libc::ENOENT,
            FsError::Overflow { .. } => libc::EOVERFLOW,
            FsError::HandlesExhausted => libc::EMFILE,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::Store(_) => libc::EIO,
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::InvalidPath(msg)
            | FsError::UnexpectedExtension(msg)
            | FsError::UnexpectedClass(msg)
            | FsError::BadArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::Io(e) => e,
            other => io::Error::from_raw_os_error(other.errno()),
        }
    }
}

/// Result type for translation layer operations.
pub type FsResult<T> = Result<T, FsError>;

/// Emulated errno reported through the normal syscall failure channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    /// ENOENT.
    NoEnt,
    /// EMFILE.
    MFile,
}

impl Errno {
    /// Raw errno value.
    pub fn raw(self) -> i32 {
        match self {
            Errno::NoEnt => libc::ENOENT,
            Errno::MFile => libc::EMFILE,
        }
    }
}

/// Result of an emulated syscall that was not a contract violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The store handled the call.
    Done(T),
    /// The store handled the call and it failed with an expected errno.
    Failed(Errno),
    /// Not ours: the real filesystem should handle it.
    NotHandled,
}

impl<T> Outcome<T> {
    pub fn is_handled(&self) -> bool {
        !matches!(self, Outcome::NotHandled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(v) => Outcome::Done(f(v)),
            Outcome::Failed(e) => Outcome::Failed(e),
            Outcome::NotHandled => Outcome::NotHandled,
        }
    }
}

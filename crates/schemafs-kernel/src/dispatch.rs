//! Syscall dispatch boundary.
//!
//! The host forwards an operation number plus up to two arguments. Those are
//! decoded into a typed [`Request`] before anything reaches the emulation;
//! numbers outside the recognized set are declined so the host falls back to
//! the real filesystem.

use libc::c_long;

use crate::error::{FsError, FsResult, Outcome};
use crate::handler::{SchemaFs, StatBuf};
use crate::handles::Fd;

/// A syscall argument as handed over by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallArg<'a> {
    /// Argument slot not used.
    None,
    /// A path string.
    Path(&'a str),
    /// An integer (flags, mode).
    Int(i64),
}

/// Operations the emulation answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Open,
    Stat,
    Access,
    Rename,
    Unlink,
}

impl Syscall {
    /// Map a raw syscall number, `None` for anything not emulated.
    pub fn from_number(number: c_long) -> Option<Self> {
        match number {
            libc::SYS_open => Some(Syscall::Open),
            libc::SYS_stat => Some(Syscall::Stat),
            libc::SYS_access => Some(Syscall::Access),
            libc::SYS_rename => Some(Syscall::Rename),
            libc::SYS_unlink => Some(Syscall::Unlink),
            _ => None,
        }
    }
}

/// A decoded, typed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Open { path: String, create: bool },
    Stat { path: String },
    Access { path: String },
    Rename { from: String, to: String },
    Unlink { path: String },
}

fn expect_path(arg: SyscallArg<'_>, what: &str) -> FsResult<String> {
    match arg {
        SyscallArg::Path(p) if !p.is_empty() => Ok(p.to_string()),
        other => Err(FsError::bad_argument(format!("{what}: expected path, got {other:?}"))),
    }
}

impl Request {
    /// Decode a syscall into a request.
    ///
    /// Returns `Ok(None)` for syscalls that are not emulated.
    pub fn decode(number: c_long, x1: SyscallArg<'_>, x2: SyscallArg<'_>) -> FsResult<Option<Self>> {
        let Some(syscall) = Syscall::from_number(number) else {
            return Ok(None);
        };

        let request = match syscall {
            Syscall::Open => {
                let path = expect_path(x1, "open")?;
                let flags = match x2 {
                    SyscallArg::Int(flags) => flags,
                    other => {
                        return Err(FsError::bad_argument(format!(
                            "open: expected flags, got {other:?}"
                        )));
                    }
                };
                Request::Open {
                    path,
                    create: flags & i64::from(libc::O_CREAT) != 0,
                }
            }
            Syscall::Stat => Request::Stat {
                path: expect_path(x1, "stat")?,
            },
            Syscall::Access => Request::Access {
                path: expect_path(x1, "access")?,
            },
            Syscall::Rename => Request::Rename {
                from: expect_path(x1, "rename")?,
                to: expect_path(x2, "rename")?,
            },
            Syscall::Unlink => Request::Unlink {
                path: expect_path(x1, "unlink")?,
            },
        };
        Ok(Some(request))
    }
}

/// Successful reply to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A descriptor from `open`.
    Fd(Fd),
    /// Metadata from `stat`.
    Stat(StatBuf),
    /// Plain success.
    Ok,
}

impl Outcome<Reply> {
    /// Host-visible `(return value, errno)` pair, `None` when not handled.
    pub fn return_code(&self) -> Option<(i64, Option<i32>)> {
        match self {
            Outcome::Done(Reply::Fd(fd)) => Some((i64::from(*fd), None)),
            Outcome::Done(_) => Some((0, None)),
            Outcome::Failed(errno) => Some((-1, Some(errno.raw()))),
            Outcome::NotHandled => None,
        }
    }
}

impl SchemaFs {
    /// Dispatch entry point for the host.
    pub fn syscall(
        &self,
        number: c_long,
        x1: SyscallArg<'_>,
        x2: SyscallArg<'_>,
    ) -> FsResult<Outcome<Reply>> {
        match Request::decode(number, x1, x2)? {
            Some(request) => self.handle(request),
            None => Ok(Outcome::NotHandled),
        }
    }

    /// Run a decoded request.
    pub fn handle(&self, request: Request) -> FsResult<Outcome<Reply>> {
        tracing::debug!(?request, "dispatch");
        match request {
            Request::Open { path, create } => Ok(self.open(&path, create)?.map(Reply::Fd)),
            Request::Stat { path } => Ok(self.stat(&path)?.map(Reply::Stat)),
            Request::Access { path } => Ok(self.access(&path)?.map(|()| Reply::Ok)),
            Request::Rename { from, to } => Ok(self.rename(&from, &to)?.map(|()| Reply::Ok)),
            Request::Unlink { path } => Ok(self.unlink(&path)?.map(|()| Reply::Ok)),
        }
    }
}

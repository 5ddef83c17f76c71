//! Kernel status taxonomy and its mapping onto POSIX errno.
//!
//! This mirrors the role the teacher crate gives `axerrno::LinuxError`: a
//! single enum that every fallible operation in the core returns, converted
//! to a signed POSIX return value only at the `fdio-api` boundary.

use std::cell::Cell;

use thiserror::Error;

/// A kernel-level status code, as would be returned by the out-of-scope
/// kernel object syscalls this crate only consumes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[error("not found")]
    NotFound,
    #[error("no memory")]
    NoMemory,
    #[error("invalid arguments")]
    InvalidArgs,
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("timed out")]
    TimedOut,
    #[error("already exists")]
    AlreadyExists,
    #[error("remote end closed")]
    PeerClosed,
    #[error("bad path")]
    BadPath,
    #[error("I/O error")]
    Io,
    #[error("not a directory")]
    NotADirectory,
    #[error("not supported")]
    NotSupported,
    #[error("out of range")]
    OutOfRange,
    #[error("no resources")]
    NoResources,
    #[error("bad handle")]
    BadHandle,
    #[error("access denied")]
    AccessDenied,
    #[error("should wait")]
    ShouldWait,
    #[error("file too big")]
    FileTooBig,
    #[error("no space")]
    NoSpace,
    #[error("unavailable")]
    Unavailable,
}

/// Crate-wide result alias used throughout `fdio-core` and by transports.
pub type IoResult<T> = Result<T, Status>;

impl Status {
    /// Translate a kernel status to a POSIX errno value.
    ///
    /// The "slot is shared or in flight" case `unbind` reports uses
    /// [`Status::EUNAVAILABLE_ERRNO`] directly rather than going through
    /// this table, since it has no kernel-status counterpart.
    pub fn to_errno(self) -> i32 {
        match self {
            Status::NotFound => libc::ENOENT,
            Status::NoMemory => libc::ENOMEM,
            Status::InvalidArgs => libc::EINVAL,
            Status::BufferTooSmall => libc::ENOBUFS,
            Status::TimedOut => libc::ETIMEDOUT,
            Status::AlreadyExists => libc::EEXIST,
            Status::PeerClosed => libc::EPIPE,
            Status::BadPath => libc::ENOENT,
            Status::Io => libc::EIO,
            Status::NotADirectory => libc::ENOTDIR,
            Status::NotSupported => libc::ENOTSUP,
            Status::OutOfRange => libc::ERANGE,
            Status::NoResources => libc::EMFILE,
            Status::BadHandle => libc::EBADF,
            Status::AccessDenied => libc::EACCES,
            Status::ShouldWait => libc::EAGAIN,
            Status::FileTooBig => libc::EFBIG,
            Status::NoSpace => libc::ENOSPC,
            Status::Unavailable => libc::EBUSY,
        }
    }
}

thread_local! {
    static LAST_ERRNO: Cell<i32> = const { Cell::new(0) };
}

/// Set the calling thread's last error, mirroring POSIX `errno`.
pub fn set_errno(value: i32) {
    LAST_ERRNO.with(|cell| cell.set(value));
}

/// Read the calling thread's last error.
pub fn errno() -> i32 {
    LAST_ERRNO.with(|cell| cell.get())
}

/// Lower an [`IoResult`] to the POSIX convention: the value on success, or
/// `-1` with `errno` set on failure. `ShouldWait` must already have been
/// resolved by the caller (blocking retry, or surfaced as `EAGAIN`) before
/// reaching this point; see `fdio-api`'s blocking-emulation loop.
pub fn posix_result(ret: IoResult<isize>) -> isize {
    match ret {
        Ok(v) => v,
        Err(status) => {
            set_errno(status.to_errno());
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_roundtrips_per_thread() {
        set_errno(libc::EAGAIN);
        assert_eq!(errno(), libc::EAGAIN);
    }

    #[test]
    fn posix_result_sets_errno_on_error() {
        set_errno(0);
        assert_eq!(posix_result(Err(Status::BadHandle)), -1);
        assert_eq!(errno(), libc::EBADF);
    }
}

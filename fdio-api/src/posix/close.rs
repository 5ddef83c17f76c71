//! `close(2)`.

use fdio_core::status::{posix_result, set_errno, Status};

use crate::PROCESS;

/// `close(2)`. `release`'s generic `InvalidArgs` (bad or already-closed
/// fd) is remapped to `EBADF` here rather than going through
/// [`Status::to_errno`]'s generic table, since that table's `EINVAL`
/// mapping for `InvalidArgs` is wrong for this specific call: POSIX
/// requires a second `close` on the same fd to report `EBADF`, not
/// `EINVAL`.
pub fn sys_close(fd: i32) -> isize {
    log::trace!("sys_close <= fd: {fd}");
    match PROCESS.fdtab.release(fd as i64) {
        Ok(deferred) => {
            drop(deferred);
            0
        }
        Err(Status::InvalidArgs) => {
            set_errno(libc::EBADF);
            -1
        }
        Err(status) => posix_result(Err(status)),
    }
}

//! `dup`/`dup2`/`dup3`.

use fdio_core::status::{posix_result, set_errno};

use crate::PROCESS;

/// `dup(2)`.
pub fn sys_dup(oldfd: i32) -> isize {
    log::trace!("sys_dup <= oldfd: {oldfd}");
    match PROCESS.fdtab.dup(oldfd as i64, None, 0) {
        Ok((fd, deferred)) => {
            drop(deferred);
            fd as isize
        }
        Err(status) => posix_result(Err(status)),
    }
}

/// `dup2(2)`. `dup2(a, a)` is a no-op that returns `a` if `a` is a valid
/// fd, per invariant #4.
pub fn sys_dup2(oldfd: i32, newfd: i32) -> isize {
    log::trace!("sys_dup2 <= oldfd: {oldfd}, newfd: {newfd}");
    if oldfd == newfd {
        return if PROCESS.fdtab.lookup(oldfd as i64).is_ok() {
            newfd as isize
        } else {
            set_errno(libc::EBADF);
            -1
        };
    }
    match PROCESS.fdtab.dup(oldfd as i64, Some(newfd as i64), 0) {
        Ok((fd, deferred)) => {
            drop(deferred);
            fd as isize
        }
        Err(status) => posix_result(Err(status)),
    }
}

/// `dup3(2)`. Same-fd always fails `EINVAL` (unlike `dup2`); `flags` must
/// be `0` or `O_CLOEXEC`.
pub fn sys_dup3(oldfd: i32, newfd: i32, flags: i32) -> isize {
    log::trace!("sys_dup3 <= oldfd: {oldfd}, newfd: {newfd}, flags: {flags:#o}");
    if oldfd == newfd || flags & !libc::O_CLOEXEC != 0 {
        set_errno(libc::EINVAL);
        return -1;
    }
    match PROCESS.fdtab.dup(oldfd as i64, Some(newfd as i64), 0) {
        Ok((fd, deferred)) => {
            if let Ok(entry) = PROCESS.fdtab.lookup(fd as i64) {
                entry.set_cloexec(flags & libc::O_CLOEXEC != 0);
            }
            drop(deferred);
            fd as isize
        }
        Err(status) => posix_result(Err(status)),
    }
}

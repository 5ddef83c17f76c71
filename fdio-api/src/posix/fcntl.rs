//! `fcntl(2)`, restricted to the option set named in §6: `F_DUPFD`,
//! `F_DUPFD_CLOEXEC`, `F_GETFD`, `F_SETFD`, `F_GETFL`, `F_SETFL`
//! (`O_NONBLOCK` only). `F_GETOWN`/`F_SETOWN`/advisory locks are
//! `ENOSYS`, matching the declared non-goal.

use fdio_core::{
    status::{posix_result, set_errno, IoResult, Status},
    transport::TransportFlags,
};

use crate::PROCESS;

fn dup_fd(fd: i32, starting_fd: usize, cloexec: bool) -> IoResult<isize> {
    let (newfd, deferred) = PROCESS.fdtab.dup(fd as i64, None, starting_fd)?;
    drop(deferred);
    if cloexec {
        PROCESS.fdtab.lookup(newfd as i64)?.set_cloexec(true);
    }
    Ok(newfd as isize)
}

/// `fcntl(2)`.
pub fn sys_fcntl(fd: i32, cmd: i32, arg: usize) -> isize {
    log::trace!("sys_fcntl <= fd: {fd}, cmd: {cmd}, arg: {arg}");

    match cmd {
        libc::F_DUPFD => posix_result(dup_fd(fd, arg, false)),
        libc::F_DUPFD_CLOEXEC => posix_result(dup_fd(fd, arg, true)),
        libc::F_GETFD => match PROCESS.fdtab.lookup(fd as i64) {
            Ok(entry) => {
                if entry.flags().contains(TransportFlags::CLOEXEC) {
                    libc::FD_CLOEXEC as isize
                } else {
                    0
                }
            }
            Err(status) => posix_result(Err(status)),
        },
        libc::F_SETFD => match PROCESS.fdtab.lookup(fd as i64) {
            Ok(entry) => {
                entry.set_cloexec(arg as i32 & libc::FD_CLOEXEC != 0);
                0
            }
            Err(status) => posix_result(Err(status)),
        },
        libc::F_GETFL => match PROCESS.fdtab.lookup(fd as i64) {
            Ok(entry) => {
                if entry.nonblocking() {
                    libc::O_NONBLOCK as isize
                } else {
                    0
                }
            }
            Err(status) => posix_result(Err(status)),
        },
        libc::F_SETFL => match PROCESS.fdtab.lookup(fd as i64) {
            Ok(entry) => {
                entry.set_nonblocking(arg as i32 & libc::O_NONBLOCK != 0);
                0
            }
            Err(status) => posix_result(Err(status)),
        },
        libc::F_GETOWN | libc::F_SETOWN => {
            set_errno(libc::ENOSYS);
            -1
        }
        _ => posix_result(Err(Status::NotSupported)),
    }
}

//! `fsync`/`fdatasync`, `faccessat`, `getcwd`/`chdir`, `isatty`, `umask`,
//! `ioctl`, `pipe`/`pipe2`.

use std::sync::atomic::{AtomicU32, Ordering};

use fdio_core::{
    path::resolve,
    status::{posix_result, set_errno, IoResult, Status},
    transport::{MiscRequest, OpenFlags, TransportEntry, TransportFlags},
};

use crate::{transports::PipeTransport, PROCESS};

const AT_EACCESS: i32 = 0x200;

/// `fsync(2)`/`fdatasync(2)`, distinguished by `data_only`.
fn do_fsync(fd: i32, data_only: bool) -> IoResult<isize> {
    let entry = PROCESS.fdtab.lookup(fd as i64)?;
    entry.transport.misc(MiscRequest::Sync { data_only })?;
    Ok(0)
}

/// `fsync(2)`.
pub fn sys_fsync(fd: i32) -> isize {
    log::trace!("sys_fsync <= fd: {fd}");
    posix_result(do_fsync(fd, false))
}

/// `fdatasync(2)`.
pub fn sys_fdatasync(fd: i32) -> isize {
    log::trace!("sys_fdatasync <= fd: {fd}");
    posix_result(do_fsync(fd, true))
}

fn do_faccessat(dirfd: i32, path: &str, mode: i32, flags: i32) -> IoResult<isize> {
    if flags & !AT_EACCESS != 0 {
        return Err(Status::InvalidArgs);
    }
    if mode != libc::F_OK && mode & !(libc::R_OK | libc::W_OK | libc::X_OK) != 0 {
        return Err(Status::InvalidArgs);
    }
    let (base, residual) = resolve(&PROCESS.fdtab, &PROCESS.cwd, &PROCESS.root(), dirfd as i64, path)?;
    // Existence is the only proxy for F_OK/R_OK/W_OK/X_OK this layer has;
    // permission bits are a declared non-goal.
    base.transport.open(&residual, OpenFlags::empty(), 0)?;
    Ok(0)
}

/// `faccessat(2)`.
pub fn sys_faccessat(dirfd: i32, path: &str, mode: i32, flags: i32) -> isize {
    log::trace!("sys_faccessat <= dirfd: {dirfd}, path: {path:?}, mode: {mode:#o}");
    posix_result(do_faccessat(dirfd, path, mode, flags))
}

/// `access(2)`: `faccessat` relative to `AT_FDCWD` with no flags.
pub fn sys_access(path: &str, mode: i32) -> isize {
    sys_faccessat(libc::AT_FDCWD, path, mode, 0)
}

/// `getcwd(3)`: copies the normalized textual path (no trailing NUL) into
/// `buf`, returning the number of bytes written or `-1`/`ERANGE` if it
/// doesn't fit.
pub fn sys_getcwd(buf: &mut [u8]) -> isize {
    let path = PROCESS.cwd.path();
    let bytes = path.as_bytes();
    if bytes.len() >= buf.len() {
        set_errno(libc::ERANGE);
        return -1;
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    buf[bytes.len()] = 0;
    bytes.len() as isize
}

fn do_chdir(path: &str) -> IoResult<isize> {
    let (base, residual) = resolve(
        &PROCESS.fdtab,
        &PROCESS.cwd,
        &PROCESS.root(),
        libc::AT_FDCWD as i64,
        path,
    )?;
    let transport = base.transport.open(&residual, OpenFlags::DIRECTORY, 0)?;
    let entry = TransportEntry::new(transport, TransportFlags::empty());
    PROCESS.cwd.set(path, entry);
    Ok(0)
}

/// `chdir(2)`.
pub fn sys_chdir(path: &str) -> isize {
    log::trace!("sys_chdir <= path: {path:?}");
    posix_result(do_chdir(path))
}

/// `isatty(3)`: queries the transport's `posix_ioctl(TCGETS)`, mirroring
/// glibc's own implementation of the call.
pub fn sys_isatty(fd: i32) -> isize {
    log::trace!("sys_isatty <= fd: {fd}");
    match PROCESS.fdtab.lookup(fd as i64) {
        Ok(entry) => match entry.transport.posix_ioctl(libc::TCGETS as u64, 0) {
            Ok(_) => 1,
            Err(_) => {
                set_errno(libc::ENOTTY);
                0
            }
        },
        Err(status) => {
            set_errno(status.to_errno());
            0
        }
    }
}

static UMASK: AtomicU32 = AtomicU32::new(0o022);

/// `umask(2)`: process-wide, not per-fd, matching POSIX semantics.
pub fn sys_umask(mask: u32) -> u32 {
    log::trace!("sys_umask <= mask: {mask:#o}");
    UMASK.swap(mask & 0o777, Ordering::AcqRel)
}

/// `ioctl(2)`.
pub fn sys_ioctl(fd: i32, request: u64, arg: usize) -> isize {
    log::trace!("sys_ioctl <= fd: {fd}, request: {request:#x}, arg: {arg}");
    let result = PROCESS
        .fdtab
        .lookup(fd as i64)
        .and_then(|entry| entry.transport.posix_ioctl(request, arg))
        .map(|v| v as isize);
    posix_result(result)
}

fn do_pipe2(flags: i32) -> IoResult<(isize, isize)> {
    if flags & !(libc::O_NONBLOCK | libc::O_CLOEXEC) != 0 {
        return Err(Status::InvalidArgs);
    }
    let (read_end, write_end) = PipeTransport::new(PROCESS.kernel.clone());

    let mut entry_flags = TransportFlags::empty();
    if flags & libc::O_NONBLOCK != 0 {
        entry_flags |= TransportFlags::NONBLOCK;
    }
    if flags & libc::O_CLOEXEC != 0 {
        entry_flags |= TransportFlags::CLOEXEC;
    }

    let read_entry = TransportEntry::new(std::sync::Arc::new(read_end), entry_flags);
    let write_entry = TransportEntry::new(std::sync::Arc::new(write_end), entry_flags);

    let (read_fd, deferred) = PROCESS.fdtab.bind(read_entry, -1, 0)?;
    drop(deferred);
    let (write_fd, deferred) = PROCESS.fdtab.bind(write_entry, -1, 0)?;
    drop(deferred);

    Ok((read_fd as isize, write_fd as isize))
}

/// `pipe2(2)`. `fds[0]` is the read end, `fds[1]` the write end. Any flag
/// outside `O_NONBLOCK|O_CLOEXEC` is rejected `EINVAL`.
pub fn sys_pipe2(fds: &mut [i32; 2], flags: i32) -> isize {
    log::trace!("sys_pipe2 <= flags: {flags:#o}");
    match do_pipe2(flags) {
        Ok((r, w)) => {
            fds[0] = r as i32;
            fds[1] = w as i32;
            0
        }
        Err(status) => posix_result(Err(status)),
    }
}

/// `pipe(2)`: `pipe2` with no flags.
pub fn sys_pipe(fds: &mut [i32; 2]) -> isize {
    sys_pipe2(fds, 0)
}

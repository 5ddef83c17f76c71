//! `stat`/`fstat`/`fstatat`, `truncate`/`ftruncate`,
//! `utimens`/`utimensat`/`futimens`.
//!
//! Per the declared non-goal, `atime` is accepted by the `utimens` family
//! and threaded through to [`fdio_core::metadata::AttrUpdate`], but no
//! reference transport ever applies it.

use std::time::SystemTime;

use fdio_core::{
    metadata::{AttrUpdate, Metadata},
    path::resolve,
    status::{posix_result, IoResult, Status},
    transport::{MiscRequest, MiscResponse, OpenFlags, Transport},
};

use crate::PROCESS;

const AT_EMPTY_PATH: i32 = 0x1000;

fn stat_transport(transport: &dyn Transport) -> IoResult<Metadata> {
    match transport.misc(MiscRequest::Stat)? {
        MiscResponse::Stat(meta) => Ok(meta),
        _ => Err(Status::Io),
    }
}

fn do_fstatat(dirfd: i32, path: &str, flags: i32) -> IoResult<Metadata> {
    if path.is_empty() && flags & AT_EMPTY_PATH != 0 {
        let entry = PROCESS.fdtab.lookup(dirfd as i64)?;
        return stat_transport(entry.transport.as_ref());
    }
    let (base, residual) = resolve(&PROCESS.fdtab, &PROCESS.cwd, &PROCESS.root(), dirfd as i64, path)?;
    let transport = base.transport.open(&residual, OpenFlags::empty(), 0)?;
    stat_transport(transport.as_ref())
}

/// `fstatat(2)`. `statbuf` is filled in place; returns `0` on success.
pub fn sys_fstatat(dirfd: i32, path: &str, statbuf: &mut Metadata, flags: i32) -> isize {
    log::trace!("sys_fstatat <= dirfd: {dirfd}, path: {path:?}, flags: {flags:#x}");
    match do_fstatat(dirfd, path, flags) {
        Ok(meta) => {
            *statbuf = meta;
            0
        }
        Err(status) => posix_result(Err(status)),
    }
}

/// `stat(2)`.
pub fn sys_stat(path: &str, statbuf: &mut Metadata) -> isize {
    sys_fstatat(libc::AT_FDCWD, path, statbuf, 0)
}

/// `fstat(2)`.
pub fn sys_fstat(fd: i32, statbuf: &mut Metadata) -> isize {
    sys_fstatat(fd, "", statbuf, AT_EMPTY_PATH)
}

fn do_truncate(path: &str, len: i64) -> IoResult<isize> {
    if len < 0 {
        return Err(Status::InvalidArgs);
    }
    let (base, residual) = resolve(&PROCESS.fdtab, &PROCESS.cwd, &PROCESS.root(), libc::AT_FDCWD as i64, path)?;
    let transport = base.transport.open(&residual, OpenFlags::WRONLY, 0)?;
    transport.misc(MiscRequest::Truncate { len: len as u64 })?;
    Ok(0)
}

/// `truncate(2)`.
pub fn sys_truncate(path: &str, len: i64) -> isize {
    log::trace!("sys_truncate <= path: {path:?}, len: {len}");
    posix_result(do_truncate(path, len))
}

/// `ftruncate(2)`.
pub fn sys_ftruncate(fd: i32, len: i64) -> isize {
    log::trace!("sys_ftruncate <= fd: {fd}, len: {len}");
    if len < 0 {
        return posix_result(Err(Status::InvalidArgs));
    }
    let result = PROCESS.fdtab.lookup(fd as i64).and_then(|entry| {
        entry
            .transport
            .misc(MiscRequest::Truncate { len: len as u64 })
            .map(|_| 0)
    });
    posix_result(result)
}

/// `utimensat(2)`. `AT_SYMLINK_NOFOLLOW` is rejected `EINVAL`, per §6.
pub fn sys_utimensat(
    dirfd: i32,
    path: &str,
    atime: Option<SystemTime>,
    mtime: Option<SystemTime>,
    flags: i32,
) -> isize {
    log::trace!("sys_utimensat <= dirfd: {dirfd}, path: {path:?}, flags: {flags:#x}");
    if flags & libc::AT_SYMLINK_NOFOLLOW != 0 {
        return posix_result(Err(Status::InvalidArgs));
    }
    let result = resolve(&PROCESS.fdtab, &PROCESS.cwd, &PROCESS.root(), dirfd as i64, path)
        .and_then(|(base, residual)| base.transport.open(&residual, OpenFlags::empty(), 0))
        .and_then(|transport| {
            transport
                .misc(MiscRequest::SetAttr(AttrUpdate {
                    mode: None,
                    atime,
                    mtime,
                }))
                .map(|_| 0)
        });
    posix_result(result)
}

/// `utimensat` relative to `AT_FDCWD`.
pub fn sys_utimens(path: &str, atime: Option<SystemTime>, mtime: Option<SystemTime>) -> isize {
    sys_utimensat(libc::AT_FDCWD, path, atime, mtime, 0)
}

/// `futimens(2)`.
pub fn sys_futimens(fd: i32, atime: Option<SystemTime>, mtime: Option<SystemTime>) -> isize {
    log::trace!("sys_futimens <= fd: {fd}");
    let result = PROCESS.fdtab.lookup(fd as i64).and_then(|entry| {
        entry
            .transport
            .misc(MiscRequest::SetAttr(AttrUpdate {
                mode: None,
                atime,
                mtime,
            }))
            .map(|_| 0)
    });
    posix_result(result)
}

//! `open`/`openat`/`creat`.

use fdio_core::{
    path::resolve,
    status::{posix_result, IoResult, Status},
    transport::{OpenFlags, TransportEntry, TransportFlags},
};

use crate::PROCESS;

fn libc_flags_to_open_flags(flags: i32) -> OpenFlags {
    let mut out = OpenFlags::empty();
    match flags & libc::O_ACCMODE {
        libc::O_WRONLY => out |= OpenFlags::WRONLY,
        libc::O_RDWR => out |= OpenFlags::RDWR,
        _ => {}
    }
    if flags & libc::O_CREAT != 0 {
        out |= OpenFlags::CREAT;
    }
    if flags & libc::O_EXCL != 0 {
        out |= OpenFlags::EXCL;
    }
    if flags & libc::O_DIRECTORY != 0 {
        out |= OpenFlags::DIRECTORY;
    }
    if flags & libc::O_NONBLOCK != 0 {
        out |= OpenFlags::NONBLOCK;
    }
    if flags & libc::O_APPEND != 0 {
        out |= OpenFlags::APPEND;
    }
    if flags & libc::O_TRUNC != 0 {
        out |= OpenFlags::TRUNC;
    }
    if flags & libc::O_NOFOLLOW != 0 {
        out |= OpenFlags::NOFOLLOW;
    }
    out
}

fn do_openat(dirfd: i32, path: &str, flags: i32, mode: u32) -> IoResult<isize> {
    log::trace!("sys_openat <= dirfd: {dirfd}, path: {path:?}, flags: {flags:#o}, mode: {mode:#o}");

    let open_flags = libc_flags_to_open_flags(flags);
    if open_flags.contains(OpenFlags::CREAT | OpenFlags::DIRECTORY) {
        return Err(Status::InvalidArgs);
    }
    let (base, residual) = resolve(
        &PROCESS.fdtab,
        &PROCESS.cwd,
        &PROCESS.root(),
        dirfd as i64,
        path,
    )?;

    let transport = base.transport.open(&residual, open_flags, mode)?;

    if open_flags.contains(OpenFlags::TRUNC) && !open_flags.contains(OpenFlags::DIRECTORY) {
        transport.misc(fdio_core::transport::MiscRequest::Truncate { len: 0 })?;
    }

    let mut entry_flags = TransportFlags::empty();
    if open_flags.contains(OpenFlags::NONBLOCK) {
        entry_flags |= TransportFlags::NONBLOCK;
    }

    let entry = TransportEntry::new(transport, entry_flags);
    let (fd, deferred) = PROCESS.fdtab.bind(entry, -1, 0)?;
    drop(deferred);
    Ok(fd as isize)
}

/// `openat(2)`.
pub fn sys_openat(dirfd: i32, path: &str, flags: i32, mode: u32) -> isize {
    posix_result(do_openat(dirfd, path, flags, mode))
}

/// `open(2)`: `openat` relative to `AT_FDCWD`.
pub fn sys_open(path: &str, flags: i32, mode: u32) -> isize {
    sys_openat(libc::AT_FDCWD, path, flags, mode)
}

/// `creat(2)`: `open` with `O_CREAT|O_WRONLY|O_TRUNC`.
pub fn sys_creat(path: &str, mode: u32) -> isize {
    sys_open(path, libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC, mode)
}

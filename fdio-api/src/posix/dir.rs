//! `mkdir`/`mkdirat`, `unlink`/`unlinkat`, `link`, `rename`, and directory
//! iteration (`opendir`/`readdir`/`closedir`/`rewinddir`/`dirfd`/
//! `fdopendir`).

use std::sync::Arc;

use parking_lot::Mutex;

use fdio_core::{
    path::{resolve, resolve_container},
    status::{posix_result, IoResult, Status},
    transport::{MiscRequest, OpenFlags, TransportEntry, TransportFlags},
};

use crate::PROCESS;

fn do_mkdirat(dirfd: i32, path: &str, mode: u32) -> IoResult<isize> {
    let (base, residual) = resolve(&PROCESS.fdtab, &PROCESS.cwd, &PROCESS.root(), dirfd as i64, path)?;
    base.transport
        .open(&residual, OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::DIRECTORY, mode)?;
    Ok(0)
}

/// `mkdirat(2)`.
pub fn sys_mkdirat(dirfd: i32, path: &str, mode: u32) -> isize {
    log::trace!("sys_mkdirat <= dirfd: {dirfd}, path: {path:?}, mode: {mode:#o}");
    posix_result(do_mkdirat(dirfd, path, mode))
}

/// `mkdir(2)`: `mkdirat` relative to `AT_FDCWD`.
pub fn sys_mkdir(path: &str, mode: u32) -> isize {
    sys_mkdirat(libc::AT_FDCWD, path, mode)
}

fn do_unlinkat(dirfd: i32, path: &str) -> IoResult<isize> {
    let (parent, leaf) = resolve_container(&PROCESS.fdtab, &PROCESS.cwd, &PROCESS.root(), dirfd as i64, path)?;
    parent.misc(MiscRequest::UnlinkInContainer { leaf: &leaf })?;
    Ok(0)
}

/// `unlinkat(2)`. `AT_REMOVEDIR` is accepted but not distinguished from a
/// plain unlink; the reference transports have no separate directory
/// emptiness check.
pub fn sys_unlinkat(dirfd: i32, path: &str, _flags: i32) -> isize {
    log::trace!("sys_unlinkat <= dirfd: {dirfd}, path: {path:?}");
    posix_result(do_unlinkat(dirfd, path))
}

/// `unlink(2)`: `unlinkat` relative to `AT_FDCWD`.
pub fn sys_unlink(path: &str) -> isize {
    sys_unlinkat(libc::AT_FDCWD, path, 0)
}

fn strip_leading_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Pick the directory a two-path op (`rename`/`link`) runs against: the
/// root if both paths are absolute, the cwd if both are relative. A mixed
/// pair is rejected `ENOTSUP`, per §4.8.
fn two_path_base(old: &str, new: &str) -> IoResult<Arc<TransportEntry>> {
    let old_abs = old.starts_with('/');
    let new_abs = new.starts_with('/');
    if old_abs != new_abs {
        return Err(Status::NotSupported);
    }
    if old_abs {
        PROCESS.root().ok_or(Status::BadHandle)
    } else {
        Ok(PROCESS.cwd.transport())
    }
}

fn do_rename(old: &str, new: &str) -> IoResult<isize> {
    let base = two_path_base(old, new)?;
    base.transport.misc(MiscRequest::Rename {
        old: strip_leading_slash(old),
        new: strip_leading_slash(new),
    })?;
    Ok(0)
}

/// `rename(2)`.
pub fn sys_rename(old: &str, new: &str) -> isize {
    log::trace!("sys_rename <= old: {old:?}, new: {new:?}");
    posix_result(do_rename(old, new))
}

fn do_link(old: &str, new: &str) -> IoResult<isize> {
    let base = two_path_base(old, new)?;
    base.transport.misc(MiscRequest::Link {
        old: strip_leading_slash(old),
        new: strip_leading_slash(new),
    })?;
    Ok(0)
}

/// `link(2)`.
pub fn sys_link(old: &str, new: &str) -> isize {
    log::trace!("sys_link <= old: {old:?}, new: {new:?}");
    posix_result(do_link(old, new))
}

struct DirStreamInner {
    entries: Vec<String>,
    cursor: usize,
    needs_reset: bool,
}

/// Per-open directory iteration state (§4.7): the backing fd, a scratch
/// buffer of names, a cursor into it, and a mutex serializing one iterator
/// at a time per stream.
pub struct DirStream {
    fd: i32,
    inner: Mutex<DirStreamInner>,
}

impl DirStream {
    fn new(fd: i32) -> Arc<Self> {
        Arc::new(Self {
            fd,
            inner: Mutex::new(DirStreamInner {
                entries: Vec::new(),
                cursor: 0,
                needs_reset: true,
            }),
        })
    }

    /// The fd this stream was built from.
    pub fn dirfd(&self) -> i32 {
        self.fd
    }
}

fn do_opendir(dirfd: i32, path: &str) -> IoResult<Arc<DirStream>> {
    let (base, residual) = resolve(&PROCESS.fdtab, &PROCESS.cwd, &PROCESS.root(), dirfd as i64, path)?;
    let transport = base.transport.open(&residual, OpenFlags::DIRECTORY, 0)?;
    let entry = TransportEntry::new(transport, TransportFlags::empty());
    let (fd, deferred) = PROCESS.fdtab.bind(entry, -1, 0)?;
    drop(deferred);
    Ok(DirStream::new(fd as i32))
}

/// `opendir(3)`.
pub fn sys_opendir(path: &str) -> IoResult<Arc<DirStream>> {
    log::trace!("sys_opendir <= path: {path:?}");
    do_opendir(libc::AT_FDCWD, path)
}

/// `fdopendir(3)`. Per the declared open question, this does not verify
/// `fd` actually names a directory.
pub fn sys_fdopendir(fd: i32) -> IoResult<Arc<DirStream>> {
    log::trace!("sys_fdopendir <= fd: {fd}");
    PROCESS.fdtab.lookup(fd as i64)?;
    Ok(DirStream::new(fd))
}

/// `readdir(3)`: the next name, or `None` at end of stream.
pub fn sys_readdir(stream: &DirStream) -> IoResult<Option<String>> {
    let mut inner = stream.inner.lock();
    if inner.cursor >= inner.entries.len() {
        let entry = PROCESS.fdtab.lookup(stream.fd as i64)?;
        let mut out = Vec::new();
        entry.transport.misc(MiscRequest::ReadDir {
            reset: inner.needs_reset,
            out: &mut out,
        })?;
        inner.needs_reset = false;
        inner.entries = out;
        inner.cursor = 0;
        if inner.entries.is_empty() {
            return Ok(None);
        }
    }
    let name = inner.entries[inner.cursor].clone();
    inner.cursor += 1;
    Ok(Some(name))
}

/// `rewinddir(3)`: mark the cursor for reset without issuing I/O.
pub fn sys_rewinddir(stream: &DirStream) {
    log::trace!("sys_rewinddir <= fd: {}", stream.fd);
    let mut inner = stream.inner.lock();
    inner.cursor = inner.entries.len();
    inner.needs_reset = true;
}

/// `closedir(3)`.
pub fn sys_closedir(stream: &DirStream) -> isize {
    log::trace!("sys_closedir <= fd: {}", stream.fd);
    super::sys_close(stream.fd)
}

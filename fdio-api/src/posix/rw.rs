//! `read`/`write`/`pread`/`pwrite` and their vector forms, `lseek`.

use fdio_core::{
    status::{posix_result, IoResult},
    transport::{PollEvents, Whence},
};

use crate::{posix::blocking_retry, PROCESS};

fn do_read(fd: i32, buf: &mut [u8]) -> IoResult<isize> {
    let entry = PROCESS.fdtab.lookup(fd as i64)?;
    let n = blocking_retry(&entry, PollEvents::IN, || entry.transport.read(buf))?;
    Ok(n as isize)
}

fn do_write(fd: i32, buf: &[u8]) -> IoResult<isize> {
    let entry = PROCESS.fdtab.lookup(fd as i64)?;
    let n = blocking_retry(&entry, PollEvents::OUT, || entry.transport.write(buf))?;
    Ok(n as isize)
}

fn do_pread(fd: i32, buf: &mut [u8], offset: u64) -> IoResult<isize> {
    let entry = PROCESS.fdtab.lookup(fd as i64)?;
    let n = blocking_retry(&entry, PollEvents::IN, || entry.transport.read_at(buf, offset))?;
    Ok(n as isize)
}

fn do_pwrite(fd: i32, buf: &[u8], offset: u64) -> IoResult<isize> {
    let entry = PROCESS.fdtab.lookup(fd as i64)?;
    let n = blocking_retry(&entry, PollEvents::OUT, || entry.transport.write_at(buf, offset))?;
    Ok(n as isize)
}

/// `read(2)`.
pub fn sys_read(fd: i32, buf: &mut [u8]) -> isize {
    log::trace!("sys_read <= fd: {fd}, len: {}", buf.len());
    posix_result(do_read(fd, buf))
}

/// `write(2)`.
pub fn sys_write(fd: i32, buf: &[u8]) -> isize {
    log::trace!("sys_write <= fd: {fd}, len: {}", buf.len());
    posix_result(do_write(fd, buf))
}

/// `pread64(2)`.
pub fn sys_pread(fd: i32, buf: &mut [u8], offset: u64) -> isize {
    log::trace!("sys_pread <= fd: {fd}, len: {}, offset: {offset}", buf.len());
    posix_result(do_pread(fd, buf, offset))
}

/// `pwrite64(2)`.
pub fn sys_pwrite(fd: i32, buf: &[u8], offset: u64) -> isize {
    log::trace!("sys_pwrite <= fd: {fd}, len: {}, offset: {offset}", buf.len());
    posix_result(do_pwrite(fd, buf, offset))
}

/// `readv(2)`: fill each buffer in turn, stopping at the first short read.
pub fn sys_readv(fd: i32, bufs: &mut [&mut [u8]]) -> isize {
    log::trace!("sys_readv <= fd: {fd}, iovcnt: {}", bufs.len());
    let mut total = 0usize;
    for buf in bufs.iter_mut() {
        let n = do_read(fd, buf);
        match n {
            Ok(n) => {
                total += n as usize;
                if (n as usize) < buf.len() {
                    break;
                }
            }
            Err(status) => {
                if total > 0 {
                    break;
                }
                return posix_result(Err(status));
            }
        }
    }
    total as isize
}

/// `writev(2)`: write each buffer in turn, stopping at the first short
/// write.
pub fn sys_writev(fd: i32, bufs: &[&[u8]]) -> isize {
    log::trace!("sys_writev <= fd: {fd}, iovcnt: {}", bufs.len());
    let mut total = 0usize;
    for buf in bufs {
        match do_write(fd, buf) {
            Ok(n) => {
                total += n as usize;
                if (n as usize) < buf.len() {
                    break;
                }
            }
            Err(status) => {
                if total > 0 {
                    break;
                }
                return posix_result(Err(status));
            }
        }
    }
    total as isize
}

/// `lseek(2)`.
pub fn sys_lseek(fd: i32, offset: i64, whence: i32) -> isize {
    log::trace!("sys_lseek <= fd: {fd}, offset: {offset}, whence: {whence}");
    let whence = match whence {
        libc::SEEK_SET => Whence::Start,
        libc::SEEK_CUR => Whence::Current,
        libc::SEEK_END => Whence::End,
        _ => return posix_result(Err(fdio_core::status::Status::InvalidArgs)),
    };
    let result = PROCESS
        .fdtab
        .lookup(fd as i64)
        .and_then(|entry| entry.transport.seek(offset, whence))
        .map(|pos| pos as isize);
    posix_result(result)
}

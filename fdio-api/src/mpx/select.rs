//! `select(2)`/`pselect6(2)`: the `fd_set` projection of the same
//! wait-many algorithm [`super::poll::sys_poll`] runs.

use std::time::Duration;

use fdio_core::{
    status::{posix_result, IoResult},
    transport::PollEvents,
    wait::WaitItem,
};

use crate::PROCESS;

fn fd_set_contains(set: Option<&libc::fd_set>, fd: i32) -> bool {
    match set {
        Some(set) => unsafe { libc::FD_ISSET(fd, set) },
        None => false,
    }
}

fn fd_set_clear(set: Option<&mut libc::fd_set>) {
    if let Some(set) = set {
        unsafe { libc::FD_ZERO(set) };
    }
}

fn fd_set_insert(set: Option<&mut libc::fd_set>, fd: i32) {
    if let Some(set) = set {
        unsafe { libc::FD_SET(fd, set) };
    }
}

fn do_select(
    nfds: i32,
    mut readfds: Option<&mut libc::fd_set>,
    mut writefds: Option<&mut libc::fd_set>,
    mut exceptfds: Option<&mut libc::fd_set>,
    timeout: Option<Duration>,
) -> IoResult<isize> {
    let mut active = Vec::new();
    let mut items = Vec::new();

    for fd in 0..nfds {
        let wants_read = fd_set_contains(readfds.as_deref(), fd);
        let wants_write = fd_set_contains(writefds.as_deref(), fd);
        let wants_except = fd_set_contains(exceptfds.as_deref(), fd);
        if !wants_read && !wants_write && !wants_except {
            continue;
        }

        let Ok(entry) = PROCESS.fdtab.lookup(fd as i64) else {
            continue;
        };

        let mut events = PollEvents::empty();
        if wants_read {
            events |= PollEvents::IN;
        }
        if wants_write {
            events |= PollEvents::OUT;
        }
        if wants_except {
            events |= PollEvents::ERR;
        }

        if let Some((handle, signals)) = entry.transport.wait_begin(events) {
            items.push(WaitItem::new(handle, signals));
            active.push((fd, entry, wants_read, wants_write, wants_except));
        }
    }

    fd_set_clear(readfds.as_deref_mut());
    fd_set_clear(writefds.as_deref_mut());
    fd_set_clear(exceptfds.as_deref_mut());

    if items.is_empty() {
        if let Some(timeout) = timeout {
            std::thread::sleep(timeout);
        }
        return Ok(0);
    }

    PROCESS.kernel.wait_many(&mut items, timeout)?;

    let mut ready = 0isize;
    for ((fd, entry, wants_read, wants_write, wants_except), item) in active.iter().zip(items.iter()) {
        let observed = entry.transport.wait_end(item.pending);
        if *wants_read && observed.contains(PollEvents::IN) {
            fd_set_insert(readfds.as_deref_mut(), *fd);
            ready += 1;
        }
        if *wants_write && observed.contains(PollEvents::OUT) {
            fd_set_insert(writefds.as_deref_mut(), *fd);
            ready += 1;
        }
        if *wants_except && observed.intersects(PollEvents::ERR | PollEvents::HUP) {
            fd_set_insert(exceptfds.as_deref_mut(), *fd);
            ready += 1;
        }
    }

    Ok(ready)
}

/// `select(2)`. `nfds` is capped by `FD_SETSIZE`; absent sets are `None`.
pub fn sys_select(
    nfds: i32,
    readfds: Option<&mut libc::fd_set>,
    writefds: Option<&mut libc::fd_set>,
    exceptfds: Option<&mut libc::fd_set>,
    timeout: Option<Duration>,
) -> isize {
    log::trace!("sys_select <= nfds: {nfds}, timeout: {timeout:?}");
    if nfds < 0 || nfds as usize > fdio_core::config::FD_SETSIZE {
        return posix_result(Err(fdio_core::status::Status::InvalidArgs));
    }
    match do_select(nfds, readfds, writefds, exceptfds, timeout) {
        Ok(n) => n as isize,
        Err(status) => posix_result(Err(status)),
    }
}

/// `pselect6(2)`, modulo signal-mask handling: no signal delivery exists
/// at this layer to suspend for the call's duration.
pub fn sys_pselect6(
    nfds: i32,
    readfds: Option<&mut libc::fd_set>,
    writefds: Option<&mut libc::fd_set>,
    exceptfds: Option<&mut libc::fd_set>,
    timeout: Option<Duration>,
) -> isize {
    sys_select(nfds, readfds, writefds, exceptfds, timeout)
}

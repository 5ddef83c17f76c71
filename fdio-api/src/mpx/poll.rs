//! `poll(2)`/`ppoll(2)`.

use std::time::Duration;

use fdio_core::{
    status::{posix_result, IoResult, Status},
    transport::PollEvents,
    wait::WaitItem,
};

use crate::PROCESS;

/// One entry of a `poll(2)` call. `events` is what the caller asked for;
/// `revents` is filled in by [`sys_poll`].
#[derive(Debug, Clone, Copy)]
pub struct PollFd {
    pub fd: i32,
    pub events: PollEvents,
    pub revents: PollEvents,
}

impl PollFd {
    pub fn new(fd: i32, events: PollEvents) -> Self {
        Self {
            fd,
            events,
            revents: PollEvents::empty(),
        }
    }
}

fn do_poll(fds: &mut [PollFd], timeout: Option<Duration>) -> IoResult<usize> {
    let mut active = Vec::new();
    let mut items = Vec::new();
    let mut ready = 0usize;

    for (i, pfd) in fds.iter_mut().enumerate() {
        pfd.revents = PollEvents::empty();
        if pfd.fd < 0 {
            continue;
        }
        match PROCESS.fdtab.lookup(pfd.fd as i64) {
            Ok(entry) => match entry.transport.wait_begin(pfd.events) {
                Some((handle, signals)) => {
                    items.push(WaitItem::new(handle, signals));
                    active.push((i, entry));
                }
                None => return Err(Status::InvalidArgs),
            },
            Err(_) => {
                pfd.revents = PollEvents::NVAL;
                ready += 1;
            }
        }
    }

    if items.is_empty() {
        if ready == 0 {
            if let Some(timeout) = timeout {
                std::thread::sleep(timeout);
            }
        }
        return Ok(ready);
    }

    PROCESS.kernel.wait_many(&mut items, timeout)?;

    for ((i, entry), item) in active.iter().zip(items.iter()) {
        let observed = entry.transport.wait_end(item.pending);
        let masked = observed & (fds[*i].events | PollEvents::HUP | PollEvents::ERR);
        fds[*i].revents = masked;
        if !masked.is_empty() {
            ready += 1;
        }
    }

    Ok(ready)
}

/// `poll(2)`. `timeout_ms < 0` waits forever; `0` polls without blocking.
pub fn sys_poll(fds: &mut [PollFd], timeout_ms: i32) -> isize {
    log::trace!("sys_poll <= nfds: {}, timeout_ms: {timeout_ms}", fds.len());
    let timeout = if timeout_ms < 0 {
        None
    } else {
        Some(Duration::from_millis(timeout_ms as u64))
    };
    match do_poll(fds, timeout) {
        Ok(n) => n as isize,
        Err(status) => posix_result(Err(status)),
    }
}

/// `ppoll(2)`, modulo signal-mask handling: this layer has no signal
/// delivery to suspend, so the mask argument is simply unused.
pub fn sys_ppoll(fds: &mut [PollFd], timeout: Option<Duration>) -> isize {
    log::trace!("sys_ppoll <= nfds: {}, timeout: {timeout:?}", fds.len());
    match do_poll(fds, timeout) {
        Ok(n) => n as isize,
        Err(status) => posix_result(Err(status)),
    }
}

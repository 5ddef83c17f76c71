//! `wait_fd`: the single-descriptor wait primitive the blocking-emulation
//! loop (§4.4) and `poll`/`select` are both built from.

use std::time::Duration;

use fdio_core::{
    status::{IoResult, Status},
    transport::PollEvents,
};

use crate::PROCESS;

/// Look up `fd`'s transport, call `wait_begin` to get a kernel handle and
/// signal mask, invoke the kernel `wait_one`, then `wait_end` to translate
/// the observed signals back to POSIX events.
///
/// An invalid handle from `wait_begin` (the transport does not support
/// waiting) surfaces as [`Status::InvalidArgs`].
pub fn wait_fd(fd: i32, events: PollEvents, timeout: Option<Duration>) -> IoResult<PollEvents> {
    let entry = PROCESS.fdtab.lookup(fd as i64)?;
    let Some((handle, mask)) = entry.transport.wait_begin(events) else {
        return Err(Status::InvalidArgs);
    };
    let signals = PROCESS.kernel.wait_one(handle, mask, timeout)?;
    Ok(entry.transport.wait_end(signals))
}

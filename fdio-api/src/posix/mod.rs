//! The POSIX call surface (§4.4's blocking emulation plus the individual
//! syscalls built on top of it). Every `sys_*` function here returns the
//! POSIX convention directly: the value on success, `-1` with `errno` set
//! on failure, via [`fdio_core::status::posix_result`].

mod close;
mod dir;
mod dup;
mod fcntl;
mod misc;
mod open;
mod rw;
mod stat;

pub use close::*;
pub use dir::*;
pub use dup::*;
pub use fcntl::*;
pub use misc::*;
pub use open::*;
pub use rw::*;
pub use stat::*;

use fdio_core::{
    status::{IoResult, Status},
    transport::{PollEvents, TransportEntry},
};

use crate::PROCESS;

/// Run `op` once; if it reports [`Status::ShouldWait`] and the descriptor
/// is blocking, park on the transport's wait object and retry instead of
/// surfacing `EAGAIN` to the caller. A non-blocking descriptor gets
/// `ShouldWait` back unchanged, which the POSIX boundary maps to `EAGAIN`.
///
/// A transport that cannot be waited on (`wait_begin` returns `None`)
/// turns a would-block result into `InvalidArgs` rather than spinning
/// forever.
pub(crate) fn blocking_retry<T>(
    entry: &TransportEntry,
    events: PollEvents,
    mut op: impl FnMut() -> IoResult<T>,
) -> IoResult<T> {
    loop {
        match op() {
            Err(Status::ShouldWait) if !entry.nonblocking() => {
                let Some((handle, mask)) = entry.transport.wait_begin(events) else {
                    return Err(Status::InvalidArgs);
                };
                let signals = PROCESS.kernel.wait_one(handle, mask, None)?;
                entry.transport.wait_end(signals);
            }
            other => return other,
        }
    }
}

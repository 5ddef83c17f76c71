//! The POSIX-facing half of the file-descriptor compatibility layer:
//! open/read/write/close/dup/fcntl/stat/dir/poll/select, plus the startup
//! handoff and the reference transports that make the whole thing
//! runnable without a real microkernel underneath.
//!
//! `fdio-core` owns the data structures; everything here is a thin,
//! errno-returning wrapper around them, playing the role the teacher
//! crate's `api/src/imp` + `api/src/syscall` split plays for its own
//! syscall surface.

pub mod mpx;
pub mod posix;
pub mod startup;
pub mod transports;

use fdio_core::session::ProcessIo;
use lazy_static::lazy_static;

lazy_static! {
    /// The process this library runs in. Bootstrapped lazily on first use
    /// with a null root/cwd/stdio set; a real launcher calls
    /// [`startup::bootstrap`] itself before touching any POSIX call if it
    /// needs a non-default handle table — there is only one process here,
    /// so there is nothing to hand the result to but this singleton.
    pub static ref PROCESS: ProcessIo = startup::bootstrap_default();
}

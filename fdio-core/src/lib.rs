//! Core of the POSIX file-descriptor compatibility layer: the fd table and
//! its transport dispatch.
//!
//! This crate owns the process-wide fdtab and cwd state, the polymorphic
//! transport contract every I/O object implements, path resolution against
//! root/cwd/dirfd, and the kernel-wait primitives the multiplexed waiters
//! are built on. The POSIX call surface itself (open/read/write/poll/...)
//! lives one layer up, in `fdio-api`.

pub mod config;
pub mod cwd;
pub mod fdtab;
pub mod metadata;
pub mod path;
pub mod session;
pub mod status;
pub mod transport;
pub mod wait;

pub use status::{IoResult, Status};
pub use transport::Transport;

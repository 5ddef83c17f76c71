//! Multiplexed waiting: `wait_fd` (§4.4), `poll`/`select` (§4.5).

mod poll;
mod select;
mod wait_fd;

pub use poll::{sys_ppoll, sys_poll, PollFd};
pub use select::{sys_pselect6, sys_select};
pub use wait_fd::wait_fd;

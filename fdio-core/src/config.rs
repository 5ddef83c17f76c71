//! Compile-time and startup-seeded configuration shared by the whole layer.

/// Size of the process-wide fd table. Fds `0..MAX_FD` are addressable.
pub const MAX_FD: usize = 1024;

/// Longest normalized cwd path we will track textually before falling back
/// to the `(unknown)` sentinel.
pub const PATH_MAX: usize = 4096;

/// Upper bound accepted by `select`'s `nfds` argument.
pub const FD_SETSIZE: usize = 1024;

/// Sentinel written to the cwd path buffer when normalization would have
/// overflowed [`PATH_MAX`]. The cwd transport is left untouched when this
/// happens; only the textual name degrades.
pub const UNKNOWN_CWD: &str = "(unknown)";

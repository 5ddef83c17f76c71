//! The typed payload carried by `misc(Stat)` / `misc(SetAttr)` requests.

use std::time::SystemTime;

/// Coarse node type, enough to answer `S_ISDIR`/`S_ISREG`/`S_ISFIFO`-style
/// questions without pulling in a full POSIX mode bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
    Fifo,
    CharDevice,
    Socket,
}

/// Attributes returned by `stat`/`fstat`/`fstatat`.
#[derive(Debug, Clone, Copy)]
pub struct Metadata {
    pub node_type: NodeType,
    pub mode: u32,
    pub ino: u64,
    pub nlink: u32,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            node_type: NodeType::File,
            mode: 0o644,
            ino: 1,
            nlink: 1,
            size: 0,
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
        }
    }
}

/// Fields `utimens`/`utimensat`/`futimens` may update. Per the spec's
/// stated non-goal, `atime` is accepted here but never applied by any
/// reference transport — callers may still set it without error.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttrUpdate {
    pub mode: Option<u32>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
}

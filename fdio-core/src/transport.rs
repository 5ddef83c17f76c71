//! The polymorphic transport contract (§4.2) and the fdtab-slot header
//! (refcount/dupcount/flags) that wraps every transport instance.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use bitflags::bitflags;

use crate::{
    metadata::{AttrUpdate, Metadata},
    status::{IoResult, Status},
    wait::{Signals, WaitHandle},
};

bitflags! {
    /// Open/descriptor flags. `NONBLOCK` is the one flag read on every
    /// read/write call; the rest exist so `open`/`fcntl` have somewhere to
    /// store what the caller asked for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const RDONLY    = 0;
        const WRONLY    = 1 << 0;
        const RDWR      = 1 << 1;
        const CREAT     = 1 << 2;
        const EXCL      = 1 << 3;
        const DIRECTORY = 1 << 4;
        const NONBLOCK  = 1 << 5;
        const APPEND    = 1 << 6;
        const TRUNC     = 1 << 7;
        const NOFOLLOW  = 1 << 8;
    }

    /// Descriptor-level flags stored in the transport header, shared by
    /// every fdtab slot that references the transport. `CLOEXEC` is
    /// tracked but inert: close-on-exec semantics are a declared non-goal
    /// (§1), so `F_SETFD`/`F_GETFD` read and write this bit without it
    /// affecting any other operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TransportFlags: u32 {
        const NONBLOCK = 1 << 0;
        const CLOEXEC  = 1 << 1;
    }

    /// POSIX-level readiness events, the vocabulary `wait_begin`/`wait_end`
    /// translate to and from kernel [`Signals`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PollEvents: u32 {
        const IN   = 1 << 0;
        const OUT  = 1 << 1;
        const ERR  = 1 << 2;
        const HUP  = 1 << 3;
        const NVAL = 1 << 4;
    }
}

/// Whence argument to `seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// A handle produced by `clone`/`unwrap`, tagged with a type the receiving
/// process/transport factory uses to reconstruct the right transport kind.
#[derive(Debug, Clone, Copy)]
pub struct HandleInfo {
    pub handle: WaitHandle,
    pub type_tag: u32,
}

/// One `misc` request. This is the Rust-shaped equivalent of the spec's
/// `misc(op, arg64, maxreply, buf, len)` C-style control channel: a single
/// dispatch entry point carrying every typed, non-stream operation a
/// transport might support, rather than one trait method per operation.
pub enum MiscRequest<'a> {
    Stat,
    Truncate { len: u64 },
    UnlinkInContainer { leaf: &'a str },
    Rename { old: &'a str, new: &'a str },
    Link { old: &'a str, new: &'a str },
    Sync { data_only: bool },
    SetAttr(AttrUpdate),
    ReadDir { reset: bool, out: &'a mut Vec<String> },
}

/// Reply to a [`MiscRequest`].
pub enum MiscResponse {
    Stat(Metadata),
    Unit,
}

/// The operation set every I/O object implements (§4.2). Every method
/// defaults to `NotSupported` so a concrete transport only overrides the
/// handful it actually implements, mirroring the teacher crate's
/// `FileLike` trait (most of its implementors leave `ioctl`/`get_vmo` at
/// their default).
pub trait Transport: Send + Sync {
    fn read(&self, _buf: &mut [u8]) -> IoResult<usize> {
        Err(Status::NotSupported)
    }

    fn write(&self, _buf: &[u8]) -> IoResult<usize> {
        Err(Status::NotSupported)
    }

    fn read_at(&self, _buf: &mut [u8], _offset: u64) -> IoResult<usize> {
        Err(Status::NotSupported)
    }

    fn write_at(&self, _buf: &[u8], _offset: u64) -> IoResult<usize> {
        Err(Status::NotSupported)
    }

    fn seek(&self, _offset: i64, _whence: Whence) -> IoResult<u64> {
        Err(Status::NotSupported)
    }

    /// Directory-like transports only: open a child by relative path.
    fn open(&self, _path: &str, _flags: OpenFlags, _mode: u32) -> IoResult<Arc<dyn Transport>> {
        Err(Status::NotSupported)
    }

    fn clone_handles(&self) -> IoResult<Vec<HandleInfo>> {
        Err(Status::NotSupported)
    }

    fn unwrap_handles(&self) -> IoResult<Vec<HandleInfo>> {
        Err(Status::NotSupported)
    }

    /// Idempotent resource release. Called at most once per transport, by
    /// whichever caller observes its `dupcount` drop to zero.
    fn close(&self) {}

    fn misc(&self, _req: MiscRequest<'_>) -> IoResult<MiscResponse> {
        Err(Status::NotSupported)
    }

    fn ioctl(&self, _op: u32, _input: &[u8], _output: &mut [u8]) -> IoResult<usize> {
        Err(Status::NotSupported)
    }

    fn posix_ioctl(&self, _request: u64, _arg: usize) -> IoResult<i64> {
        Err(Status::NotSupported)
    }

    /// Produce a kernel handle and the signal mask equivalent to
    /// `events`, or `None` if this transport cannot be waited on (the
    /// caller maps that to `EINVAL`).
    fn wait_begin(&self, _events: PollEvents) -> Option<(WaitHandle, Signals)> {
        None
    }

    /// Reverse mapping after a wait completes.
    fn wait_end(&self, _signals: Signals) -> PollEvents {
        PollEvents::empty()
    }

    fn get_vmo(&self) -> IoResult<(WaitHandle, u64, u64)> {
        Err(Status::NotSupported)
    }
}

/// The fdtab-slot header: a transport plus the refcount/dupcount/flags
/// triple described in §3.
///
/// `Arc::strong_count` on a `TransportEntry` *is* the spec's `refcount`:
/// every fdtab slot holding a clone, and every in-flight call holding its
/// own clone for the call's duration, contributes one count. `dupcount` is
/// tracked explicitly because it counts only fdtab slots, a strict subset
/// of the holders `refcount` counts.
pub struct TransportEntry {
    pub transport: Arc<dyn Transport>,
    dupcount: std::sync::atomic::AtomicUsize,
    flags: AtomicU32,
}

impl TransportEntry {
    pub fn new(transport: Arc<dyn Transport>, flags: TransportFlags) -> Arc<Self> {
        Arc::new(Self {
            transport,
            dupcount: std::sync::atomic::AtomicUsize::new(0),
            flags: AtomicU32::new(flags.bits()),
        })
    }

    pub fn dupcount(&self) -> usize {
        self.dupcount.load(Ordering::Acquire)
    }

    pub(crate) fn inc_dupcount(&self) {
        self.dupcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the dupcount *after* decrementing.
    pub(crate) fn dec_dupcount(&self) -> usize {
        self.dupcount.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn flags(&self) -> TransportFlags {
        TransportFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn set_nonblocking(&self, nonblocking: bool) {
        if nonblocking {
            self.flags
                .fetch_or(TransportFlags::NONBLOCK.bits(), Ordering::AcqRel);
        } else {
            self.flags
                .fetch_and(!TransportFlags::NONBLOCK.bits(), Ordering::AcqRel);
        }
    }

    pub fn set_cloexec(&self, cloexec: bool) {
        if cloexec {
            self.flags
                .fetch_or(TransportFlags::CLOEXEC.bits(), Ordering::AcqRel);
        } else {
            self.flags
                .fetch_and(!TransportFlags::CLOEXEC.bits(), Ordering::AcqRel);
        }
    }

    pub fn nonblocking(&self) -> bool {
        self.flags().contains(TransportFlags::NONBLOCK)
    }
}

impl Drop for TransportEntry {
    fn drop(&mut self) {
        self.transport.close();
    }
}

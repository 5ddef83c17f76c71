//! Startup handoff and teardown (§4.6): turning the `(handle, info-word)`
//! pairs a process is launched with into the bound fdtab slots, root, and
//! cwd that the rest of this crate's POSIX surface dispatches against.
//!
//! This plays the role the teacher crate's `rust_main`/`new_user_task` pair
//! plays for its own fd table: a one-time setup path invoked before any
//! POSIX call is legal, and an exit hook invoked after the last one.

use std::sync::Arc;

use fdio_core::{
    transport::{Transport, TransportEntry, TransportFlags},
    session::ProcessIo,
};

use crate::transports::{MemFsTransport, NullTransport};

/// The type tag carried alongside a startup handle (§3's "Startup handle
/// descriptor"), used to reconstruct the right transport kind and to pick
/// out the root/cwd entries from the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleType {
    Root,
    Cwd,
    Remote,
    Pipe,
    Logger,
}

/// One entry of the startup handle table a launching process hands to a new
/// one, the Rust-typed equivalent of the spec's `(handle, info-word)` pair:
/// a transport, the tag saying what it's for, an optional explicit fd (the
/// info-word's low-bits `arg`, when the launcher pins this handle to a
/// specific descriptor), and the `USE_FOR_STDIO` bit.
pub struct StartupHandle {
    pub transport: Arc<dyn Transport>,
    pub ty: HandleType,
    pub fd: Option<i64>,
    pub use_for_stdio: bool,
    pub nonblocking: bool,
}

impl StartupHandle {
    pub fn new(transport: Arc<dyn Transport>, ty: HandleType) -> Self {
        Self {
            transport,
            ty,
            fd: None,
            use_for_stdio: false,
            nonblocking: false,
        }
    }

    /// Mark this handle as the stdio donor: any of fds 0/1/2 still empty
    /// once every other entry has been placed is dup-bound onto this same
    /// transport rather than a fresh [`NullTransport`] (§4.6).
    pub fn use_for_stdio(mut self) -> Self {
        self.use_for_stdio = true;
        self
    }

    /// Pin this handle to a specific fd instead of letting `bootstrap`
    /// auto-assign one.
    pub fn at_fd(mut self, fd: i64) -> Self {
        self.fd = Some(fd);
        self
    }
}

/// Build the process singleton from an explicit startup handle table, as a
/// real launcher would construct it from a capability table rather than
/// from `std::env`/`std::fs`.
///
/// Missing `Root`/`Cwd` degrade to a fresh, empty in-memory namespace rather
/// than failing outright, matching the spec's "degrade to a null root"
/// rule for a rootless process. Any of fds 0/1/2 left empty once every
/// other entry is placed receives the `USE_FOR_STDIO` donor (dup-bound onto
/// the same transport, so its dupcount reflects every aliased slot), or a
/// fresh [`NullTransport`] if no donor was supplied.
pub fn bootstrap(handles: Vec<StartupHandle>) -> ProcessIo {
    let mut root = None;
    let mut cwd = None;
    let mut rest = Vec::new();

    for handle in handles {
        match handle.ty {
            HandleType::Root => root = Some(handle),
            HandleType::Cwd => cwd = Some(handle),
            _ => rest.push(handle),
        }
    }

    let root_entry = root
        .map(|h| bind_entry(&h))
        .unwrap_or_else(|| TransportEntry::new(MemFsTransport::new_root(), TransportFlags::empty()));

    let cwd_entry = cwd.map(|h| bind_entry(&h)).unwrap_or_else(|| root_entry.clone());

    let cwd_path = std::env::var("PWD").unwrap_or_else(|_| "/".to_string());

    let process = ProcessIo::new(Some(root_entry), cwd_path, cwd_entry);

    let mut donor: Option<Arc<TransportEntry>> = None;
    for handle in rest {
        let use_for_stdio = handle.use_for_stdio;
        let fd = handle.fd.unwrap_or(-1);
        let entry = bind_entry(&handle);
        if use_for_stdio && donor.is_none() {
            donor = Some(entry.clone());
        }
        let (_fd, deferred) = process
            .fdtab
            .bind(entry, fd, 3)
            .expect("fd table has room at startup");
        drop(deferred);
    }

    for fd in 0..3i64 {
        if process.fdtab.lookup(fd).is_ok() {
            continue;
        }
        let entry = donor
            .clone()
            .unwrap_or_else(|| TransportEntry::new(Arc::new(NullTransport), TransportFlags::empty()));
        let (_fd, deferred) = process
            .fdtab
            .bind(entry, fd, 0)
            .expect("stdio fds 0..3 are always free at this point");
        drop(deferred);
    }

    process
}

fn bind_entry(handle: &StartupHandle) -> Arc<TransportEntry> {
    let mut flags = TransportFlags::empty();
    if handle.nonblocking {
        flags |= TransportFlags::NONBLOCK;
    }
    TransportEntry::new(handle.transport.clone(), flags)
}

/// A process singleton good enough to exercise the POSIX surface without a
/// real launcher: an empty in-memory namespace as root and cwd, and
/// null-device stdio.
pub fn bootstrap_default() -> ProcessIo {
    bootstrap(Vec::new())
}

/// The exit hook: drain every fdtab slot, closing what falls to zero.
pub fn teardown(process: &ProcessIo) {
    process.teardown();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bootstrap_binds_three_stdio_fds() {
        let process = bootstrap_default();
        assert_eq!(process.fdtab.len(), 3);
        assert!(process.fdtab.lookup(0).is_ok());
        assert!(process.fdtab.lookup(1).is_ok());
        assert!(process.fdtab.lookup(2).is_ok());
    }

    #[test]
    fn teardown_empties_the_table() {
        let process = bootstrap_default();
        teardown(&process);
        assert!(process.fdtab.is_empty());
    }

    #[test]
    fn use_for_stdio_donor_is_aliased_across_every_empty_slot() {
        let donor: Arc<dyn Transport> = Arc::new(NullTransport);
        let handle = StartupHandle::new(donor, HandleType::Remote)
            .at_fd(3)
            .use_for_stdio();
        let process = bootstrap(vec![handle]);

        assert_eq!(process.fdtab.len(), 4);
        let entry3 = process.fdtab.lookup(3).unwrap();
        for fd in 0..3 {
            assert!(Arc::ptr_eq(&entry3, &process.fdtab.lookup(fd).unwrap()));
        }
        assert_eq!(entry3.dupcount(), 4);
    }

    #[test]
    fn without_a_donor_each_empty_stdio_slot_gets_its_own_null_sink() {
        let process = bootstrap(Vec::new());
        let entry0 = process.fdtab.lookup(0).unwrap();
        let entry1 = process.fdtab.lookup(1).unwrap();
        assert!(!Arc::ptr_eq(&entry0, &entry1));
        assert_eq!(entry0.dupcount(), 1);
    }
}

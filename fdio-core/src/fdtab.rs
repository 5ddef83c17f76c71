//! The process-wide fd table and the reference/dup-counting discipline that
//! governs shared ownership of a transport by multiple descriptors (§4.1).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    config::MAX_FD,
    status::{IoResult, Status},
    transport::TransportEntry,
};

/// Entries whose `dupcount` reached zero during a `bind`/`unbind`/`dup`
/// call. Its `Drop` runs `close()` on each — always *after* the fdtab
/// mutex guard that produced it has gone out of scope, which is what gives
/// the core its "never call into a transport while holding the table
/// lock" guarantee.
#[derive(Default)]
pub struct DeferredClose(Vec<Arc<TransportEntry>>);

impl Drop for DeferredClose {
    fn drop(&mut self) {
        for entry in self.0.drain(..) {
            entry.transport.close();
        }
    }
}

/// The fixed-size fd table, guarded by a single mutex (§3, §5).
pub struct Fdtab {
    slots: Mutex<Vec<Option<Arc<TransportEntry>>>>,
}

impl Default for Fdtab {
    fn default() -> Self {
        Self {
            slots: Mutex::new(vec![None; MAX_FD]),
        }
    }
}

impl Fdtab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `entry` at `fd`, or at the first free slot in
    /// `[starting_fd, MAX_FD)` if `fd` is negative. Returns the fd used and
    /// a token whose drop closes whatever was displaced, if anything.
    pub fn bind(
        &self,
        entry: Arc<TransportEntry>,
        fd: i64,
        starting_fd: usize,
    ) -> IoResult<(usize, DeferredClose)> {
        let mut slots = self.slots.lock();

        let target = if fd < 0 {
            (starting_fd..slots.len())
                .find(|&i| slots[i].is_none())
                .ok_or(Status::NoResources)?
        } else {
            let fd = fd as usize;
            if fd >= slots.len() {
                return Err(Status::BadHandle);
            }
            fd
        };

        entry.inc_dupcount();
        let old = slots[target].replace(entry);

        let mut deferred = Vec::new();
        if let Some(old) = old {
            if old.dec_dupcount() == 0 {
                deferred.push(old);
            }
        }

        Ok((target, DeferredClose(deferred)))
    }

    /// Remove `fd` from the table and hand its transport back uniquely.
    /// Fails `InvalidArgs` (EINVAL) if `fd` is out of range or already
    /// empty; fails `Unavailable` (EBUSY) if the transport is still shared
    /// (`dupcount > 1`) or another operation still holds a reference
    /// (`refcount > 1`). This is a stricter primitive than `close(2)`
    /// needs — see [`Fdtab::release`] for the one that backs it.
    pub fn unbind(&self, fd: i64) -> IoResult<Arc<TransportEntry>> {
        let mut slots = self.slots.lock();
        if fd < 0 || fd as usize >= slots.len() {
            return Err(Status::InvalidArgs);
        }
        let fd = fd as usize;
        let Some(entry) = slots[fd].as_ref() else {
            return Err(Status::InvalidArgs);
        };

        if entry.dupcount() > 1 || Arc::strong_count(entry) > 1 {
            return Err(Status::Unavailable);
        }

        let entry = slots[fd].take().unwrap();
        entry.dec_dupcount();
        Ok(entry)
    }

    /// `close(fd)`: clear the slot unconditionally and decrement its
    /// transport's dupcount, closing the transport only if that drops it
    /// to zero. Unlike [`Fdtab::unbind`], this always succeeds for a
    /// valid, occupied fd regardless of how many other slots still
    /// reference the same transport — closing one half of a `dup2` pair
    /// must not disturb the other (S2: `close` on a dup'd fd leaves the
    /// transport open and reads on the surviving fd unaffected).
    pub fn release(&self, fd: i64) -> IoResult<DeferredClose> {
        let mut slots = self.slots.lock();
        if fd < 0 || fd as usize >= slots.len() {
            return Err(Status::InvalidArgs);
        }
        let entry = slots[fd as usize].take().ok_or(Status::InvalidArgs)?;

        let mut deferred = Vec::new();
        if entry.dec_dupcount() == 0 {
            deferred.push(entry);
        }
        Ok(DeferredClose(deferred))
    }

    /// Acquire a reference to the transport bound at `fd`, if any.
    pub fn lookup(&self, fd: i64) -> IoResult<Arc<TransportEntry>> {
        if fd < 0 {
            return Err(Status::BadHandle);
        }
        let slots = self.slots.lock();
        let fd = fd as usize;
        slots
            .get(fd)
            .and_then(|slot| slot.clone())
            .ok_or(Status::BadHandle)
    }

    /// `dup`/`dup2`/`dup3`/`F_DUPFD`: alias `oldfd`'s transport into a new
    /// slot, incrementing its dupcount.
    pub fn dup(
        &self,
        oldfd: i64,
        newfd: Option<i64>,
        starting_fd: usize,
    ) -> IoResult<(usize, DeferredClose)> {
        let entry = self.lookup(oldfd)?;
        self.bind(entry, newfd.unwrap_or(-1), starting_fd)
    }

    /// Number of occupied slots, used by `RLIMIT_NOFILE` accounting.
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// Walk every slot, decrementing dupcount and closing what falls to
    /// zero. Used by process exit (§4.6).
    pub fn drain(&self) {
        let mut slots = self.slots.lock();
        let mut deferred = Vec::new();
        for slot in slots.iter_mut() {
            if let Some(entry) = slot.take() {
                if entry.dec_dupcount() == 0 {
                    deferred.push(entry);
                }
            }
        }
        drop(slots);
        for entry in deferred {
            entry.transport.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Transport, TransportFlags};

    struct Dummy;
    impl Transport for Dummy {}

    fn entry() -> Arc<TransportEntry> {
        TransportEntry::new(Arc::new(Dummy), TransportFlags::empty())
    }

    #[test]
    fn bind_scans_from_starting_fd() {
        let table = Fdtab::new();
        let (fd, _d) = table.bind(entry(), -1, 0).unwrap();
        assert_eq!(fd, 0);
        let (fd, _d) = table.bind(entry(), -1, 0).unwrap();
        assert_eq!(fd, 1);
        let (fd, _d) = table.bind(entry(), -1, 5).unwrap();
        assert_eq!(fd, 5);
    }

    #[test]
    fn dup_increments_dupcount() {
        let table = Fdtab::new();
        let (fd0, _d) = table.bind(entry(), -1, 0).unwrap();
        let (fd1, _d) = table.dup(fd0 as i64, None, 0).unwrap();
        assert_ne!(fd0, fd1);
        let e = table.lookup(fd0 as i64).unwrap();
        assert_eq!(e.dupcount(), 2);
    }

    #[test]
    fn unbind_rejects_shared_transport() {
        let table = Fdtab::new();
        let (fd0, _d) = table.bind(entry(), -1, 0).unwrap();
        let (_fd1, _d) = table.dup(fd0 as i64, None, 0).unwrap();
        assert_eq!(table.unbind(fd0 as i64), Err(Status::Unavailable));
    }

    #[test]
    fn release_succeeds_on_shared_transport_without_closing() {
        use std::sync::atomic::{AtomicBool, Ordering};
        struct Closing(Arc<AtomicBool>);
        impl Transport for Closing {
            fn close(&self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let closed = Arc::new(AtomicBool::new(false));
        let table = Fdtab::new();
        let e = TransportEntry::new(Arc::new(Closing(closed.clone())), TransportFlags::empty());
        let (fd0, _d) = table.bind(e, -1, 0).unwrap();
        let (fd1, _d) = table.dup(fd0 as i64, None, 0).unwrap();

        let deferred = table.release(fd0 as i64).unwrap();
        drop(deferred);
        assert!(!closed.load(Ordering::SeqCst));
        assert!(table.lookup(fd0 as i64).is_err());
        assert!(table.lookup(fd1 as i64).is_ok());

        let deferred = table.release(fd1 as i64).unwrap();
        drop(deferred);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn unbind_rejects_invalid_fd() {
        let table = Fdtab::new();
        assert_eq!(table.unbind(3), Err(Status::InvalidArgs));
        assert_eq!(table.unbind(-1), Err(Status::InvalidArgs));
        assert_eq!(table.unbind(999_999), Err(Status::InvalidArgs));
    }

    #[test]
    fn closing_last_dup_runs_close_via_rebind() {
        use std::sync::atomic::{AtomicBool, Ordering};
        struct Closing(Arc<AtomicBool>);
        impl Transport for Closing {
            fn close(&self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let closed = Arc::new(AtomicBool::new(false));
        let table = Fdtab::new();
        let e = TransportEntry::new(Arc::new(Closing(closed.clone())), TransportFlags::empty());
        let (fd, _d) = table.bind(e, -1, 0).unwrap();

        // Rebinding fd to something else should close the displaced entry.
        let (_fd2, deferred) = table.bind(entry(), fd as i64, 0).unwrap();
        drop(deferred);
        assert!(closed.load(Ordering::SeqCst));
    }
}

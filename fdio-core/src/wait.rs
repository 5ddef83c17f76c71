//! Stand-ins for the kernel wait primitives named in the external interface:
//! `object_wait_one`, `object_wait_many`, `handle_close`.
//!
//! The core and the multiplexed waiters built on it (§4.4, §4.5 of the
//! spec) only ever go through the [`KernelWaiter`] trait. [`LocalKernel`] is
//! the one concrete implementation shipped here so the crate is runnable
//! without a real microkernel underneath; swapping it for a real
//! syscall-backed waiter touches nothing above this module.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use bitflags::bitflags;

use crate::status::{IoResult, Status};

bitflags! {
    /// Kernel-level readiness bits a transport's [`wait_begin`] maps POSIX
    /// events onto, and [`wait_end`] maps back.
    ///
    /// [`wait_begin`]: crate::transport::Transport::wait_begin
    /// [`wait_end`]: crate::transport::Transport::wait_end
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Signals: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const PEER_CLOSED = 1 << 2;
        const ERROR = 1 << 3;
    }
}

/// Opaque kernel-object handle. A transport's `wait_begin` produces one of
/// these; `wait_end` and `handle_close` consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitHandle(u64);

/// One entry of a `wait_many` call: the handle to watch, the signals being
/// waited for, and (on return) the signals observed.
#[derive(Debug, Clone, Copy)]
pub struct WaitItem {
    pub handle: WaitHandle,
    pub waitfor: Signals,
    pub pending: Signals,
}

impl WaitItem {
    pub fn new(handle: WaitHandle, waitfor: Signals) -> Self {
        Self {
            handle,
            waitfor,
            pending: Signals::empty(),
        }
    }
}

/// The three kernel primitives this crate consumes but never implements in
/// production: a blocking single-handle wait, a fan-in multi-wait, and
/// handle teardown.
pub trait KernelWaiter: Send + Sync {
    /// Block until any bit in `signals` is observed on `handle`, or
    /// `timeout` elapses. `None` means wait forever.
    fn wait_one(&self, handle: WaitHandle, signals: Signals, timeout: Option<Duration>)
    -> IoResult<Signals>;

    /// Wait for any item to become ready, filling in each item's `pending`
    /// field. Returns `Ok(())` on both a genuine readiness and on timeout
    /// (a timed-out call still reports whatever each item observed, which
    /// may be nothing) — mirroring the spec's "success and TIMED_OUT both
    /// processed the same way" rule for poll/select.
    fn wait_many(&self, items: &mut [WaitItem], timeout: Option<Duration>) -> IoResult<()>;

    /// Release a handle. Idempotent.
    fn close(&self, handle: WaitHandle);
}

/// The synchronization primitive a reference transport registers with
/// [`LocalKernel`] to become waitable. Conceptually this is the userland
/// side of a kernel object: a signal bit-field plus a way to block for it
/// to change.
pub struct Waitable {
    state: Mutex<Signals>,
    cv: Condvar,
}

impl Waitable {
    pub fn new(initial: Signals) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(initial),
            cv: Condvar::new(),
        })
    }

    /// Replace the signal state and wake anyone blocked in [`wait`].
    ///
    /// [`wait`]: Self::wait
    pub fn set(&self, signals: Signals) {
        *self.state.lock().unwrap() = signals;
        self.cv.notify_all();
    }

    pub fn get(&self) -> Signals {
        *self.state.lock().unwrap()
    }

    fn wait(&self, mask: Signals, timeout: Option<Duration>) -> IoResult<Signals> {
        let mut guard = self.state.lock().unwrap();
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let pending = *guard & mask;
            if !pending.is_empty() {
                return Ok(pending);
            }
            match deadline {
                None => guard = self.cv.wait(guard).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Status::TimedOut);
                    }
                    let (next, timed_out) =
                        self.cv.wait_timeout(guard, deadline - now).unwrap();
                    guard = next;
                    if timed_out.timed_out() && (*guard & mask).is_empty() {
                        return Err(Status::TimedOut);
                    }
                }
            }
        }
    }
}

/// In-process simulation of the kernel's wait primitives. Registers
/// [`Waitable`]s under fresh [`WaitHandle`]s; `wait_many` is implemented by
/// short-interval polling rather than a true multi-object block (the same
/// tradeoff the teacher crate makes in its `do_poll`/`do_select` loops,
/// which re-check readiness on a timer instead of blocking on a native
/// multi-wait). A real microkernel-backed `KernelWaiter` would replace this
/// with an actual `object_wait_many` syscall.
#[derive(Default)]
pub struct LocalKernel {
    table: Mutex<HashMap<WaitHandle, Arc<Waitable>>>,
    next_id: AtomicU64,
}

/// Polling granularity for [`LocalKernel::wait_many`].
const POLL_INTERVAL: Duration = Duration::from_millis(1);

impl LocalKernel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a waitable object, returning the handle a transport should
    /// hand back from `wait_begin`.
    pub fn register(&self, waitable: Arc<Waitable>) -> WaitHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = WaitHandle(id);
        self.table.lock().unwrap().insert(handle, waitable);
        handle
    }

    fn lookup(&self, handle: WaitHandle) -> IoResult<Arc<Waitable>> {
        self.table
            .lock()
            .unwrap()
            .get(&handle)
            .cloned()
            .ok_or(Status::BadHandle)
    }
}

impl KernelWaiter for LocalKernel {
    fn wait_one(
        &self,
        handle: WaitHandle,
        signals: Signals,
        timeout: Option<Duration>,
    ) -> IoResult<Signals> {
        self.lookup(handle)?.wait(signals, timeout)
    }

    fn wait_many(&self, items: &mut [WaitItem], timeout: Option<Duration>) -> IoResult<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let mut any = false;
            for item in items.iter_mut() {
                let waitable = self.lookup(item.handle)?;
                item.pending = waitable.get() & item.waitfor;
                if !item.pending.is_empty() {
                    any = true;
                }
            }
            if any {
                return Ok(());
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => return Ok(()),
                Some(_) => std::thread::sleep(POLL_INTERVAL),
                None => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }

    fn close(&self, handle: WaitHandle) {
        self.table.lock().unwrap().remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_one_observes_set_signal() {
        let kernel = LocalKernel::new();
        let waitable = Waitable::new(Signals::empty());
        let handle = kernel.register(waitable.clone());

        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            waitable.set(Signals::READABLE);
        });

        let pending = kernel
            .wait_one(handle, Signals::READABLE, Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(pending, Signals::READABLE);
        t.join().unwrap();
    }

    #[test]
    fn wait_one_times_out() {
        let kernel = LocalKernel::new();
        let waitable = Waitable::new(Signals::empty());
        let handle = kernel.register(waitable);
        let err = kernel
            .wait_one(handle, Signals::READABLE, Some(Duration::from_millis(10)))
            .unwrap_err();
        assert_eq!(err, Status::TimedOut);
    }

    #[test]
    fn wait_many_reports_timeout_as_ok_with_empty_pending() {
        let kernel = LocalKernel::new();
        let waitable = Waitable::new(Signals::empty());
        let handle = kernel.register(waitable);
        let mut items = [WaitItem::new(handle, Signals::READABLE)];
        kernel
            .wait_many(&mut items, Some(Duration::from_millis(10)))
            .unwrap();
        assert!(items[0].pending.is_empty());
    }

    #[test]
    fn close_invalidates_handle() {
        let kernel = LocalKernel::new();
        let waitable = Waitable::new(Signals::empty());
        let handle = kernel.register(waitable);
        kernel.close(handle);
        assert_eq!(
            kernel.wait_one(handle, Signals::READABLE, Some(Duration::from_millis(1))),
            Err(Status::BadHandle)
        );
    }
}

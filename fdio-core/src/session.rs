//! The process-wide singleton this whole layer hangs off of: the fdtab,
//! the cwd state, the root transport, and the kernel waiter, bundled
//! together the way §9's design notes describe — "a process-level
//! singleton owned by the runtime, initialized exactly once in the startup
//! hook and torn down in the exit hook".

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    cwd::CwdState,
    fdtab::Fdtab,
    transport::TransportEntry,
    wait::{KernelWaiter, LocalKernel},
};

/// Everything a POSIX call needs to reach the core: the fd table, the cwd,
/// an optional root transport (absent means every absolute-path lookup
/// fails `EBADF`, per §4.6's "degrade to a null root" rule), and the
/// kernel waiter multiplexed waits are built on.
pub struct ProcessIo {
    pub fdtab: Fdtab,
    pub cwd: CwdState,
    root: RwLock<Option<Arc<TransportEntry>>>,
    pub kernel: Arc<dyn KernelWaiter>,
}

impl ProcessIo {
    pub fn new(root: Option<Arc<TransportEntry>>, cwd_path: String, cwd: Arc<TransportEntry>) -> Self {
        Self {
            fdtab: Fdtab::new(),
            cwd: CwdState::new(cwd_path, cwd),
            root: RwLock::new(root),
            kernel: LocalKernel::new(),
        }
    }

    pub fn root(&self) -> Option<Arc<TransportEntry>> {
        self.root.read().clone()
    }

    pub fn set_root(&self, root: Option<Arc<TransportEntry>>) {
        *self.root.write() = root;
    }

    /// The exit hook (§4.6): walk every slot, decrementing dupcount and
    /// closing what falls to zero.
    pub fn teardown(&self) {
        self.fdtab.drain();
    }
}

//! An in-memory byte-ring-buffer pipe pair. The direct generalization of
//! the teacher crate's `Pipe`/`Shared` type onto the `Transport` trait:
//! same ring buffer, same wake-on-readable/writable discipline, same
//! `closed()`-via-`Arc::strong_count` trick.

use std::sync::Arc;

use fdio_core::{
    status::{IoResult, Status},
    transport::{PollEvents, Transport},
    wait::{KernelWaiter, Signals, Waitable, WaitHandle},
};
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer, Producer},
    HeapRb,
};

const RING_BUFFER_CAPACITY: usize = 64 * 1024;

struct Shared {
    buffer: Mutex<HeapRb<u8>>,
    waitable: Arc<Waitable>,
    handle: WaitHandle,
    kernel: Arc<dyn KernelWaiter>,
}

impl Shared {
    fn refresh(&self, peer_gone: bool) {
        let buffer = self.buffer.lock();
        let mut signals = Signals::empty();
        if buffer.occupied_len() > 0 {
            signals |= Signals::READABLE;
        }
        if buffer.vacant_len() > 0 {
            signals |= Signals::WRITABLE;
        }
        if peer_gone {
            signals |= Signals::PEER_CLOSED;
        }
        self.waitable.set(signals);
    }
}

// Both ends of a pipe register a single kernel wait handle in `new` and
// hold it through their shared `Arc<Shared>`. Deregistering it has to wait
// until the last end is gone, not the first `Transport::close()` — a read
// end closing must not invalidate the still-open write end's `wait_begin`.
impl Drop for Shared {
    fn drop(&mut self) {
        self.kernel.close(self.handle);
    }
}

pub struct PipeTransport {
    read_side: bool,
    shared: Arc<Shared>,
}

impl PipeTransport {
    pub fn new(kernel: Arc<dyn KernelWaiter>) -> (PipeTransport, PipeTransport) {
        let waitable = Waitable::new(Signals::WRITABLE);
        let handle = kernel.register(waitable.clone());
        let shared = Arc::new(Shared {
            buffer: Mutex::new(HeapRb::new(RING_BUFFER_CAPACITY)),
            waitable,
            handle,
            kernel,
        });
        (
            PipeTransport {
                read_side: true,
                shared: shared.clone(),
            },
            PipeTransport {
                read_side: false,
                shared,
            },
        )
    }

    fn peer_gone(&self) -> bool {
        Arc::strong_count(&self.shared) == 1
    }
}

impl Transport for PipeTransport {
    fn read(&self, buf: &mut [u8]) -> IoResult<usize> {
        if !self.read_side {
            return Err(Status::BadHandle);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.shared.buffer.lock().pop_slice(buf);
        if n > 0 {
            self.shared.refresh(self.peer_gone());
            return Ok(n);
        }
        if self.peer_gone() {
            return Ok(0);
        }
        Err(Status::ShouldWait)
    }

    fn write(&self, buf: &[u8]) -> IoResult<usize> {
        if self.read_side {
            return Err(Status::BadHandle);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.peer_gone() {
            return Err(Status::PeerClosed);
        }
        let n = self.shared.buffer.lock().push_slice(buf);
        if n > 0 {
            self.shared.refresh(false);
            return Ok(n);
        }
        Err(Status::ShouldWait)
    }

    fn ioctl(&self, op: u32, _input: &[u8], output: &mut [u8]) -> IoResult<usize> {
        const FIONREAD: u32 = 0x541B;
        if op == FIONREAD && output.len() >= 4 {
            let n = self.shared.buffer.lock().occupied_len() as u32;
            output[..4].copy_from_slice(&n.to_ne_bytes());
            return Ok(4);
        }
        Err(Status::NotSupported)
    }

    fn wait_begin(&self, events: PollEvents) -> Option<(WaitHandle, Signals)> {
        let mut mask = Signals::empty();
        if events.contains(PollEvents::IN) {
            mask |= Signals::READABLE | Signals::PEER_CLOSED;
        }
        if events.contains(PollEvents::OUT) {
            mask |= Signals::WRITABLE | Signals::PEER_CLOSED;
        }
        Some((self.shared.handle, mask))
    }

    fn wait_end(&self, signals: Signals) -> PollEvents {
        let mut events = PollEvents::empty();
        if self.read_side {
            if signals.contains(Signals::READABLE) {
                events |= PollEvents::IN;
            }
            if signals.contains(Signals::PEER_CLOSED) {
                events |= PollEvents::HUP;
            }
        } else {
            if signals.contains(Signals::WRITABLE) {
                events |= PollEvents::OUT;
            }
            if signals.contains(Signals::PEER_CLOSED) {
                events |= PollEvents::ERR;
            }
        }
        events
    }

    fn close(&self) {
        self.shared.refresh(true);
    }
}

impl Drop for PipeTransport {
    fn drop(&mut self) {
        // After this drop, at most one reference to `shared` remains; if
        // that's the peer, it needs to see PEER_CLOSED.
        self.shared.refresh(self.peer_gone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdio_core::wait::LocalKernel;

    #[test]
    fn write_then_read_roundtrips() {
        let kernel = LocalKernel::new();
        let (rx, tx) = PipeTransport::new(kernel);
        assert_eq!(tx.write(b"hello").unwrap(), 5);
        let mut buf = [0u8; 5];
        assert_eq!(rx.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn read_on_empty_pipe_should_wait() {
        let kernel = LocalKernel::new();
        let (rx, _tx) = PipeTransport::new(kernel);
        let mut buf = [0u8; 4];
        assert_eq!(rx.read(&mut buf), Err(Status::ShouldWait));
    }

    #[test]
    fn read_returns_eof_after_writer_drops() {
        let kernel = LocalKernel::new();
        let (rx, tx) = PipeTransport::new(kernel);
        drop(tx);
        let mut buf = [0u8; 4];
        assert_eq!(rx.read(&mut buf), Ok(0));
    }

    #[test]
    fn write_after_reader_drops_is_peer_closed() {
        let kernel = LocalKernel::new();
        let (rx, tx) = PipeTransport::new(kernel);
        drop(rx);
        assert_eq!(tx.write(b"x"), Err(Status::PeerClosed));
    }
}

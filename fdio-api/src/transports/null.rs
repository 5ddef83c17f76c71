//! `/dev/null` equivalent: reads report EOF, writes silently succeed.
//!
//! Used for unfilled stdio slots at startup and as the rootless-process
//! root transport, per the startup handoff's "degrade to a null root" rule.

use fdio_core::{
    status::IoResult,
    transport::Transport,
};

pub struct NullTransport;

impl Transport for NullTransport {
    fn read(&self, _buf: &mut [u8]) -> IoResult<usize> {
        Ok(0)
    }

    fn write(&self, buf: &[u8]) -> IoResult<usize> {
        Ok(buf.len())
    }

    fn read_at(&self, _buf: &mut [u8], _offset: u64) -> IoResult<usize> {
        Ok(0)
    }

    fn write_at(&self, buf: &[u8], _offset: u64) -> IoResult<usize> {
        Ok(buf.len())
    }
}

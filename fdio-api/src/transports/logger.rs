//! A write-only transport that lines-buffer its input and emits each
//! completed line via `log::info!`. Grounds the `LOGGER` startup-handle
//! type tag (§4.6): a process whose stdout/stderr are wired to this
//! transport gets its output folded into the host's log stream instead of
//! a real terminal.

use parking_lot::Mutex;

use fdio_core::{status::IoResult, transport::Transport};

#[derive(Default)]
pub struct LoggerTransport {
    pending: Mutex<Vec<u8>>,
}

impl LoggerTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_lines(&self, pending: &mut Vec<u8>) {
        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            log::info!("{line}");
        }
    }
}

impl Transport for LoggerTransport {
    fn write(&self, buf: &[u8]) -> IoResult<usize> {
        let mut pending = self.pending.lock();
        pending.extend_from_slice(buf);
        self.flush_lines(&mut pending);
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_lines_stay_buffered() {
        let logger = LoggerTransport::new();
        assert_eq!(logger.write(b"no newline yet").unwrap(), 14);
        assert_eq!(logger.pending.lock().len(), 14);
    }

    #[test]
    fn complete_lines_are_drained() {
        let logger = LoggerTransport::new();
        logger.write(b"one\ntwo\nthree").unwrap();
        assert_eq!(logger.pending.lock().as_slice(), b"three");
    }
}

//! Communication module
//!
//! Line-oriented transports to the motion controller. The serial sender only
//! talks to a `Transport`; where that transport comes from (a real serial
//! port or the in-memory simulator) is decided by a `TransportFactory`.

pub mod serial;
pub mod simulator;

use motionkit_core::Result;
use std::io;
use std::time::Duration;

pub use serial::SerialPortInfo;

/// Line terminator used in both directions
pub const LINE_ENDING: &str = "\r\n";

/// An open, line-oriented connection to a device
pub trait Transport: Send {
    /// Write all bytes
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush buffered output to the device
    fn flush(&mut self) -> io::Result<()>;

    /// Read one line without its terminator
    ///
    /// Returns `Ok(None)` when the per-read timeout elapsed before a full
    /// line arrived; partial data is kept for the next call.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Close the connection
    fn close(&mut self) -> io::Result<()>;
}

/// Opens transports and enumerates ports
pub trait TransportFactory: Send + Sync {
    /// Open `port` at `baud_rate`; each `read_line` waits at most `read_timeout`
    fn open(&self, port: &str, baud_rate: u32, read_timeout: Duration)
        -> Result<Box<dyn Transport>>;

    /// List ports the factory can open
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>>;
}

/// Splits an incoming byte stream into lines
///
/// Accepts `\n` and `\r\n` terminators and keeps partial lines between reads.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append raw bytes
    pub(crate) fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Pop the next complete line, if any
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        let line = String::from_utf8_lossy(&raw);
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Drop buffered data
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_splits_crlf() {
        let mut buffer = LineBuffer::default();
        buffer.extend(b"Grbl 1.1h\r\nok\r\nerr");
        assert_eq!(buffer.next_line().as_deref(), Some("Grbl 1.1h"));
        assert_eq!(buffer.next_line().as_deref(), Some("ok"));
        assert_eq!(buffer.next_line(), None);

        buffer.extend(b"or:20\n");
        assert_eq!(buffer.next_line().as_deref(), Some("error:20"));
    }

    #[test]
    fn test_line_buffer_replaces_invalid_utf8() {
        let mut buffer = LineBuffer::default();
        buffer.extend(&[0xff, b'o', b'k', b'\n']);
        assert_eq!(buffer.next_line().as_deref(), Some("\u{fffd}ok"));
        buffer.extend(b"partial");
        buffer.clear();
        assert_eq!(buffer.next_line(), None);
    }
}

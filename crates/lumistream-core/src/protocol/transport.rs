//! Transport abstraction
//!
//! The session drives a bidirectional byte stream: byte-oriented writes,
//! line-oriented reads bounded by a timeout, a non-blocking query for bytes
//! waiting in the receive buffer, and the DTR/RTS control lines used to pulse
//! the controller into a hardware reset.
//!
//! The wire encoding is one byte per character, so received bytes widen to
//! chars 1:1 rather than going through UTF-8 decoding.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// A bidirectional byte stream to one panel controller
pub trait Transport: Send {
    /// Write raw bytes, blocking until they are handed to the driver
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read one line, blocking up to the configured timeout
    ///
    /// Returns `Ok(None)` when the timeout elapses without a complete line;
    /// partial input is retained for the next call.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Number of bytes waiting in the receive buffer
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Set the read timeout
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard anything waiting in the receive buffer
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Set the DTR control line
    fn set_dtr(&mut self, level: bool) -> io::Result<()>;

    /// Set the RTS control line
    fn set_rts(&mut self, level: bool) -> io::Result<()>;
}

/// Serial port transport for panel controllers
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    /// Bytes read from the port but not yet returned as a complete line
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Wrap an open serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            pending: Vec::new(),
        }
    }
}

/// Widen single-byte characters to a string
fn decode_line(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

impl Transport for SerialTransport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = [0u8; 256];
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                return Ok(Some(decode_line(&line)));
            }
            match self.port.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let buffered = self.pending.len() as u32;
        self.port
            .bytes_to_read()
            .map(|n| n + buffered)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        self.port
            .write_data_terminal_ready(level)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.port
            .write_request_to_send(level)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_is_single_byte_per_char() {
        // 0xB0 is '°' in Latin-1; must widen to one char, not error
        let decoded = decode_line(&[b'O', b'K', 0xB0, b'\n']);
        assert_eq!(decoded.chars().count(), 4);
        assert_eq!(&decoded[..2], "OK");
    }
}

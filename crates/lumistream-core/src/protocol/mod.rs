//! Serial Protocol Communication
//!
//! Implements the line-numbered, checksummed command protocol spoken by the
//! panel controller firmware: framing, acknowledgement tracking with flow
//! control, response classification, and the session state machine that ties
//! them to a transport.

pub mod commands;
mod error;
pub mod frame;
mod ledger;
pub mod response;
pub mod serial;
mod session;
pub mod transport;

pub use commands::{Command, Mnemonic};
pub use error::ProtocolError;
pub use ledger::AckLedger;
pub use response::{classify, Response, Telemetry};
pub use serial::{find_controller_port, find_port_by_vid, list_ports, open_port, PortInfo};
pub use session::{Session, SessionConfig, SessionState};
pub use transport::{SerialTransport, Transport};

/// Default baud rate for panel controller communication
pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// Default transport read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Receive buffer capacity of the stock controller firmware, in bytes
///
/// Flow control keeps the framed length of all unacknowledged commands under
/// this; overfilling the device buffer drops bytes mid-frame.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Default maximum framed length of one payload chunk
///
/// Sits below the firmware's 256-byte line buffer with slack for the checksum
/// suffix.
pub const DEFAULT_CHUNK_SIZE: usize = 230;

/// Error codes the firmware reports for transient conditions that resolve on
/// their own (command queue momentarily full, payload before panel init,
/// duplicate line); these never terminate a session
pub const BENIGN_ERROR_CODES: [u16; 3] = [10, 11, 19];

/// USB vendor id of the Teensy boards used in the stock controllers
pub const TEENSY_VID: u16 = 0x16C0;

/// Argument key whose value is a base64-packed channel payload
pub const PAYLOAD_KEY: char = 'V';

/// Argument key carrying the starting channel offset of a payload chunk
pub const OFFSET_KEY: char = 'S';

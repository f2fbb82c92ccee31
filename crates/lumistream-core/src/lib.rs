//! # Lumistream Core Library
//!
//! Core functionality for the Lumistream LED panel driver.
//!
//! This library provides:
//! - The line-numbered, checksummed serial command protocol spoken by the
//!   panel controllers (framing, flow control, acknowledgement tracking,
//!   resend recovery)
//! - Serial port discovery for controller boards
//! - Per-controller session management
//!
//! Pixel geometry, color generation, and preview rendering are the embedding
//! application's concern; this crate ends at the protocol boundary.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lumistream_core::protocol::{
//!     frame::pack_channels, open_port, Mnemonic, SerialTransport, Session, SessionConfig,
//!     DEFAULT_BAUD_RATE,
//! };
//! use std::time::Duration;
//!
//! let port = open_port("/dev/ttyACM0", DEFAULT_BAUD_RATE, Duration::from_secs(1))?;
//! let mut session = Session::new(
//!     Box::new(SerialTransport::new(port)),
//!     SessionConfig::default(),
//! )?;
//! session.reset_board()?;
//!
//! // paint panel 0 solid white and show it
//! let payload = pack_channels(&vec![255; 300]);
//! session.chunk_and_submit(Mnemonic::PixelsRgb, "Q0", &payload)?;
//! session.submit_sync(Mnemonic::ShowFrame, "")?;
//! ```

#![warn(missing_docs)]

pub mod manager;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::manager::{ServerSpec, SessionManager};
    pub use crate::protocol::{
        Command, Mnemonic, ProtocolError, Response, Session, SessionConfig, SessionState,
        Telemetry, Transport,
    };
}

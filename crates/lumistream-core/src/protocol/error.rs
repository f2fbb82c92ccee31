//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Controller fault E{code}: {message} (command: {command})")]
    DeviceFault {
        code: u16,
        message: String,
        command: String,
    },

    #[error("Chunk size {chunk_size} cannot fit a payload group after a {skeleton_len} byte skeleton")]
    ChunkTooSmall {
        chunk_size: usize,
        skeleton_len: usize,
    },

    #[error("Session is closed")]
    Closed,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

//! Error types for the KEEL transport layer.

use thiserror::Error;

/// Frame-level errors. All of them are fatal to the current socket and
/// recovered by reconnecting, never by skipping bytes.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Payload length is not a positive multiple of 4
    #[error("payload length not a positive multiple of 4: {0}")]
    Misaligned(usize),

    /// Declared frame length exceeds the 2 MiB cap
    #[error("frame length {0} exceeds maximum")]
    Oversized(usize),

    /// Decoded a zero-length frame
    #[error("zero-length frame")]
    Empty,
}

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire framing violation
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The endpoint registry has no address for the requested class
    #[error("no address available")]
    NoAddress,

    /// Operation attempted on a connection that is not connected
    #[error("connection is not established")]
    NotConnected,
}

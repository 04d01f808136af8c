//! # KEEL Transport
//!
//! The framed connection layer of the KEEL client.
//!
//! This crate provides:
//! - The obfuscated, length-prefixed wire framing with quick-ack support
//!   and partial-frame reassembly
//! - A reconnecting connection actor with backoff and endpoint rotation
//! - The socket abstraction the connection runs over
//! - The delegate trait upstream owners implement to receive traffic
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    ConnectionDelegate                      │
//! │    (handshake during bootstrap, RPC traffic afterwards)   │
//! ├───────────────────────────────────────────────────────────┤
//! │                       Connection                           │
//! │    (actor task: state machine, backoff, reconnect timer)  │
//! ├───────────────────────────────────────────────────────────┤
//! │                  FrameCodec / Connector                    │
//! │    (length-prefixed frames over an abstract socket)       │
//! └───────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod error;
pub mod framing;
pub mod socket;

pub use connection::{
    AlwaysReachable, Connection, ConnectionDelegate, ConnectionState, ConnectivityOracle,
    EndpointProvider, TrafficClass, reconnect_delay,
};
pub use error::{FrameError, TransportError};
pub use framing::{FrameDecoder, FrameEvent, encode_frame, encode_quick_ack};
pub use socket::{BoxedSocket, Connector, TcpConnector};

/// Maximum decoded frame payload size (2 MiB)
pub const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

/// Obfuscation marker prepended to the very first packet on a fresh socket
pub const OBFUSCATION_MARKER: u8 = 0xEF;

/// Size of the fixed initial response header of a download-class frame.
///
/// Once this many bytes of a partial frame are buffered, the in-flight
/// message id can be recovered and progress reported before the frame
/// completes.
pub const DOWNLOAD_PROGRESS_HEADER_LEN: usize = 152;

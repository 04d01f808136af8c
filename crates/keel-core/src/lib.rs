//! # KEEL Core
//!
//! The client core of the KEEL transport: datacenter state and the
//! handshake that bootstraps a secure session.
//!
//! This crate provides:
//! - The datacenter endpoint registry: per-cluster address lists with
//!   rotation cursors, the derived auth key, and the server salt set
//! - The length-prefixed plaintext message envelope and message-id clock
//! - The wire codec for the handshake message set
//! - The handshake state machine that negotiates the 256-byte auth key
//!   over one framed connection and writes it back into the registry
//!
//! ## Bootstrap flow
//!
//! ```text
//! Handshake ── req_pq ──────────────────▶ server
//!           ◀─ res_pq (nonce, pq, fps) ──
//!           ── req_dh_params (RSA) ─────▶
//!           ◀─ server_dh_params_ok ──────   AES-IGE encrypted DH group
//!           ── set_client_dh_params ────▶
//!           ◀─ dh_gen_ok ────────────────   auth key established
//!                      │
//!                      ▼
//!              Datacenter registry (auth key, key id, initial salt)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datacenter;
pub mod envelope;
pub mod handshake;
pub mod salt;
pub mod wire;

pub use datacenter::{CursorStore, Datacenter, Endpoint, MemoryCursorStore, PREFERRED_PORT};
pub use envelope::{MessageIdClock, PlainMessage, pack_plaintext, quick_ack_id, unpack_plaintext};
pub use handshake::{Handshake, HandshakeError, HandshakeResult};
pub use salt::ServerSalt;
pub use wire::{WireError, WireReader, WireWriter};

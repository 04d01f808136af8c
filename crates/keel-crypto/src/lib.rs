//! # KEEL Crypto
//!
//! Cryptographic primitives for the KEEL transport client.
//!
//! This crate provides:
//! - SHA-1 hashing and the handshake key/IV derivation schemes
//! - AES-256 in IGE mode (the block chaining mode the protocol mandates)
//! - Raw RSA encryption against an embedded server public key table
//! - Factorization of 64-bit semiprimes (the server's proof-of-work)
//! - DH parameter validation and 256-byte auth key normalization

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dh;
pub mod error;
pub mod factorize;
pub mod ige;
pub mod rsa;
pub mod sha;

mod random;

pub use dh::{auth_key_id, is_good_dh_value, is_good_prime, normalize_auth_key};
pub use error::CryptoError;
pub use factorize::factorize;
pub use rsa::{Keyring, ServerKey};
pub use random::{fill_random, random_array};

/// Size of a SHA-1 digest in bytes
pub const SHA1_LEN: usize = 20;

/// Size of the derived auth key in bytes
pub const AUTH_KEY_LEN: usize = 256;

/// Size of an RSA-encrypted handshake payload in bytes
pub const RSA_BLOCK_LEN: usize = 256;

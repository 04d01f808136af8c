//! SHA-1 hashing and the handshake derivation schemes built on it.
//!
//! The protocol predates modern AEAD constructions: the temporary key
//! material protecting the DH exchange and all integrity checks inside the
//! handshake are fixed byte-slicing schemes over SHA-1 digests.

use sha1::{Digest, Sha1};

use crate::SHA1_LEN;

/// Compute the SHA-1 digest of `data`.
#[must_use]
pub fn sha1(data: &[u8]) -> [u8; SHA1_LEN] {
    Sha1::digest(data).into()
}

/// Compute the SHA-1 digest of several chunks as if concatenated.
#[must_use]
pub fn sha1_concat(chunks: &[&[u8]]) -> [u8; SHA1_LEN] {
    let mut hasher = Sha1::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// Derive the temporary AES-256-IGE key and IV protecting the DH exchange.
///
/// With `a = SHA1(new_nonce || server_nonce)`,
/// `b = SHA1(server_nonce || new_nonce)` and
/// `c = SHA1(new_nonce || new_nonce)`:
///
/// ```text
/// key = a[0..20] || b[0..12]
/// iv  = b[12..20] || c[0..20] || new_nonce[0..4]
/// ```
#[must_use]
pub fn derive_tmp_aes(server_nonce: &[u8; 16], new_nonce: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let a = sha1_concat(&[new_nonce, server_nonce]);
    let b = sha1_concat(&[server_nonce, new_nonce]);
    let c = sha1_concat(&[new_nonce, new_nonce]);

    let mut key = [0u8; 32];
    key[..20].copy_from_slice(&a);
    key[20..].copy_from_slice(&b[..12]);

    let mut iv = [0u8; 32];
    iv[..8].copy_from_slice(&b[12..]);
    iv[8..28].copy_from_slice(&c);
    iv[28..].copy_from_slice(&new_nonce[..4]);

    (key, iv)
}

/// Compute the 16-byte outcome hash binding a DH result message to this
/// handshake attempt.
///
/// The server proves which outcome it chose (ok / retry / fail map to
/// selector 1 / 2 / 3) by hashing
/// `new_nonce || selector || SHA1(auth_key)[0..8]` and sending the last
/// 16 bytes of the digest.
#[must_use]
pub fn dh_outcome_hash(new_nonce: &[u8; 32], selector: u8, auth_key_sha: &[u8; 20]) -> [u8; 16] {
    let digest = sha1_concat(&[new_nonce, &[selector], &auth_key_sha[..8]]);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[4..]);
    out
}

/// Verify a hash-prefixed plaintext whose true length is ambiguous due to
/// block padding.
///
/// The first 20 bytes are a claimed SHA-1 of the remainder, but the
/// remainder carries up to 15 trailing padding bytes. Re-hashes with 0..=15
/// bytes trimmed from the end and returns the verified payload length
/// (excluding the digest prefix) for the first trim that matches, or `None`
/// if no trim does.
#[must_use]
pub fn verify_trimmed_hash(data: &[u8]) -> Option<usize> {
    if data.len() < SHA1_LEN + 1 {
        return None;
    }
    let (claimed, body) = data.split_at(SHA1_LEN);
    for trim in 0..16usize {
        if trim >= body.len() {
            break;
        }
        let candidate = &body[..body.len() - trim];
        if sha1(candidate).as_slice() == claimed {
            return Some(candidate.len());
        }
    }
    None
}

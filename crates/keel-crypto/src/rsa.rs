//! Raw RSA encryption against the embedded server public key table.
//!
//! The handshake does not use any standard RSA padding scheme: the payload
//! is prefixed with its own SHA-1 digest, filled with random bytes to
//! exactly 255 bytes and run through a bare `m^e mod n`. Key selection is
//! by fingerprint, the low 64 bits of the SHA-1 of the wire serialization
//! of `(modulus, exponent)`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use num_bigint::BigUint;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::random::fill_random;
use crate::sha::{sha1, sha1_concat};
use crate::{RSA_BLOCK_LEN, SHA1_LEN};

/// Maximum payload the hash-prefixed 255-byte wrapping can carry.
pub const MAX_INNER_LEN: usize = 255 - SHA1_LEN;

/// A server RSA public key with its precomputed fingerprint.
#[derive(Debug, Clone)]
pub struct ServerKey {
    n: BigUint,
    e: BigUint,
    fingerprint: i64,
}

impl ServerKey {
    /// Parse a PEM-encoded `RSA PUBLIC KEY` block (PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedKey`] on any structural problem in
    /// the PEM framing or the DER payload.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let body: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let der = BASE64
            .decode(body.trim())
            .map_err(|_| CryptoError::MalformedKey("bad base64"))?;
        let (n_bytes, e_bytes) = parse_pkcs1(&der)?;
        Ok(Self::from_parts(&n_bytes, &e_bytes))
    }

    /// Build a key from raw big-endian modulus and exponent bytes.
    #[must_use]
    pub fn from_parts(n_bytes: &[u8], e_bytes: &[u8]) -> Self {
        Self {
            n: BigUint::from_bytes_be(n_bytes),
            e: BigUint::from_bytes_be(e_bytes),
            fingerprint: compute_fingerprint(n_bytes, e_bytes),
        }
    }

    /// The key fingerprint servers use to reference this key.
    #[must_use]
    pub fn fingerprint(&self) -> i64 {
        self.fingerprint
    }

    /// Encrypt a hash-prefixed, random-padded payload with bare modular
    /// exponentiation, producing exactly 256 bytes (left-zero-padded).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::PayloadTooLarge`] if `inner` exceeds
    /// [`MAX_INNER_LEN`], or [`CryptoError::RandomFailed`] if padding
    /// bytes cannot be generated.
    pub fn encrypt_padded(&self, inner: &[u8]) -> Result<[u8; RSA_BLOCK_LEN], CryptoError> {
        if inner.len() > MAX_INNER_LEN {
            return Err(CryptoError::PayloadTooLarge(inner.len()));
        }
        let mut block = Zeroizing::new([0u8; 255]);
        block[..SHA1_LEN].copy_from_slice(&sha1(inner));
        block[SHA1_LEN..SHA1_LEN + inner.len()].copy_from_slice(inner);
        fill_random(&mut block[SHA1_LEN + inner.len()..])?;

        let m = BigUint::from_bytes_be(&block[..]);
        let c = m.modpow(&self.e, &self.n);
        let bytes = c.to_bytes_be();

        let mut out = [0u8; RSA_BLOCK_LEN];
        out[RSA_BLOCK_LEN - bytes.len()..].copy_from_slice(&bytes);
        Ok(out)
    }
}

/// The embedded table of known server public keys.
#[derive(Debug, Clone)]
pub struct Keyring {
    keys: Vec<ServerKey>,
}

impl Keyring {
    /// Build a keyring from an explicit key list.
    #[must_use]
    pub fn new(keys: Vec<ServerKey>) -> Self {
        Self { keys }
    }

    /// The bundled production key table.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedKey`] if any embedded PEM fails to
    /// parse (a build defect, not a runtime condition).
    pub fn bundled() -> Result<Self, CryptoError> {
        let keys = BUNDLED_KEYS
            .iter()
            .map(|pem| ServerKey::from_pem(pem))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }

    /// Select the first local key whose fingerprint appears in the
    /// server-offered list.
    #[must_use]
    pub fn select(&self, offered: &[i64]) -> Option<&ServerKey> {
        offered
            .iter()
            .find_map(|fp| self.keys.iter().find(|key| key.fingerprint == *fp))
    }
}

/// Compute a key fingerprint: the last 8 bytes (little-endian `i64`) of
/// the SHA-1 of the wire serialization of `(modulus, exponent)` as
/// compact byte strings.
#[must_use]
pub fn compute_fingerprint(n_bytes: &[u8], e_bytes: &[u8]) -> i64 {
    let digest = sha1_concat(&[&wire_bytes(n_bytes), &wire_bytes(e_bytes)]);
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[12..]);
    i64::from_le_bytes(tail)
}

/// Compact byte-string encoding: one length byte below 254, otherwise
/// `0xFE` plus a 3-byte little-endian length; data zero-padded to a
/// 4-byte boundary.
fn wire_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 8);
    if data.len() < 254 {
        out.push(data.len() as u8);
    } else {
        out.push(0xFE);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes()[..3]);
    }
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out
}

/// Minimal DER parse of a PKCS#1 `RSAPublicKey`: a SEQUENCE of two
/// INTEGERs. Leading zero sign bytes are stripped from both.
fn parse_pkcs1(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let (tag, seq, rest) = read_tlv(der)?;
    if tag != 0x30 || !rest.is_empty() {
        return Err(CryptoError::MalformedKey("expected a single SEQUENCE"));
    }
    let (n_tag, n_raw, after_n) = read_tlv(seq)?;
    let (e_tag, e_raw, after_e) = read_tlv(after_n)?;
    if n_tag != 0x02 || e_tag != 0x02 || !after_e.is_empty() {
        return Err(CryptoError::MalformedKey("expected two INTEGERs"));
    }
    Ok((strip_sign(n_raw).to_vec(), strip_sign(e_raw).to_vec()))
}

fn strip_sign(int_bytes: &[u8]) -> &[u8] {
    if int_bytes.len() > 1 && int_bytes[0] == 0 {
        &int_bytes[1..]
    } else {
        int_bytes
    }
}

fn read_tlv(data: &[u8]) -> Result<(u8, &[u8], &[u8]), CryptoError> {
    if data.len() < 2 {
        return Err(CryptoError::MalformedKey("truncated DER"));
    }
    let tag = data[0];
    let (len, header) = if data[1] & 0x80 == 0 {
        (data[1] as usize, 2)
    } else {
        let len_bytes = (data[1] & 0x7F) as usize;
        if len_bytes == 0 || len_bytes > 4 || data.len() < 2 + len_bytes {
            return Err(CryptoError::MalformedKey("bad DER length"));
        }
        let mut len = 0usize;
        for b in &data[2..2 + len_bytes] {
            len = (len << 8) | *b as usize;
        }
        (len, 2 + len_bytes)
    };
    if data.len() < header + len {
        return Err(CryptoError::MalformedKey("truncated DER value"));
    }
    Ok((tag, &data[header..header + len], &data[header + len..]))
}

const BUNDLED_KEYS: [&str; 4] = [
    "-----BEGIN RSA PUBLIC KEY-----\n\
     MIIBCgKCAQEAwVACPi9w23mF3tBkdZz+zwrzKOaaQdr01vAbU4E1pvkfj4sqDsm6\n\
     lyDONS789sVoD/xCS9Y0hkkC3gtL1tSfTlgCMOOul9lcixlEKzwKENj1Yz/s7daS\n\
     an9tqw3bfUV/nqgbhGX81v/+7RFAEd+RwFnK7a+XYl9sluzHRyVVaTTveB2GazTw\n\
     Efzk2DWgkBluml8OREmvfraX3bkHZJTKX4EQSjBbbdJ2ZXIsRrYOXfaA+xayEGB+\n\
     8hdlLmAjbCVfaigxX0CDqWeR1yFL9kwd9P0NsZRPsmoqVwMbMu7mStFai6aIhc3n\n\
     Slv8kg9qv1m6XHVQY3PnEw+QQtqSIXklHwIDAQAB\n\
     -----END RSA PUBLIC KEY-----",
    "-----BEGIN RSA PUBLIC KEY-----\n\
     MIIBCgKCAQEAxq7aeLAqJR20tkQQMfRn+ocfrtMlJsQ2Uksfs7Xcoo77jAid0bRt\n\
     ksiVmT2HEIJUlRxfABoPBV8wY9zRTUMaMA654pUX41mhyVN+XoerGxFvrs9dF1Ru\n\
     vCHbI02dM2ppPvyytvvMoefRoL5BTcpAihFgm5xCaakgsJ/tH5oVl74CdhQw8J5L\n\
     xI/K++KJBUyZ26Uba1632cOiq05JBUW0Z2vWIOk4BLysk7+U9z+SxynKiZR3/xdi\n\
     XvFKk01R3BHV+GUKM2RYazpS/P8v7eyKhAbKxOdRcFpHLlVwfjyM1VlDQrEZxsMp\n\
     NTLYXb6Sce1Uov0YtNx5wEowlREH1WOTlwIDAQAB\n\
     -----END RSA PUBLIC KEY-----",
    "-----BEGIN RSA PUBLIC KEY-----\n\
     MIIBCgKCAQEAsQZnSWVZNfClk29RcDTJQ76n8zZaiTGuUsi8sUhW8AS4PSbPKDm+\n\
     DyJgdHDWdIF3HBzl7DHeFrILuqTs0vfS7Pa2NW8nUBwiaYQmPtwEa4n7bTmBVGsB\n\
     1700/tz8wQWOLUlL2nMv+BPlDhxq4kmJCyJfgrIrHlX8sGPcPA4Y6Rwo0MSqYn3s\n\
     g1Pu5gOKlaT9HKmE6wn5Sut6IiBjWozrRQ6n5h2RXNtO7O2qCDqjgB2vBxhV7B+z\n\
     hRbLbCmW0tYMDsvPpX5M8fsO05svN+lKtCAuz1leFns8piZpptpSCFn7bWxiA9/f\n\
     x5x17D7pfah3Sy2pA+NDXyzSlGcKdaUmwQIDAQAB\n\
     -----END RSA PUBLIC KEY-----",
    "-----BEGIN RSA PUBLIC KEY-----\n\
     MIIBCgKCAQEAwqjFW0pi4reKGbkc9pK83Eunwj/k0G8ZTioMMPbZmW99GivMibwa\n\
     xDM9RDWabEMyUtGoQC2ZcDeLWRK3W8jMP6dnEKAlvLkDLfC4fXYHzFO5KHEqF06i\n\
     qAqBdmI1iBGdQv/OQCBcbXIWCGDY2AsiqLhlGQfPOI7/vvKc188rTriocgUtoTUc\n\
     /n/sIUzkgwTqRyvWYynWARWzQg0I9olLBBC2q5RQJJlnYXZwyTL3y9tdb7zOHkks\n\
     WV9IMQmZmyZh/N7sMbGWQpt4NMchGpPGeJ2e5gHBjDnlIf2p1yZOYeUYrdbwcS0t\n\
     UiggS4UeE8TzIuXFQxw7fzEIlmhIaq3FnwIDAQAB\n\
     -----END RSA PUBLIC KEY-----",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_keys_parse() {
        let ring = Keyring::bundled().unwrap();
        assert_eq!(ring.keys.len(), 4);
        for key in &ring.keys {
            assert_eq!(key.n.bits(), 2048);
            assert_eq!(key.e, BigUint::from(65537u32));
        }
    }

    #[test]
    fn test_bundled_fingerprints_are_distinct() {
        let ring = Keyring::bundled().unwrap();
        for a in 0..ring.keys.len() {
            for b in a + 1..ring.keys.len() {
                assert_ne!(ring.keys[a].fingerprint, ring.keys[b].fingerprint);
            }
        }
    }

    #[test]
    fn test_select_by_fingerprint() {
        let ring = Keyring::bundled().unwrap();
        let wanted = ring.keys[2].fingerprint;
        let offered = [0x1234_5678_9ABC_DEF0_i64, wanted];
        let key = ring.select(&offered).unwrap();
        assert_eq!(key.fingerprint(), wanted);
        assert!(ring.select(&[0x1111_2222_3333_4444]).is_none());
    }

    #[test]
    fn test_encrypt_padded_output_size() {
        let ring = Keyring::bundled().unwrap();
        let out = ring.keys[0].encrypt_padded(b"inner data").unwrap();
        assert_eq!(out.len(), RSA_BLOCK_LEN);
        // Raw RSA of a random-padded block is overwhelmingly non-zero
        assert!(out.iter().any(|b| *b != 0));
    }

    #[test]
    fn test_encrypt_rejects_oversized_payload() {
        let ring = Keyring::bundled().unwrap();
        let too_big = vec![0u8; MAX_INNER_LEN + 1];
        assert!(matches!(
            ring.keys[0].encrypt_padded(&too_big),
            Err(CryptoError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_wire_bytes_short_and_long_forms() {
        let short = wire_bytes(&[1, 2, 3]);
        assert_eq!(short, vec![3, 1, 2, 3]);
        let long = wire_bytes(&[0xAA; 256]);
        assert_eq!(&long[..4], &[0xFE, 0x00, 0x01, 0x00]);
        assert_eq!(long.len(), 260);
    }
}

//! Diffie-Hellman parameter validation and auth key derivation helpers.
//!
//! The server dictates the DH group, so every parameter it sends is treated
//! as hostile until proven otherwise: the modulus must be a 2048-bit safe
//! prime whose residue mod 4g matches the generator, and the public values
//! must sit far from the group edges to rule out small-subgroup tricks.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};

use crate::error::CryptoError;
use crate::sha::sha1;
use crate::AUTH_KEY_LEN;

/// Hex encoding of the known-good 2048-bit DH modulus. Matching it skips
/// the expensive primality checks.
pub const GOOD_PRIME_HEX: &str = "c71caeb9c6b1c9048e6c522f70f13f73980d40238e3e21c14934d037563d930f48198a0aa7c14058229493d22530f4dbfa336f6e0ac925139543aed44cce7c3720fd51f69458705ac68cd4fe6b6b13abdc9746512969328454f18faf8c595f642477fe96bb2a941d5bcd1d4ac8cc49880708fa9b378e3c4f3a9060bee67cf9a4a4a695811051907e162753b56b0f6b410dba74d8a84b2a14b3144e0ef1284754fd17ed950d5965b4b9dd46582db1178d169c6bc465b0d6ff9ca3928fef5b9ae4e418fc15e83ebea0f87fa9ff5eed70050ded2849f47bf959d956850ce929851f0d8115f635b105ee2e4e15d04b2454bf6f4fadf034b10403119cd8e3b92fcc5b";

const PRIME_BITS: u64 = 2048;
const EDGE_MARGIN_BITS: u64 = 64;
const MILLER_RABIN_ROUNDS: u32 = 30;

/// Validate a server-supplied DH modulus and generator.
///
/// Accepts only a 2048-bit prime `p` with `g` in `2..=7`, the residue of
/// `p mod 4g` consistent with `g`, and `(p - 1) / 2` prime as well. The
/// known-good modulus is accepted without re-running the primality tests.
#[must_use]
pub fn is_good_prime(p: &BigUint, g: u32) -> bool {
    if !(2..=7).contains(&g) || p.bits() != PRIME_BITS {
        return false;
    }

    if p.to_str_radix(16) == GOOD_PRIME_HEX {
        return true;
    }

    let x = (p % (4u32 * g)).to_u64_digits().first().copied().unwrap_or(0);
    let residue_ok = match g {
        2 => x == 7,
        3 => x % 3 == 2,
        4 => true,
        5 => x % 5 == 1 || x % 5 == 4,
        6 => x == 19 || x == 23,
        7 => x % 7 == 3 || x % 7 == 5 || x % 7 == 6,
        _ => false,
    };
    if !residue_ok {
        return false;
    }

    if !is_probable_prime(p, MILLER_RABIN_ROUNDS) {
        return false;
    }
    let half = p >> 1;
    is_probable_prime(&half, MILLER_RABIN_ROUNDS)
}

/// Validate a DH public value (`g_a` from the server or our own `g_b`)
/// against the modulus.
///
/// The value must fit in 256 bytes, stay at least `2^(2048-64)` away from
/// both 0 and `p`, and be strictly below `p`.
#[must_use]
pub fn is_good_dh_value(value: &BigUint, p: &BigUint) -> bool {
    if value.bits() > PRIME_BITS || value.bits() < PRIME_BITS - EDGE_MARGIN_BITS {
        return false;
    }
    if value >= p {
        return false;
    }
    let diff = p - value;
    diff.bits() >= PRIME_BITS - EDGE_MARGIN_BITS
}

/// Normalize a big-endian DH result to exactly 256 bytes.
///
/// A 257-byte encoding carries a leading zero (a stripped two's-complement
/// sign byte); shorter encodings are left-zero-padded.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidLength`] if the value cannot fit in 256
/// bytes.
pub fn normalize_auth_key(bytes: &[u8]) -> Result<[u8; AUTH_KEY_LEN], CryptoError> {
    let trimmed = if bytes.len() == AUTH_KEY_LEN + 1 && bytes[0] == 0 {
        &bytes[1..]
    } else {
        bytes
    };
    if trimmed.len() > AUTH_KEY_LEN {
        return Err(CryptoError::InvalidLength {
            expected: AUTH_KEY_LEN,
            actual: bytes.len(),
        });
    }
    let mut key = [0u8; AUTH_KEY_LEN];
    key[AUTH_KEY_LEN - trimmed.len()..].copy_from_slice(trimmed);
    Ok(key)
}

/// Derive the 8-byte auth key identifier: the last 8 bytes of
/// `SHA1(auth_key)`, read as a little-endian `i64`.
#[must_use]
pub fn auth_key_id(auth_key: &[u8; AUTH_KEY_LEN]) -> i64 {
    let digest = sha1(auth_key);
    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[12..]);
    i64::from_le_bytes(id)
}

/// Miller-Rabin probabilistic primality test.
#[must_use]
pub fn is_probable_prime(n: &BigUint, rounds: u32) -> bool {
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);
    if n < &two {
        return false;
    }
    if n == &two || n == &three {
        return true;
    }
    if (n % 2u32).is_zero() {
        return false;
    }

    let one = BigUint::one();
    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut s = 0u64;
    while (&d % 2u32).is_zero() {
        d >>= 1;
        s += 1;
    }

    let mut rng = rand::thread_rng();
    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 0..s - 1 {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_prime() -> BigUint {
        BigUint::parse_bytes(GOOD_PRIME_HEX.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_known_prime_accepted_for_valid_generators() {
        let p = good_prime();
        for g in 2..=7 {
            assert!(is_good_prime(&p, g), "g = {g}");
        }
    }

    #[test]
    fn test_rejects_out_of_range_generator() {
        let p = good_prime();
        assert!(!is_good_prime(&p, 1));
        assert!(!is_good_prime(&p, 8));
    }

    #[test]
    fn test_rejects_wrong_size_modulus() {
        let small = BigUint::from(0xFFFF_FFFB_u32); // prime, but 32-bit
        assert!(!is_good_prime(&small, 3));
    }

    #[test]
    fn test_rejects_composite_of_right_size() {
        // Known prime with the low bit cleared: even, same bit length
        let p = good_prime() - 1u32;
        assert!(!is_good_prime(&p, 3));
    }

    #[test]
    fn test_dh_value_bounds() {
        let p = good_prime();
        // Comfortably in the middle of the group
        let mid = &p >> 1;
        assert!(is_good_dh_value(&mid, &p));
        // Too close to zero
        assert!(!is_good_dh_value(&BigUint::from(2u32), &p));
        // Too close to p
        let near_p = &p - 2u32;
        assert!(!is_good_dh_value(&near_p, &p));
        // Not below p
        assert!(!is_good_dh_value(&p, &p));
    }

    #[test]
    fn test_normalize_pads_short_values() {
        let short = vec![0xABu8; 255];
        let key = normalize_auth_key(&short).unwrap();
        assert_eq!(key[0], 0);
        assert_eq!(&key[1..], &short[..]);
    }

    #[test]
    fn test_normalize_keeps_exact_values() {
        let exact = vec![0xCDu8; 256];
        let key = normalize_auth_key(&exact).unwrap();
        assert_eq!(&key[..], &exact[..]);
    }

    #[test]
    fn test_normalize_strips_sign_byte() {
        let mut long = vec![0xEFu8; 257];
        long[0] = 0;
        let key = normalize_auth_key(&long).unwrap();
        assert_eq!(&key[..], &long[1..]);
    }

    #[test]
    fn test_normalize_rejects_oversized() {
        let mut long = vec![0xEFu8; 257];
        long[0] = 1;
        assert!(normalize_auth_key(&long).is_err());
        assert!(normalize_auth_key(&[1u8; 300]).is_err());
    }

    #[test]
    fn test_auth_key_id_is_digest_tail() {
        let key = [0x42u8; 256];
        let digest = crate::sha::sha1(&key);
        let id = auth_key_id(&key);
        assert_eq!(id.to_le_bytes()[..], digest[12..]);
    }

    proptest::proptest! {
        #[test]
        fn prop_normalize_preserves_value(data in proptest::collection::vec(0u8.., 1..=256)) {
            let key = normalize_auth_key(&data).unwrap();
            // Left-zero-padding never changes the integer value
            assert_eq!(
                BigUint::from_bytes_be(&key),
                BigUint::from_bytes_be(&data)
            );
        }
    }

    #[test]
    fn test_miller_rabin_small_numbers() {
        let primes = [2u32, 3, 5, 7, 11, 13, 104_729];
        let composites = [1u32, 4, 9, 15, 341, 561, 104_730];
        for p in primes {
            assert!(is_probable_prime(&BigUint::from(p), 20), "{p}");
        }
        for c in composites {
            assert!(!is_probable_prime(&BigUint::from(c), 20), "{c}");
        }
    }
}

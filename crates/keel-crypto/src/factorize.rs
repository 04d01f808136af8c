//! Factorization of 64-bit semiprimes.
//!
//! The server proves liveness by handing the client a composite `pq` of two
//! ~32-bit primes; the client must factor it before the handshake can
//! proceed. A Pollard-rho style cycle search is more than fast enough for
//! numbers of this size, but it is still CPU-bound work: callers run it on
//! a blocking worker, never on the protocol task.

use rand::Rng;

use crate::CryptoError;

/// Factor a 64-bit composite into its two prime factors, smaller first.
///
/// # Errors
///
/// Returns [`CryptoError::FactorizationFailed`] if no non-trivial factor is
/// found within the iteration budget. The caller treats this as a
/// restartable handshake fault, not a fatal error.
pub fn factorize(pq: u64) -> Result<(u32, u32), CryptoError> {
    if pq < 4 {
        return Err(CryptoError::FactorizationFailed(pq));
    }
    if pq % 2 == 0 {
        return split(pq, 2);
    }

    let mut rng = rand::thread_rng();
    let mut g: u64 = 0;
    let mut it: u32 = 0;

    let mut i = 0;
    while i < 3 || it < 1000 {
        let t: u64 = (rng.gen_range(0u64..16) + 17) % pq;
        let mut x: u64 = rng.gen_range(1..pq);
        let mut y = x;
        let lim = 1u32 << (i.min(13) + 18);
        for j in 1..lim {
            it += 1;
            // x = x^2 + t (mod pq)
            x = (((x as u128) * (x as u128) + t as u128) % pq as u128) as u64;
            let z = if x < y { pq + x - y } else { x - y };
            g = gcd(z, pq);
            if g != 1 {
                break;
            }
            if j & (j - 1) == 0 {
                y = x;
            }
        }
        if g > 1 && g < pq {
            break;
        }
        i += 1;
    }

    if g > 1 && g < pq {
        split(pq, g)
    } else {
        Err(CryptoError::FactorizationFailed(pq))
    }
}

fn split(pq: u64, g: u64) -> Result<(u32, u32), CryptoError> {
    let other = pq / g;
    let (p, q) = if g < other { (g, other) } else { (other, g) };
    if p > u64::from(u32::MAX) || q > u64::from(u32::MAX) {
        return Err(CryptoError::FactorizationFailed(pq));
    }
    Ok((p as u32, q as u32))
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

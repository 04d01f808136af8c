//! Error types for KEEL cryptographic primitives.

use thiserror::Error;

/// Cryptographic operation errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// OS CSPRNG failure
    #[error("random number generation failed")]
    RandomFailed,

    /// Factorization gave up on the composite
    #[error("factorization failed for {0}")]
    FactorizationFailed(u64),

    /// Input length not usable by the primitive
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Embedded public key could not be parsed
    #[error("malformed server public key: {0}")]
    MalformedKey(&'static str),

    /// Payload too large for the RSA wrapping scheme
    #[error("payload too large for RSA block: {0} bytes")]
    PayloadTooLarge(usize),
}

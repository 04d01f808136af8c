//! AES-256 in IGE (Infinite Garble Extension) mode.
//!
//! IGE chains both the previous ciphertext and the previous plaintext block
//! into each encryption, so a single corrupted block garbles everything
//! after it. No RustCrypto crate ships this mode, so it is built here
//! directly on the `aes` block cipher:
//!
//! ```text
//! c[i] = E(p[i] ^ c[i-1]) ^ p[i-1]        c[-1] = iv[0..16], p[-1] = iv[16..32]
//! p[i] = D(c[i] ^ p[i-1]) ^ c[i-1]
//! ```

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::CryptoError;

const BLOCK: usize = 16;

/// Encrypt `data` in place with AES-256-IGE.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidLength`] unless `data` is a non-empty
/// multiple of the 16-byte block size.
pub fn ige_encrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<(), CryptoError> {
    check_len(data)?;
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; BLOCK];
    let mut prev_plain = [0u8; BLOCK];
    prev_cipher.copy_from_slice(&iv[..BLOCK]);
    prev_plain.copy_from_slice(&iv[BLOCK..]);

    for chunk in data.chunks_exact_mut(BLOCK) {
        let mut plain = [0u8; BLOCK];
        plain.copy_from_slice(chunk);

        let mut block = [0u8; BLOCK];
        for i in 0..BLOCK {
            block[i] = plain[i] ^ prev_cipher[i];
        }
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut block));
        for i in 0..BLOCK {
            block[i] ^= prev_plain[i];
        }

        chunk.copy_from_slice(&block);
        prev_cipher = block;
        prev_plain = plain;
    }
    Ok(())
}

/// Decrypt `data` in place with AES-256-IGE.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidLength`] unless `data` is a non-empty
/// multiple of the 16-byte block size.
pub fn ige_decrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) -> Result<(), CryptoError> {
    check_len(data)?;
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; BLOCK];
    let mut prev_plain = [0u8; BLOCK];
    prev_cipher.copy_from_slice(&iv[..BLOCK]);
    prev_plain.copy_from_slice(&iv[BLOCK..]);

    for chunk in data.chunks_exact_mut(BLOCK) {
        let mut cipher_block = [0u8; BLOCK];
        cipher_block.copy_from_slice(chunk);

        let mut block = [0u8; BLOCK];
        for i in 0..BLOCK {
            block[i] = cipher_block[i] ^ prev_plain[i];
        }
        cipher.decrypt_block(GenericArray::from_mut_slice(&mut block));
        for i in 0..BLOCK {
            block[i] ^= prev_cipher[i];
        }

        chunk.copy_from_slice(&block);
        prev_cipher = cipher_block;
        prev_plain = block;
    }
    Ok(())
}

fn check_len(data: &[u8]) -> Result<(), CryptoError> {
    if data.is_empty() || data.len() % BLOCK != 0 {
        return Err(CryptoError::InvalidLength {
            expected: BLOCK,
            actual: data.len(),
        });
    }
    Ok(())
}

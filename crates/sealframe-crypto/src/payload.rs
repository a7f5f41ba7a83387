//! Payload encryption using AES-128-CTR.
//!
//! The 16-byte counter block is the 12-byte message nonce followed by a
//! 32-bit big-endian block counter starting at zero. No authentication tag
//! is produced: the surrounding message signature covers the ciphertext.

use aes::Aes128;
use ctr::{
    Ctr32BE,
    cipher::{KeyIvInit, StreamCipher},
};

use crate::{error::CryptoError, keys::SenderKey};

/// Payload nonce length.
pub const NONCE_SIZE: usize = 12;

type Aes128Ctr = Ctr32BE<Aes128>;

/// Normalize caller-provided nonce bytes to [`NONCE_SIZE`].
///
/// Longer input is truncated.
///
/// # Errors
///
/// - `NonceTooShort` if fewer than [`NONCE_SIZE`] bytes are given
pub fn nonce_from_slice(bytes: &[u8]) -> Result<[u8; NONCE_SIZE], CryptoError> {
    let Some(prefix) = bytes.get(..NONCE_SIZE) else {
        return Err(CryptoError::NonceTooShort { expected: NONCE_SIZE, actual: bytes.len() });
    };
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(prefix);
    Ok(nonce)
}

/// Encrypt `plaintext` under `key` and `nonce`.
///
/// The caller MUST NOT reuse a (key, nonce) pair: CTR mode leaks the XOR of
/// two plaintexts encrypted under the same keystream.
pub fn encrypt_payload(plaintext: &[u8], key: &SenderKey, nonce: &[u8; NONCE_SIZE]) -> Vec<u8> {
    let mut buf = plaintext.to_vec();
    apply_keystream(key.as_bytes(), &counter_block(nonce), &mut buf);
    buf
}

/// Decrypt raw payload bytes. CTR is symmetric, so this cannot fail.
pub fn decrypt_payload(ciphertext: &[u8], key: &SenderKey, nonce: &[u8; NONCE_SIZE]) -> Vec<u8> {
    let mut buf = ciphertext.to_vec();
    apply_keystream(key.as_bytes(), &counter_block(nonce), &mut buf);
    buf
}

/// Decrypt a payload and require the result to be UTF-8 text.
///
/// # Errors
///
/// - `DecodeFailure` if the plaintext is not valid UTF-8, which happens with
///   high probability under a wrong key or nonce
pub fn decrypt_text(
    ciphertext: &[u8],
    key: &SenderKey,
    nonce: &[u8; NONCE_SIZE],
) -> Result<String, CryptoError> {
    String::from_utf8(decrypt_payload(ciphertext, key, nonce)).map_err(|_| CryptoError::DecodeFailure)
}

fn counter_block(nonce: &[u8; NONCE_SIZE]) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[..NONCE_SIZE].copy_from_slice(nonce);
    block
}

fn apply_keystream(key: &[u8; 16], counter_block: &[u8; 16], buf: &mut [u8]) {
    let mut cipher = Aes128Ctr::new(key.into(), counter_block.into());
    cipher.apply_keystream(buf);
}

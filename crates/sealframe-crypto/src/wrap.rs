//! Sender key wrapping using AES-128-CBC.
//!
//! Keys are concatenated and encrypted without padding (the input is always
//! a whole number of 16-byte blocks). The IV binds the wrapped blob to the
//! receiving handle and the message nonce:
//!
//! ```text
//! IV = SHA-256(receiver_handle || nonce)[..16]
//! ```
//!
//! The receiving handle is always the party the keys are addressed to. A
//! sender re-reading its own message therefore derives the IV from the
//! recipient's handle, not its own.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use sha2::{Digest, Sha256};

use crate::{
    error::CryptoError,
    keys::{KEY_SIZE, KeyEncryptionKey, SenderKey},
    payload::NONCE_SIZE,
};

/// CBC initialization vector length.
pub const IV_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Derive the wrapping IV for `receiver` and `nonce`.
pub fn derive_wrap_iv(receiver: &[u8], nonce: &[u8; NONCE_SIZE]) -> [u8; IV_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(receiver);
    hasher.update(nonce);
    let digest = hasher.finalize();

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&digest[..IV_SIZE]);
    iv
}

/// Wrap `keys` for `receiver` under the pairwise `kek`.
pub fn wrap_keys(
    keys: &[SenderKey],
    nonce: &[u8; NONCE_SIZE],
    receiver: &[u8],
    kek: &KeyEncryptionKey,
) -> Vec<u8> {
    debug_assert!(!keys.is_empty(), "wrapping an empty key list");

    let plaintext: Vec<u8> = keys.iter().flat_map(|key| *key.as_bytes()).collect();
    let iv = derive_wrap_iv(receiver, nonce);
    cbc_encrypt(&kek.wrapping_key(), &iv, &plaintext)
}

/// Unwrap keys addressed to `receiver`.
///
/// # Errors
///
/// - `LengthMismatch` if `wrapped` is empty or not a multiple of 16 bytes
pub fn unwrap_keys(
    wrapped: &[u8],
    nonce: &[u8; NONCE_SIZE],
    receiver: &[u8],
    kek: &KeyEncryptionKey,
) -> Result<Vec<SenderKey>, CryptoError> {
    if wrapped.is_empty() || wrapped.len() % KEY_SIZE != 0 {
        return Err(CryptoError::LengthMismatch { len: wrapped.len(), block: KEY_SIZE });
    }

    let iv = derive_wrap_iv(receiver, nonce);
    let plaintext = cbc_decrypt(&kek.wrapping_key(), &iv, wrapped)?;

    plaintext
        .chunks_exact(KEY_SIZE)
        .map(|chunk| {
            SenderKey::from_slice(chunk)
                .ok_or(CryptoError::LengthMismatch { len: plaintext.len(), block: KEY_SIZE })
        })
        .collect()
}

fn cbc_encrypt(key: &[u8; 16], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<NoPadding>(plaintext)
}

fn cbc_decrypt(key: &[u8; 16], iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CryptoError::LengthMismatch { len: ciphertext.len(), block: KEY_SIZE })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_kek(seed: u8) -> KeyEncryptionKey {
        KeyEncryptionKey::new([seed; 32])
    }

    #[test]
    fn aes_cbc_known_answer() {
        // NIST SP 800-38A, F.2.1 CBC-AES128.Encrypt, block #1
        let key: [u8; 16] = hex::decode("2b7e151628aed2a6abf7158809cf4f3c")
            .unwrap()
            .try_into()
            .unwrap();
        let iv: [u8; 16] = hex::decode("000102030405060708090a0b0c0d0e0f")
            .unwrap()
            .try_into()
            .unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let ciphertext = cbc_encrypt(&key, &iv, &plaintext);
        assert_eq!(hex::encode(&ciphertext), "7649abac8119b246cee98e9b12e9197d");
        assert_eq!(cbc_decrypt(&key, &iv, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn iv_depends_on_receiver_and_nonce() {
        let nonce = [0x01; NONCE_SIZE];
        let a = derive_wrap_iv(b"alice", &nonce);
        let b = derive_wrap_iv(b"bob", &nonce);
        let c = derive_wrap_iv(b"alice", &[0x02; NONCE_SIZE]);

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_wrap_iv(b"alice", &nonce));
    }

    #[test]
    fn wrap_unwrap_two_keys() {
        let keys = [SenderKey::from_bytes([0x11; 16]), SenderKey::from_bytes([0x22; 16])];
        let nonce = [0x33; NONCE_SIZE];
        let kek = test_kek(0x44);

        let wrapped = wrap_keys(&keys, &nonce, b"bob", &kek);
        assert_eq!(wrapped.len(), 32);

        let unwrapped = unwrap_keys(&wrapped, &nonce, b"bob", &kek).unwrap();
        assert_eq!(unwrapped, keys);
    }

    #[test]
    fn wrong_receiver_yields_different_keys() {
        let keys = [SenderKey::from_bytes([0x11; 16])];
        let nonce = [0x33; NONCE_SIZE];
        let kek = test_kek(0x44);

        let wrapped = wrap_keys(&keys, &nonce, b"bob", &kek);
        let unwrapped = unwrap_keys(&wrapped, &nonce, b"carol", &kek).unwrap();
        assert_ne!(unwrapped, keys);
    }

    #[test]
    fn unwrap_rejects_partial_blocks() {
        let kek = test_kek(0x01);
        let nonce = [0; NONCE_SIZE];

        for len in [0usize, 1, 15, 17, 31] {
            let result = unwrap_keys(&vec![0u8; len], &nonce, b"bob", &kek);
            assert_eq!(result, Err(CryptoError::LengthMismatch { len, block: 16 }));
        }
    }
}

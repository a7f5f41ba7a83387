//! Symmetric key types.

use std::fmt;

use zeroize::Zeroize;

/// AES-128 key length.
pub const KEY_SIZE: usize = 16;

/// A participant's 16-byte symmetric sender key.
///
/// Issued once per rotation and never mutated afterwards. Key material is
/// zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SenderKey([u8; KEY_SIZE]);

impl SenderKey {
    /// Wrap raw key bytes. Callers supply fresh random bytes for new keys.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build from a slice. `None` unless exactly [`KEY_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; KEY_SIZE]>::try_from(bytes).ok().map(Self)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl Drop for SenderKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SenderKey(..)")
    }
}

/// Pairwise key-encryption-key: SHA-256 of an X25519 shared secret.
///
/// Only the first 16 bytes are used, as the AES-128 key for wrapping sender
/// keys.
pub struct KeyEncryptionKey([u8; 32]);

impl KeyEncryptionKey {
    pub(crate) fn new(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Full 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// AES-128 key used for wrapping (first 16 bytes of the digest).
    pub fn wrapping_key(&self) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&self.0[..KEY_SIZE]);
        key
    }
}

impl Drop for KeyEncryptionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyEncryptionKey(..)")
    }
}

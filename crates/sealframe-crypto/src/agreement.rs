//! X25519 key agreement for pairwise key-encryption-keys.

use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{error::CryptoError, keys::KeyEncryptionKey};

/// Derive the pairwise key-encryption-key shared with a peer.
///
/// Computes `SHA-256(X25519(own_secret, peer_public))`. Both parties derive
/// the same value from their own secret and the other's public key, so a
/// sender can unwrap keys it wrapped for a recipient.
///
/// # Errors
///
/// - `WeakPeerKey` if the peer key is a low-order point, which would make
///   the shared secret independent of `own_secret`
pub fn derive_shared_key(
    own_secret: &StaticSecret,
    peer_public: &[u8; 32],
) -> Result<KeyEncryptionKey, CryptoError> {
    let shared = own_secret.diffie_hellman(&PublicKey::from(*peer_public));
    if !shared.was_contributory() {
        return Err(CryptoError::WeakPeerKey);
    }

    let digest: [u8; 32] = Sha256::digest(shared.as_bytes()).into();
    Ok(KeyEncryptionKey::new(digest))
}

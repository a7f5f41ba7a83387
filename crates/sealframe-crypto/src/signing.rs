//! Ed25519 detached signatures over message content.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Ed25519 public key length.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature length.
pub const SIGNATURE_SIZE: usize = 64;

/// Sign `content` with the participant's long-term signing key.
pub fn sign(content: &[u8], signing_key: &SigningKey) -> [u8; SIGNATURE_SIZE] {
    signing_key.sign(content).to_bytes()
}

/// Verify a detached signature.
///
/// Returns `false` for a bad signature and for public key bytes that do not
/// decode to a curve point; callers treat both as a forged message.
pub fn verify(
    content: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
    public_key: &[u8; PUBLIC_KEY_SIZE],
) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    verifying_key.verify(content, &Signature::from_bytes(signature)).is_ok()
}

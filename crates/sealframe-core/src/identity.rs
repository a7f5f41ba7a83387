//! Participant handles and long-term identity keys.

use std::fmt;

use ed25519_dalek::SigningKey;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::env::Environment;

/// Opaque user handle identifying a chat participant.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserHandle(String);

impl UserHandle {
    /// Create a handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Handle as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Handle bytes, as carried in RECIPIENT records and IV derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for UserHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_owned())
    }
}

impl From<String> for UserHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

impl fmt::Debug for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserHandle({:?})", self.0)
    }
}

impl fmt::Display for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A participant's long-term key material.
///
/// The X25519 secret derives pairwise key-encryption-keys; the Ed25519 key
/// signs outgoing messages. Both zeroize on drop via their dalek types.
pub struct Identity {
    handle: UserHandle,
    chat_secret: StaticSecret,
    signing_key: SigningKey,
}

impl Identity {
    /// Build an identity from raw secret key bytes.
    pub fn from_secrets(
        handle: UserHandle,
        chat_secret: [u8; 32],
        signing_secret: [u8; 32],
    ) -> Self {
        Self {
            handle,
            chat_secret: StaticSecret::from(chat_secret),
            signing_key: SigningKey::from_bytes(&signing_secret),
        }
    }

    /// Generate fresh key material from the environment's RNG.
    pub fn generate(handle: UserHandle, env: &impl Environment) -> Self {
        let chat_secret: [u8; 32] = env.random_array();
        let signing_secret: [u8; 32] = env.random_array();
        Self::from_secrets(handle, chat_secret, signing_secret)
    }

    /// The participant's handle.
    pub fn handle(&self) -> &UserHandle {
        &self.handle
    }

    /// Public Curve25519 key to publish in the key directory.
    pub fn public_chat_key(&self) -> [u8; 32] {
        PublicKey::from(&self.chat_secret).to_bytes()
    }

    /// Public Ed25519 key to publish in the key directory.
    pub fn public_signing_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub(crate) fn chat_secret(&self) -> &StaticSecret {
        &self.chat_secret
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity").field("handle", &self.handle).finish_non_exhaustive()
    }
}

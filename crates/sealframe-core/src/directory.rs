//! Public key directory interface.
//!
//! Resolving a handle to its long-term public keys (fetching, caching,
//! trust decisions) is the job of an external collaborator. The handler
//! only needs synchronous lookups of keys the application already holds.

use std::{collections::HashMap, sync::Arc};

use crate::identity::{Identity, UserHandle};

/// Synchronous lookup of participants' long-term public keys.
pub trait KeyDirectory {
    /// Curve25519 public key used for key agreement. `None` if unknown.
    fn public_chat_key(&self, handle: &UserHandle) -> Option<[u8; 32]>;

    /// Ed25519 public key used to verify signatures. `None` if unknown.
    fn public_signing_key(&self, handle: &UserHandle) -> Option<[u8; 32]>;
}

impl<T: KeyDirectory + ?Sized> KeyDirectory for &T {
    fn public_chat_key(&self, handle: &UserHandle) -> Option<[u8; 32]> {
        (**self).public_chat_key(handle)
    }

    fn public_signing_key(&self, handle: &UserHandle) -> Option<[u8; 32]> {
        (**self).public_signing_key(handle)
    }
}

impl<T: KeyDirectory + ?Sized> KeyDirectory for Arc<T> {
    fn public_chat_key(&self, handle: &UserHandle) -> Option<[u8; 32]> {
        (**self).public_chat_key(handle)
    }

    fn public_signing_key(&self, handle: &UserHandle) -> Option<[u8; 32]> {
        (**self).public_signing_key(handle)
    }
}

/// Public keys published by one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKeys {
    /// Curve25519 key agreement key
    pub chat: [u8; 32],
    /// Ed25519 signature verification key
    pub signing: [u8; 32],
}

/// In-memory directory, populated by the application.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    keys: HashMap<UserHandle, PublicKeys>,
}

impl MemoryDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a participant's public keys.
    pub fn insert(&mut self, handle: UserHandle, keys: PublicKeys) {
        self.keys.insert(handle, keys);
    }

    /// Register the public half of a local identity.
    pub fn publish(&mut self, identity: &Identity) {
        self.insert(
            identity.handle().clone(),
            PublicKeys {
                chat: identity.public_chat_key(),
                signing: identity.public_signing_key(),
            },
        );
    }

    /// Forget a participant.
    pub fn remove(&mut self, handle: &UserHandle) -> Option<PublicKeys> {
        self.keys.remove(handle)
    }

    /// Number of known participants.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no participants are known.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyDirectory for MemoryDirectory {
    fn public_chat_key(&self, handle: &UserHandle) -> Option<[u8; 32]> {
        self.keys.get(handle).map(|keys| keys.chat)
    }

    fn public_signing_key(&self, handle: &UserHandle) -> Option<[u8; 32]> {
        self.keys.get(handle).map(|keys| keys.signing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_exposes_identity_keys() {
        let identity = Identity::from_secrets(UserHandle::from("alice"), [1; 32], [2; 32]);
        let mut directory = MemoryDirectory::new();
        directory.publish(&identity);

        let handle = UserHandle::from("alice");
        assert_eq!(directory.public_chat_key(&handle), Some(identity.public_chat_key()));
        assert_eq!(directory.public_signing_key(&handle), Some(identity.public_signing_key()));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn unknown_handle_resolves_to_none() {
        let directory = MemoryDirectory::new();
        assert!(directory.is_empty());
        assert_eq!(directory.public_chat_key(&UserHandle::from("nobody")), None);
    }

    #[test]
    fn shared_directory_through_arc() {
        let mut directory = MemoryDirectory::new();
        directory.insert(UserHandle::from("bob"), PublicKeys { chat: [3; 32], signing: [4; 32] });
        let shared = Arc::new(directory);

        assert_eq!(shared.public_signing_key(&UserHandle::from("bob")), Some([4; 32]));

        fn chat_key_of(directory: impl KeyDirectory, handle: &str) -> Option<[u8; 32]> {
            directory.public_chat_key(&UserHandle::from(handle))
        }
        assert_eq!(chat_key_of(&*shared, "bob"), Some([3; 32]));
        assert_eq!(chat_key_of(shared, "bob"), Some([3; 32]));
    }
}

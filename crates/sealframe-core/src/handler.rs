//! Per-participant protocol handler.
//!
//! A [`ProtocolHandler`] owns one participant's sender key state and key
//! cache. It turns plaintext into signed wire messages and wire messages back
//! into plaintext. It performs no I/O: peer public keys come from a
//! [`KeyDirectory`], time and randomness from an [`Environment`].
//!
//! # Sender key lifecycle
//!
//! ```text
//!        new()                      rotate_key_every messages
//!          │                         or rotate_key()
//!          ▼                               │
//!   ┌─────────────┐   keyed message   ┌────▼────────┐
//!   │ current key ├──────────────────►│ delivered   │──► follow-ups
//!   │ not sent    │                   │ to all dest │
//!   └─────────────┘                   └─────────────┘
//! ```
//!
//! A rotated-out key is remembered as the previous key and is wrapped next to
//! the new one in the following keyed message, so recipients can still read
//! messages that were in flight under the old key.
//!
//! # Invariants
//!
//! - The current key is always present in the key store under the own handle.
//! - `encrypt_to*` either fails without touching rotation state or succeeds
//!   and increments the per-key message counter.
//! - `decrypt_from` mutates the key store only after the signature verified
//!   and every unwrapped key passed the conflict check.

use std::collections::BTreeSet;

use bytes::Bytes;
use sealframe_crypto::{
    KeyEncryptionKey, SenderKey, decrypt_text, derive_shared_key, encrypt_payload, sign,
    unwrap_keys, verify, wrap_keys,
};
use sealframe_proto::{KeyId, MAX_VALUE_LEN, MessageType, NONCE_SIZE, PROTOCOL_VERSION};

use crate::{
    config::HandlerConfig,
    directory::KeyDirectory,
    env::Environment,
    error::{ConfigError, HandlerError},
    identity::{Identity, UserHandle},
    key_store::ParticipantKeyStore,
    message::{self, KeyTransport, ParsedMessage},
};

/// A successfully verified and decrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    /// Participant that signed the message
    pub sender: UserHandle,
    /// Message kind from the MESSAGE_TYPE record
    pub message_type: MessageType,
    /// Decrypted text
    pub payload: String,
    /// Key id the payload was encrypted under
    pub key_id: KeyId,
}

/// Encrypts outgoing and decrypts incoming messages for one participant.
///
/// All mutating operations take `&mut self`; a handler belongs to a single
/// ordered sequence of operations and is never shared without a lock.
pub struct ProtocolHandler<E: Environment, D: KeyDirectory> {
    identity: Identity,
    env: E,
    directory: D,
    config: HandlerConfig,
    key_store: ParticipantKeyStore,
    current_key_id: KeyId,
    previous_key_id: Option<KeyId>,
    sent_key_id: Option<KeyId>,
    delivered_to: BTreeSet<UserHandle>,
    messages_since_rotation: u32,
}

impl<E: Environment, D: KeyDirectory> ProtocolHandler<E, D> {
    /// Create a handler with a freshly generated sender key.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if `config` does not validate
    pub fn new(
        identity: Identity,
        env: E,
        directory: D,
        config: HandlerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let key_id = KeyId::next(None, env.day_epoch());
        let key = SenderKey::from_bytes(env.random_array());
        let key_store = ParticipantKeyStore::with_key(identity.handle().clone(), key_id, key);

        tracing::debug!(
            handle = %identity.handle(),
            key_id = %key_id,
            rotate_key_every = config.rotate_key_every,
            "Created protocol handler"
        );

        Ok(Self {
            identity,
            env,
            directory,
            config,
            key_store,
            current_key_id: key_id,
            previous_key_id: None,
            sent_key_id: None,
            delivered_to: BTreeSet::new(),
            messages_since_rotation: 0,
        })
    }

    /// Own handle.
    pub fn handle(&self) -> &UserHandle {
        self.identity.handle()
    }

    /// Key id of the sender key used for the next message.
    pub fn current_key_id(&self) -> KeyId {
        self.current_key_id
    }

    /// Key id rotated out by the last rotation, if any.
    pub fn previous_key_id(&self) -> Option<KeyId> {
        self.previous_key_id
    }

    /// Key id last transported in a keyed message, cleared on rotation.
    pub fn sent_key_id(&self) -> Option<KeyId> {
        self.sent_key_id
    }

    /// Messages encrypted under the current key.
    pub fn messages_since_rotation(&self) -> u32 {
        self.messages_since_rotation
    }

    /// Read-only view of cached sender keys.
    pub fn key_store(&self) -> &ParticipantKeyStore {
        &self.key_store
    }

    /// Active configuration.
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Replace the current sender key.
    ///
    /// The old key becomes the previous key, the message counter resets and
    /// the next message to any destination is keyed.
    ///
    /// # Errors
    ///
    /// - `KeyConflict` if the next key id is already bound to another own key,
    ///   which only happens after 65536 rotations in one day. State is left
    ///   unchanged.
    pub fn rotate_key(&mut self) -> Result<KeyId, HandlerError> {
        let key_id = KeyId::next(Some(self.current_key_id), self.env.day_epoch());
        let key = SenderKey::from_bytes(self.env.random_array());
        self.key_store.insert(self.identity.handle(), key_id, key)?;

        tracing::debug!(
            handle = %self.identity.handle(),
            old_key_id = %self.current_key_id,
            new_key_id = %key_id,
            messages = self.messages_since_rotation,
            "Rotated sender key"
        );

        self.previous_key_id = Some(self.current_key_id);
        self.current_key_id = key_id;
        self.sent_key_id = None;
        self.delivered_to.clear();
        self.messages_since_rotation = 0;
        Ok(key_id)
    }

    /// Encrypt `plaintext` for a single destination.
    ///
    /// # Errors
    ///
    /// See [`Self::encrypt_to_group`].
    pub fn encrypt_to(
        &mut self,
        plaintext: &str,
        destination: &UserHandle,
    ) -> Result<Vec<u8>, HandlerError> {
        self.encrypt_to_group(plaintext, std::slice::from_ref(destination))
    }

    /// Encrypt `plaintext` into one message readable by every destination.
    ///
    /// The message is keyed (carries the wrapped sender key for each
    /// destination) unless the current key was already delivered to all of
    /// them, in which case a follow-up without key transport is emitted.
    /// Duplicate destinations are ignored.
    ///
    /// # Errors
    ///
    /// - `NoRecipients` if `destinations` is empty
    /// - `MessageTooLarge` if the plaintext or a handle exceeds a record
    /// - `UnknownPeerKey` / `InvalidPeerKey` if a destination's chat key is
    ///   missing or unusable. Nothing is rotated or counted in that case.
    pub fn encrypt_to_group(
        &mut self,
        plaintext: &str,
        destinations: &[UserHandle],
    ) -> Result<Vec<u8>, HandlerError> {
        let mut seen = BTreeSet::new();
        let destinations: Vec<&UserHandle> =
            destinations.iter().filter(|handle| seen.insert(*handle)).collect();
        if destinations.is_empty() {
            return Err(HandlerError::NoRecipients);
        }
        check_record_len(plaintext.len())?;
        for destination in &destinations {
            check_record_len(destination.as_bytes().len())?;
        }

        let rotate = self.messages_since_rotation >= self.config.rotate_key_every;
        let keyed = rotate
            || self.sent_key_id != Some(self.current_key_id)
            || destinations.iter().any(|handle| !self.delivered_to.contains(*handle));

        // Resolve every peer before mutating so a missing key leaves no trace
        let keks = if keyed {
            destinations
                .iter()
                .map(|handle| self.kek_with(handle))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        if rotate {
            self.rotate_key()?;
        }

        let key_id = self.current_key_id;
        let nonce: [u8; NONCE_SIZE] = self.env.random_array();
        let (key_ids, keys) = self.outgoing_keys(keyed)?;
        let ciphertext = encrypt_payload(plaintext.as_bytes(), &keys[0], &nonce);

        let key_transport: Vec<KeyTransport> = destinations
            .iter()
            .zip(&keks)
            .map(|(handle, kek)| KeyTransport {
                recipient: Bytes::copy_from_slice(handle.as_bytes()),
                wrapped_keys: Bytes::from(wrap_keys(&keys, &nonce, handle.as_bytes(), kek)),
            })
            .collect();

        let message_type = if keyed { MessageType::GroupKeyed } else { MessageType::GroupFollowup };
        let content = message::encode_signed_content(
            message_type,
            nonce,
            &key_transport,
            &key_ids,
            Bytes::from(ciphertext),
        )?;
        let signature = sign(&content, self.identity.signing_key());
        let wire = message::seal(signature, &content)?;

        self.messages_since_rotation = self.messages_since_rotation.saturating_add(1);
        if keyed {
            self.sent_key_id = Some(key_id);
            self.delivered_to.extend(destinations.iter().map(|handle| (*handle).clone()));
        }

        tracing::debug!(
            handle = %self.identity.handle(),
            key_id = %key_id,
            keyed,
            destinations = destinations.len(),
            len = wire.len(),
            "Encrypted message"
        );

        Ok(wire)
    }

    /// Verify and decrypt a message claimed to come from `sender`.
    ///
    /// Wrapped keys addressed to this participant are cached. A message this
    /// participant sent itself can be re-read through the wrapped keys of its
    /// first recipient.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` for framing or ordering violations
    /// - `UnsupportedVersion` for a foreign version byte
    /// - `UnknownPeerKey` if the sender's signing key is unknown
    /// - `InvalidSignature` if the signature does not verify
    /// - `LengthMismatch` if unwrapped keys do not match the key ids
    /// - `KeyConflict` if a key id is asserted with a second, different key
    /// - `UnknownSenderKey` if no key is known for the primary key id
    /// - `DecryptionFailed` if the payload does not decrypt to text
    pub fn decrypt_from(
        &mut self,
        wire: &[u8],
        sender: &UserHandle,
    ) -> Result<DecryptedMessage, HandlerError> {
        let message = ParsedMessage::parse(wire)?;
        if message.version != PROTOCOL_VERSION {
            return Err(HandlerError::UnsupportedVersion(message.version));
        }

        let signing_key = self
            .directory
            .public_signing_key(sender)
            .ok_or_else(|| HandlerError::UnknownPeerKey { handle: sender.clone() })?;
        if !verify(message.signed_content, &message.signature, &signing_key) {
            tracing::warn!(sender = %sender, "Rejected message with invalid signature");
            return Err(HandlerError::InvalidSignature { sender: sender.clone() });
        }

        let message_type = message.checked_message_type()?;
        let key_id = message.primary_key_id()?;

        if let Some(keys) = self.unwrap_transported_keys(&message, sender)? {
            if keys.len() != message.key_ids.len() {
                return Err(HandlerError::LengthMismatch {
                    reason: format!(
                        "{} keys unwrapped for {} key ids",
                        keys.len(),
                        message.key_ids.len()
                    ),
                });
            }

            let bindings = message.key_ids.iter().copied().zip(keys).collect();
            let added = self.key_store.commit(sender, bindings).inspect_err(|err| {
                tracing::warn!(sender = %sender, error = %err, "Rejected conflicting sender key");
            })?;

            tracing::debug!(sender = %sender, key_id = %key_id, added, "Cached sender keys");
        }

        let Some(key) = self.key_store.get(sender, key_id) else {
            return Err(HandlerError::UnknownSenderKey { participant: sender.clone(), key_id });
        };
        let payload = decrypt_text(&message.payload, key, &message.nonce)?;

        Ok(DecryptedMessage { sender: sender.clone(), message_type, payload, key_id })
    }

    /// Unwrap the key list addressed to this participant, if any.
    ///
    /// Inbound messages use the RECIPIENT entry matching the own handle. A
    /// self-sent message uses its first RECIPIENT as the other party.
    fn unwrap_transported_keys(
        &self,
        message: &ParsedMessage<'_>,
        sender: &UserHandle,
    ) -> Result<Option<Vec<SenderKey>>, HandlerError> {
        let recipients = message
            .key_transport
            .iter()
            .map(KeyTransport::recipient_handle)
            .collect::<Result<Vec<_>, _>>()?;

        let own = self.identity.handle();
        let (transport, other_party, receiver) = if sender == own {
            let Some((transport, recipient)) = message.key_transport.iter().zip(&recipients).next()
            else {
                return Ok(None);
            };
            (transport, recipient, recipient)
        } else {
            let Some((transport, _)) =
                message.key_transport.iter().zip(&recipients).find(|(_, handle)| *handle == own)
            else {
                return Ok(None);
            };
            (transport, sender, own)
        };

        let kek = self.kek_with(other_party)?;
        let keys = unwrap_keys(&transport.wrapped_keys, &message.nonce, receiver.as_bytes(), &kek)?;
        Ok(Some(keys))
    }

    /// Keys carried by the next message: current first, then the previous
    /// key when the message is keyed and one exists.
    fn outgoing_keys(&self, keyed: bool) -> Result<(Vec<KeyId>, Vec<SenderKey>), HandlerError> {
        let own = self.identity.handle();
        let current = self.key_store.get(own, self.current_key_id).ok_or_else(|| {
            HandlerError::UnknownSenderKey { participant: own.clone(), key_id: self.current_key_id }
        })?;

        let mut key_ids = vec![self.current_key_id];
        let mut keys = vec![current.clone()];
        if keyed
            && let Some(previous_id) = self.previous_key_id
            && let Some(previous) = self.key_store.get(own, previous_id)
        {
            key_ids.push(previous_id);
            keys.push(previous.clone());
        }
        Ok((key_ids, keys))
    }

    fn kek_with(&self, peer: &UserHandle) -> Result<KeyEncryptionKey, HandlerError> {
        let public = self
            .directory
            .public_chat_key(peer)
            .ok_or_else(|| HandlerError::UnknownPeerKey { handle: peer.clone() })?;
        derive_shared_key(self.identity.chat_secret(), &public)
            .map_err(|_| HandlerError::InvalidPeerKey { handle: peer.clone() })
    }
}

impl<E: Environment, D: KeyDirectory> std::fmt::Debug for ProtocolHandler<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolHandler")
            .field("handle", self.identity.handle())
            .field("current_key_id", &self.current_key_id)
            .field("previous_key_id", &self.previous_key_id)
            .field("sent_key_id", &self.sent_key_id)
            .field("messages_since_rotation", &self.messages_since_rotation)
            .finish_non_exhaustive()
    }
}

fn check_record_len(len: usize) -> Result<(), HandlerError> {
    if len > MAX_VALUE_LEN {
        return Err(HandlerError::MessageTooLarge { len, max: MAX_VALUE_LEN });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    };

    use sealframe_proto::{SECONDS_PER_DAY, decode_stream};

    use super::*;
    use crate::directory::MemoryDirectory;

    /// Counter-based RNG and settable clock.
    #[derive(Clone)]
    struct TestEnv {
        seed: Arc<Mutex<u64>>,
        now: Arc<AtomicU64>,
    }

    impl TestEnv {
        fn at_day(day: u16) -> Self {
            Self {
                seed: Arc::new(Mutex::new(1)),
                now: Arc::new(AtomicU64::new(u64::from(day) * SECONDS_PER_DAY)),
            }
        }

        fn advance_days(&self, days: u64) {
            self.now.fetch_add(days * SECONDS_PER_DAY, Ordering::SeqCst);
        }
    }

    impl Environment for TestEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut seed = self.seed.lock().unwrap();
            for byte in buffer {
                *seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                *byte = (*seed >> 33) as u8;
            }
        }

        fn wall_clock_secs(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }
    }

    fn identity(handle: &str, seed: u8) -> Identity {
        Identity::from_secrets(UserHandle::from(handle), [seed; 32], [seed.wrapping_add(100); 32])
    }

    fn directory(identities: &[&Identity]) -> Arc<MemoryDirectory> {
        let mut directory = MemoryDirectory::new();
        for identity in identities {
            directory.publish(identity);
        }
        Arc::new(directory)
    }

    type TestHandler = ProtocolHandler<TestEnv, Arc<MemoryDirectory>>;

    fn pair(rotate_key_every: u32) -> (TestHandler, TestHandler, TestEnv) {
        let alice = identity("alice", 1);
        let bob = identity("bob", 2);
        let directory = directory(&[&alice, &bob]);
        let env = TestEnv::at_day(0xD0);
        let config = HandlerConfig { rotate_key_every };

        let a = ProtocolHandler::new(alice, env.clone(), directory.clone(), config).unwrap();
        let b = ProtocolHandler::new(bob, env.clone(), directory, config).unwrap();
        (a, b, env)
    }

    fn record_types(wire: &[u8]) -> Vec<u8> {
        decode_stream(&wire[1..]).unwrap().iter().map(|raw| raw.record_type).collect()
    }

    #[test]
    fn zero_rotation_threshold_rejected() {
        let alice = identity("alice", 1);
        let result = ProtocolHandler::new(
            alice,
            TestEnv::at_day(1),
            MemoryDirectory::new(),
            HandlerConfig { rotate_key_every: 0 },
        );
        assert!(matches!(result, Err(ConfigError::ZeroRotationThreshold)));
    }

    #[test]
    fn initial_key_is_first_of_the_day() {
        let (a, _, _) = pair(16);

        assert_eq!(a.current_key_id(), KeyId::new(0xD0, 0));
        assert_eq!(a.previous_key_id(), None);
        assert_eq!(a.sent_key_id(), None);
        assert!(a.key_store().contains(a.handle(), a.current_key_id()));
    }

    #[test]
    fn keyed_then_followup() {
        let (mut a, mut b, _) = pair(16);
        let bob = UserHandle::from("bob");
        let alice = UserHandle::from("alice");

        let first = a.encrypt_to("hello", &bob).unwrap();
        let second = a.encrypt_to("world", &bob).unwrap();

        assert_eq!(record_types(&first), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(record_types(&second), vec![1, 2, 3, 6, 7]);
        assert_eq!(a.sent_key_id(), Some(a.current_key_id()));

        let m1 = b.decrypt_from(&first, &alice).unwrap();
        assert_eq!(m1.payload, "hello");
        assert_eq!(m1.message_type, MessageType::GroupKeyed);

        let m2 = b.decrypt_from(&second, &alice).unwrap();
        assert_eq!(m2.payload, "world");
        assert_eq!(m2.message_type, MessageType::GroupFollowup);
        assert_eq!(m2.key_id, m1.key_id);
    }

    #[test]
    fn rotation_after_threshold_carries_previous_key() {
        let (mut a, mut b, _) = pair(2);
        let bob = UserHandle::from("bob");
        let alice = UserHandle::from("alice");
        let first_key = a.current_key_id();

        for text in ["one", "two"] {
            let wire = a.encrypt_to(text, &bob).unwrap();
            b.decrypt_from(&wire, &alice).unwrap();
        }
        assert_eq!(a.messages_since_rotation(), 2);

        let third = a.encrypt_to("three", &bob).unwrap();
        assert_eq!(a.current_key_id(), KeyId::new(0xD0, 1));
        assert_eq!(a.previous_key_id(), Some(first_key));
        assert_eq!(a.messages_since_rotation(), 1);

        let parsed = ParsedMessage::parse(&third).unwrap();
        assert_eq!(parsed.key_ids, vec![KeyId::new(0xD0, 1), first_key]);

        let message = b.decrypt_from(&third, &alice).unwrap();
        assert_eq!(message.payload, "three");
        assert_eq!(b.key_store().key_count(&alice), 2);
    }

    #[test]
    fn rotation_across_day_boundary_resets_counter() {
        let (mut a, _, env) = pair(16);

        a.rotate_key().unwrap();
        assert_eq!(a.current_key_id(), KeyId::new(0xD0, 1));

        env.advance_days(1);
        a.rotate_key().unwrap();
        assert_eq!(a.current_key_id(), KeyId::new(0xD1, 0));
    }

    #[test]
    fn forced_rotation_makes_next_message_keyed() {
        let (mut a, _, _) = pair(16);
        let bob = UserHandle::from("bob");

        a.encrypt_to("hello", &bob).unwrap();
        a.rotate_key().unwrap();
        assert_eq!(a.sent_key_id(), None);

        let wire = a.encrypt_to("again", &bob).unwrap();
        assert!(record_types(&wire).contains(&5));
    }

    #[test]
    fn unknown_peer_leaves_state_untouched() {
        let (mut a, _, _) = pair(1);
        let bob = UserHandle::from("bob");
        a.encrypt_to("hello", &bob).unwrap();
        let before = a.current_key_id();

        let result = a.encrypt_to("hi", &UserHandle::from("nobody"));

        assert_eq!(
            result,
            Err(HandlerError::UnknownPeerKey { handle: UserHandle::from("nobody") })
        );
        assert_eq!(a.current_key_id(), before, "no rotation on failure");
        assert_eq!(a.messages_since_rotation(), 1);
    }

    #[test]
    fn empty_destination_list_rejected() {
        let (mut a, _, _) = pair(16);
        assert_eq!(a.encrypt_to_group("x", &[]), Err(HandlerError::NoRecipients));
    }

    #[test]
    fn oversized_plaintext_rejected() {
        let (mut a, _, _) = pair(16);
        let text = "x".repeat(MAX_VALUE_LEN + 1);

        let result = a.encrypt_to(&text, &UserHandle::from("bob"));
        assert!(matches!(result, Err(HandlerError::MessageTooLarge { .. })));
        assert_eq!(a.messages_since_rotation(), 0);
    }

    #[test]
    fn sender_rereads_own_message() {
        let (mut a, _, _) = pair(16);
        let bob = UserHandle::from("bob");
        let alice = UserHandle::from("alice");

        let wire = a.encrypt_to("note to self", &bob).unwrap();
        let message = a.decrypt_from(&wire, &alice).unwrap();

        assert_eq!(message.payload, "note to self");
        assert_eq!(message.sender, alice);
    }

    #[test]
    fn followup_without_key_is_unknown_sender_key() {
        let (mut a, mut b, _) = pair(16);
        let bob = UserHandle::from("bob");
        let alice = UserHandle::from("alice");

        let _dropped = a.encrypt_to("lost", &bob).unwrap();
        let followup = a.encrypt_to("orphan", &bob).unwrap();

        assert_eq!(
            b.decrypt_from(&followup, &alice),
            Err(HandlerError::UnknownSenderKey {
                participant: alice,
                key_id: a.current_key_id()
            })
        );
    }

    #[test]
    fn wrong_claimed_sender_fails_signature() {
        let (mut a, mut b, _) = pair(16);
        let wire = a.encrypt_to("hello", &UserHandle::from("bob")).unwrap();

        // bob claims the message came from himself
        let result = b.decrypt_from(&wire, &UserHandle::from("bob"));
        assert!(matches!(result, Err(HandlerError::InvalidSignature { .. })));
    }

    #[test]
    fn foreign_version_rejected() {
        let (mut a, mut b, _) = pair(16);
        let mut wire = a.encrypt_to("hello", &UserHandle::from("bob")).unwrap();
        wire[0] = 0x02;

        assert_eq!(
            b.decrypt_from(&wire, &UserHandle::from("alice")),
            Err(HandlerError::UnsupportedVersion(0x02))
        );
    }
}

//! Per-participant sender key cache.
//!
//! Maps participant handle → key id → sender key. The local participant's
//! own keys live here too, next to every key learned from a keyed message.
//!
//! # Invariants
//!
//! - A (participant, key id) binding is never rebound to a different key.
//!   Re-asserting the same key is a no-op; asserting a different one is a
//!   [`HandlerError::KeyConflict`] and signals tampering or a protocol bug.
//! - [`ParticipantKeyStore::commit`] is all-or-nothing: every binding is
//!   conflict-checked before the first one is written.

use std::collections::{HashMap, hash_map::Entry};

use sealframe_crypto::SenderKey;
use sealframe_proto::KeyId;

use crate::{error::HandlerError, identity::UserHandle};

/// Additive-only cache of sender keys.
#[derive(Debug, Default)]
pub struct ParticipantKeyStore {
    keys: HashMap<UserHandle, HashMap<KeyId, SenderKey>>,
}

impl ParticipantKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a single binding.
    pub fn with_key(participant: UserHandle, key_id: KeyId, key: SenderKey) -> Self {
        let mut keys = HashMap::new();
        keys.insert(participant, HashMap::from([(key_id, key)]));
        Self { keys }
    }

    /// Look up a cached key.
    pub fn get(&self, participant: &UserHandle, key_id: KeyId) -> Option<&SenderKey> {
        self.keys.get(participant).and_then(|keys| keys.get(&key_id))
    }

    /// True if a key is cached for this pair.
    pub fn contains(&self, participant: &UserHandle, key_id: KeyId) -> bool {
        self.get(participant, key_id).is_some()
    }

    /// Number of keys cached for a participant.
    pub fn key_count(&self, participant: &UserHandle) -> usize {
        self.keys.get(participant).map_or(0, HashMap::len)
    }

    /// Number of participants with at least one cached key.
    pub fn participant_count(&self) -> usize {
        self.keys.len()
    }

    /// Check that binding `key` would not contradict an existing entry.
    ///
    /// # Errors
    ///
    /// - `KeyConflict` if a different key is already bound
    pub fn check(
        &self,
        participant: &UserHandle,
        key_id: KeyId,
        key: &SenderKey,
    ) -> Result<(), HandlerError> {
        match self.get(participant, key_id) {
            Some(existing) if existing != key => Err(HandlerError::KeyConflict {
                participant: participant.clone(),
                key_id,
            }),
            _ => Ok(()),
        }
    }

    /// Bind a single key.
    ///
    /// Returns `true` if the entry is new, `false` if the same key was
    /// already bound.
    ///
    /// # Errors
    ///
    /// - `KeyConflict` if a different key is already bound; the store is
    ///   left untouched
    pub fn insert(
        &mut self,
        participant: &UserHandle,
        key_id: KeyId,
        key: SenderKey,
    ) -> Result<bool, HandlerError> {
        match self.keys.entry(participant.clone()).or_default().entry(key_id) {
            Entry::Occupied(existing) => {
                if *existing.get() == key {
                    Ok(false)
                } else {
                    Err(HandlerError::KeyConflict { participant: participant.clone(), key_id })
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(key);
                Ok(true)
            },
        }
    }

    /// Bind several keys for one participant atomically.
    ///
    /// Returns the number of newly cached keys.
    ///
    /// # Errors
    ///
    /// - `KeyConflict` if any binding conflicts with the store, or if the
    ///   batch itself asserts two different keys for one id. Nothing is
    ///   written in that case.
    pub fn commit(
        &mut self,
        participant: &UserHandle,
        bindings: Vec<(KeyId, SenderKey)>,
    ) -> Result<usize, HandlerError> {
        for (index, (key_id, key)) in bindings.iter().enumerate() {
            self.check(participant, *key_id, key)?;

            let contradicts_batch = bindings[..index]
                .iter()
                .any(|(earlier_id, earlier_key)| earlier_id == key_id && earlier_key != key);
            if contradicts_batch {
                return Err(HandlerError::KeyConflict {
                    participant: participant.clone(),
                    key_id: *key_id,
                });
            }
        }

        let mut added = 0;
        for (key_id, key) in bindings {
            if self.insert(participant, key_id, key)? {
                added += 1;
            }
        }
        Ok(added)
    }
}

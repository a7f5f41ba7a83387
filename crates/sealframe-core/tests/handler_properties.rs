//! Property-based tests for the protocol handler
//!
//! 1. **Round-trip**: whatever a sender encrypts for a destination, that
//!    destination decrypts to the same text.
//! 2. **Tamper detection**: flipping any bit inside a signed record value
//!    fails with `InvalidSignature`.
//! 3. **Rotation**: after exactly `rotate_key_every` messages the next one
//!    uses a different key id.
//! 4. **Follow-up economy**: repeated messages to the same destination omit
//!    key transport until rotation.

use proptest::prelude::*;
use sealframe_core::{HandlerError, ParsedMessage, UserHandle};
use sealframe_harness::Conversation;
use sealframe_proto::{MessageType, decode_stream};

const HEADER_SIZE: usize = 3;

fn alice_and_bob(seed: u64, rotate_key_every: u32) -> Conversation {
    Conversation::builder()
        .seed(seed)
        .rotate_key_every(rotate_key_every)
        .participants(["alice", "bob"])
        .build()
        .expect("valid config")
}

/// Wire positions of every byte inside a record value.
fn value_positions(wire: &[u8]) -> Vec<usize> {
    decode_stream(&wire[1..])
        .expect("well-formed message")
        .iter()
        .flat_map(|raw| {
            let start = 1 + raw.offset + HEADER_SIZE;
            start..start + raw.value.len()
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_round_trip(
        seed in any::<u64>(),
        texts in prop::collection::vec(".{0,64}", 1..8),
    ) {
        let mut conversation = alice_and_bob(seed, 3);

        for text in &texts {
            let wire = conversation.send("alice", &["bob"], text).expect("encrypt");
            let message = conversation.deliver(&wire, "alice", "bob").expect("decrypt");

            // PROPERTY: destination recovers sender and plaintext
            prop_assert_eq!(&message.payload, text);
            prop_assert_eq!(message.sender.as_str(), "alice");
        }
    }

    #[test]
    fn prop_bit_flip_in_value_fails_signature(
        seed in any::<u64>(),
        keyed in any::<bool>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut conversation = alice_and_bob(seed, 16);
        let mut wire = conversation.send("alice", &["bob"], "attack at dawn").expect("encrypt");
        if !keyed {
            conversation.deliver(&wire, "alice", "bob").expect("decrypt keyed");
            wire = conversation.send("alice", &["bob"], "attack at dusk").expect("encrypt");
        }

        let positions = value_positions(&wire);
        wire[*position.get(&positions)] ^= 1 << bit;

        // PROPERTY: any tampered value is caught by the signature check
        let result = conversation.deliver(&wire, "alice", "bob");
        prop_assert!(
            matches!(result, Err(HandlerError::InvalidSignature { .. })),
            "expected InvalidSignature, got {:?}", result
        );
    }

    #[test]
    fn prop_rotation_after_threshold(
        seed in any::<u64>(),
        rotate_key_every in 1u32..6,
    ) {
        let mut conversation = alice_and_bob(seed, rotate_key_every);
        let first_key = conversation.handler("alice").expect("alice").current_key_id();

        for i in 0..rotate_key_every {
            let wire = conversation.send("alice", &["bob"], &format!("m{i}")).expect("encrypt");
            let parsed = ParsedMessage::parse(&wire).expect("parse");
            prop_assert_eq!(parsed.primary_key_id().expect("key id"), first_key);
        }

        let wire = conversation.send("alice", &["bob"], "next").expect("encrypt");
        let parsed = ParsedMessage::parse(&wire).expect("parse");

        // PROPERTY: the message after the threshold uses a new key and is keyed
        prop_assert_ne!(parsed.primary_key_id().expect("key id"), first_key);
        prop_assert_eq!(parsed.checked_message_type(), Ok(MessageType::GroupKeyed));
        prop_assert_eq!(parsed.key_ids.get(1).copied(), Some(first_key));
    }

    #[test]
    fn prop_followups_until_rotation(
        seed in any::<u64>(),
        rotate_key_every in 2u32..8,
    ) {
        let mut conversation = alice_and_bob(seed, rotate_key_every);

        for i in 0..rotate_key_every {
            let wire = conversation.send("alice", &["bob"], "x").expect("encrypt");
            let parsed = ParsedMessage::parse(&wire).expect("parse");

            // PROPERTY: only the first message under a key transports it
            prop_assert_eq!(parsed.key_transport.is_empty(), i > 0);
        }
    }
}

#[test]
fn key_ids_before_nonce_is_malformed() {
    let mut conversation = alice_and_bob(1, 16);
    let keyed = conversation.send("alice", &["bob"], "hello").expect("encrypt");
    conversation.deliver(&keyed, "alice", "bob").expect("decrypt");
    let followup = conversation.send("alice", &["bob"], "again").expect("encrypt");

    // SIGNATURE, MESSAGE_TYPE, NONCE, KEY_IDS, PAYLOAD -> swap NONCE and KEY_IDS
    let records = decode_stream(&followup[1..]).expect("decode");
    assert_eq!(records.iter().map(|raw| raw.record_type).collect::<Vec<_>>(), [1, 2, 3, 6, 7]);
    let mut reordered = vec![followup[0]];
    for index in [0, 1, 3, 2, 4] {
        let raw = &records[index];
        reordered.extend_from_slice(&followup[1 + raw.offset..1 + raw.end()]);
    }

    let result = conversation.deliver(&reordered, "alice", "bob");
    assert!(matches!(result, Err(HandlerError::MalformedMessage { .. })), "got {result:?}");
}

#[test]
fn unsupported_version_rejected_before_signature() {
    let mut conversation = alice_and_bob(2, 16);
    let mut wire = conversation.send("alice", &["bob"], "hello").expect("encrypt");
    wire[0] = 0x7F;

    assert_eq!(
        conversation.deliver(&wire, "alice", "bob"),
        Err(HandlerError::UnsupportedVersion(0x7F))
    );
}

#[test]
fn unknown_sender_signing_key() {
    let mut conversation = alice_and_bob(3, 16);
    let wire = conversation.send("alice", &["bob"], "hello").expect("encrypt");

    assert_eq!(
        conversation.deliver(&wire, "mallory", "bob"),
        Err(HandlerError::UnknownPeerKey { handle: UserHandle::from("mallory") })
    );
}

#[test]
fn unknown_destination_fails_encrypt() {
    let mut conversation = alice_and_bob(4, 16);

    assert_eq!(
        conversation.send("alice", &["nobody"], "hello"),
        Err(HandlerError::UnknownPeerKey { handle: UserHandle::from("nobody") })
    );
    assert_eq!(conversation.handler("alice").expect("alice").messages_since_rotation(), 0);
}

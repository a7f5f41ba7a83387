//! Fuzz target for the full decrypt path
//!
//! A genuine keyed message is mutated by the fuzzer and handed to the
//! recipient.
//!
//! # Invariants
//!
//! - Decryption never panics
//! - A mutated message never yields a plaintext other than the original
//! - A rejected message never adds keys to the recipient's cache

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_core::UserHandle;
use sealframe_harness::Conversation;

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    mutations: Vec<(u16, u8)>,
    truncate: Option<u16>,
}

const PLAINTEXT: &str = "meet at the usual place";

fuzz_target!(|input: Input| {
    let Ok(mut conversation) =
        Conversation::builder().seed(input.seed).participants(["alice", "bob"]).build()
    else {
        return;
    };
    let Ok(mut wire) = conversation.send("alice", &["bob"], PLAINTEXT) else {
        return;
    };

    for (position, mask) in input.mutations {
        if let Some(byte) = wire.get_mut(usize::from(position)) {
            *byte ^= mask;
        }
    }
    if let Some(len) = input.truncate {
        wire.truncate(usize::from(len));
    }

    let alice = UserHandle::from("alice");
    match conversation.deliver(&wire, "alice", "bob") {
        Ok(message) => assert_eq!(message.payload, PLAINTEXT),
        Err(_) => {
            let bob = conversation.handler("bob").expect("bob exists");
            assert_eq!(bob.key_store().key_count(&alice), 0);
        },
    }
});

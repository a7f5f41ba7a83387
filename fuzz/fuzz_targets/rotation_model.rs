//! Fuzz target for sender key rotation
//!
//! Arbitrary operation sequences drive a real conversation and the reference
//! model side by side.
//!
//! # Invariants
//!
//! - Current key ids match the model after every operation
//! - Every delivered message either decrypts or fails with a missing key,
//!   exactly as the model predicts

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_core::HandlerError;
use sealframe_harness::{Conversation, DeliveryOutcome, ModelWorld};

const PARTICIPANTS: u8 = 3;
const START_DAY: u16 = 20_000;

#[derive(Debug, Arbitrary)]
enum FuzzOp {
    Send { from: u8, to: Vec<u8>, deliver: bool },
    Rotate { who: u8 },
    AdvanceDay,
}

fn name(id: u8) -> String {
    format!("p{id}")
}

fuzz_target!(|input: (u8, u64, Vec<FuzzOp>)| {
    let (threshold, seed, ops) = input;
    let rotate_key_every = u32::from(threshold % 8) + 1;

    let Ok(mut conversation) = Conversation::builder()
        .seed(seed)
        .start_day(START_DAY)
        .rotate_key_every(rotate_key_every)
        .participants((0..PARTICIPANTS).map(name))
        .build()
    else {
        return;
    };
    let mut model = ModelWorld::new(usize::from(PARTICIPANTS), START_DAY, rotate_key_every);

    for op in ops.into_iter().take(64) {
        match op {
            FuzzOp::Send { from, to, deliver } => {
                let from = from % PARTICIPANTS;
                let to: Vec<u8> =
                    to.into_iter().map(|id| id % PARTICIPANTS).filter(|id| *id != from).collect();
                let (_, expected) = model.send(from, &to, deliver);

                let names: Vec<String> = to.iter().copied().map(name).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let wire = match conversation.send(&name(from), &refs, "fuzz") {
                    Ok(wire) => wire,
                    Err(HandlerError::NoRecipients) => continue,
                    Err(err) => panic!("encrypt failed: {err}"),
                };
                if !deliver {
                    continue;
                }

                for (dest, outcome) in expected {
                    let result = conversation.deliver(&wire, &name(from), &name(dest));
                    match (outcome, result) {
                        (DeliveryOutcome::Decrypted { key_id }, Ok(message)) => {
                            assert_eq!(message.key_id, key_id);
                        },
                        (
                            DeliveryOutcome::UnknownSenderKey { key_id },
                            Err(HandlerError::UnknownSenderKey { key_id: actual, .. }),
                        ) => assert_eq!(actual, key_id),
                        (expected, actual) => panic!("model {expected:?} vs real {actual:?}"),
                    }
                }
            },
            FuzzOp::Rotate { who } => {
                let who = who % PARTICIPANTS;
                model.rotate(who);
                if let Some(handler) = conversation.handler_mut(&name(who)) {
                    handler.rotate_key().expect("rotation");
                }
            },
            FuzzOp::AdvanceDay => {
                model.advance_days(1);
                conversation.env().advance_days(1);
            },
        }

        for id in 0..PARTICIPANTS {
            let real = conversation.handler(&name(id)).map(|handler| handler.current_key_id());
            assert_eq!(real, model.current_key_id(id));
        }
    }
});

//! Fuzz target for message parsing
//!
//! # Invariants
//!
//! - Parsing never panics
//! - Signed content of a parsed message is a suffix of the input
//! - A parsed message always has a primary key id

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_core::ParsedMessage;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = ParsedMessage::parse(data) else {
        return;
    };

    assert!(data.ends_with(message.signed_content));
    assert!(message.primary_key_id().is_ok());
    let _ = message.checked_message_type();
    for transport in &message.key_transport {
        let _ = transport.recipient_handle();
    }
});

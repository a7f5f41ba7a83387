//! Fuzz target for the TLV codec
//!
//! Arbitrary bytes are cut into records and every record is lifted into its
//! typed form.
//!
//! # Invariants
//!
//! - Decoding never panics; invalid input returns an error
//! - Records tile the input exactly: each starts where the previous ended
//! - Any record that decodes re-encodes to the same bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_proto::{Record, decode_stream};

fuzz_target!(|data: &[u8]| {
    let Ok(records) = decode_stream(data) else {
        return;
    };

    let mut expected_offset = 0;
    for raw in &records {
        assert_eq!(raw.offset, expected_offset, "records must be contiguous");
        expected_offset = raw.end();

        if let Ok(record) = Record::decode(raw) {
            let mut encoded = Vec::new();
            record.encode(&mut encoded).expect("decoded record fits its length prefix");
            assert_eq!(encoded, &data[raw.offset..raw.end()]);
        }
    }
    assert_eq!(expected_offset, data.len());
});

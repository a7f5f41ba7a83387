//! Type-Length-Value record codec.
//!
//! Layout of one record:
//!
//! ```text
//! [type: u8][length: u16 big-endian][value: length bytes]
//! ```
//!
//! This layer is a pure transform. It has no opinion about which type codes
//! exist or in which order they appear; see [`crate::record`] for typed
//! decoding.

use bytes::BufMut;

use crate::errors::{ProtocolError, Result};

/// Size of the `[type][length]` prefix.
pub const HEADER_SIZE: usize = 3;

/// Largest value the 16-bit length prefix can describe.
pub const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// A record cut from a stream, borrowing its value from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Raw type code (not yet validated)
    pub record_type: u8,
    /// Value bytes
    pub value: &'a [u8],
    /// Offset of the type byte within the decoded stream
    pub offset: usize,
}

impl RawRecord<'_> {
    /// Offset one past the last value byte within the decoded stream.
    pub fn end(&self) -> usize {
        self.offset + HEADER_SIZE + self.value.len()
    }
}

/// Append one record to `dst`.
///
/// # Errors
///
/// - `ProtocolError::ValueTooLong` if `value` exceeds [`MAX_VALUE_LEN`].
///   Nothing is written in that case.
pub fn encode_record(record_type: u8, value: &[u8], dst: &mut impl BufMut) -> Result<()> {
    let Ok(len) = u16::try_from(value.len()) else {
        return Err(ProtocolError::ValueTooLong { len: value.len(), max: MAX_VALUE_LEN });
    };

    dst.put_u8(record_type);
    dst.put_u16(len);
    dst.put_slice(value);
    Ok(())
}

/// Split `bytes` into records until the input is exhausted.
///
/// # Errors
///
/// - `ProtocolError::Truncated` if a header or value runs past the end of
///   the input
pub fn decode_stream(bytes: &[u8]) -> Result<Vec<RawRecord<'_>>> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let remaining = &bytes[offset..];
        let Some(header) = remaining.get(..HEADER_SIZE) else {
            return Err(ProtocolError::Truncated {
                offset,
                expected: HEADER_SIZE,
                actual: remaining.len(),
            });
        };

        let record_type = header[0];
        let len = usize::from(u16::from_be_bytes([header[1], header[2]]));

        let Some(value) = remaining.get(HEADER_SIZE..HEADER_SIZE + len) else {
            return Err(ProtocolError::Truncated {
                offset,
                expected: len,
                actual: remaining.len() - HEADER_SIZE,
            });
        };

        records.push(RawRecord { record_type, value, offset });
        offset += HEADER_SIZE + len;
    }

    debug_assert_eq!(offset, bytes.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encode_writes_type_length_value() {
        let mut buf = Vec::new();
        encode_record(0x07, b"hi", &mut buf).unwrap();
        assert_eq!(buf, [0x07, 0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn encode_empty_value() {
        let mut buf = Vec::new();
        encode_record(0x02, &[], &mut buf).unwrap();
        assert_eq!(buf, [0x02, 0x00, 0x00]);
    }

    #[test]
    fn encode_rejects_oversized_value() {
        let mut buf = Vec::new();
        let value = vec![0u8; MAX_VALUE_LEN + 1];

        let result = encode_record(0x07, &value, &mut buf);
        assert_eq!(
            result,
            Err(ProtocolError::ValueTooLong { len: MAX_VALUE_LEN + 1, max: MAX_VALUE_LEN })
        );
        assert!(buf.is_empty(), "nothing written on failure");
    }

    #[test]
    fn decode_empty_stream() {
        assert_eq!(decode_stream(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn decode_records_offsets() {
        let bytes = [0x01, 0x00, 0x01, 0xAA, 0x03, 0x00, 0x00];
        let records = decode_stream(&bytes).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, 0x01);
        assert_eq!(records[0].value, &[0xAA]);
        assert_eq!(records[0].offset, 0);
        assert_eq!(records[0].end(), 4);
        assert_eq!(records[1].record_type, 0x03);
        assert_eq!(records[1].offset, 4);
        assert_eq!(records[1].end(), 7);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let result = decode_stream(&[0x01, 0x00]);
        assert_eq!(result, Err(ProtocolError::Truncated { offset: 0, expected: 3, actual: 2 }));
    }

    #[test]
    fn decode_rejects_truncated_value() {
        let result = decode_stream(&[0x07, 0x00, 0x05, 0x01, 0x02]);
        assert_eq!(result, Err(ProtocolError::Truncated { offset: 0, expected: 5, actual: 2 }));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = decode_stream(&bytes);
        }

        #[test]
        fn decoded_records_cover_input(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            if let Ok(records) = decode_stream(&bytes) {
                let covered: usize = records.iter().map(|r| HEADER_SIZE + r.value.len()).sum();
                prop_assert_eq!(covered, bytes.len());
            }
        }
    }
}

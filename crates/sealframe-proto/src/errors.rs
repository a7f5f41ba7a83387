//! Wire format errors.

use thiserror::Error;

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding TLV records.
///
/// All variants describe structural problems. None of them say anything
/// about authenticity: a structurally valid record may still carry forged
/// content until the message signature is checked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes remain than a record header or value requires
    #[error("truncated record at offset {offset}: need {expected} bytes, have {actual}")]
    Truncated {
        /// Offset of the record within the stream
        offset: usize,
        /// Bytes required to finish the record
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Value does not fit the 16-bit length prefix
    #[error("record value too long: {len} bytes (max {max})")]
    ValueTooLong {
        /// Length of the rejected value
        len: usize,
        /// Maximum encodable length
        max: usize,
    },

    /// Type code outside the known record set
    #[error("unknown record type: {0:#04x}")]
    UnknownRecordType(u8),

    /// Fixed-size record carried a value of the wrong length
    #[error("invalid {record_type} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Name of the record type
        record_type: &'static str,
        /// Acceptable length(s), human readable
        expected: &'static str,
        /// Observed length
        actual: usize,
    },

    /// Message contained no bytes at all
    #[error("empty message")]
    Empty,
}

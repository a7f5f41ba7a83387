//! Typed TLV records.
//!
//! [`Record`] has one variant per record kind. Decoding goes through an
//! exhaustive match on [`RecordType`], so an unhandled kind is a compile
//! error rather than a silent fallthrough.
//!
//! # Invariants
//!
//! - Type codes are ordered: SIGNATURE < MESSAGE_TYPE < NONCE < RECIPIENT <
//!   KEYS < KEY_IDS < PAYLOAD. Messages list records in this order, with
//!   RECIPIENT/KEYS pairs allowed to repeat.
//! - Fixed-size values (signature, nonce, key ids) are length-checked here.
//!   Variable values (recipient, keys, payload) are passed through as bytes
//!   and interpreted only after signature verification.

use bytes::{BufMut, Bytes};

use crate::{
    errors::{ProtocolError, Result},
    key_id::KeyId,
    tlv::{RawRecord, encode_record},
};

/// Protocol version byte that prefixes every message.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Ed25519 signature length.
pub const SIGNATURE_SIZE: usize = 64;

/// AES-CTR nonce length.
pub const NONCE_SIZE: usize = 12;

/// Encoded [`KeyId`] length.
pub const KEY_ID_SIZE: usize = 4;

/// Record type codes, in their required wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Detached signature over everything that follows it
    Signature = 0x01,
    /// One-byte [`MessageType`]
    MessageType = 0x02,
    /// Payload nonce
    Nonce = 0x03,
    /// Recipient handle of the following KEYS record (repeatable)
    Recipient = 0x04,
    /// Wrapped sender keys for the preceding recipient (repeatable)
    Keys = 0x05,
    /// One or two concatenated key ids
    KeyIds = 0x06,
    /// Encrypted payload
    Payload = 0x07,
}

impl RecordType {
    /// Parse a type code. `None` if unknown.
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Signature),
            0x02 => Some(Self::MessageType),
            0x03 => Some(Self::Nonce),
            0x04 => Some(Self::Recipient),
            0x05 => Some(Self::Keys),
            0x06 => Some(Self::KeyIds),
            0x07 => Some(Self::Payload),
            _ => None,
        }
    }

    /// Wire code.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Whether the record may appear more than once in a message.
    pub fn is_repeatable(self) -> bool {
        matches!(self, Self::Recipient | Self::Keys)
    }

    /// Human readable name, used in errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Signature => "SIGNATURE",
            Self::MessageType => "MESSAGE_TYPE",
            Self::Nonce => "NONCE",
            Self::Recipient => "RECIPIENT",
            Self::Keys => "KEYS",
            Self::KeyIds => "KEY_IDS",
            Self::Payload => "PAYLOAD",
        }
    }
}

/// Value of the MESSAGE_TYPE record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Group message transporting sender keys
    GroupKeyed = 0x00,
    /// Group message relying on a previously transported key
    GroupFollowup = 0x01,
    /// Pairwise message without group key semantics
    SimpleTwoParty = 0x02,
}

impl MessageType {
    /// Parse a message type byte. `None` if unknown.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::GroupKeyed),
            0x01 => Some(Self::GroupFollowup),
            0x02 => Some(Self::SimpleTwoParty),
            _ => None,
        }
    }

    /// Wire value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Ed25519 signature
    Signature([u8; SIGNATURE_SIZE]),
    /// Raw message type byte. Kept raw so that a tampered value surfaces as
    /// a signature failure rather than a parse failure.
    MessageType(u8),
    /// Payload nonce
    Nonce([u8; NONCE_SIZE]),
    /// Recipient handle bytes
    Recipient(Bytes),
    /// Wrapped keys for the paired recipient
    Keys(Bytes),
    /// Primary key id, optionally followed by the previous one
    KeyIds(Vec<KeyId>),
    /// Ciphertext
    Payload(Bytes),
}

impl Record {
    /// Type code of this record.
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Signature(_) => RecordType::Signature,
            Self::MessageType(_) => RecordType::MessageType,
            Self::Nonce(_) => RecordType::Nonce,
            Self::Recipient(_) => RecordType::Recipient,
            Self::Keys(_) => RecordType::Keys,
            Self::KeyIds(_) => RecordType::KeyIds,
            Self::Payload(_) => RecordType::Payload,
        }
    }

    /// Lift a raw record into its typed form.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownRecordType` for unknown type codes
    /// - `ProtocolError::InvalidLength` for fixed-size records with the
    ///   wrong value length
    pub fn decode(raw: &RawRecord<'_>) -> Result<Self> {
        let Some(record_type) = RecordType::from_u8(raw.record_type) else {
            return Err(ProtocolError::UnknownRecordType(raw.record_type));
        };
        let value = raw.value;

        match record_type {
            RecordType::Signature => {
                let signature = <[u8; SIGNATURE_SIZE]>::try_from(value).map_err(|_| {
                    ProtocolError::InvalidLength {
                        record_type: record_type.name(),
                        expected: "64",
                        actual: value.len(),
                    }
                })?;
                Ok(Self::Signature(signature))
            },
            RecordType::MessageType => match value {
                [byte] => Ok(Self::MessageType(*byte)),
                _ => Err(ProtocolError::InvalidLength {
                    record_type: record_type.name(),
                    expected: "1",
                    actual: value.len(),
                }),
            },
            RecordType::Nonce => {
                let nonce = <[u8; NONCE_SIZE]>::try_from(value).map_err(|_| {
                    ProtocolError::InvalidLength {
                        record_type: record_type.name(),
                        expected: "12",
                        actual: value.len(),
                    }
                })?;
                Ok(Self::Nonce(nonce))
            },
            RecordType::Recipient => Ok(Self::Recipient(Bytes::copy_from_slice(value))),
            RecordType::Keys => Ok(Self::Keys(Bytes::copy_from_slice(value))),
            RecordType::KeyIds => {
                if value.len() != KEY_ID_SIZE && value.len() != 2 * KEY_ID_SIZE {
                    return Err(ProtocolError::InvalidLength {
                        record_type: record_type.name(),
                        expected: "4 or 8",
                        actual: value.len(),
                    });
                }
                let ids = value
                    .chunks_exact(KEY_ID_SIZE)
                    .map(|chunk| {
                        KeyId::from_slice(chunk).ok_or(ProtocolError::InvalidLength {
                            record_type: record_type.name(),
                            expected: "4",
                            actual: chunk.len(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::KeyIds(ids))
            },
            RecordType::Payload => Ok(Self::Payload(Bytes::copy_from_slice(value))),
        }
    }

    /// Append this record to `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::ValueTooLong` if the value exceeds the length prefix
    /// - `ProtocolError::InvalidLength` for a KEY_IDS record that does not
    ///   hold one or two ids
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let code = self.record_type().to_u8();
        match self {
            Self::Signature(signature) => encode_record(code, signature, dst),
            Self::MessageType(value) => encode_record(code, &[*value], dst),
            Self::Nonce(nonce) => encode_record(code, nonce, dst),
            Self::Recipient(bytes) | Self::Keys(bytes) | Self::Payload(bytes) => {
                encode_record(code, bytes, dst)
            },
            Self::KeyIds(ids) => {
                if ids.is_empty() || ids.len() > 2 {
                    return Err(ProtocolError::InvalidLength {
                        record_type: RecordType::KeyIds.name(),
                        expected: "4 or 8",
                        actual: ids.len() * KEY_ID_SIZE,
                    });
                }
                let value: Vec<u8> = ids.iter().flat_map(|id| id.to_bytes()).collect();
                encode_record(code, &value, dst)
            },
        }
    }
}

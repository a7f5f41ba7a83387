//! Wire format for the Sealframe protocol.
//!
//! A message is one protocol version byte followed by a stream of
//! Type-Length-Value records:
//!
//! ```text
//! message := version:1, record*
//! record  := type:1, length:2 (big-endian), value:<length>
//! ```
//!
//! The codec in [`tlv`] is deliberately order-agnostic: it only knows how to
//! cut a byte stream into records. Each raw record is lifted into a typed
//! [`Record`] by an exhaustive match on [`RecordType`], so adding a record
//! kind forces every decoder to handle it. Ordering rules (non-decreasing
//! type codes, paired RECIPIENT/KEYS) are enforced by the protocol handler
//! that consumes the records.
//!
//! Sender key identifiers ([`KeyId`]) also live here because they travel in
//! the KEY_IDS record and carry no secret material.
//!
//! # Security
//!
//! Nothing in this crate authenticates data. Every length is bounds-checked
//! before slicing, and fixed-size values (signature, nonce, key ids) are
//! validated on decode, but callers must verify the message signature before
//! trusting any record value.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod key_id;
pub mod record;
pub mod tlv;

pub use errors::{ProtocolError, Result};
pub use key_id::{KeyId, SECONDS_PER_DAY, day_epoch_from_secs};
pub use record::{
    KEY_ID_SIZE, MessageType, NONCE_SIZE, PROTOCOL_VERSION, Record, RecordType, SIGNATURE_SIZE,
};
pub use tlv::{MAX_VALUE_LEN, RawRecord, decode_stream, encode_record};

//! Message assembly and structural parsing.
//!
//! ```text
//! [version][SIGNATURE][MESSAGE_TYPE][NONCE]([RECIPIENT][KEYS])*[KEY_IDS][PAYLOAD]
//!                     └──────────────── signed content ────────────────────────┘
//! ```
//!
//! [`ParsedMessage::parse`] enforces framing and record order only. Values
//! whose interpretation could fail (message type byte, recipient text) are
//! kept raw until the signature has been checked, so a tampered value is
//! reported as a signature failure.

use bytes::Bytes;
use sealframe_proto::{
    KeyId, MessageType, NONCE_SIZE, PROTOCOL_VERSION, ProtocolError, Record, RecordType,
    SIGNATURE_SIZE, decode_stream,
};

use crate::{error::HandlerError, identity::UserHandle};

/// One RECIPIENT/KEYS pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTransport {
    /// Recipient handle bytes, unvalidated until after verification
    pub recipient: Bytes,
    /// Sender keys wrapped for that recipient
    pub wrapped_keys: Bytes,
}

impl KeyTransport {
    /// Recipient handle as text.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if the handle is not UTF-8
    pub fn recipient_handle(&self) -> Result<UserHandle, HandlerError> {
        std::str::from_utf8(&self.recipient)
            .map(UserHandle::from)
            .map_err(|_| HandlerError::malformed("recipient handle is not valid UTF-8"))
    }
}

/// Structurally valid, not yet authenticated message.
#[derive(Debug, Clone)]
pub struct ParsedMessage<'a> {
    /// Leading version byte
    pub version: u8,
    /// Signature over [`Self::signed_content`]
    pub signature: [u8; SIGNATURE_SIZE],
    /// Every byte after the SIGNATURE record
    pub signed_content: &'a [u8],
    /// Raw MESSAGE_TYPE value
    pub message_type: u8,
    /// Payload nonce
    pub nonce: [u8; NONCE_SIZE],
    /// RECIPIENT/KEYS pairs in wire order
    pub key_transport: Vec<KeyTransport>,
    /// Primary key id first, then the previous one if present
    pub key_ids: Vec<KeyId>,
    /// Encrypted payload
    pub payload: Bytes,
}

impl<'a> ParsedMessage<'a> {
    /// Split `wire` into its records and check their order.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` for truncated or unknown records, records out of
    ///   order, duplicated non-repeatable records, unpaired RECIPIENT/KEYS,
    ///   or a missing required record
    pub fn parse(wire: &'a [u8]) -> Result<Self, HandlerError> {
        let Some((&version, stream)) = wire.split_first() else {
            return Err(ProtocolError::Empty.into());
        };
        let raw_records = decode_stream(stream)?;

        let Some(first) = raw_records.first() else {
            return Err(HandlerError::malformed("message has no records"));
        };
        let Record::Signature(signature) = Record::decode(first)? else {
            return Err(HandlerError::malformed("first record must be SIGNATURE"));
        };
        let signed_content = &stream[first.end()..];

        let mut message_type = None;
        let mut nonce = None;
        let mut key_ids = None;
        let mut payload = None;
        let mut key_transport = Vec::new();
        let mut pending_recipient: Option<Bytes> = None;
        let mut previous = RecordType::Signature;

        for raw in &raw_records[1..] {
            let record = Record::decode(raw)?;
            let current = record.record_type();
            check_order(previous, current)?;
            previous = current;

            match record {
                Record::Signature(_) => {
                    return Err(HandlerError::malformed("duplicate SIGNATURE record"));
                },
                Record::MessageType(value) => message_type = Some(value),
                Record::Nonce(value) => nonce = Some(value),
                Record::Recipient(recipient) => pending_recipient = Some(recipient),
                Record::Keys(wrapped_keys) => {
                    let Some(recipient) = pending_recipient.take() else {
                        return Err(HandlerError::malformed("KEYS without RECIPIENT"));
                    };
                    key_transport.push(KeyTransport { recipient, wrapped_keys });
                },
                Record::KeyIds(ids) => key_ids = Some(ids),
                Record::Payload(bytes) => payload = Some(bytes),
            }
        }

        if pending_recipient.is_some() {
            return Err(HandlerError::malformed("RECIPIENT without KEYS"));
        }

        Ok(Self {
            version,
            signature,
            signed_content,
            message_type: required(message_type, RecordType::MessageType)?,
            nonce: required(nonce, RecordType::Nonce)?,
            key_transport,
            key_ids: required(key_ids, RecordType::KeyIds)?,
            payload: required(payload, RecordType::Payload)?,
        })
    }

    /// Interpret the message type byte and check it agrees with the presence
    /// of key transport records.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` for unknown values, a keyed message without
    ///   RECIPIENT/KEYS, or a follow-up that carries them
    pub fn checked_message_type(&self) -> Result<MessageType, HandlerError> {
        let Some(message_type) = MessageType::from_u8(self.message_type) else {
            return Err(HandlerError::malformed(format!(
                "unknown message type {:#04x}",
                self.message_type
            )));
        };

        match message_type {
            MessageType::GroupKeyed if self.key_transport.is_empty() => {
                Err(HandlerError::malformed("keyed message without key transport"))
            },
            MessageType::GroupFollowup if !self.key_transport.is_empty() => {
                Err(HandlerError::malformed("follow-up message carries key transport"))
            },
            _ => Ok(message_type),
        }
    }

    /// Key id the payload is encrypted under.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if no key id is present
    pub fn primary_key_id(&self) -> Result<KeyId, HandlerError> {
        self.key_ids.first().copied().ok_or_else(|| HandlerError::malformed("empty KEY_IDS record"))
    }
}

fn check_order(previous: RecordType, current: RecordType) -> Result<(), HandlerError> {
    let restarts_pair = previous == RecordType::Keys && current == RecordType::Recipient;
    if current < previous && !restarts_pair {
        return Err(HandlerError::malformed(format!(
            "{} record after {}",
            current.name(),
            previous.name()
        )));
    }
    if current == previous && !current.is_repeatable() {
        return Err(HandlerError::malformed(format!("duplicate {} record", current.name())));
    }
    if current == previous && current == RecordType::Recipient {
        return Err(HandlerError::malformed("RECIPIENT without KEYS"));
    }
    Ok(())
}

fn required<T>(value: Option<T>, record_type: RecordType) -> Result<T, HandlerError> {
    value.ok_or_else(|| HandlerError::malformed(format!("missing {} record", record_type.name())))
}

/// Encode the records covered by the signature, in wire order.
///
/// # Errors
///
/// - `MalformedMessage` if a value exceeds the record length limit
pub(crate) fn encode_signed_content(
    message_type: MessageType,
    nonce: [u8; NONCE_SIZE],
    key_transport: &[KeyTransport],
    key_ids: &[KeyId],
    payload: Bytes,
) -> Result<Vec<u8>, HandlerError> {
    let mut records = Vec::with_capacity(4 + 2 * key_transport.len());
    records.push(Record::MessageType(message_type.to_u8()));
    records.push(Record::Nonce(nonce));
    for transport in key_transport {
        records.push(Record::Recipient(transport.recipient.clone()));
        records.push(Record::Keys(transport.wrapped_keys.clone()));
    }
    records.push(Record::KeyIds(key_ids.to_vec()));
    records.push(Record::Payload(payload));

    let mut content = Vec::new();
    for record in &records {
        record.encode(&mut content)?;
    }
    Ok(content)
}

/// Prefix the version byte and SIGNATURE record to signed content.
pub(crate) fn seal(
    signature: [u8; SIGNATURE_SIZE],
    signed_content: &[u8],
) -> Result<Vec<u8>, HandlerError> {
    let mut wire = Vec::with_capacity(1 + 3 + SIGNATURE_SIZE + signed_content.len());
    wire.push(PROTOCOL_VERSION);
    Record::Signature(signature).encode(&mut wire)?;
    wire.extend_from_slice(signed_content);
    Ok(wire)
}

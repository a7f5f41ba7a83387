//! Error types for the Sealframe protocol handler.
//!
//! Every failure is a distinct variant so callers (and tests) can tell a
//! forged message from a missing key from a malformed frame. Nothing here is
//! retried inside the core; retry policy belongs to the transport.

use sealframe_crypto::CryptoError;
use sealframe_proto::{KeyId, ProtocolError};
use thiserror::Error;

use crate::identity::UserHandle;

/// Errors produced by [`crate::ProtocolHandler`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Framing, ordering or record content violation
    #[error("malformed message: {reason}")]
    MalformedMessage {
        /// What was wrong
        reason: String,
    },

    /// Version byte does not match [`sealframe_proto::PROTOCOL_VERSION`]
    #[error("unsupported protocol version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Signature does not verify under the sender's signing key
    #[error("invalid signature from {sender}")]
    InvalidSignature {
        /// Claimed sender
        sender: UserHandle,
    },

    /// A (participant, key id) pair was asserted with a second, different key
    #[error("key conflict for {participant} key {key_id}")]
    KeyConflict {
        /// Participant owning the key
        participant: UserHandle,
        /// Key id already bound to a different key
        key_id: KeyId,
    },

    /// No sender key is known for the message's key id
    #[error("unknown sender key {key_id} for {participant}")]
    UnknownSenderKey {
        /// Participant owning the key
        participant: UserHandle,
        /// Key id that could not be resolved
        key_id: KeyId,
    },

    /// The key directory has no public key for this participant
    #[error("no public key for {handle}")]
    UnknownPeerKey {
        /// Participant whose key is missing
        handle: UserHandle,
    },

    /// The directory returned a key that cannot be used for agreement
    #[error("unusable public key for {handle}")]
    InvalidPeerKey {
        /// Participant whose key was rejected
        handle: UserHandle,
    },

    /// Payload did not decrypt to valid text
    #[error("payload decryption failed")]
    DecryptionFailed,

    /// Unwrapped key material does not match the advertised key ids
    #[error("key length mismatch: {reason}")]
    LengthMismatch {
        /// What did not line up
        reason: String,
    },

    /// Plaintext or handle too large for a 16-bit record length
    #[error("message too large: {len} bytes (max {max})")]
    MessageTooLarge {
        /// Offending length
        len: usize,
        /// Maximum encodable length
        max: usize,
    },

    /// Encryption requested with an empty destination list
    #[error("no recipients given")]
    NoRecipients,
}

impl HandlerError {
    /// Returns true if this error means the peer sent forged or
    /// inconsistent data, as opposed to local state being incomplete.
    ///
    /// Callers typically surface these to the user as a security warning
    /// rather than a "waiting for keys" state.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature { .. }
                | Self::KeyConflict { .. }
                | Self::LengthMismatch { .. }
                | Self::DecryptionFailed
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage { reason: reason.into() }
    }
}

/// Convert wire format errors into `MalformedMessage`
impl From<ProtocolError> for HandlerError {
    fn from(err: ProtocolError) -> Self {
        Self::malformed(err.to_string())
    }
}

/// Convert crypto errors that carry no peer context
impl From<CryptoError> for HandlerError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecodeFailure => Self::DecryptionFailed,
            CryptoError::LengthMismatch { .. } => Self::LengthMismatch { reason: err.to_string() },
            CryptoError::NonceTooShort { .. } | CryptoError::WeakPeerKey => {
                Self::malformed(err.to_string())
            },
        }
    }
}

/// Errors in [`crate::HandlerConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Rotation threshold must be at least one message
    #[error("rotate_key_every must be greater than zero")]
    ZeroRotationThreshold,
}

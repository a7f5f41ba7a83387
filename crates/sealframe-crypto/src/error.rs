//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors raised by the primitives in this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Unwrapped key material is not a whole number of keys
    #[error("wrapped key length {len} is not a non-zero multiple of {block}")]
    LengthMismatch {
        /// Observed length
        len: usize,
        /// Required granularity
        block: usize,
    },

    /// Decrypted payload is not valid text
    #[error("payload is not valid UTF-8")]
    DecodeFailure,

    /// Nonce input shorter than the cipher requires
    #[error("nonce too short: need {expected} bytes, got {actual}")]
    NonceTooShort {
        /// Required length
        expected: usize,
        /// Provided length
        actual: usize,
    },

    /// Diffie-Hellman produced an all-zero secret (low-order peer key)
    #[error("peer public key is not contributory")]
    WeakPeerKey,
}

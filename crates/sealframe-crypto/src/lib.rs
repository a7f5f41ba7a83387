//! Sealframe Cryptographic Primitives
//!
//! Building blocks for the Sealframe messaging protocol. Pure functions with
//! deterministic outputs: callers provide keys, nonces and any randomness,
//! which keeps the protocol handler testable under a seeded environment.
//!
//! # Key Lifecycle
//!
//! Each participant owns a sequence of random 16-byte sender keys. A sender
//! key encrypts that participant's outgoing payloads until it is rotated. To
//! reach a recipient, sender keys are wrapped under a pairwise
//! key-encryption-key derived from the two parties' long-term X25519 keys.
//!
//! ```text
//! X25519(own secret, peer public)
//!        │
//!        ▼
//! SHA-256 → Key-Encryption-Key (pairwise, stable)
//!        │
//!        ▼
//! AES-128-CBC wrap → sender keys for one recipient
//!
//! Sender Key (random, rotated)
//!        │
//!        ▼
//! AES-128-CTR → payload ciphertext
//! ```
//!
//! # Security
//!
//! Payload encryption carries no authentication tag. Integrity and
//! authenticity come solely from the Ed25519 signature the protocol handler
//! places over the framed message (nonce, wrapped keys, key ids and
//! ciphertext). Callers MUST verify that signature before decrypting.
//!
//! The UTF-8 check in [`decrypt_text`] is a last-resort sanity check and is
//! not an authenticity guarantee.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod agreement;
pub mod error;
pub mod keys;
pub mod payload;
pub mod signing;
pub mod wrap;

pub use agreement::derive_shared_key;
pub use error::CryptoError;
pub use keys::{KEY_SIZE, KeyEncryptionKey, SenderKey};
pub use payload::{NONCE_SIZE, decrypt_payload, decrypt_text, encrypt_payload, nonce_from_slice};
pub use signing::{PUBLIC_KEY_SIZE, SIGNATURE_SIZE, sign, verify};
pub use wrap::{IV_SIZE, derive_wrap_iv, unwrap_keys, wrap_keys};

//! Sealframe Protocol Handler
//!
//! Sans-IO core of the Sealframe messaging protocol. A [`ProtocolHandler`]
//! owns one participant's sender keys and turns plaintext into signed wire
//! messages and back. Transports, storage and key distribution live outside
//! this crate and reach it through [`KeyDirectory`] and [`Environment`].
//!
//! # Message Flow
//!
//! ```text
//! encrypt_to(text, dest)
//!        │
//!        ├─ rotate sender key every N messages
//!        ├─ AES-CTR encrypt payload (fresh nonce)
//!        ├─ keyed: wrap current (+ previous) key for each destination
//!        │  follow-up: key already delivered, no wrapping
//!        ├─ TLV records in ascending type order
//!        └─ Ed25519 sign, prepend SIGNATURE and version
//!
//! decrypt_from(wire, sender)
//!        │
//!        ├─ parse framing and record order
//!        ├─ check version, verify signature (fail closed)
//!        ├─ unwrap keys addressed to us, conflict check, cache
//!        └─ resolve primary key id, decrypt payload
//! ```
//!
//! # Security
//!
//! Payload encryption is unauthenticated AES-CTR, kept for wire
//! compatibility. The Ed25519 signature over framing and payload is the only
//! integrity check, so nothing in a message is trusted before it verifies.
//!
//! A sender key id, once bound for a participant, is never rebound. A second
//! message asserting a different key for the same id is rejected as
//! [`HandlerError::KeyConflict`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod directory;
pub mod env;
pub mod error;
pub mod handler;
pub mod identity;
pub mod key_store;
pub mod message;

pub use config::{DEFAULT_ROTATE_KEY_EVERY, HandlerConfig};
pub use directory::{KeyDirectory, MemoryDirectory, PublicKeys};
pub use env::{Environment, SystemEnv};
pub use error::{ConfigError, HandlerError};
pub use handler::{DecryptedMessage, ProtocolHandler};
pub use identity::{Identity, UserHandle};
pub use key_store::ParticipantKeyStore;
pub use message::{KeyTransport, ParsedMessage};

//! Deterministic simulation harness for Sealframe protocol testing.
//!
//! [`SimEnv`] implements the core `Environment` trait with a seeded RNG and
//! a virtual clock, so every run with the same seed produces the same keys,
//! nonces and messages. [`Conversation`] wires several participants to one
//! shared key directory and delivers messages by hand.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of sender key
//! rotation and delivery. Operations are applied to both the model and a
//! real conversation, and their observable outcomes are compared.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod conversation;
pub mod model;
pub mod sim_env;

pub use conversation::{Conversation, ConversationBuilder, SimHandler};
pub use model::{DeliveryOutcome, ModelWorld, Operation, ParticipantId, SendOutcome};
pub use sim_env::{DEFAULT_START_SECS, SimEnv};

//! Reference model for model-based testing.
//!
//! The model tracks sender key state as plain counters and sets. Operations
//! are applied to both the model and a real [`crate::Conversation`]; the
//! observable outcomes must agree.

mod operation;
mod world;

pub use operation::{Operation, ParticipantId};
pub use world::{DeliveryOutcome, ModelWorld, SendOutcome};

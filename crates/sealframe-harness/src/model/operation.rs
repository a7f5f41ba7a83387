//! Operations for model-based testing.

/// Participant index (0-based).
pub type ParticipantId = u8;

/// Operations applied to both the model and the real conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Encrypt a message for some destinations, optionally delivering it.
    Send {
        /// Sending participant
        from: ParticipantId,
        /// Destinations, excluding the sender
        to: Vec<ParticipantId>,
        /// Deliver to every destination, or drop the message
        deliver: bool,
    },

    /// Force a sender key rotation.
    Rotate {
        /// Participant rotating its key
        who: ParticipantId,
    },

    /// Advance the shared clock.
    AdvanceDays {
        /// Whole days to advance
        days: u8,
    },
}

//! Model world: expected sender key behaviour without any cryptography.

use std::collections::BTreeSet;

use sealframe_proto::KeyId;

use super::operation::ParticipantId;

/// Expected shape of an encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Key transport for every destination, carrying these key ids
    Keyed {
        /// Current key id, then the previous one if any
        key_ids: Vec<KeyId>,
    },
    /// No key transport
    Followup {
        /// Current key id
        key_id: KeyId,
    },
    /// Destination list was empty
    NoRecipients,
}

/// Expected result of delivering a message to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Decrypts under this key id
    Decrypted {
        /// Primary key id of the message
        key_id: KeyId,
    },
    /// Recipient never received the key
    UnknownSenderKey {
        /// Primary key id of the message
        key_id: KeyId,
    },
}

#[derive(Debug, Clone)]
struct ModelSender {
    current: KeyId,
    previous: Option<KeyId>,
    sent: bool,
    delivered: BTreeSet<ParticipantId>,
    messages: u32,
}

/// Reference model of a conversation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    day: u16,
    rotate_key_every: u32,
    senders: Vec<ModelSender>,
    /// (receiver, sender, key id) triples the receiver has cached
    known: BTreeSet<(ParticipantId, ParticipantId, KeyId)>,
}

impl ModelWorld {
    /// Model with `participants` fresh handlers on `day`.
    pub fn new(participants: usize, day: u16, rotate_key_every: u32) -> Self {
        let sender = ModelSender {
            current: KeyId::next(None, day),
            previous: None,
            sent: false,
            delivered: BTreeSet::new(),
            messages: 0,
        };
        Self {
            day,
            rotate_key_every,
            senders: vec![sender; participants],
            known: BTreeSet::new(),
        }
    }

    /// Number of participants.
    pub fn num_participants(&self) -> usize {
        self.senders.len()
    }

    /// Expected current key id of `who`.
    pub fn current_key_id(&self, who: ParticipantId) -> Option<KeyId> {
        self.senders.get(usize::from(who)).map(|sender| sender.current)
    }

    /// Advance the model clock.
    pub fn advance_days(&mut self, days: u8) {
        self.day = self.day.wrapping_add(u16::from(days));
    }

    /// Rotate `who`'s key. Unknown participants are ignored.
    pub fn rotate(&mut self, who: ParticipantId) {
        let day = self.day;
        if let Some(sender) = self.senders.get_mut(usize::from(who)) {
            rotate(sender, day);
        }
    }

    /// Send from `from` to the deduplicated `to`, delivering if asked.
    ///
    /// Returns the expected message shape and, when delivered, the expected
    /// outcome for each unique destination in order.
    pub fn send(
        &mut self,
        from: ParticipantId,
        to: &[ParticipantId],
        deliver: bool,
    ) -> (SendOutcome, Vec<(ParticipantId, DeliveryOutcome)>) {
        let destinations = unique(to);
        let day = self.day;
        let rotate_key_every = self.rotate_key_every;
        let Some(sender) = self.senders.get_mut(usize::from(from)) else {
            return (SendOutcome::NoRecipients, Vec::new());
        };
        if destinations.is_empty() {
            return (SendOutcome::NoRecipients, Vec::new());
        }

        let rotating = sender.messages >= rotate_key_every;
        let keyed = rotating
            || !sender.sent
            || destinations.iter().any(|dest| !sender.delivered.contains(dest));
        if rotating {
            rotate(sender, day);
        }

        let key_id = sender.current;
        let mut key_ids = vec![key_id];
        if keyed && let Some(previous) = sender.previous {
            key_ids.push(previous);
        }

        sender.messages += 1;
        if keyed {
            sender.sent = true;
            sender.delivered.extend(destinations.iter().copied());
        }

        let outcome = if keyed {
            SendOutcome::Keyed { key_ids: key_ids.clone() }
        } else {
            SendOutcome::Followup { key_id }
        };
        if !deliver {
            return (outcome, Vec::new());
        }

        let deliveries = destinations
            .iter()
            .map(|&dest| {
                if keyed {
                    for id in &key_ids {
                        self.known.insert((dest, from, *id));
                    }
                }
                let delivered = if self.known.contains(&(dest, from, key_id)) {
                    DeliveryOutcome::Decrypted { key_id }
                } else {
                    DeliveryOutcome::UnknownSenderKey { key_id }
                };
                (dest, delivered)
            })
            .collect();
        (outcome, deliveries)
    }
}

fn rotate(sender: &mut ModelSender, day: u16) {
    sender.previous = Some(sender.current);
    sender.current = KeyId::next(Some(sender.current), day);
    sender.sent = false;
    sender.delivered.clear();
    sender.messages = 0;
}

fn unique(ids: &[ParticipantId]) -> Vec<ParticipantId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

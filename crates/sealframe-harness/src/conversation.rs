//! Multi-participant conversations over a shared directory.
//!
//! A [`Conversation`] generates identities from one [`SimEnv`], publishes
//! them in a shared [`MemoryDirectory`] and builds a handler per
//! participant. Messages are delivered by hand, so tests decide ordering and
//! loss.

use std::sync::Arc;

use sealframe_core::{
    ConfigError, DecryptedMessage, HandlerConfig, HandlerError, Identity, MemoryDirectory,
    ProtocolHandler, UserHandle,
};

use crate::sim_env::SimEnv;

/// Handler type used throughout the harness.
pub type SimHandler = ProtocolHandler<SimEnv, Arc<MemoryDirectory>>;

/// Builder for [`Conversation`].
#[derive(Debug, Clone)]
pub struct ConversationBuilder {
    seed: u64,
    start_day: Option<u16>,
    config: HandlerConfig,
    participants: Vec<UserHandle>,
}

impl ConversationBuilder {
    /// RNG seed for identities, sender keys and nonces.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Start the virtual clock at midnight of `day`.
    #[must_use]
    pub fn start_day(mut self, day: u16) -> Self {
        self.start_day = Some(day);
        self
    }

    /// Rotation threshold for every participant.
    #[must_use]
    pub fn rotate_key_every(mut self, messages: u32) -> Self {
        self.config.rotate_key_every = messages;
        self
    }

    /// Add a participant.
    #[must_use]
    pub fn participant(mut self, handle: impl Into<UserHandle>) -> Self {
        self.participants.push(handle.into());
        self
    }

    /// Add several participants.
    #[must_use]
    pub fn participants<H: Into<UserHandle>>(
        mut self,
        handles: impl IntoIterator<Item = H>,
    ) -> Self {
        self.participants.extend(handles.into_iter().map(Into::into));
        self
    }

    /// Generate identities, publish them and create the handlers.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if the rotation threshold is zero
    pub fn build(self) -> Result<Conversation, ConfigError> {
        let env = match self.start_day {
            Some(day) => SimEnv::on_day(self.seed, day),
            None => SimEnv::with_seed(self.seed),
        };

        let identities: Vec<Identity> = self
            .participants
            .into_iter()
            .map(|handle| Identity::generate(handle, &env))
            .collect();

        let mut directory = MemoryDirectory::new();
        for identity in &identities {
            directory.publish(identity);
        }
        let directory = Arc::new(directory);

        let handlers = identities
            .into_iter()
            .map(|identity| {
                ProtocolHandler::new(identity, env.clone(), Arc::clone(&directory), self.config)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Conversation { env, directory, handlers })
    }
}

/// Participants that share one environment and one key directory.
#[derive(Debug)]
pub struct Conversation {
    env: SimEnv,
    directory: Arc<MemoryDirectory>,
    handlers: Vec<SimHandler>,
}

impl Conversation {
    /// Start building a conversation.
    pub fn builder() -> ConversationBuilder {
        ConversationBuilder {
            seed: 0,
            start_day: None,
            config: HandlerConfig::default(),
            participants: Vec::new(),
        }
    }

    /// Shared environment, for clock control.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Shared key directory.
    pub fn directory(&self) -> &Arc<MemoryDirectory> {
        &self.directory
    }

    /// Participant handles in insertion order.
    pub fn handles(&self) -> impl Iterator<Item = &UserHandle> {
        self.handlers.iter().map(SimHandler::handle)
    }

    /// Handler for `handle`.
    pub fn handler(&self, handle: &str) -> Option<&SimHandler> {
        self.handlers.iter().find(|handler| handler.handle().as_str() == handle)
    }

    /// Mutable handler for `handle`.
    pub fn handler_mut(&mut self, handle: &str) -> Option<&mut SimHandler> {
        self.handlers.iter_mut().find(|handler| handler.handle().as_str() == handle)
    }

    /// Encrypt `text` from `from` to every handle in `to`.
    ///
    /// # Errors
    ///
    /// - `UnknownPeerKey` naming `from` if it is not a participant
    /// - any error of [`ProtocolHandler::encrypt_to_group`]
    pub fn send(&mut self, from: &str, to: &[&str], text: &str) -> Result<Vec<u8>, HandlerError> {
        let destinations: Vec<UserHandle> = to.iter().copied().map(UserHandle::from).collect();
        self.sender(from)?.encrypt_to_group(text, &destinations)
    }

    /// Hand `wire`, sent by `from`, to participant `to`.
    ///
    /// # Errors
    ///
    /// - `UnknownPeerKey` naming `to` if it is not a participant
    /// - any error of [`ProtocolHandler::decrypt_from`]
    pub fn deliver(
        &mut self,
        wire: &[u8],
        from: &str,
        to: &str,
    ) -> Result<DecryptedMessage, HandlerError> {
        let sender = UserHandle::from(from);
        let result = self.sender(to)?.decrypt_from(wire, &sender);
        if let Err(err) = &result {
            tracing::debug!(from, to, error = %err, "Delivery rejected");
        }
        result
    }

    /// Send `text` and deliver it to every destination in order.
    ///
    /// # Errors
    ///
    /// Fails only if encryption fails. Per-recipient outcomes are returned.
    pub fn broadcast(
        &mut self,
        from: &str,
        to: &[&str],
        text: &str,
    ) -> Result<Vec<Result<DecryptedMessage, HandlerError>>, HandlerError> {
        let wire = self.send(from, to, text)?;
        Ok(to.iter().map(|recipient| self.deliver(&wire, from, recipient)).collect())
    }

    fn sender(&mut self, handle: &str) -> Result<&mut SimHandler, HandlerError> {
        self.handler_mut(handle)
            .ok_or_else(|| HandlerError::UnknownPeerKey { handle: UserHandle::from(handle) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_publishes_every_participant() {
        let conversation =
            Conversation::builder().seed(3).participants(["alice", "bob", "carol"]).build().unwrap();

        assert_eq!(conversation.directory().len(), 3);
        let handles: Vec<_> = conversation.handles().map(UserHandle::as_str).collect();
        assert_eq!(handles, ["alice", "bob", "carol"]);
    }

    #[test]
    fn zero_threshold_fails_build() {
        let result = Conversation::builder().participant("alice").rotate_key_every(0).build();
        assert!(matches!(result, Err(ConfigError::ZeroRotationThreshold)));
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let mut conversation =
            Conversation::builder().seed(9).participants(["alice", "bob", "carol"]).build().unwrap();

        let outcomes = conversation.broadcast("alice", &["bob", "carol"], "hi all").unwrap();

        assert_eq!(outcomes.len(), 2);
        for outcome in outcomes {
            assert_eq!(outcome.unwrap().payload, "hi all");
        }
    }

    #[test]
    fn unknown_participant_is_reported() {
        let mut conversation = Conversation::builder().participant("alice").build().unwrap();

        let result = conversation.send("mallory", &["alice"], "x");
        assert_eq!(result, Err(HandlerError::UnknownPeerKey { handle: UserHandle::from("mallory") }));
    }
}

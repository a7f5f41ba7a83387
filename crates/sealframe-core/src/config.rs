//! Handler configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of messages encrypted under one sender key.
pub const DEFAULT_ROTATE_KEY_EVERY: u32 = 16;

/// Tunables for a [`crate::ProtocolHandler`].
///
/// Deserializable so an embedding application can load it from its own
/// configuration file; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Rotate the sender key after this many messages.
    pub rotate_key_every: u32,
}

impl HandlerConfig {
    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotate_key_every == 0 {
            return Err(ConfigError::ZeroRotationThreshold);
        }
        Ok(())
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self { rotate_key_every: DEFAULT_ROTATE_KEY_EVERY }
    }
}

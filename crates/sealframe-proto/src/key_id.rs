//! Compact, time-ordered sender key identifiers.
//!
//! A [`KeyId`] packs a 16-bit day counter and a 16-bit per-day rotation
//! counter into four bytes:
//!
//! ```text
//! [day_epoch: u16 BE][counter: u16 BE]
//! ```
//!
//! The day gives an approximate issue date without any clock
//! synchronization beyond day boundaries. The counter makes a participant's
//! own ids unique within a day. Ids issued by different participants are
//! independent and carry no global order.

use std::fmt;

/// Seconds in one day of the key id clock.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Days since the Unix epoch, truncated to 16 bits.
pub fn day_epoch_from_secs(unix_secs: u64) -> u16 {
    (unix_secs / SECONDS_PER_DAY) as u16
}

/// Identifier of one sender key generation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(u32);

impl KeyId {
    /// Build from a day epoch and counter.
    pub fn new(day: u16, counter: u16) -> Self {
        Self((u32::from(day) << 16) | u32::from(counter))
    }

    /// Id that follows `previous` on `today`.
    ///
    /// - no previous id: `(today, 0)`
    /// - previous id from another day: `(today, 0)`
    /// - previous id from today: `(today, counter + 1)`, wrapping at 65536
    pub fn next(previous: Option<Self>, today: u16) -> Self {
        match previous {
            Some(prev) if prev.day() == today => Self::new(today, prev.counter().wrapping_add(1)),
            _ => Self::new(today, 0),
        }
    }

    /// Day epoch component.
    pub fn day(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Rotation counter component.
    pub fn counter(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Packed 32-bit value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Wire encoding (big-endian).
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode from wire bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    /// Decode from a slice. `None` unless exactly four bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 4]>::try_from(bytes).ok().map(Self::from_bytes)
    }
}

impl From<u32> for KeyId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({:#06x}:{})", self.day(), self.counter())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

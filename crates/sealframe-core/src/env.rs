//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (wall clock, randomness).
//! Enables deterministic simulation with a virtual clock and seeded RNG, and
//! production use with real system resources.

/// Abstract environment providing wall-clock time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    ///
    /// Only day granularity matters to the protocol, so small clock skew
    /// between participants is harmless.
    fn wall_clock_secs(&self) -> u64;

    /// Days since the Unix epoch, as used in key identifiers.
    fn day_epoch(&self) -> u16 {
        sealframe_proto::day_epoch_from_secs(self.wall_clock_secs())
    }

    /// Fills and returns a fixed-size array of random bytes.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Production environment using the system clock and OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. A handler without functioning cryptographic
/// randomness would reuse nonces and produce guessable keys; continuing is
/// never correct.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot generate keys securely");
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

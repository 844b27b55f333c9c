//! Environment abstraction for deterministic testing.
//!
//! Decouples key lifecycle logic from system resources (wall-clock time,
//! randomness). Simulation supplies a virtual clock and a seeded RNG;
//! production supplies the system clock and OS entropy.

use meshpae_nvm::{GTK_LEN, GtkKey};

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now_secs()` is wall-clock time in seconds. GTK expiry and the frame
///   counter `stored_time` are absolute timestamps that must remain
///   meaningful across restarts, so a monotonic process clock is not enough.
/// - `random_bytes()` uses cryptographically secure entropy in production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in seconds since the Unix epoch.
    fn now_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// Given the same seed, simulation environments produce the same
    /// sequence of bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates fresh GTK material.
    fn random_gtk(&self) -> GtkKey {
        let mut bytes = [0u8; GTK_LEN];
        self.random_bytes(&mut bytes);
        GtkKey::new(bytes)
    }
}

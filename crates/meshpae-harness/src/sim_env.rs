//! Simulated environment: virtual clock and seeded RNG.
//!
//! Clones share the clock and the RNG, so a test can keep one handle to
//! advance time while the controller holds another.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use meshpae_core::Environment;
use rand::RngCore;
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};

/// Fixed start time: 2024-01-01 00:00:00 UTC
pub const SIM_EPOCH_SECS: u64 = 1_704_067_200;

/// Deterministic environment for simulation and tests.
#[derive(Clone)]
pub struct SimEnv {
    now: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Environment seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment whose random stream is fixed by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(SIM_EPOCH_SECS)),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock, possibly backwards.
    pub fn set_time(&self, secs: u64) {
        self.now.store(secs, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("now", &self.now_secs()).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::expect_used)]
        let mut rng = self.rng.lock().expect("SimEnv RNG mutex poisoned");
        rng.fill_bytes(buffer);
    }
}

//! Simulated authenticator node.
//!
//! Bundles a controller with the environment, store and recording it was
//! started with, so tests can crash and restart it against the same store.

use meshpae_auth::{Controller, MemoryStore, NvmStore, PaeConfig, PaeError};

use crate::{recording::RecordingHooks, sim_env::SimEnv};

/// A controller over simulated resources.
pub struct SimNode<S: NvmStore = MemoryStore> {
    /// Running controller
    pub controller: Controller<S, SimEnv>,
    /// Shared clock and RNG
    pub env: SimEnv,
    /// Shared store handle
    pub store: S,
    /// Push-down recording
    pub hooks: RecordingHooks,
    config: PaeConfig,
}

impl SimNode<MemoryStore> {
    /// Start a node on an empty in-memory store.
    pub fn start(seed: u64, config: PaeConfig) -> Result<Self, PaeError> {
        Self::start_with(SimEnv::with_seed(seed), MemoryStore::new(), config)
    }
}

impl<S: NvmStore> SimNode<S> {
    /// Start a node on the given environment and store.
    pub fn start_with(env: SimEnv, store: S, config: PaeConfig) -> Result<Self, PaeError> {
        let hooks = RecordingHooks::new();
        let controller =
            Controller::start(env.clone(), store.clone(), config.clone(), hooks.hooks())?;
        Ok(Self { controller, env, store, hooks, config })
    }

    /// Drop all volatile state and start again from the store, without a
    /// clean shutdown.
    pub fn crash_and_restart(self) -> Result<Self, PaeError> {
        tracing::debug!("simulated crash");
        Self::start_with(self.env, self.store, self.config)
    }
}

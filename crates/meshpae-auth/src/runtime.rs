//! Production runtime: tokio timers around the controller.
//!
//! One task owns the authenticator and drives its fast and slow timers
//! from two `tokio::time::interval`s until ctrl-c. Controller events that
//! call for new key material are answered here with fresh random GTKs.

use std::{fmt, path::PathBuf, time::Duration};

use meshpae_core::Environment;

use crate::{
    authenticator::{Authenticator, Pae},
    config::PaeConfig,
    controller::ControllerEvent,
    error::PaeError,
    hooks::KeyHooks,
    storage::{RedbStore, StorageError},
    system_env::SystemEnv,
};

/// Runtime configuration for the authenticator host.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path of the redb database holding the NVM records
    pub store_path: PathBuf,
    /// Authenticator configuration
    pub pae: PaeConfig,
    /// Fast timer period
    pub fast_tick: Duration,
    /// Slow timer period
    pub slow_tick: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let pae = PaeConfig::default();
        let fast_tick = Duration::from_millis(1000 / u64::from(pae.fast_ticks_per_second.max(1)));
        Self {
            store_path: PathBuf::from("meshpae.redb"),
            pae,
            fast_tick,
            slow_tick: Duration::from_secs(1),
        }
    }
}

/// Errors that stop the runtime.
#[derive(Debug)]
pub enum RuntimeError {
    /// Configuration rejected before start-up.
    Config(String),

    /// Store could not be opened.
    Storage(StorageError),

    /// Authenticator failed to start or shut down cleanly.
    Pae(PaeError),

    /// Signal handling failed.
    Io(std::io::Error),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Pae(err) => write!(f, "authenticator error: {err}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Pae(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Config(_) => None,
        }
    }
}

impl From<StorageError> for RuntimeError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<PaeError> for RuntimeError {
    fn from(err: PaeError) -> Self {
        Self::Pae(err)
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Open the store, start the authenticator and drive it until ctrl-c.
///
/// # Errors
///
/// - `Config` if a timer period is zero
/// - `Storage` if the database cannot be opened
/// - `Pae` if start-up or the final counter persist fails
pub async fn run(config: RuntimeConfig) -> Result<(), RuntimeError> {
    if config.fast_tick.is_zero() || config.slow_tick.is_zero() {
        return Err(RuntimeError::Config("timer periods must be non-zero".to_string()));
    }

    let env = SystemEnv::new();
    let store = RedbStore::open(&config.store_path)?;
    let lifetime = config.pae.gtk_lifetime_secs;
    let slow_secs = u32::try_from(config.slow_tick.as_secs().max(1)).unwrap_or(u32::MAX);

    let mut pae = Pae::start(env, store, config.pae, KeyHooks::tracing())?;
    tracing::info!(store = %config.store_path.display(), "authenticator runtime started");

    let mut fast = tokio::time::interval(config.fast_tick);
    let mut slow = tokio::time::interval(config.slow_tick);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = fast.tick() => pae.authenticator().fast_timer(1),
            _ = slow.tick() => {
                match pae.authenticator().slow_timer(slow_secs) {
                    Ok(events) => respond(pae.authenticator(), &env, &events, lifetime),
                    Err(e) => tracing::warn!(error = %e, transient = e.is_transient(), "slow tick failed"),
                }
            },
            result = &mut shutdown => {
                result?;
                tracing::info!("shutdown requested");
                break;
            },
        }
    }

    pae.authenticator().shutdown()?;
    Ok(())
}

/// Answer controller events that ask for key material.
///
/// `NeedsRotation` installs and activates a fresh GTK; `SuccessorRequired`
/// installs one to be activated when the current key expires.
pub fn respond(
    authenticator: &mut dyn Authenticator,
    env: &impl Environment,
    events: &[ControllerEvent],
    lifetime_secs: u64,
) {
    for event in events {
        match event {
            ControllerEvent::NeedsRotation => {
                let result = authenticator
                    .install_gtk(env.random_gtk(), lifetime_secs)
                    .and_then(|slot| authenticator.activate_gtk(slot));
                if let Err(e) = result {
                    tracing::warn!(error = %e, "GTK rotation failed, retrying on next slow tick");
                }
            },
            ControllerEvent::SuccessorRequired => {
                if let Err(e) = authenticator.install_gtk(env.random_gtk(), lifetime_secs) {
                    tracing::warn!(error = %e, "successor GTK install failed");
                }
            },
            other => tracing::debug!(event = ?other, "controller event"),
        }
    }
}

//! Mesh PAE authenticator.
//!
//! Wraps the pure key-management state machines of [`meshpae_core`] with
//! durable storage, supplicant admission and timer handling.
//!
//! # Architecture
//!
//! The [`Controller`] is synchronous and owns all state. It persists through
//! an [`NvmStore`] and pushes finished key state down through [`KeyHooks`].
//! [`run`] hosts it on tokio with two interval timers.
//!
//! # Components
//!
//! - [`Controller`]: authenticator state and operations
//! - [`Pae`]: enabled controller or [`DisabledAuthenticator`], behind the
//!   [`Authenticator`] trait
//! - [`NvmStore`]: named blob storage ([`MemoryStore`], [`RedbStore`],
//!   [`ChaoticStore`])
//! - [`SystemEnv`]: production environment (wall clock, OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod authenticator;
mod config;
mod controller;
mod error;
mod hooks;
mod runtime;
pub mod storage;
mod supplicant;
mod system_env;

pub use authenticator::{Authenticator, DisabledAuthenticator, Pae};
pub use config::{DEFAULT_GTK_LIFETIME_SECS, PaeConfig};
pub use controller::{Controller, ControllerEvent, GcReport};
pub use error::PaeError;
pub use hooks::{GtkHashSink, HandshakeTimers, KeyHooks, KeyIndexSink, KeyInstaller, TracingHooks};
pub use runtime::{RuntimeConfig, RuntimeError, respond, run};
pub use storage::{ChaoticStore, MemoryStore, NvmStore, RedbStore, StorageError, StoreId};
pub use supplicant::{Supplicant, SupplicantRegistry, SupplicantState};
pub use system_env::SystemEnv;

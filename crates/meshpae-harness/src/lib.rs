//! Deterministic simulation harness for the mesh PAE authenticator.
//!
//! Provides a seeded [`SimEnv`], [`RecordingHooks`] that capture every
//! push-down, and a [`SimNode`] that can be crashed and restarted against
//! the same store.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after every
//! controller operation. Use [`InvariantRegistry::standard()`] in
//! simulations that leave the store alone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod node;
pub mod recording;
pub mod sim_env;

pub use invariants::{
    CounterBinding, GtkSnapshot, IndexMatchesStore, Invariant, InvariantRegistry, InvariantResult,
    SingleActiveGtk, StorageOwnership, SupplicantSnapshot, SystemSnapshot, Violation,
};
pub use node::SimNode;
pub use recording::{Recording, RecordingHooks};
pub use sim_env::{SIM_EPOCH_SECS, SimEnv};

//! Key management core for the mesh PAE authenticator.
//!
//! Pure state machines with no I/O: the GTK lifecycle manager, the frame
//! counter tracker and the relay liveness table. Time is passed in as
//! wall-clock seconds; persistence is the caller's job.
//!
//! # Architecture
//!
//! - [`GtkLifecycleManager`]: four GTK slots, install/activate/expire
//! - [`FrameCounterTracker`]: per-slot anti-replay counters and epochs
//! - [`RelayTable`]: bounded TTL table of EAPOL relays
//! - [`Environment`]: time and randomness, swapped out under simulation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod frame_counter;
pub mod gtk;
pub mod relay;

pub use env::Environment;
pub use error::{CounterError, GtkError};
pub use frame_counter::{
    CounterConfig, DEFAULT_STORE_INTERVAL_SECS, DEFAULT_STORE_THRESHOLD, FrameCounterTracker,
    ReplayPolicy,
};
pub use gtk::{
    DEFAULT_NEW_INSTALL_REQUIRED_PCT, EMPTY_GTK_HASH, EvictionPolicy, GtkHash,
    GtkLifecycleManager, SweepReport, gtk_hash,
};
pub use relay::{DEFAULT_RELAY_CAPACITY, DEFAULT_RELAY_TTL, RelayEntry, RelayTable};

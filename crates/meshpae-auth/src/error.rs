//! Authenticator error types.
//!
//! Errors from the core state machines and the store are wrapped with
//! `#[from]` so controller operations can use `?` throughout.

use meshpae_core::{CounterError, GtkError};
use meshpae_nvm::Eui64;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by controller operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaeError {
    /// GTK slot operation refused
    #[error("GTK error: {0}")]
    Gtk(#[from] GtkError),

    /// Frame counter update refused
    #[error("frame counter error: {0}")]
    Counter(#[from] CounterError),

    /// Too many Authenticated supplicants
    #[error("admission limit of {limit} supplicants reached")]
    AdmissionLimitExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Backing store failed; in-memory state is unchanged
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// Every key-storage record is in use
    #[error("no free key-storage record")]
    KeyStorageExhausted,

    /// Supplicant never seen
    #[error("unknown supplicant {0}")]
    UnknownSupplicant(Eui64),

    /// Authenticator disabled by configuration
    #[error("authenticator disabled")]
    Disabled,
}

impl PaeError {
    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Gtk(e) => e.is_transient(),
            Self::AdmissionLimitExceeded { .. }
            | Self::StorageUnavailable(_)
            | Self::KeyStorageExhausted => true,
            Self::Counter(_) | Self::UnknownSupplicant(_) | Self::Disabled => false,
        }
    }
}

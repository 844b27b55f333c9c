//! Error types for the key management core.
//!
//! Every error here is recoverable locally: the caller either retries later
//! (`KeyStoreFull`), refuses the offending peer (`CounterRegression`), or
//! sources new key material (`NeedsRotation`).

use meshpae_nvm::{GtkStatus, SlotId};
use thiserror::Error;

/// Errors from the GTK lifecycle manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GtkError {
    /// All slots are occupied and the eviction policy refused to free one
    #[error("all GTK slots occupied")]
    KeyStoreFull,

    /// Operation addressed an empty slot
    #[error("GTK slot {0} is empty")]
    EmptySlot(SlotId),

    /// Slot is not in a state that allows the requested transition
    #[error("GTK slot {slot} cannot be activated from {from:?}")]
    InvalidTransition {
        /// Slot addressed
        slot: SlotId,
        /// Its current status
        from: GtkStatus,
    },

    /// The key material is already installed
    #[error("key already installed in GTK slot {0}")]
    DuplicateKey(SlotId),

    /// No usable Active key and no Installed successor to promote
    #[error("active GTK expired with no successor; new key material required")]
    NeedsRotation,
}

impl GtkError {
    /// Returns true if waiting (for expiry or new key material) resolves this
    /// error without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::KeyStoreFull | Self::NeedsRotation)
    }
}

/// Errors from the frame counter tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    /// New value would move the counter backwards; possible replay
    #[error("frame counter regression on slot {slot}: last {last}, attempted {attempted}")]
    CounterRegression {
        /// Slot addressed
        slot: SlotId,
        /// Current counter value
        last: u32,
        /// Rejected value
        attempted: u32,
    },

    /// Slot has no GTK bound to it
    #[error("no GTK bound to frame counter slot {0}")]
    Unbound(SlotId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_resolves_capacity_errors() {
        assert!(GtkError::KeyStoreFull.is_transient());
        assert!(GtkError::NeedsRotation.is_transient());

        let slot = SlotId::new(1).unwrap();
        assert!(!GtkError::EmptySlot(slot).is_transient());
        assert!(!GtkError::DuplicateKey(slot).is_transient());
        assert!(
            !GtkError::InvalidTransition { slot, from: GtkStatus::Expiring }.is_transient()
        );
    }

    #[test]
    fn regression_message_names_values() {
        let err = CounterError::CounterRegression {
            slot: SlotId::new(0).unwrap(),
            last: 10,
            attempted: 9,
        };
        assert_eq!(err.to_string(), "frame counter regression on slot 0: last 10, attempted 9");
    }
}

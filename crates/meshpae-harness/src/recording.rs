//! Hooks that record every push-down for later assertions.

#![allow(clippy::disallowed_types, reason = "Shared between hooks and test")]

use std::sync::{Arc, Mutex};

use meshpae_auth::{GtkHashSink, HandshakeTimers, KeyHooks, KeyIndexSink, KeyInstaller};
use meshpae_core::GtkHash;
use meshpae_nvm::{Eui64, GTK_SLOT_COUNT, GtkKeySet, SlotId};

/// Everything pushed down so far.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    /// Supplicants keys were installed for, in order
    pub installs: Vec<Eui64>,
    /// Every published hash set
    pub hashes: Vec<[GtkHash; GTK_SLOT_COUNT]>,
    /// Every Active index change
    pub active_indices: Vec<SlotId>,
    /// Total handshake ticks
    pub handshake_ticks: u64,
}

/// Recording hook set. Clones share the recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingHooks {
    /// Create an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook bundle writing into this recording.
    pub fn hooks(&self) -> KeyHooks {
        KeyHooks {
            installer: Box::new(self.clone()),
            hashes: Box::new(self.clone()),
            key_index: Box::new(self.clone()),
            handshake: Box::new(self.clone()),
        }
    }

    /// Copy of the recording so far.
    pub fn recording(&self) -> Recording {
        self.with(|r| r.clone())
    }

    /// Latest published hash set.
    pub fn last_hashes(&self) -> Option<[GtkHash; GTK_SLOT_COUNT]> {
        self.with(|r| r.hashes.last().copied())
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recording) -> T) -> T {
        #[allow(clippy::expect_used)]
        let mut recording = self.recording.lock().expect("recording mutex poisoned");
        f(&mut recording)
    }
}

impl KeyInstaller for RecordingHooks {
    fn install_keys(&mut self, supplicant: Eui64, _gtks: &GtkKeySet) {
        self.with(|r| r.installs.push(supplicant));
    }
}

impl GtkHashSink for RecordingHooks {
    fn publish(&mut self, hashes: &[GtkHash; GTK_SLOT_COUNT]) {
        self.with(|r| r.hashes.push(*hashes));
    }
}

impl KeyIndexSink for RecordingHooks {
    fn set_active_index(&mut self, slot: SlotId) {
        self.with(|r| r.active_indices.push(slot));
    }
}

impl HandshakeTimers for RecordingHooks {
    fn tick(&mut self, ticks: u32) {
        self.with(|r| r.handshake_ticks += u64::from(ticks));
    }
}

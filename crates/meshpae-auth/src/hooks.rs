//! Push-down callbacks into the MAC layer and handshake engine.
//!
//! The controller never programs hardware or runs the handshake itself. It
//! reports finished key state through these traits, injected at
//! construction as a [`KeyHooks`] bundle.

use meshpae_core::GtkHash;
use meshpae_nvm::{Eui64, GTK_SLOT_COUNT, GtkKeySet, SlotId};

/// Installs group keys for an admitted supplicant.
pub trait KeyInstaller: Send {
    /// Called when `supplicant` becomes Authenticated.
    fn install_keys(&mut self, supplicant: Eui64, gtks: &GtkKeySet);
}

/// Publishes the non-secret GTK hashes advertised to the mesh.
pub trait GtkHashSink: Send {
    /// Called whenever the key set changes and on every admission.
    fn publish(&mut self, hashes: &[GtkHash; GTK_SLOT_COUNT]);
}

/// Selects the GTK used for outgoing frames.
pub trait KeyIndexSink: Send {
    /// Called when a slot becomes Active.
    fn set_active_index(&mut self, slot: SlotId);
}

/// Drives handshake retransmission timers.
pub trait HandshakeTimers: Send {
    /// Called on every fast tick with the number of ticks elapsed.
    fn tick(&mut self, ticks: u32);
}

/// Callback bundle handed to the controller.
pub struct KeyHooks {
    /// Per-supplicant key installation
    pub installer: Box<dyn KeyInstaller>,
    /// GTK hash publication
    pub hashes: Box<dyn GtkHashSink>,
    /// Active send-key selection
    pub key_index: Box<dyn KeyIndexSink>,
    /// Handshake retransmission
    pub handshake: Box<dyn HandshakeTimers>,
}

impl KeyHooks {
    /// Hooks that only log what they receive.
    #[must_use]
    pub fn tracing() -> Self {
        Self {
            installer: Box::new(TracingHooks),
            hashes: Box::new(TracingHooks),
            key_index: Box::new(TracingHooks),
            handshake: Box::new(TracingHooks),
        }
    }
}

impl Default for KeyHooks {
    fn default() -> Self {
        Self::tracing()
    }
}

impl std::fmt::Debug for KeyHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHooks").finish_non_exhaustive()
    }
}

/// Hook implementation for hosts without a MAC layer to program.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl KeyInstaller for TracingHooks {
    fn install_keys(&mut self, supplicant: Eui64, gtks: &GtkKeySet) {
        tracing::debug!(supplicant = %supplicant, gtks = gtks.len(), "install group keys");
    }
}

impl GtkHashSink for TracingHooks {
    fn publish(&mut self, hashes: &[GtkHash; GTK_SLOT_COUNT]) {
        let occupied = hashes.iter().filter(|h| **h != meshpae_core::EMPTY_GTK_HASH).count();
        tracing::debug!(occupied, "publish GTK hashes");
    }
}

impl KeyIndexSink for TracingHooks {
    fn set_active_index(&mut self, slot: SlotId) {
        tracing::debug!(slot = %slot, "set active GTK index");
    }
}

impl HandshakeTimers for TracingHooks {
    fn tick(&mut self, ticks: u32) {
        tracing::trace!(ticks, "handshake timers");
    }
}

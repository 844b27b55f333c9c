//! Outgoing frame counter tracking.
//!
//! Each GTK slot carries a 32-bit frame counter bound to the key it
//! protects. A counter must never repeat for a given key, including across
//! restarts, so the tracker only persists every `store_threshold` increments
//! and skips ahead by that amount when a stored image is loaded.

use meshpae_nvm::{BoundCounter, FrameCounterSet, GTK_SLOT_COUNT, GtkKey, GtkKeySet, SlotId};

use crate::error::CounterError;

/// Counter advance between persisted images.
pub const DEFAULT_STORE_THRESHOLD: u32 = 1_000_000;

/// Maximum seconds between persisted images.
pub const DEFAULT_STORE_INTERVAL_SECS: u64 = 3600;

/// How `set` treats a value that does not advance the counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Reject values below the current counter; equal values are accepted
    #[default]
    RejectLower,
    /// Reject values at or below the current counter
    RejectLowerOrEqual,
}

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    /// Treatment of non-advancing values
    pub replay_policy: ReplayPolicy,
    /// Advance that forces a persist, also the skip applied on load
    pub store_threshold: u32,
    /// Maximum seconds between persists
    pub store_interval_secs: u64,
    /// Added to the PAN version on every load
    pub pan_version_restart_increment: u16,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            replay_policy: ReplayPolicy::default(),
            store_threshold: DEFAULT_STORE_THRESHOLD,
            store_interval_secs: DEFAULT_STORE_INTERVAL_SECS,
            pan_version_restart_increment: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct SlotCounter {
    key: GtkKey,
    current: u32,
    persisted: u32,
    /// No value has been accepted since the key was bound
    fresh: bool,
}

/// Per-slot frame counters plus the restart and PAN version epochs.
#[derive(Debug, Clone)]
pub struct FrameCounterTracker {
    slots: [Option<SlotCounter>; GTK_SLOT_COUNT],
    restart_counter: u32,
    stored_time: u64,
    pan_version: u16,
    config: CounterConfig,
}

impl FrameCounterTracker {
    /// Tracker with no stored image.
    #[must_use]
    pub fn new(config: CounterConfig) -> Self {
        Self {
            slots: Default::default(),
            restart_counter: 0,
            stored_time: 0,
            pan_version: 0,
            config,
        }
    }

    /// Resume from a stored image.
    ///
    /// The restart counter is incremented by one, every counter skips
    /// ahead by `store_threshold` (values since the last persist may already
    /// have been used), and the PAN version advances by the restart
    /// increment.
    #[must_use]
    pub fn load(stored: FrameCounterSet, config: CounterConfig) -> Self {
        let mut slots: [Option<SlotCounter>; GTK_SLOT_COUNT] = Default::default();
        for (dst, src) in slots.iter_mut().zip(stored.counters) {
            *dst = src.map(|c| SlotCounter {
                key: c.key,
                current: c.counter.saturating_add(config.store_threshold),
                persisted: c.counter,
                fresh: false,
            });
        }

        let tracker = Self {
            slots,
            restart_counter: stored.restart_counter.wrapping_add(1),
            stored_time: stored.stored_time,
            pan_version: stored.pan_version.wrapping_add(config.pan_version_restart_increment),
            config,
        };
        tracing::info!(
            restart_counter = tracker.restart_counter,
            pan_version = tracker.pan_version,
            "frame counters restored"
        );
        tracker
    }

    /// Current counter for a slot, 0 if unbound.
    #[must_use]
    pub fn read(&self, slot: SlotId) -> u32 {
        self.slots[slot.index()].as_ref().map_or(0, |c| c.current)
    }

    /// Key bound to a slot.
    #[must_use]
    pub fn bound_key(&self, slot: SlotId) -> Option<&GtkKey> {
        self.slots[slot.index()].as_ref().map(|c| &c.key)
    }

    /// Advance a slot's counter.
    ///
    /// # Errors
    ///
    /// - `Unbound` if no key is bound to the slot
    /// - `CounterRegression` if the value does not advance the counter
    ///   under the configured [`ReplayPolicy`]
    pub fn set(&mut self, slot: SlotId, value: u32) -> Result<(), CounterError> {
        let policy = self.config.replay_policy;
        let counter = self.slots[slot.index()].as_mut().ok_or(CounterError::Unbound(slot))?;

        let rejected = match policy {
            ReplayPolicy::RejectLower => value < counter.current,
            ReplayPolicy::RejectLowerOrEqual => !counter.fresh && value <= counter.current,
        };
        if rejected {
            tracing::warn!(slot = %slot, last = counter.current, attempted = value, "frame counter regression");
            return Err(CounterError::CounterRegression {
                slot,
                last: counter.current,
                attempted: value,
            });
        }

        counter.current = value;
        counter.fresh = false;
        Ok(())
    }

    /// Bind a key to a slot. Binding a different key resets the counter;
    /// rebinding the same key keeps it.
    pub fn bind(&mut self, slot: SlotId, key: &GtkKey) {
        let entry = &mut self.slots[slot.index()];
        if entry.as_ref().is_some_and(|c| &c.key == key) {
            return;
        }
        *entry = Some(SlotCounter { key: key.clone(), current: 0, persisted: 0, fresh: true });
        tracing::debug!(slot = %slot, "frame counter bound to new GTK");
    }

    /// Drop the counter for a slot.
    pub fn unbind(&mut self, slot: SlotId) {
        self.slots[slot.index()] = None;
    }

    /// Align bindings with a key set: slots whose key changed are rebound
    /// from zero, empty slots are unbound.
    pub fn reconcile(&mut self, keys: &GtkKeySet) {
        for slot in SlotId::all() {
            match keys.get(slot) {
                Some(gtk) => self.bind(slot, &gtk.key),
                None => self.unbind(slot),
            }
        }
    }

    /// True if a persist is due, either because a counter advanced by the
    /// store threshold or the store interval elapsed.
    #[must_use]
    pub fn persistence_due(&self, now: u64) -> bool {
        let threshold = self.config.store_threshold;
        let advanced = self
            .slots
            .iter()
            .flatten()
            .any(|c| c.current.saturating_sub(c.persisted) >= threshold);
        advanced || now.saturating_sub(self.stored_time) >= self.config.store_interval_secs
    }

    /// True if the last persist is older than `max_age_secs`.
    #[must_use]
    pub fn is_stale(&self, now: u64, max_age_secs: u64) -> bool {
        now.saturating_sub(self.stored_time) > max_age_secs
    }

    /// Image to persist at `now`.
    #[must_use]
    pub fn snapshot(&self, now: u64) -> FrameCounterSet {
        let mut counters: [Option<BoundCounter>; GTK_SLOT_COUNT] = Default::default();
        for (dst, src) in counters.iter_mut().zip(&self.slots) {
            *dst = src.as_ref().map(|c| BoundCounter { key: c.key.clone(), counter: c.current });
        }
        FrameCounterSet {
            restart_counter: self.restart_counter,
            stored_time: now,
            pan_version: self.pan_version,
            counters,
        }
    }

    /// Record that the image from [`Self::snapshot`] reached storage.
    pub fn mark_persisted(&mut self, now: u64) {
        self.stored_time = now;
        for counter in self.slots.iter_mut().flatten() {
            counter.persisted = counter.current;
        }
    }

    /// Advance the PAN version, returning the new value.
    pub fn bump_pan_version(&mut self) -> u16 {
        self.pan_version = self.pan_version.wrapping_add(1);
        self.pan_version
    }

    /// Number of stored images loaded so far.
    #[must_use]
    pub fn restart_counter(&self) -> u32 {
        self.restart_counter
    }

    /// Wall-clock seconds of the last persist.
    #[must_use]
    pub fn stored_time(&self) -> u64 {
        self.stored_time
    }

    /// PAN version epoch.
    #[must_use]
    pub fn pan_version(&self) -> u16 {
        self.pan_version
    }

    /// Configuration in force.
    #[must_use]
    pub fn config(&self) -> &CounterConfig {
        &self.config
    }
}

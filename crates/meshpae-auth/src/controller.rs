//! Authenticator controller.
//!
//! Ties together the GTK lifecycle manager, frame counter tracker, relay
//! table, supplicant registry and the backing store. The controller is
//! synchronous and single-owner: every mutation happens inside a timer call
//! or a discrete event method.
//!
//! # Persistence
//!
//! Key set changes are computed on a copy and written to the store before
//! they are committed in memory. A failed write surfaces as
//! [`PaeError::StorageUnavailable`] and leaves the controller exactly as it
//! was, so the caller can retry on the next tick.

use std::{
    collections::BTreeMap,
    net::{Ipv6Addr, SocketAddrV6},
};

use meshpae_core::{
    Environment, FrameCounterTracker, GtkLifecycleManager, RelayEntry, RelayTable,
};
use meshpae_nvm::{
    Eui64, FrameCounterSet, GtkKey, KeyStorageIndex, KeyStorageRecord, NetworkInfo, NvmRecord,
    SecurityKeys, SlotId,
};

use crate::{
    config::PaeConfig,
    error::PaeError,
    hooks::KeyHooks,
    storage::{NvmStore, StorageError, StoreId},
    supplicant::{SupplicantRegistry, SupplicantState},
};

/// Something the host should act on, reported by [`Controller::slow_timer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Expired GTK slot freed
    GtkRemoved(SlotId),
    /// Installed GTK promoted to Active after the previous one expired
    GtkPromoted(SlotId),
    /// No usable Active GTK; install and activate a new key
    NeedsRotation,
    /// Active GTK is ageing with no successor; install a new key
    SuccessorRequired,
    /// Supplicant revoked by the revocation sweep; it must authenticate again
    ReauthenticationRequired(Eui64),
    /// Frame counters written to the store
    FrameCountersPersisted,
}

/// Outcome of [`Controller::forced_gc`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Revoked supplicants forgotten (and their records erased)
    pub revoked_reclaimed: usize,
    /// Records erased because another record already holds the supplicant
    pub orphans_erased: usize,
    /// Records erased because they did not decode
    pub corrupt_erased: usize,
    /// Unindexed but valid records taken back into use
    pub adopted: usize,
    /// Index bits set because the record exists
    pub index_bits_set: u32,
    /// Index bits cleared because the record is gone
    pub index_bits_cleared: u32,
}

impl GcReport {
    /// True if the index disagreed with the store.
    pub fn index_repaired(&self) -> bool {
        self.index_bits_set > 0 || self.index_bits_cleared > 0
    }
}

/// Authenticator controller over a store `S` and environment `E`.
pub struct Controller<S: NvmStore, E: Environment> {
    env: E,
    store: S,
    config: PaeConfig,
    gtk: GtkLifecycleManager,
    counters: FrameCounterTracker,
    relays: RelayTable,
    supplicants: SupplicantRegistry,
    index: KeyStorageIndex,
    hooks: KeyHooks,
    node_limit: Option<usize>,
    fast_tick_remainder: u32,
    last_slow_secs: u64,
    /// Counter image changed in a way that must reach the store
    counters_dirty: bool,
}

impl<S: NvmStore, E: Environment> Controller<S, E> {
    /// Start a controller from whatever the store holds.
    ///
    /// Corrupt records are logged and replaced by defaults. A stored key set
    /// for a different PAN id or network name is discarded. Key-storage
    /// records listed in the index come back as Unregistered supplicants.
    /// The frame counter image is re-persisted before returning so the
    /// restart it records is durable.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store cannot be read or written
    pub fn start(env: E, store: S, config: PaeConfig, hooks: KeyHooks) -> Result<Self, PaeError> {
        let now = env.now_secs();

        let mut gtk = GtkLifecycleManager::new(config.eviction_policy)
            .with_new_install_required_pct(config.new_install_required_pct);
        if let Some(info) = load_record::<NetworkInfo>(&store, StoreId::NetworkInfo)? {
            if info.pan_id == config.pan_id && info.name == config.network_name {
                gtk.restore(info.gtks);
            } else {
                tracing::info!(
                    stored_pan_id = info.pan_id,
                    stored_name = %info.name,
                    pan_id = config.pan_id,
                    name = %config.network_name,
                    "stored network differs, key set discarded"
                );
            }
        }

        let mut counters = match load_record::<FrameCounterSet>(&store, StoreId::FrameCounter)? {
            Some(image) => {
                let counters = FrameCounterTracker::load(image, config.counters.clone());
                if counters.is_stale(now, config.counter_max_age_secs) {
                    tracing::warn!(
                        stored_time = counters.stored_time(),
                        now,
                        "frame counter image is stale"
                    );
                }
                counters
            },
            None => FrameCounterTracker::new(config.counters.clone()),
        };
        counters.reconcile(gtk.keys());

        let index = load_record::<KeyStorageIndex>(&store, StoreId::KeyStorageIndex)?
            .unwrap_or_default();
        let mut supplicants = SupplicantRegistry::new();
        for slot in index.iter() {
            match load_record::<KeyStorageRecord>(&store, StoreId::KeyStorage(slot))? {
                Some(record) => {
                    if !supplicants.restore(record.eui64, record.keys, slot) {
                        tracing::warn!(record = slot, supplicant = %record.eui64, "duplicate key storage");
                    }
                },
                None => tracing::warn!(record = slot, "indexed key storage missing"),
            }
        }

        let mut controller = Self {
            relays: RelayTable::with_limits(config.relay_ttl, config.relay_capacity),
            node_limit: config.node_limit,
            env,
            store,
            config,
            gtk,
            counters,
            supplicants,
            index,
            hooks,
            fast_tick_remainder: 0,
            last_slow_secs: now,
            counters_dirty: false,
        };
        controller.persist_counters(now)?;
        controller.publish_key_state();

        tracing::info!(
            pan_id = controller.config.pan_id,
            gtks = controller.gtk.keys().len(),
            supplicants = controller.supplicants.len(),
            restart_counter = controller.counters.restart_counter(),
            "authenticator started"
        );
        Ok(controller)
    }

    /// Fine-grained tick: handshake timers and relay aging.
    ///
    /// Ticks are converted to seconds with `fast_ticks_per_second`; the
    /// remainder carries over to the next call.
    pub fn fast_timer(&mut self, ticks: u32) {
        self.hooks.handshake.tick(ticks);

        let per_second = self.config.fast_ticks_per_second.max(1);
        let total = self.fast_tick_remainder.saturating_add(ticks);
        let seconds = total / per_second;
        self.fast_tick_remainder = total % per_second;

        if seconds > 0 {
            self.relays.age_tick(seconds);
        }
    }

    /// Coarse tick: GTK expiry, revocation batches, counter persistence.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if a required write fails; the sweep is
    ///   retried on the next call
    pub fn slow_timer(&mut self, seconds: u32) -> Result<Vec<ControllerEvent>, PaeError> {
        let now = self.env.now_secs();
        if now < self.last_slow_secs {
            tracing::warn!(now, last = self.last_slow_secs, "wall clock moved backwards");
        }
        tracing::trace!(elapsed = seconds, now, "slow tick");
        self.last_slow_secs = now;

        let mut events = Vec::new();

        let mut next = self.gtk.clone();
        let report = next.expire_sweep(now);
        if report.changed() {
            self.commit_key_set(next, now)?;
            events.extend(report.removed.iter().map(|slot| ControllerEvent::GtkRemoved(*slot)));
            if let Some(slot) = report.promoted {
                events.push(ControllerEvent::GtkPromoted(slot));
            }
        }

        if report.needs_rotation {
            events.push(ControllerEvent::NeedsRotation);
        } else if self.gtk.successor_required(now, self.config.gtk_lifetime_secs) {
            events.push(ControllerEvent::SuccessorRequired);
        }

        for eui64 in self.supplicants.revoke_batch(self.config.revoke_batch_size.max(1)) {
            tracing::info!(supplicant = %eui64, "access revoked, re-authentication required");
            events.push(ControllerEvent::ReauthenticationRequired(eui64));
        }

        if self.counters_dirty || self.counters.persistence_due(now) {
            self.persist_counters(now)?;
            events.push(ControllerEvent::FrameCountersPersisted);
        }

        Ok(events)
    }

    /// Queue every Authenticated supplicant for revocation.
    ///
    /// Candidates are revoked `revoke_batch_size` at a time on subsequent
    /// slow ticks. Calling again while a sweep is running only adds newly
    /// Authenticated supplicants. Returns the number newly queued.
    pub fn node_access_revoke_start(&mut self) -> usize {
        let queued = self.supplicants.queue_revocation();
        tracing::info!(queued, pending = self.supplicants.revocation_pending(), "revocation sweep");
        queued
    }

    /// Limit concurrently Authenticated supplicants.
    ///
    /// Supplicants already admitted stay admitted when the limit drops below
    /// their number; only new admissions are refused.
    pub fn node_limit_set(&mut self, limit: usize) {
        if self.supplicants.authenticated_count() > limit {
            tracing::warn!(
                limit,
                authenticated = self.supplicants.authenticated_count(),
                "node limit below current admissions"
            );
        }
        self.node_limit = Some(limit);
    }

    /// Reclaim key storage and repair the index against the store.
    ///
    /// Revoked supplicants are forgotten and their records erased. Every
    /// record actually present is then checked: undecodable records and
    /// duplicates of a supplicant held elsewhere are erased, valid records
    /// missing from the index are adopted. The index is rewritten to match.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the store fails; running again resumes
    pub fn forced_gc(&mut self) -> Result<GcReport, PaeError> {
        let mut report = GcReport::default();
        let mut index = self.index;

        for (eui64, slot) in self.supplicants.revoked() {
            if let Some(slot) = slot {
                self.store.erase(StoreId::KeyStorage(slot))?;
                index.remove(slot);
            }
            self.supplicants.remove(&eui64);
            report.revoked_reclaimed += 1;
        }

        let mut owners: BTreeMap<u8, Eui64> = BTreeMap::new();
        for slot in self.store.list_key_storage()? {
            let Some(bytes) = self.store.read(StoreId::KeyStorage(slot))? else {
                continue;
            };
            let record = match KeyStorageRecord::decode(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(record = slot, error = %e, "erasing undecodable key storage");
                    self.store.erase(StoreId::KeyStorage(slot))?;
                    report.corrupt_erased += 1;
                    continue;
                },
            };

            let claimed_by_other =
                self.supplicants.by_storage_slot(slot).is_some_and(|s| s.eui64 != record.eui64);
            let keep = match self.supplicants.get(&record.eui64).map(|s| s.storage_slot) {
                Some(Some(owned)) => owned == slot,
                Some(None) | None => !claimed_by_other,
            };
            if !keep {
                tracing::debug!(record = slot, supplicant = %record.eui64, "erasing orphaned key storage");
                self.store.erase(StoreId::KeyStorage(slot))?;
                report.orphans_erased += 1;
                continue;
            }

            match self.supplicants.get_mut(&record.eui64) {
                Some(supplicant) => {
                    if supplicant.storage_slot.is_none() {
                        supplicant.storage_slot = Some(slot);
                        report.adopted += 1;
                    }
                },
                None => {
                    self.supplicants.restore(record.eui64, record.keys, slot);
                    report.adopted += 1;
                },
            }
            owners.insert(slot, record.eui64);
        }

        for supplicant in self.supplicants.iter_mut() {
            if let Some(slot) = supplicant.storage_slot
                && owners.get(&slot) != Some(&supplicant.eui64)
            {
                tracing::warn!(supplicant = %supplicant.eui64, record = slot, "key storage lost");
                supplicant.storage_slot = None;
            }
        }

        let mut repaired = KeyStorageIndex::empty();
        for slot in owners.keys() {
            repaired.insert(*slot);
        }
        report.index_bits_set = (repaired.bits() & !index.bits()).count_ones();
        report.index_bits_cleared = (index.bits() & !repaired.bits()).count_ones();

        if repaired != self.index {
            self.store.write(StoreId::KeyStorageIndex, &repaired.encode())?;
        }
        self.index = repaired;

        tracing::info!(
            reclaimed = report.revoked_reclaimed,
            orphans = report.orphans_erased,
            corrupt = report.corrupt_erased,
            adopted = report.adopted,
            index_repaired = report.index_repaired(),
            "forced GC complete"
        );
        Ok(report)
    }

    /// Record that a supplicant started a handshake.
    ///
    /// An Authenticated supplicant re-keying stays Authenticated, and keeps
    /// counting against the node limit, until the new handshake completes.
    pub fn begin_authentication(&mut self, eui64: Eui64) -> Result<(), PaeError> {
        let entry = self.supplicants.entry(eui64);
        if entry.state == SupplicantState::Authenticated {
            tracing::debug!(supplicant = %eui64, "re-authentication");
            return Ok(());
        }
        entry.state = SupplicantState::Authenticating;
        Ok(())
    }

    /// Admit a supplicant that completed its handshake.
    ///
    /// Persists its pairwise keys to a key-storage record (reusing the one
    /// it already holds), then pushes the group keys and hashes down.
    ///
    /// # Errors
    ///
    /// - `AdmissionLimitExceeded` if the node limit is reached
    /// - `Gtk(NeedsRotation)` if there is no usable Active GTK to hand out
    /// - `KeyStorageExhausted` if every key-storage record is in use
    /// - `StorageUnavailable` if the record cannot be written
    pub fn supplicant_authenticated(
        &mut self,
        eui64: Eui64,
        keys: SecurityKeys,
    ) -> Result<(), PaeError> {
        let now = self.env.now_secs();

        let (already_admitted, held_slot) = match self.supplicants.get(&eui64) {
            Some(s) => (s.state == SupplicantState::Authenticated, s.storage_slot),
            None => (false, None),
        };

        if !already_admitted
            && let Some(limit) = self.node_limit
            && self.supplicants.authenticated_count() >= limit
        {
            tracing::warn!(supplicant = %eui64, limit, "admission refused, node limit reached");
            return Err(PaeError::AdmissionLimitExceeded { limit });
        }

        self.gtk.active(now)?;

        let slot = match held_slot {
            Some(slot) => slot,
            None => self.index.first_free().ok_or(PaeError::KeyStorageExhausted)?,
        };

        let record = KeyStorageRecord { eui64, keys };
        self.store.write(StoreId::KeyStorage(slot), &record.encode())?;
        if !self.index.contains(slot) {
            let mut index = self.index;
            index.insert(slot);
            self.store.write(StoreId::KeyStorageIndex, &index.encode())?;
            self.index = index;
        }

        let entry = self.supplicants.entry(eui64);
        entry.state = SupplicantState::Authenticated;
        entry.keys = record.keys;
        entry.storage_slot = Some(slot);

        self.hooks.installer.install_keys(eui64, self.gtk.keys());
        self.hooks.hashes.publish(&self.gtk.hashes());

        tracing::info!(supplicant = %eui64, record = slot, "supplicant authenticated");
        Ok(())
    }

    /// Withdraw a supplicant's access. Its record is reclaimed by GC.
    ///
    /// # Errors
    ///
    /// - `UnknownSupplicant` if the EUI-64 was never seen
    pub fn supplicant_revoked(&mut self, eui64: Eui64) -> Result<(), PaeError> {
        if !self.supplicants.revoke(&eui64) {
            return Err(PaeError::UnknownSupplicant(eui64));
        }
        tracing::info!(supplicant = %eui64, "supplicant revoked");
        Ok(())
    }

    /// Install a new GTK.
    ///
    /// # Errors
    ///
    /// - `Gtk(..)` if the lifecycle manager refuses the key
    /// - `StorageUnavailable` if the key set cannot be persisted
    pub fn install_gtk(&mut self, key: GtkKey, lifetime_secs: u64) -> Result<SlotId, PaeError> {
        let now = self.env.now_secs();
        let mut next = self.gtk.clone();
        let slot = next.install(key, lifetime_secs, now)?;
        self.commit_key_set(next, now)?;
        Ok(slot)
    }

    /// Make an Installed GTK the Active send key.
    ///
    /// # Errors
    ///
    /// - `Gtk(..)` if the slot cannot be activated
    /// - `StorageUnavailable` if the key set cannot be persisted
    pub fn activate_gtk(&mut self, slot: SlotId) -> Result<(), PaeError> {
        let now = self.env.now_secs();
        let mut next = self.gtk.clone();
        next.activate(slot)?;
        self.commit_key_set(next, now)
    }

    /// Current outgoing frame counter for a slot.
    pub fn frame_counter_read(&self, slot: SlotId) -> u32 {
        self.counters.read(slot)
    }

    /// Advance a slot's frame counter.
    ///
    /// # Errors
    ///
    /// - `Counter(..)` if the slot is unbound or the value regresses
    pub fn frame_counter_set(&mut self, slot: SlotId, value: u32) -> Result<(), PaeError> {
        self.counters.set(slot, value)?;
        Ok(())
    }

    /// Record traffic relayed through `address` via `parent`.
    pub fn relay_update(&mut self, address: Ipv6Addr, parent: SocketAddrV6) -> RelayEntry {
        self.relays.update(address, parent)
    }

    /// Look up a relay without refreshing it.
    pub fn relay_detect(&self, address: Ipv6Addr) -> Option<RelayEntry> {
        self.relays.detect(address)
    }

    /// Persist frame counters and drop volatile state.
    ///
    /// The persisted key set is kept for the next start.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the counters cannot be written
    pub fn shutdown(&mut self) -> Result<(), PaeError> {
        let now = self.env.now_secs();
        self.persist_counters(now)?;
        self.gtk.clear();
        self.relays.clear();
        tracing::info!("authenticator stopped");
        Ok(())
    }

    /// Configuration in force.
    pub fn config(&self) -> &PaeConfig {
        &self.config
    }

    /// GTK lifecycle state.
    pub fn gtk(&self) -> &GtkLifecycleManager {
        &self.gtk
    }

    /// Frame counter state.
    pub fn counters(&self) -> &FrameCounterTracker {
        &self.counters
    }

    /// Relay table.
    pub fn relays(&self) -> &RelayTable {
        &self.relays
    }

    /// Known supplicants.
    pub fn supplicants(&self) -> &SupplicantRegistry {
        &self.supplicants
    }

    /// Key-storage index as last persisted.
    pub fn key_storage_index(&self) -> KeyStorageIndex {
        self.index
    }

    /// Current admission limit.
    pub fn node_limit(&self) -> Option<usize> {
        self.node_limit
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Persist `next` and make it the current key set.
    fn commit_key_set(&mut self, next: GtkLifecycleManager, now: u64) -> Result<(), PaeError> {
        self.persist_network_info(&next)?;

        let previous_active = self.gtk.keys().active().map(|(slot, _)| slot);
        self.gtk = next;
        self.counters.reconcile(self.gtk.keys());
        let pan_version = self.counters.bump_pan_version();
        self.counters_dirty = true;
        tracing::debug!(pan_version, gtks = self.gtk.keys().len(), "key set committed");
        if let Err(e) = self.persist_counters(now) {
            tracing::warn!(error = %e, "frame counters not persisted, retrying on next slow tick");
        }

        self.hooks.hashes.publish(&self.gtk.hashes());
        let active = self.gtk.keys().active().map(|(slot, _)| slot);
        if active != previous_active
            && let Some(slot) = active
        {
            self.hooks.key_index.set_active_index(slot);
        }
        Ok(())
    }

    fn persist_network_info(&self, gtk: &GtkLifecycleManager) -> Result<(), StorageError> {
        let info = NetworkInfo {
            pan_id: self.config.pan_id,
            name: self.config.network_name.clone(),
            key_generator: self.config.key_generator,
            gtks: gtk.snapshot(),
        };
        self.store.write(StoreId::NetworkInfo, &info.encode())
    }

    fn persist_counters(&mut self, now: u64) -> Result<(), StorageError> {
        let image = self.counters.snapshot(now);
        self.store.write(StoreId::FrameCounter, &image.encode())?;
        self.counters.mark_persisted(now);
        self.counters_dirty = false;
        Ok(())
    }

    fn publish_key_state(&mut self) {
        self.hooks.hashes.publish(&self.gtk.hashes());
        if let Some((slot, _)) = self.gtk.keys().active() {
            self.hooks.key_index.set_active_index(slot);
        }
    }
}

impl<S: NvmStore, E: Environment> std::fmt::Debug for Controller<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("pan_id", &self.config.pan_id)
            .field("gtks", &self.gtk.keys().len())
            .field("supplicants", &self.supplicants.len())
            .field("relays", &self.relays.len())
            .finish_non_exhaustive()
    }
}

/// Read and decode a record. Undecodable records are logged and treated as
/// absent; only store failures are errors.
fn load_record<R: NvmRecord>(
    store: &impl NvmStore,
    id: StoreId,
) -> Result<Option<R>, StorageError> {
    let Some(bytes) = store.read(id)? else {
        return Ok(None);
    };
    match R::decode(&bytes) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!(record = %id, error = %e, "corrupt record ignored");
            Ok(None)
        },
    }
}

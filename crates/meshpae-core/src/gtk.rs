//! GTK lifecycle manager.
//!
//! Owns the four GTK slots and drives each key through
//! Installed → Active → Expiring → removed. The manager is pure state: it
//! never touches storage or the clock directly. Callers pass `now` in and
//! persist [`GtkLifecycleManager::snapshot`] after every change.
//!
//! # Invariants
//!
//! - At most one slot is Active.
//! - Install orders of occupied slots are exactly `0..len`, 0 being oldest.
//!   Freeing a slot decrements every order above it.

use meshpae_nvm::{GTK_SLOT_COUNT, GtkKey, GtkKeySet, GtkSlot, GtkStatus, SlotId};
use sha2::{Digest, Sha256};

use crate::error::GtkError;

/// Truncated GTK digest advertised to nodes.
pub type GtkHash = [u8; 8];

/// Hash advertised for an empty slot.
pub const EMPTY_GTK_HASH: GtkHash = [0; 8];

/// Default share of a GTK lifetime after which a successor should be
/// installed, in percent.
pub const DEFAULT_NEW_INSTALL_REQUIRED_PCT: u8 = 80;

/// First 8 bytes of SHA-256 over the key material.
#[must_use]
pub fn gtk_hash(key: &GtkKey) -> GtkHash {
    let digest = Sha256::digest(key.as_bytes());
    let mut hash = EMPTY_GTK_HASH;
    hash.copy_from_slice(&digest[..8]);
    hash
}

/// What `install` does when every slot is occupied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Fail with [`GtkError::KeyStoreFull`]
    Reject,
    /// Free the oldest slot that is not Active
    #[default]
    OldestInactive,
    /// Free the oldest slot; fail if that slot is Active
    StrictFifoWait,
    /// Free the oldest slot. If it is Active, the oldest Installed slot is
    /// promoted in its place (or the new key when none is Installed).
    StrictFifoForceExpiry,
}

/// Outcome of [`GtkLifecycleManager::expire_sweep`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Slots freed, in the order they were freed
    pub removed: Vec<SlotId>,
    /// Slot promoted to Active
    pub promoted: Option<SlotId>,
    /// No usable Active key and nothing to promote
    pub needs_rotation: bool,
}

impl SweepReport {
    /// True if the key set changed and must be persisted.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.removed.is_empty() || self.promoted.is_some()
    }
}

/// GTK slot state machine.
#[derive(Debug, Clone)]
pub struct GtkLifecycleManager {
    keys: GtkKeySet,
    policy: EvictionPolicy,
    new_install_required_pct: u8,
}

impl Default for GtkLifecycleManager {
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}

impl GtkLifecycleManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            keys: GtkKeySet::new(),
            policy,
            new_install_required_pct: DEFAULT_NEW_INSTALL_REQUIRED_PCT,
        }
    }

    /// Override the successor threshold. Values above 100 are clamped.
    #[must_use]
    pub fn with_new_install_required_pct(mut self, pct: u8) -> Self {
        self.new_install_required_pct = pct.min(100);
        self
    }

    /// Eviction policy in force.
    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Current slot contents.
    #[must_use]
    pub fn keys(&self) -> &GtkKeySet {
        &self.keys
    }

    /// Copy of the key set for persistence.
    #[must_use]
    pub fn snapshot(&self) -> GtkKeySet {
        self.keys.clone()
    }

    /// Install a new key as Installed with expiry `now + lifetime_secs`.
    ///
    /// Uses the first empty slot. When all slots are occupied the eviction
    /// policy decides which slot to free.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey` if the same key material is already installed
    /// - `KeyStoreFull` if the eviction policy refused to free a slot
    pub fn install(
        &mut self,
        key: GtkKey,
        lifetime_secs: u64,
        now: u64,
    ) -> Result<SlotId, GtkError> {
        if let Some((existing, _)) = self.keys.iter().find(|(_, s)| s.key == key) {
            return Err(GtkError::DuplicateKey(existing));
        }

        let mut activate_new = false;
        let slot = match self.keys.first_empty() {
            Some(slot) => slot,
            None => {
                let (slot, orphaned) = self.evict_for_install()?;
                activate_new = orphaned;
                slot
            },
        };

        let install_order = self.order_for_next();
        let status = if activate_new { GtkStatus::Active } else { GtkStatus::Installed };
        self.keys.replace(
            slot,
            Some(GtkSlot { key, expiry: now.saturating_add(lifetime_secs), install_order, status }),
        );

        tracing::debug!(slot = %slot, install_order, ?status, "GTK installed");
        debug_assert!(self.invariants_hold());
        Ok(slot)
    }

    /// Make an Installed slot the Active one.
    ///
    /// The previous Active slot, if any, becomes Expiring. Activating the
    /// slot that is already Active is a no-op.
    ///
    /// # Errors
    ///
    /// - `EmptySlot` if the slot is empty
    /// - `InvalidTransition` if the slot is Expiring
    pub fn activate(&mut self, slot: SlotId) -> Result<(), GtkError> {
        let status = self.keys.get(slot).ok_or(GtkError::EmptySlot(slot))?.status;
        match status {
            GtkStatus::Active => return Ok(()),
            GtkStatus::Expiring => {
                return Err(GtkError::InvalidTransition { slot, from: GtkStatus::Expiring });
            },
            GtkStatus::Installed => {},
        }

        if let Some(previous) = self.active_slot() {
            self.set_status(previous, GtkStatus::Expiring);
            tracing::debug!(slot = %previous, "GTK now expiring");
        }
        self.set_status(slot, GtkStatus::Active);

        tracing::info!(slot = %slot, "GTK activated");
        debug_assert!(self.invariants_hold());
        Ok(())
    }

    /// Free expired slots and keep an Active key in place.
    ///
    /// Non-Active slots whose expiry has passed are removed. An expired
    /// Active slot is replaced by the oldest Installed slot; without one it
    /// is retained and `needs_rotation` is reported on every sweep until new
    /// key material arrives. With no Active slot at all, the oldest
    /// Installed slot is promoted, or `needs_rotation` is reported.
    pub fn expire_sweep(&mut self, now: u64) -> SweepReport {
        let mut report = SweepReport::default();

        let expired: Vec<SlotId> = self
            .keys
            .iter()
            .filter(|(_, s)| s.status != GtkStatus::Active && s.expiry <= now)
            .map(|(id, _)| id)
            .collect();
        for slot in expired {
            self.remove(slot);
            report.removed.push(slot);
            tracing::debug!(slot = %slot, "expired GTK removed");
        }

        let active = self.keys.active().map(|(id, s)| (id, s.expiry));
        match active {
            Some((active, expiry)) if expiry <= now => {
                match self.oldest_with_status(GtkStatus::Installed) {
                    Some(successor) => {
                        self.remove(active);
                        self.set_status(successor, GtkStatus::Active);
                        report.removed.push(active);
                        report.promoted = Some(successor);
                        tracing::info!(expired = %active, promoted = %successor, "GTK rotated");
                    },
                    None => {
                        report.needs_rotation = true;
                        tracing::warn!(slot = %active, "active GTK expired without successor");
                    },
                }
            },
            Some(_) => {},
            None => match self.oldest_with_status(GtkStatus::Installed) {
                Some(successor) => {
                    self.set_status(successor, GtkStatus::Active);
                    report.promoted = Some(successor);
                    tracing::info!(promoted = %successor, "installed GTK promoted, none was active");
                },
                None => report.needs_rotation = true,
            },
        }

        debug_assert!(self.invariants_hold());
        report
    }

    /// The Active slot, if it has not expired.
    ///
    /// # Errors
    ///
    /// - `NeedsRotation` if there is no Active slot or it has expired
    pub fn active(&self, now: u64) -> Result<(SlotId, &GtkSlot), GtkError> {
        match self.keys.active() {
            Some((id, slot)) if slot.expiry > now => Ok((id, slot)),
            _ => Err(GtkError::NeedsRotation),
        }
    }

    /// True if a received frame protected by this slot's key may be decoded.
    ///
    /// The Active key is always usable. Other keys are usable until expiry.
    #[must_use]
    pub fn valid_for_decode(&self, slot: SlotId, now: u64) -> bool {
        self.keys.get(slot).is_some_and(|s| s.status == GtkStatus::Active || s.expiry > now)
    }

    /// True if the Active key has used up the configured share of its
    /// lifetime and no Installed successor exists yet.
    #[must_use]
    pub fn successor_required(&self, now: u64, lifetime_secs: u64) -> bool {
        let Some((_, active)) = self.keys.active() else {
            return false;
        };
        if self.oldest_with_status(GtkStatus::Installed).is_some() {
            return false;
        }

        let remaining = active.expiry.saturating_sub(now);
        let allowed_remaining = u128::from(lifetime_secs)
            * u128::from(100 - self.new_install_required_pct)
            / 100;
        u128::from(remaining) <= allowed_remaining
    }

    /// Per-slot GTK hashes, zero for empty slots.
    #[must_use]
    pub fn hashes(&self) -> [GtkHash; GTK_SLOT_COUNT] {
        let mut hashes = [EMPTY_GTK_HASH; GTK_SLOT_COUNT];
        for (id, slot) in self.keys.iter() {
            hashes[id.index()] = gtk_hash(&slot.key);
        }
        hashes
    }

    /// Replace the key set with one read from storage.
    ///
    /// Stored state may predate a crash mid-update, so the lifecycle
    /// invariants are re-established: extra Active slots (all but the most
    /// recently installed) become Expiring, and install orders are
    /// renumbered to `0..len` preserving their relative order.
    pub fn restore(&mut self, keys: GtkKeySet) {
        self.keys = keys;

        let actives: Vec<(SlotId, u8)> = self
            .keys
            .iter()
            .filter(|(_, s)| s.status == GtkStatus::Active)
            .map(|(id, s)| (id, s.install_order))
            .collect();
        if let Some(&(keep, _)) = actives.iter().max_by_key(|(id, order)| (*order, id.get())) {
            for &(slot, _) in &actives {
                if slot != keep {
                    self.set_status(slot, GtkStatus::Expiring);
                    tracing::warn!(slot = %slot, "demoted duplicate active GTK");
                }
            }
        }

        let mut by_order: Vec<(u8, SlotId)> =
            self.keys.iter().map(|(id, s)| (s.install_order, id)).collect();
        by_order.sort_unstable();
        for (order, (_, slot)) in (0u8..).zip(by_order) {
            if let Some(s) = self.keys.get_mut(slot) {
                s.install_order = order;
            }
        }

        debug_assert!(self.invariants_hold());
    }

    /// Drop every key.
    pub fn clear(&mut self) {
        self.keys = GtkKeySet::new();
    }

    /// Check the lifecycle invariants on the current key set.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let active_count = self.keys.iter().filter(|(_, s)| s.status == GtkStatus::Active).count();

        let mut orders: Vec<u8> = self.keys.iter().map(|(_, s)| s.install_order).collect();
        orders.sort_unstable();
        let compact = orders.iter().copied().eq(0..self.keys.len() as u8);

        active_count <= 1 && compact
    }

    /// Pick the slot to free when all are occupied.
    ///
    /// Returns the freed slot and whether the Active key went with it
    /// without an Installed slot to take over.
    fn evict_for_install(&mut self) -> Result<(SlotId, bool), GtkError> {
        let (victim, victim_active) = match self.policy {
            EvictionPolicy::Reject => return Err(GtkError::KeyStoreFull),
            EvictionPolicy::OldestInactive => {
                let victim = self
                    .keys
                    .iter()
                    .filter(|(_, s)| s.status != GtkStatus::Active)
                    .min_by_key(|(_, s)| s.install_order)
                    .map(|(id, _)| id)
                    .ok_or(GtkError::KeyStoreFull)?;
                (victim, false)
            },
            EvictionPolicy::StrictFifoWait => {
                let (victim, status) = self.oldest().ok_or(GtkError::KeyStoreFull)?;
                if status == GtkStatus::Active {
                    return Err(GtkError::KeyStoreFull);
                }
                (victim, false)
            },
            EvictionPolicy::StrictFifoForceExpiry => {
                let (victim, status) = self.oldest().ok_or(GtkError::KeyStoreFull)?;
                (victim, status == GtkStatus::Active)
            },
        };

        self.remove(victim);
        tracing::debug!(slot = %victim, policy = ?self.policy, "GTK evicted");

        if !victim_active {
            return Ok((victim, false));
        }

        match self.oldest_with_status(GtkStatus::Installed) {
            Some(successor) => {
                self.set_status(successor, GtkStatus::Active);
                tracing::info!(expired = %victim, promoted = %successor, "GTK expired early");
                Ok((victim, false))
            },
            None => Ok((victim, true)),
        }
    }

    fn remove(&mut self, slot: SlotId) {
        let Some(removed) = self.keys.replace(slot, None) else {
            return;
        };
        for id in SlotId::all() {
            if let Some(s) = self.keys.get_mut(id)
                && s.install_order > removed.install_order
            {
                s.install_order -= 1;
            }
        }
    }

    fn set_status(&mut self, slot: SlotId, status: GtkStatus) {
        if let Some(s) = self.keys.get_mut(slot) {
            s.status = status;
        }
    }

    fn active_slot(&self) -> Option<SlotId> {
        self.keys.active().map(|(id, _)| id)
    }

    fn oldest(&self) -> Option<(SlotId, GtkStatus)> {
        self.keys.iter().min_by_key(|(_, s)| s.install_order).map(|(id, s)| (id, s.status))
    }

    fn oldest_with_status(&self, status: GtkStatus) -> Option<SlotId> {
        self.keys
            .iter()
            .filter(|(_, s)| s.status == status)
            .min_by_key(|(_, s)| s.install_order)
            .map(|(id, _)| id)
    }

    fn order_for_next(&self) -> u8 {
        // len ≤ GTK_SLOT_COUNT
        self.keys.len() as u8
    }
}

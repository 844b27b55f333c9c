//! Supplicant registry for admission state tracking.
//!
//! One entry per EUI-64. Entries move Unregistered → Authenticating →
//! Authenticated → Revoked. Revoked is terminal: the entry stays until
//! forced GC reclaims it, and a Revoked supplicant that shows up again gets
//! a fresh entry.
//!
//! The registry also owns the revocation queue so that
//! `node_access_revoke_start` can be spread over several slow ticks.

use std::collections::{BTreeMap, VecDeque};

use meshpae_nvm::{Eui64, SecurityKeys};

/// Admission state of a supplicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupplicantState {
    /// Known from storage, no handshake since start-up
    Unregistered,
    /// Handshake in progress
    Authenticating,
    /// Admitted; holds the current group keys
    Authenticated,
    /// Access withdrawn, awaiting garbage collection
    Revoked,
}

/// Information about a known supplicant.
#[derive(Debug, Clone)]
pub struct Supplicant {
    /// Node identity
    pub eui64: Eui64,
    /// Admission state
    pub state: SupplicantState,
    /// Pairwise keys from the last successful handshake
    pub keys: SecurityKeys,
    /// Key-storage record holding `keys`, if persisted
    pub storage_slot: Option<u8>,
}

impl Supplicant {
    fn new(eui64: Eui64) -> Self {
        Self {
            eui64,
            state: SupplicantState::Unregistered,
            keys: SecurityKeys::default(),
            storage_slot: None,
        }
    }
}

/// Registry of supplicants keyed by EUI-64.
///
/// Ordered by EUI-64 so revocation batches and GC passes are deterministic.
#[derive(Debug, Default)]
pub struct SupplicantRegistry {
    entries: BTreeMap<Eui64, Supplicant>,
    revoke_queue: VecDeque<Eui64>,
}

impl SupplicantRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplicant by EUI-64.
    pub fn get(&self, eui64: &Eui64) -> Option<&Supplicant> {
        self.entries.get(eui64)
    }

    /// Mutable supplicant by EUI-64.
    pub fn get_mut(&mut self, eui64: &Eui64) -> Option<&mut Supplicant> {
        self.entries.get_mut(eui64)
    }

    /// Supplicant whose keys are persisted in record `slot`.
    pub fn by_storage_slot(&self, slot: u8) -> Option<&Supplicant> {
        self.entries.values().find(|s| s.storage_slot == Some(slot))
    }

    /// Register a supplicant restored from key storage as Unregistered.
    ///
    /// Returns `false` (and changes nothing) if the EUI-64 is already known.
    pub fn restore(&mut self, eui64: Eui64, keys: SecurityKeys, storage_slot: u8) -> bool {
        if self.entries.contains_key(&eui64) {
            return false;
        }
        self.entries.insert(
            eui64,
            Supplicant {
                eui64,
                state: SupplicantState::Unregistered,
                keys,
                storage_slot: Some(storage_slot),
            },
        );
        true
    }

    /// Entry for a supplicant about to start or finish a handshake.
    ///
    /// Unknown supplicants are created. A Revoked entry is replaced by a
    /// fresh one that keeps only its storage record, which the next
    /// successful handshake overwrites.
    pub fn entry(&mut self, eui64: Eui64) -> &mut Supplicant {
        let entry = self.entries.entry(eui64).or_insert_with(|| Supplicant::new(eui64));
        if entry.state == SupplicantState::Revoked {
            tracing::debug!(supplicant = %eui64, "revoked supplicant returned, fresh entry");
            let storage_slot = entry.storage_slot;
            *entry = Supplicant { storage_slot, ..Supplicant::new(eui64) };
        }
        entry
    }

    /// Mark a supplicant Revoked. Returns `false` if unknown.
    pub fn revoke(&mut self, eui64: &Eui64) -> bool {
        match self.entries.get_mut(eui64) {
            Some(entry) => {
                entry.state = SupplicantState::Revoked;
                true
            },
            None => false,
        }
    }

    /// Queue every Authenticated supplicant for revocation.
    ///
    /// Supplicants already queued are not queued twice. Returns the number
    /// newly queued.
    pub fn queue_revocation(&mut self) -> usize {
        let candidates: Vec<Eui64> = self
            .entries
            .values()
            .filter(|s| s.state == SupplicantState::Authenticated)
            .map(|s| s.eui64)
            .filter(|eui| !self.revoke_queue.contains(eui))
            .collect();

        let queued = candidates.len();
        self.revoke_queue.extend(candidates);
        queued
    }

    /// Revoke up to `batch` queued supplicants, returning those revoked.
    ///
    /// Queued supplicants that are no longer Authenticated (revoked directly,
    /// or back on a fresh entry after revocation) are skipped without
    /// counting against the batch.
    pub fn revoke_batch(&mut self, batch: usize) -> Vec<Eui64> {
        let mut revoked = Vec::new();
        while revoked.len() < batch {
            let Some(eui64) = self.revoke_queue.pop_front() else {
                break;
            };
            if let Some(entry) = self.entries.get_mut(&eui64)
                && entry.state == SupplicantState::Authenticated
            {
                entry.state = SupplicantState::Revoked;
                revoked.push(eui64);
            }
        }
        revoked
    }

    /// Supplicants still waiting in the revocation queue.
    pub fn revocation_pending(&self) -> usize {
        self.revoke_queue.len()
    }

    /// Revoked supplicants and their storage records.
    pub fn revoked(&self) -> Vec<(Eui64, Option<u8>)> {
        self.entries
            .values()
            .filter(|s| s.state == SupplicantState::Revoked)
            .map(|s| (s.eui64, s.storage_slot))
            .collect()
    }

    /// Forget a supplicant.
    pub fn remove(&mut self, eui64: &Eui64) -> Option<Supplicant> {
        self.revoke_queue.retain(|queued| queued != eui64);
        self.entries.remove(eui64)
    }

    /// Number of Authenticated supplicants.
    pub fn authenticated_count(&self) -> usize {
        self.entries.values().filter(|s| s.state == SupplicantState::Authenticated).count()
    }

    /// All entries, ordered by EUI-64.
    pub fn iter(&self) -> impl Iterator<Item = &Supplicant> {
        self.entries.values()
    }

    /// All entries, mutable.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Supplicant> {
        self.entries.values_mut()
    }

    /// Number of known supplicants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no supplicant is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Observable authenticator state extracted for invariant checks.

use std::collections::BTreeSet;

use meshpae_auth::{Controller, NvmStore, StorageError, SupplicantState};
use meshpae_core::Environment;
use meshpae_nvm::{Eui64, GtkStatus, SlotId};

/// One occupied GTK slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtkSnapshot {
    /// Slot index
    pub slot: SlotId,
    /// Lifecycle status
    pub status: GtkStatus,
    /// Install order
    pub install_order: u8,
    /// Frame counter is bound to this slot's key
    pub counter_bound: bool,
}

/// One known supplicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplicantSnapshot {
    /// Node identity
    pub eui64: Eui64,
    /// Admission state
    pub state: SupplicantState,
    /// Key-storage record held
    pub storage_slot: Option<u8>,
}

/// Controller state at one instant.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Occupied GTK slots
    pub gtks: Vec<GtkSnapshot>,
    /// Slots with no key whose counter is still bound
    pub stale_counter_slots: Vec<SlotId>,
    /// Key-storage index held in memory
    pub index: BTreeSet<u8>,
    /// Key-storage records present in the store
    pub stored_records: BTreeSet<u8>,
    /// Known supplicants
    pub supplicants: Vec<SupplicantSnapshot>,
    /// Per-slot frame counters
    pub counters: [u32; 4],
    /// Restart counter
    pub restart_counter: u32,
}

impl SystemSnapshot {
    /// Capture a controller's observable state.
    ///
    /// # Errors
    ///
    /// - `StorageError` if the store cannot be listed
    pub fn capture<S: NvmStore, E: Environment>(
        controller: &Controller<S, E>,
    ) -> Result<Self, StorageError> {
        let keys = controller.gtk().keys();
        let counters = controller.counters();

        let gtks = keys
            .iter()
            .map(|(slot, gtk)| GtkSnapshot {
                slot,
                status: gtk.status,
                install_order: gtk.install_order,
                counter_bound: counters.bound_key(slot) == Some(&gtk.key),
            })
            .collect();
        let stale_counter_slots = SlotId::all()
            .filter(|slot| keys.get(*slot).is_none() && counters.bound_key(*slot).is_some())
            .collect();

        let supplicants = controller
            .supplicants()
            .iter()
            .map(|s| SupplicantSnapshot {
                eui64: s.eui64,
                state: s.state,
                storage_slot: s.storage_slot,
            })
            .collect();

        let mut per_slot = [0; 4];
        for slot in SlotId::all() {
            per_slot[slot.index()] = counters.read(slot);
        }

        Ok(Self {
            gtks,
            stale_counter_slots,
            index: controller.key_storage_index().iter().collect(),
            stored_records: controller.store().list_key_storage()?.into_iter().collect(),
            supplicants,
            counters: per_slot,
            restart_counter: counters.restart_counter(),
        })
    }
}

//! Standard invariant checks.

use std::collections::BTreeMap;

use meshpae_auth::SupplicantState;
use meshpae_nvm::GtkStatus;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// At most one Active GTK, and install orders are `0..len`.
pub struct SingleActiveGtk;

impl Invariant for SingleActiveGtk {
    fn name(&self) -> &'static str {
        "single_active_gtk"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let active: Vec<_> =
            state.gtks.iter().filter(|g| g.status == GtkStatus::Active).map(|g| g.slot).collect();
        if active.len() > 1 {
            return Err(Violation {
                invariant: self.name(),
                message: format!("multiple active slots {active:?}"),
            });
        }

        let mut orders: Vec<u8> = state.gtks.iter().map(|g| g.install_order).collect();
        orders.sort_unstable();
        if !orders.iter().copied().eq(0..state.gtks.len() as u8) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("install orders not compact: {orders:?}"),
            });
        }
        Ok(())
    }
}

/// Every occupied slot has its counter bound to its key; empty slots have
/// no counter.
pub struct CounterBinding;

impl Invariant for CounterBinding {
    fn name(&self) -> &'static str {
        "counter_binding"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if let Some(gtk) = state.gtks.iter().find(|g| !g.counter_bound) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("slot {} counter not bound to its key", gtk.slot),
            });
        }
        if !state.stale_counter_slots.is_empty() {
            return Err(Violation {
                invariant: self.name(),
                message: format!("empty slots with counters {:?}", state.stale_counter_slots),
            });
        }
        Ok(())
    }
}

/// The key-storage index names exactly the records in the store.
pub struct IndexMatchesStore;

impl Invariant for IndexMatchesStore {
    fn name(&self) -> &'static str {
        "index_matches_store"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.index != state.stored_records {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "index {:?} but store holds {:?}",
                    state.index, state.stored_records
                ),
            });
        }
        Ok(())
    }
}

/// No two supplicants hold the same record, and every Authenticated
/// supplicant's record is indexed.
pub struct StorageOwnership;

impl Invariant for StorageOwnership {
    fn name(&self) -> &'static str {
        "storage_ownership"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut owners = BTreeMap::new();
        for supplicant in &state.supplicants {
            let Some(slot) = supplicant.storage_slot else {
                if supplicant.state == SupplicantState::Authenticated {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("{} authenticated without key storage", supplicant.eui64),
                    });
                }
                continue;
            };

            if let Some(other) = owners.insert(slot, supplicant.eui64) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("record {slot} held by {other} and {}", supplicant.eui64),
                });
            }
            if supplicant.state == SupplicantState::Authenticated && !state.index.contains(&slot) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("record {slot} of {} not indexed", supplicant.eui64),
                });
            }
        }
        Ok(())
    }
}

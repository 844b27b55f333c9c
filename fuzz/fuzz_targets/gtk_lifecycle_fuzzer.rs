//! Fuzz target for the GTK lifecycle manager and frame counters
//!
//! # Invariants
//!
//! - At most one Active slot; install orders are compact
//! - Counters stay bound to the key of their slot
//! - A counter accepted by `set` never goes down while its key is unchanged

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use meshpae_core::{CounterConfig, EvictionPolicy, FrameCounterTracker, GtkLifecycleManager};
use meshpae_nvm::{GtkKey, SlotId};

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Policy {
    Reject,
    OldestInactive,
    StrictFifoWait,
    StrictFifoForceExpiry,
}

#[derive(Debug, Clone, Arbitrary)]
enum GtkOp {
    Install { key: u8, lifetime: u16 },
    Activate { slot: u8 },
    Sweep { advance: u16 },
    SetCounter { slot: u8, value: u32 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    policy: Policy,
    ops: Vec<GtkOp>,
}

fuzz_target!(|input: Input| {
    let policy = match input.policy {
        Policy::Reject => EvictionPolicy::Reject,
        Policy::OldestInactive => EvictionPolicy::OldestInactive,
        Policy::StrictFifoWait => EvictionPolicy::StrictFifoWait,
        Policy::StrictFifoForceExpiry => EvictionPolicy::StrictFifoForceExpiry,
    };
    let mut gtk = GtkLifecycleManager::new(policy);
    let mut counters = FrameCounterTracker::new(CounterConfig::default());
    let mut now: u64 = 0;

    for op in input.ops {
        let before = gtk.snapshot();
        let counters_before: Vec<u32> = SlotId::all().map(|slot| counters.read(slot)).collect();
        match op {
            GtkOp::Install { key, lifetime } => {
                let _ = gtk.install(GtkKey::new([key; 16]), u64::from(lifetime), now);
            },
            GtkOp::Activate { slot } => {
                if let Some(slot) = SlotId::new(slot % 4) {
                    let _ = gtk.activate(slot);
                }
            },
            GtkOp::Sweep { advance } => {
                now += u64::from(advance);
                let _ = gtk.expire_sweep(now);
            },
            GtkOp::SetCounter { slot, value } => {
                if let Some(slot) = SlotId::new(slot % 4) {
                    let _ = counters.set(slot, value);
                }
            },
        }
        counters.reconcile(gtk.keys());

        assert!(gtk.invariants_hold(), "lifecycle invariants broken");
        for slot in SlotId::all() {
            let key = gtk.keys().get(slot).map(|s| &s.key);
            assert_eq!(counters.bound_key(slot), key);
            if key.is_some() && key == before.get(slot).map(|s| &s.key) {
                assert!(counters.read(slot) >= counters_before[slot.index()]);
            }
        }
    }
});

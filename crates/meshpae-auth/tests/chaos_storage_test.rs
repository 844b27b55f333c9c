//! Storage failures surface as `StorageUnavailable` and never corrupt
//! in-memory state.

use meshpae_auth::{ChaoticStore, MemoryStore, PaeConfig, PaeError};
use meshpae_core::Environment;
use meshpae_harness::{InvariantRegistry, SimEnv, SimNode, SystemSnapshot};
use meshpae_nvm::{Eui64, SecurityKeys};
use proptest::prelude::*;

const DAY: u64 = 24 * 3600;

fn eui(n: u8) -> Eui64 {
    Eui64([0x02, 0, 0, 0, 0, 0, 0x20, n])
}

#[test]
fn total_failure_rejects_everything_without_change() {
    let mut node = SimNode::start(1, PaeConfig::default()).unwrap();
    let key = node.env.random_gtk();
    let slot = node.controller.install_gtk(key, 30 * DAY).unwrap();
    node.controller.activate_gtk(slot).unwrap();

    // Same backing map, every operation now fails
    let failing = ChaoticStore::new(node.store.clone(), 1.0);
    let result = SimNode::start_with(node.env.clone(), failing, PaeConfig::default());
    assert!(matches!(result, Err(PaeError::StorageUnavailable(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn failures_leave_state_consistent(
        seed in any::<u64>(),
        failure_rate in 0.05f64..0.6,
        arrivals in prop::collection::vec(0u8..16, 1..40),
    ) {
        let env = SimEnv::with_seed(seed);
        let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, seed);

        // Start-up may itself fail; retry until it gets through
        let mut node = loop {
            match SimNode::start_with(env.clone(), store.clone(), PaeConfig::default()) {
                Ok(node) => break node,
                Err(e) => prop_assert!(matches!(e, PaeError::StorageUnavailable(_))),
            }
        };

        let registry = InvariantRegistry::without_store();
        for n in arrivals {
            let keys_before = node.controller.gtk().keys().clone();
            match node.controller.install_gtk(env.random_gtk(), 30 * DAY) {
                Ok(slot) => {
                    let _ = node.controller.activate_gtk(slot);
                },
                Err(PaeError::StorageUnavailable(_)) => {
                    prop_assert_eq!(node.controller.gtk().keys(), &keys_before);
                },
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }

            let index_before = node.controller.key_storage_index();
            let was_known = node.controller.supplicants().get(&eui(n)).is_some();
            match node.controller.supplicant_authenticated(eui(n), SecurityKeys::default()) {
                Err(PaeError::StorageUnavailable(_)) => {
                    prop_assert_eq!(node.controller.key_storage_index(), index_before);
                    prop_assert_eq!(node.controller.supplicants().get(&eui(n)).is_some(), was_known);
                },
                Ok(()) | Err(_) => {},
            }

            env.advance(3600);
            let _ = node.controller.slow_timer(3600);

            let snapshot = SystemSnapshot::capture(&node.controller);
            if let Ok(snapshot) = snapshot {
                registry.assert_all(&snapshot, "under storage chaos");
            }
        }
    }
}

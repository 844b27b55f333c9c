//! Randomized simulation of an authenticator node.
//!
//! proptest generates operation sequences (key rotation, admissions,
//! revocations, timer ticks, GC and crashes) and every standard invariant is
//! checked after each step.

use meshpae_auth::PaeConfig;
use meshpae_core::Environment;
use meshpae_harness::{InvariantRegistry, SimNode, SystemSnapshot};
use meshpae_nvm::{Eui64, SecurityKeys, SlotId};
use proptest::prelude::*;

const HOUR: u64 = 3600;

#[derive(Debug, Clone)]
enum Op {
    Install { lifetime_hours: u64 },
    Activate(u8),
    Authenticate(u8),
    Revoke(u8),
    RevokeStart,
    SlowTick { advance_hours: u64 },
    FastTick(u32),
    CounterBump { slot: u8, delta: u32 },
    Gc,
    Crash,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..24 * 40).prop_map(|lifetime_hours| Op::Install { lifetime_hours }),
        2 => (0u8..4).prop_map(Op::Activate),
        4 => (0u8..12).prop_map(Op::Authenticate),
        1 => (0u8..12).prop_map(Op::Revoke),
        1 => Just(Op::RevokeStart),
        3 => (0u64..24 * 10).prop_map(|advance_hours| Op::SlowTick { advance_hours }),
        1 => (1u32..400).prop_map(Op::FastTick),
        2 => ((0u8..4), (1u32..1000)).prop_map(|(slot, delta)| Op::CounterBump { slot, delta }),
        1 => Just(Op::Gc),
        1 => Just(Op::Crash),
    ]
}

fn eui(n: u8) -> Eui64 {
    Eui64([0x02, 0, 0, 0, 0, 0, 0xA0, n])
}

fn apply(mut node: SimNode, op: &Op) -> SimNode {
    let controller = &mut node.controller;
    match op {
        Op::Install { lifetime_hours } => {
            let key = node.env.random_gtk();
            let _ = controller.install_gtk(key, lifetime_hours * HOUR);
        },
        Op::Activate(slot) => {
            let _ = controller.activate_gtk(SlotId::new(*slot).unwrap());
        },
        Op::Authenticate(n) => {
            controller.begin_authentication(eui(*n)).unwrap();
            let _ = controller.supplicant_authenticated(eui(*n), SecurityKeys::default());
        },
        Op::Revoke(n) => {
            let _ = controller.supplicant_revoked(eui(*n));
        },
        Op::RevokeStart => {
            controller.node_access_revoke_start();
        },
        Op::SlowTick { advance_hours } => {
            node.env.advance(advance_hours * HOUR);
            controller.slow_timer(u32::try_from(advance_hours * HOUR).unwrap()).unwrap();
        },
        Op::FastTick(ticks) => controller.fast_timer(*ticks),
        Op::CounterBump { slot, delta } => {
            let slot = SlotId::new(*slot).unwrap();
            let next = controller.frame_counter_read(slot).saturating_add(*delta);
            let _ = controller.frame_counter_set(slot, next);
        },
        Op::Gc => {
            controller.forced_gc().unwrap();
        },
        Op::Crash => {
            let before = SystemSnapshot::capture(&node.controller).unwrap();
            let keys_before = node.controller.gtk().snapshot();
            let node = node.crash_and_restart().unwrap();
            let after = SystemSnapshot::capture(&node.controller).unwrap();

            assert_eq!(after.restart_counter, before.restart_counter + 1);
            for slot in SlotId::all() {
                let same_key = keys_before.get(slot).map(|g| &g.key)
                    == node.controller.gtk().keys().get(slot).map(|g| &g.key);
                if same_key && keys_before.get(slot).is_some() {
                    assert!(
                        after.counters[slot.index()] >= before.counters[slot.index()],
                        "counter for {slot} went backwards across restart"
                    );
                }
            }
            return node;
        },
    }
    node
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_under_random_operations(
        seed in any::<u64>(),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let registry = InvariantRegistry::standard();
        let mut node = SimNode::start(seed, PaeConfig::default()).unwrap();

        for (step, op) in ops.iter().enumerate() {
            node = apply(node, op);

            let snapshot = SystemSnapshot::capture(&node.controller).unwrap();
            registry.assert_all(&snapshot, &format!("after step {step} ({op:?})"));
            prop_assert_eq!(node.hooks.last_hashes(), Some(node.controller.gtk().hashes()));
        }
    }

    #[test]
    fn node_limit_never_exceeded_by_new_admissions(
        seed in any::<u64>(),
        limit in 0usize..6,
        arrivals in prop::collection::vec(0u8..12, 1..40),
    ) {
        let config = PaeConfig { node_limit: Some(limit), ..PaeConfig::default() };
        let mut node = SimNode::start(seed, config).unwrap();
        let key = node.env.random_gtk();
        let slot = node.controller.install_gtk(key, 30 * 24 * HOUR).unwrap();
        node.controller.activate_gtk(slot).unwrap();

        for n in arrivals {
            let _ = node.controller.supplicant_authenticated(eui(n), SecurityKeys::default());
            prop_assert!(node.controller.supplicants().authenticated_count() <= limit);
        }
    }
}

#[test]
fn same_seed_same_run() {
    let run = |seed| {
        let mut node = SimNode::start(seed, PaeConfig::default()).unwrap();
        for _ in 0..3 {
            let key = node.env.random_gtk();
            node.controller.install_gtk(key, 24 * HOUR).unwrap();
        }
        node.controller.gtk().hashes()
    };
    assert_eq!(run(11), run(11));
    assert_ne!(run(11), run(12));
}

#[test]
fn recording_sees_pushdowns() {
    let mut node = SimNode::start(1, PaeConfig::default()).unwrap();
    let key = node.env.random_gtk();
    let slot = node.controller.install_gtk(key, 24 * HOUR).unwrap();
    node.controller.activate_gtk(slot).unwrap();
    node.controller.supplicant_authenticated(eui(1), SecurityKeys::default()).unwrap();
    node.controller.fast_timer(25);

    let recording = node.hooks.recording();
    assert_eq!(recording.installs, vec![eui(1)]);
    assert_eq!(recording.active_indices, vec![slot]);
    assert_eq!(recording.handshake_ticks, 25);
    // start, install, activate, admission
    assert_eq!(recording.hashes.len(), 4);
}

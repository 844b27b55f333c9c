//! Model-based property tests for the relay table
//!
//! Every operation is mirrored on a plain `VecDeque` model; the arena table
//! must agree with the model on contents and order.

use std::{
    collections::VecDeque,
    net::{Ipv6Addr, SocketAddrV6},
};

use meshpae_core::{RelayEntry, RelayTable};
use proptest::prelude::*;

const TTL: u8 = 20;
const CAPACITY: usize = 8;

#[derive(Debug, Clone)]
enum Op {
    Update { relay: u16, parent: u16 },
    Detect(u16),
    Age(u32),
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u16..12, 0u16..4).prop_map(|(relay, parent)| Op::Update { relay, parent }),
        1 => (0u16..12).prop_map(Op::Detect),
        1 => (0u32..25).prop_map(Op::Age),
    ]
}

fn relay(n: u16) -> Ipv6Addr {
    Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, n)
}

fn parent(n: u16) -> SocketAddrV6 {
    SocketAddrV6::new(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, n), 10253, 0, 0)
}

#[derive(Default)]
struct Model {
    entries: VecDeque<RelayEntry>,
}

impl Model {
    fn update(&mut self, address: Ipv6Addr, parent: SocketAddrV6) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.relay_address == address) {
            e.ttl = TTL;
            e.parent = parent;
            return;
        }
        if self.entries.len() >= CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(RelayEntry { relay_address: address, parent, ttl: TTL });
    }

    fn age(&mut self, elapsed: u32) {
        self.entries.retain_mut(|e| {
            if u32::from(e.ttl) <= elapsed {
                false
            } else {
                e.ttl -= elapsed as u8;
                true
            }
        });
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the table matches the model after every operation
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(arbitrary_op(), 1..100)) {
        let mut table = RelayTable::with_limits(TTL, CAPACITY);
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Update { relay: r, parent: p } => {
                    table.update(relay(r), parent(p));
                    model.update(relay(r), parent(p));
                },
                Op::Detect(r) => {
                    let expected = model.entries.iter().find(|e| e.relay_address == relay(r)).copied();
                    prop_assert_eq!(table.detect(relay(r)), expected);
                },
                Op::Age(elapsed) => {
                    table.age_tick(elapsed);
                    model.age(elapsed);
                },
            }

            let actual: Vec<RelayEntry> = table.iter().copied().collect();
            let expected: Vec<RelayEntry> = model.entries.iter().copied().collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(table.len(), model.entries.len());
            prop_assert!(table.len() <= CAPACITY);
        }
    }

    /// Property: detect never changes the table
    #[test]
    fn prop_detect_is_pure(relays in prop::collection::vec(0u16..12, 1..20), probe in 0u16..12) {
        let mut table = RelayTable::with_limits(TTL, CAPACITY);
        for r in relays {
            table.update(relay(r), parent(0));
        }
        let before: Vec<RelayEntry> = table.iter().copied().collect();
        for _ in 0..3 {
            let _ = table.detect(relay(probe));
        }
        let after: Vec<RelayEntry> = table.iter().copied().collect();
        prop_assert_eq!(before, after);
    }
}

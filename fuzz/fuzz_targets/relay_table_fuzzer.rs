//! Fuzz target for the relay table
//!
//! Applies arbitrary update/detect/age sequences and compares against a
//! plain list kept in insertion order.
//!
//! # Invariants
//!
//! - Length never exceeds capacity
//! - `detect` never changes the table
//! - Iteration order matches the model

#![no_main]

use std::net::{Ipv6Addr, SocketAddrV6};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use meshpae_core::RelayTable;

#[derive(Debug, Clone, Arbitrary)]
enum RelayOp {
    Update { address: u8, parent: u8 },
    Detect { address: u8 },
    Age { elapsed: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    ttl: u8,
    capacity: u8,
    ops: Vec<RelayOp>,
}

fn address(n: u8) -> Ipv6Addr {
    Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, u16::from(n))
}

fuzz_target!(|input: Input| {
    let ttl = input.ttl.max(1);
    let capacity = usize::from(input.capacity.max(1));
    let mut table = RelayTable::with_limits(ttl, capacity);
    // (address, parent, ttl), oldest first
    let mut model: Vec<(Ipv6Addr, SocketAddrV6, u8)> = Vec::new();

    for op in input.ops {
        match op {
            RelayOp::Update { address: a, parent } => {
                let addr = address(a);
                let parent = SocketAddrV6::new(address(parent), 19788, 0, 0);
                table.update(addr, parent);

                if let Some(entry) = model.iter_mut().find(|(m, _, _)| *m == addr) {
                    entry.1 = parent;
                    entry.2 = ttl;
                } else {
                    if model.len() == capacity {
                        model.remove(0);
                    }
                    model.push((addr, parent, ttl));
                }
            },
            RelayOp::Detect { address: a } => {
                let before: Vec<_> = table.iter().copied().collect();
                let found = table.detect(address(a));
                assert_eq!(found.is_some(), model.iter().any(|(m, _, _)| *m == address(a)));
                assert_eq!(before, table.iter().copied().collect::<Vec<_>>());
            },
            RelayOp::Age { elapsed } => {
                table.age_tick(u32::from(elapsed));
                model.retain_mut(|(_, _, t)| {
                    if *t <= elapsed {
                        return false;
                    }
                    *t -= elapsed;
                    true
                });
            },
        }

        assert!(table.len() <= capacity);
        let actual: Vec<_> =
            table.iter().map(|e| (e.relay_address, e.parent, e.ttl)).collect();
        assert_eq!(actual, model);
    }
});

//! EAPOL relay liveness table.
//!
//! Records which relay forwarded a supplicant's traffic and through which
//! parent, so replies can be routed back. Entries live in an arena with a
//! free list; insertion order is kept by an index-linked list so the oldest
//! entry can be dropped when the table is full.
//!
//! `detect` is a pure lookup. Only `update` refreshes an entry's TTL and
//! only `age_tick` removes expired entries.

use std::net::{Ipv6Addr, SocketAddrV6};

/// TTL given to new and refreshed entries, in slow-timer seconds.
pub const DEFAULT_RELAY_TTL: u8 = 20;

/// Entries kept before the oldest is dropped.
pub const DEFAULT_RELAY_CAPACITY: usize = 32;

/// One relay observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEntry {
    /// Address of the relay node
    pub relay_address: Ipv6Addr,
    /// Parent the relay was reached through
    pub parent: SocketAddrV6,
    /// Remaining seconds before the entry is aged out
    pub ttl: u8,
}

#[derive(Debug, Clone)]
struct Node {
    entry: RelayEntry,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded relay table in insertion order.
#[derive(Debug, Clone)]
pub struct RelayTable {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    ttl: u8,
    capacity: usize,
}

impl Default for RelayTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayTable {
    /// Table with the default TTL and capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_RELAY_TTL, DEFAULT_RELAY_CAPACITY)
    }

    /// Table with explicit TTL and capacity. Capacity is at least one.
    #[must_use]
    pub fn with_limits(ttl: u8, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            ttl,
            capacity,
        }
    }

    /// Create or refresh the entry for `address`.
    ///
    /// An existing entry gets a full TTL and the new parent. A new entry is
    /// appended, dropping the oldest one first if the table is full.
    pub fn update(&mut self, address: Ipv6Addr, parent: SocketAddrV6) -> RelayEntry {
        if let Some(index) = self.find(address)
            && let Some(node) = self.nodes[index].as_mut()
        {
            node.entry.ttl = self.ttl;
            node.entry.parent = parent;
            return node.entry;
        }

        if self.len >= self.capacity
            && let Some(oldest) = self.head
            && let Some(dropped) = self.unlink(oldest)
        {
            tracing::debug!(relay = %dropped.relay_address, "relay table full, oldest dropped");
        }

        let entry = RelayEntry { relay_address: address, parent, ttl: self.ttl };
        let node = Node { entry, prev: self.tail, next: None };
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                index
            },
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            },
        };

        match self.tail {
            Some(tail) => {
                if let Some(t) = self.nodes[tail].as_mut() {
                    t.next = Some(index);
                }
            },
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        tracing::trace!(relay = %address, "relay recorded");
        entry
    }

    /// Entry for `address`, if present. Never modifies the table.
    #[must_use]
    pub fn detect(&self, address: Ipv6Addr) -> Option<RelayEntry> {
        self.find(address).and_then(|i| self.nodes[i].as_ref()).map(|n| n.entry)
    }

    /// Age every entry by `elapsed_secs`, removing those whose TTL runs
    /// out. Returns the number removed.
    pub fn age_tick(&mut self, elapsed_secs: u32) -> usize {
        let mut removed = 0;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let Some(node) = self.nodes[index].as_mut() else {
                break;
            };
            cursor = node.next;

            if u32::from(node.entry.ttl) <= elapsed_secs {
                self.unlink(index);
                removed += 1;
            } else {
                node.entry.ttl -= elapsed_secs as u8;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, remaining = self.len, "relay entries aged out");
        }
        removed
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RelayEntry> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.nodes[cursor?].as_ref()?;
            cursor = node.next;
            Some(&node.entry)
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    fn find(&self, address: Ipv6Addr) -> Option<usize> {
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let node = self.nodes[index].as_ref()?;
            if node.entry.relay_address == address {
                return Some(index);
            }
            cursor = node.next;
        }
        None
    }

    fn unlink(&mut self, index: usize) -> Option<RelayEntry> {
        let node = self.nodes[index].take()?;

        match node.prev {
            Some(prev) => {
                if let Some(p) = self.nodes[prev].as_mut() {
                    p.next = node.next;
                }
            },
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.nodes[next].as_mut() {
                    n.prev = node.prev;
                }
            },
            None => self.tail = node.prev,
        }

        self.free.push(index);
        self.len -= 1;
        Some(node.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay(n: u16) -> Ipv6Addr {
        Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, n)
    }

    fn parent(n: u16) -> SocketAddrV6 {
        SocketAddrV6::new(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, n), 10253, 0, 0)
    }

    #[test]
    fn update_creates_with_full_ttl() {
        let mut table = RelayTable::new();
        let entry = table.update(relay(1), parent(1));
        assert_eq!(entry.ttl, DEFAULT_RELAY_TTL);
        assert_eq!(table.detect(relay(1)), Some(entry));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn update_refreshes_ttl_and_parent() {
        let mut table = RelayTable::new();
        table.update(relay(1), parent(1));
        table.age_tick(15);
        assert_eq!(table.detect(relay(1)).unwrap().ttl, 5);

        let entry = table.update(relay(1), parent(2));
        assert_eq!(entry.ttl, DEFAULT_RELAY_TTL);
        assert_eq!(entry.parent, parent(2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn detect_does_not_refresh() {
        let mut table = RelayTable::new();
        table.update(relay(1), parent(1));
        table.age_tick(10);
        for _ in 0..5 {
            assert_eq!(table.detect(relay(1)).unwrap().ttl, 10);
        }
        assert!(table.detect(relay(2)).is_none());
    }

    #[test]
    fn age_tick_removes_at_zero() {
        let mut table = RelayTable::new();
        table.update(relay(1), parent(1));
        table.update(relay(2), parent(1));
        table.age_tick(19);
        table.update(relay(2), parent(1));

        assert_eq!(table.age_tick(1), 1);
        assert!(table.detect(relay(1)).is_none());
        assert_eq!(table.detect(relay(2)).unwrap().ttl, 19);
    }

    #[test]
    fn full_table_drops_oldest() {
        let mut table = RelayTable::with_limits(DEFAULT_RELAY_TTL, 3);
        for n in 1..=4 {
            table.update(relay(n), parent(n));
        }
        assert_eq!(table.len(), 3);
        assert!(table.detect(relay(1)).is_none());
        let order: Vec<_> = table.iter().map(|e| e.relay_address).collect();
        assert_eq!(order, vec![relay(2), relay(3), relay(4)]);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut table = RelayTable::with_limits(5, 4);
        for n in 1..=4 {
            table.update(relay(n), parent(n));
        }
        table.age_tick(5);
        assert!(table.is_empty());

        for n in 10..=13 {
            table.update(relay(n), parent(n));
        }
        assert_eq!(table.nodes.len(), 4);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn removing_middle_keeps_links() {
        let mut table = RelayTable::new();
        table.update(relay(1), parent(1));
        table.update(relay(2), parent(1));
        table.update(relay(3), parent(1));
        table.age_tick(10);
        table.update(relay(1), parent(1));
        table.update(relay(3), parent(1));

        table.age_tick(10);
        let order: Vec<_> = table.iter().map(|e| e.relay_address).collect();
        assert_eq!(order, vec![relay(1), relay(3)]);
        assert_eq!(table.len(), 2);
    }
}

//! Forced GC repairs the key-storage index against the store.

use meshpae_auth::{MemoryStore, NvmStore, PaeConfig, StoreId, SupplicantState};
use meshpae_core::Environment;
use meshpae_harness::{InvariantRegistry, SimNode, SystemSnapshot};
use meshpae_nvm::{Eui64, KeyStorageIndex, KeyStorageRecord, NvmRecord, SecurityKeys};

const DAY: u64 = 24 * 3600;

fn eui(n: u8) -> Eui64 {
    Eui64([0x02, 0, 0, 0, 0, 0, 0x10, n])
}

fn admitted(count: u8) -> SimNode<MemoryStore> {
    let mut node = SimNode::start(5, PaeConfig::default()).unwrap();
    let key = node.env.random_gtk();
    let slot = node.controller.install_gtk(key, 30 * DAY).unwrap();
    node.controller.activate_gtk(slot).unwrap();
    for n in 0..count {
        node.controller.supplicant_authenticated(eui(n), SecurityKeys::default()).unwrap();
    }
    node
}

fn stored_index(store: &MemoryStore) -> KeyStorageIndex {
    KeyStorageIndex::decode(&store.read(StoreId::KeyStorageIndex).unwrap().unwrap()).unwrap()
}

#[test]
fn spurious_and_missing_bits_repaired() {
    let node = admitted(3);

    // Bit 40 set with no record; record 20 present but unindexed
    let mut index = node.controller.key_storage_index();
    index.insert(40);
    node.store.write(StoreId::KeyStorageIndex, &index.encode()).unwrap();
    let stray = KeyStorageRecord { eui64: eui(20), keys: SecurityKeys::default() };
    node.store.write(StoreId::KeyStorage(20), &stray.encode()).unwrap();

    // Restart so the controller believes the damaged index
    let mut node = node.crash_and_restart().unwrap();
    assert!(node.controller.key_storage_index().contains(40));

    let report = node.controller.forced_gc().unwrap();
    assert_eq!(report.index_bits_set, 1);
    assert_eq!(report.index_bits_cleared, 1);
    assert_eq!(report.adopted, 1);

    let expected: Vec<u8> = vec![0, 1, 2, 20];
    assert_eq!(node.controller.key_storage_index().iter().collect::<Vec<_>>(), expected);
    assert_eq!(stored_index(&node.store), node.controller.key_storage_index());

    let snapshot = SystemSnapshot::capture(&node.controller).unwrap();
    InvariantRegistry::standard().assert_all(&snapshot, "after GC");
}

#[test]
fn gc_is_idempotent() {
    let mut node = admitted(4);
    node.controller.supplicant_revoked(eui(1)).unwrap();
    node.controller.supplicant_revoked(eui(3)).unwrap();

    let first = node.controller.forced_gc().unwrap();
    assert_eq!(first.revoked_reclaimed, 2);
    assert!(!first.index_repaired());

    let second = node.controller.forced_gc().unwrap();
    assert_eq!(second, Default::default());
    assert_eq!(node.store.list_key_storage().unwrap(), vec![0, 2]);
}

#[test]
fn reclaimed_record_reused() {
    let mut node = admitted(2);
    node.controller.supplicant_revoked(eui(0)).unwrap();
    node.controller.forced_gc().unwrap();

    node.controller.supplicant_authenticated(eui(7), SecurityKeys::default()).unwrap();
    let supplicant = node.controller.supplicants().get(&eui(7)).unwrap();
    assert_eq!(supplicant.storage_slot, Some(0));
    assert_eq!(supplicant.state, SupplicantState::Authenticated);
}

#[test]
fn corrupt_record_erased() {
    let mut node = admitted(1);
    node.store.write(StoreId::KeyStorage(0), &[0xDE, 0xAD]).unwrap();

    let report = node.controller.forced_gc().unwrap();
    assert_eq!(report.corrupt_erased, 1);
    assert_eq!(report.index_bits_cleared, 1);
    assert!(node.store.list_key_storage().unwrap().is_empty());
    assert_eq!(node.controller.supplicants().get(&eui(0)).unwrap().storage_slot, None);
}

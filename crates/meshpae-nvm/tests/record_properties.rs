//! Property-based tests for NVM record encoding/decoding.
//!
//! Verify that every representable record survives a round trip and that a
//! damaged envelope is always rejected instead of producing garbage.

use meshpae_nvm::{
    BoundCounter, Eui64, FrameCounterSet, GTK_LEN, GTK_SLOT_COUNT, GtkKey, GtkKeySet, GtkSlot,
    GtkStatus, KeyStorageIndex, KeyStorageRecord, NetworkInfo, NetworkName, NvmError, NvmRecord,
    PMK_LEN, PTK_LEN, PmkEntry, PmkKey, PtkEntry, PtkKey, SecurityKeys, SlotId,
};
use proptest::prelude::*;

fn arbitrary_gtk_key() -> impl Strategy<Value = GtkKey> {
    any::<[u8; GTK_LEN]>().prop_map(GtkKey::new)
}

fn arbitrary_status() -> impl Strategy<Value = GtkStatus> {
    prop_oneof![Just(GtkStatus::Installed), Just(GtkStatus::Active), Just(GtkStatus::Expiring)]
}

fn arbitrary_slot() -> impl Strategy<Value = Option<GtkSlot>> {
    prop::option::of((arbitrary_gtk_key(), any::<u64>(), 0u8..4, arbitrary_status()).prop_map(
        |(key, expiry, install_order, status)| GtkSlot { key, expiry, install_order, status },
    ))
}

fn arbitrary_key_set() -> impl Strategy<Value = GtkKeySet> {
    prop::collection::vec(arbitrary_slot(), GTK_SLOT_COUNT).prop_map(|slots| {
        let mut set = GtkKeySet::new();
        for (id, slot) in SlotId::all().zip(slots) {
            set.replace(id, slot);
        }
        set
    })
}

fn arbitrary_name() -> impl Strategy<Value = NetworkName> {
    "[a-zA-Z0-9_-]{0,32}".prop_map(|s| NetworkName::new(s).expect("regex bounds the length"))
}

fn arbitrary_network_info() -> impl Strategy<Value = NetworkInfo> {
    (any::<u16>(), arbitrary_name(), any::<[u8; 8]>(), arbitrary_key_set()).prop_map(
        |(pan_id, name, eui, gtks)| NetworkInfo { pan_id, name, key_generator: Eui64(eui), gtks },
    )
}

fn arbitrary_security_keys() -> impl Strategy<Value = SecurityKeys> {
    (
        prop::option::of(any::<[u8; 8]>().prop_map(Eui64)),
        prop::option::of(
            (prop::collection::vec(any::<u8>(), PMK_LEN), any::<u32>(), any::<u64>()).prop_map(
                |(key, lifetime, replay_counter)| {
                    let mut bytes = [0u8; PMK_LEN];
                    bytes.copy_from_slice(&key);
                    PmkEntry { key: PmkKey::new(bytes), lifetime, replay_counter }
                },
            ),
        ),
        prop::option::of((prop::collection::vec(any::<u8>(), PTK_LEN), any::<u32>()).prop_map(
            |(key, lifetime)| {
                let mut bytes = [0u8; PTK_LEN];
                bytes.copy_from_slice(&key);
                PtkEntry { key: PtkKey::new(bytes), lifetime }
            },
        )),
    )
        .prop_map(|(ptk_eui64, pmk, ptk)| SecurityKeys { ptk_eui64, pmk, ptk })
}

fn arbitrary_frame_counters() -> impl Strategy<Value = FrameCounterSet> {
    (
        any::<u32>(),
        any::<u64>(),
        any::<u16>(),
        prop::collection::vec(
            prop::option::of(
                (arbitrary_gtk_key(), any::<u32>())
                    .prop_map(|(key, counter)| BoundCounter { key, counter }),
            ),
            GTK_SLOT_COUNT,
        ),
    )
        .prop_map(|(restart_counter, stored_time, pan_version, slots)| {
            let mut set =
                FrameCounterSet { restart_counter, stored_time, pan_version, ..Default::default() };
            for (dst, src) in set.counters.iter_mut().zip(slots) {
                *dst = src;
            }
            set
        })
}

proptest! {
    #[test]
    fn prop_network_info_round_trip(info in arbitrary_network_info()) {
        let bytes = info.encode();
        prop_assert_eq!(NetworkInfo::decode(&bytes)?, info);
    }

    #[test]
    fn prop_security_keys_round_trip(keys in arbitrary_security_keys()) {
        prop_assert_eq!(SecurityKeys::decode(&keys.encode())?, keys);
    }

    #[test]
    fn prop_key_storage_round_trip(eui in any::<[u8; 8]>(), keys in arbitrary_security_keys()) {
        let record = KeyStorageRecord { eui64: Eui64(eui), keys };
        prop_assert_eq!(KeyStorageRecord::decode(&record.encode())?, record);
    }

    #[test]
    fn prop_frame_counters_round_trip(set in arbitrary_frame_counters()) {
        prop_assert_eq!(FrameCounterSet::decode(&set.encode())?, set);
    }

    #[test]
    fn prop_index_round_trip(bits in any::<u64>()) {
        let index = KeyStorageIndex::from_bits(bits);
        prop_assert_eq!(KeyStorageIndex::decode(&index.encode())?, index);
    }

    /// Property: any stored length other than the fixed one is rejected
    #[test]
    fn prop_altered_length_is_corrupt(info in arbitrary_network_info(), len in any::<u16>()) {
        prop_assume!(len != 151);
        let mut bytes = info.encode();
        bytes[2..4].copy_from_slice(&len.to_be_bytes());
        let is_corrupt = matches!(NetworkInfo::decode(&bytes), Err(NvmError::NvmCorrupt { .. }));
        prop_assert!(is_corrupt);
    }

    /// Property: decoding arbitrary bytes never panics
    #[test]
    fn prop_decode_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = NetworkInfo::decode(&bytes);
        let _ = SecurityKeys::decode(&bytes);
        let _ = FrameCounterSet::decode(&bytes);
        let _ = KeyStorageIndex::decode(&bytes);
        let _ = KeyStorageRecord::decode(&bytes);
    }
}

#[test]
fn boundary_pan_ids_and_names_round_trip() {
    for pan_id in [0u16, 0xFFFF] {
        for name in [String::new(), "n".repeat(32)] {
            let info = NetworkInfo {
                pan_id,
                name: NetworkName::new(name).unwrap(),
                key_generator: Eui64::ZERO,
                gtks: GtkKeySet::new(),
            };
            assert_eq!(NetworkInfo::decode(&info.encode()).unwrap(), info);
        }
    }
}

#[test]
fn boundary_bitfields_round_trip() {
    for bits in [0u64, u64::MAX] {
        let index = KeyStorageIndex::from_bits(bits);
        assert_eq!(KeyStorageIndex::decode(&index.encode()).unwrap(), index);
    }
}

#[test]
fn full_name_leaves_terminator() {
    let info = NetworkInfo { name: NetworkName::new("x".repeat(32)).unwrap(), ..Default::default() };
    let bytes = info.encode();
    // header 4 + pan id 2 + 32 name bytes
    assert_eq!(bytes[4 + 2 + 32], 0);
}

//! GTK frame counter record.

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{NvmError, Result},
    tlv::{NvmRecord, RecordTag, read_flag},
    types::{GTK_LEN, GTK_SLOT_COUNT, GtkKey, SlotId},
};

/// Frame counter tagged with the GTK it protects.
///
/// The key tag prevents a counter persisted for one key being applied to a
/// different key installed later in the same slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCounter {
    /// Key the counter belongs to
    pub key: GtkKey,
    /// Last frame counter value
    pub counter: u32,
}

/// Persisted frame counter state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCounterSet {
    /// Number of times a stored image has been loaded
    pub restart_counter: u32,
    /// Wall-clock seconds at the last store
    pub stored_time: u64,
    /// PAN version epoch
    pub pan_version: u16,
    /// One counter per GTK slot
    pub counters: [Option<BoundCounter>; GTK_SLOT_COUNT],
}

impl FrameCounterSet {
    /// Counter for a slot. `None` if the slot has no bound key.
    #[must_use]
    pub fn get(&self, slot: SlotId) -> Option<&BoundCounter> {
        self.counters[slot.index()].as_ref()
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawCounterSlot {
    set: u8,
    key: [u8; GTK_LEN],
    counter: [u8; 4],
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawFrameCounter {
    restart_counter: [u8; 4],
    stored_time: [u8; 8],
    pan_version: [u8; 2],
    slots: [RawCounterSlot; GTK_SLOT_COUNT],
}

impl NvmRecord for FrameCounterSet {
    const TAG: RecordTag = RecordTag::FrameCounter;

    fn write_payload(&self, out: &mut Vec<u8>) {
        let mut slots = [RawCounterSlot::new_zeroed(); GTK_SLOT_COUNT];
        for (raw, counter) in slots.iter_mut().zip(&self.counters) {
            if let Some(c) = counter {
                *raw = RawCounterSlot {
                    set: 1,
                    key: *c.key.as_bytes(),
                    counter: c.counter.to_be_bytes(),
                };
            }
        }

        let raw = RawFrameCounter {
            restart_counter: self.restart_counter.to_be_bytes(),
            stored_time: self.stored_time.to_be_bytes(),
            pan_version: self.pan_version.to_be_bytes(),
            slots,
        };
        out.extend_from_slice(raw.as_bytes());
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        let raw = RawFrameCounter::read_from_bytes(payload).map_err(|_| NvmError::NvmCorrupt {
            tag: Self::TAG.to_u16(),
            expected: Self::TAG.payload_len(),
            actual: payload.len(),
        })?;

        let mut counters: [Option<BoundCounter>; GTK_SLOT_COUNT] = Default::default();
        let raw_slots = raw.slots;
        for (counter, slot) in counters.iter_mut().zip(raw_slots) {
            if read_flag(slot.set, "frame_counter.set")? {
                *counter = Some(BoundCounter {
                    key: GtkKey::new(slot.key),
                    counter: u32::from_be_bytes(slot.counter),
                });
            }
        }

        Ok(Self {
            restart_counter: u32::from_be_bytes(raw.restart_counter),
            stored_time: u64::from_be_bytes(raw.stored_time),
            pan_version: u16::from_be_bytes(raw.pan_version),
            counters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_layout_sizes() {
        assert_eq!(std::mem::size_of::<RawCounterSlot>(), 21);
        assert_eq!(std::mem::size_of::<RawFrameCounter>(), RecordTag::FrameCounter.payload_len());
    }

    #[test]
    fn round_trip_with_mixed_slots() {
        let mut set = FrameCounterSet {
            restart_counter: 3,
            stored_time: 1_700_000_000,
            pan_version: 0xFFFF,
            ..Default::default()
        };
        set.counters[1] = Some(BoundCounter { key: GtkKey::new([7; GTK_LEN]), counter: 42 });
        set.counters[3] = Some(BoundCounter { key: GtkKey::new([8; GTK_LEN]), counter: u32::MAX });

        let bytes = set.encode();
        assert_eq!(bytes.len(), 4 + 98);
        let decoded = FrameCounterSet::decode(&bytes).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(decoded.get(SlotId::new(1).unwrap()).map(|c| c.counter), Some(42));
        assert!(decoded.get(SlotId::new(0).unwrap()).is_none());
    }

    #[test]
    fn header_fields_are_big_endian() {
        let set = FrameCounterSet {
            restart_counter: 0x0A0B_0C0D,
            stored_time: 1,
            pan_version: 0x0102,
            ..Default::default()
        };
        let bytes = set.encode();
        assert_eq!(&bytes[4..8], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&bytes[16..18], &[1, 2]);
    }

    #[test]
    fn truncated_record_is_corrupt() {
        let bytes = FrameCounterSet::default().encode();
        assert!(matches!(
            FrameCounterSet::decode(&bytes[..50]),
            Err(NvmError::NvmCorrupt { tag: 3, expected: 98, actual: 46 })
        ));
    }
}

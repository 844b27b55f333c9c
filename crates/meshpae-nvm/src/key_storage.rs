//! Key-storage index bitfield.

use crate::{
    errors::{NvmError, Result},
    tlv::{NvmRecord, RecordTag},
};

/// Bitfield of key-storage records present in the backing store.
///
/// Bit `i` is set iff key-storage file `i` exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyStorageIndex(u64);

impl KeyStorageIndex {
    /// Number of addressable key-storage records.
    pub const CAPACITY: u8 = 64;

    /// Index with no records.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Index from a raw bitfield.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bitfield.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True if record `i` is marked present.
    #[must_use]
    pub const fn contains(self, i: u8) -> bool {
        i < Self::CAPACITY && self.0 & (1 << i) != 0
    }

    /// Mark record `i` present. Out-of-range indices are ignored.
    pub fn insert(&mut self, i: u8) {
        if i < Self::CAPACITY {
            self.0 |= 1 << i;
        }
    }

    /// Mark record `i` absent.
    pub fn remove(&mut self, i: u8) {
        if i < Self::CAPACITY {
            self.0 &= !(1 << i);
        }
    }

    /// Lowest unused record number. `None` if every record is in use.
    #[must_use]
    pub const fn first_free(self) -> Option<u8> {
        let free = !self.0;
        if free == 0 { None } else { Some(free.trailing_zeros() as u8) }
    }

    /// Record numbers marked present, ascending.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..Self::CAPACITY).filter(move |i| self.contains(*i))
    }

    /// Number of records marked present.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// True if no record is marked present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl NvmRecord for KeyStorageIndex {
    const TAG: RecordTag = RecordTag::KeyStorageIndex;

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_be_bytes());
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        let bytes: [u8; 8] = payload.try_into().map_err(|_| NvmError::NvmCorrupt {
            tag: Self::TAG.to_u16(),
            expected: Self::TAG.payload_len(),
            actual: payload.len(),
        })?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_contains() {
        let mut index = KeyStorageIndex::empty();
        index.insert(0);
        index.insert(63);
        index.insert(64);
        assert!(index.contains(0));
        assert!(index.contains(63));
        assert!(!index.contains(64));
        assert_eq!(index.len(), 2);

        index.remove(0);
        assert!(!index.contains(0));
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![63]);
    }

    #[test]
    fn first_free_skips_used() {
        let index = KeyStorageIndex::from_bits(0b0111);
        assert_eq!(index.first_free(), Some(3));
        assert_eq!(KeyStorageIndex::from_bits(u64::MAX).first_free(), None);
        assert_eq!(KeyStorageIndex::empty().first_free(), Some(0));
    }

    #[test]
    fn encoded_layout() {
        let bytes = KeyStorageIndex::from_bits(0x8000_0000_0000_0001).encode();
        insta::assert_snapshot!(hex::encode(&bytes), @"000400088000000000000001");
    }

    #[test]
    fn boundary_bitfields_round_trip() {
        for bits in [0, u64::MAX] {
            let index = KeyStorageIndex::from_bits(bits);
            assert_eq!(KeyStorageIndex::decode(&index.encode()).unwrap(), index);
        }
    }
}

//! Per-supplicant security keys and the numbered key-storage record.

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{NvmError, Result},
    tlv::{NvmRecord, RecordTag, read_flag},
    types::{Eui64, PMK_LEN, PTK_LEN, PmkKey, PtkKey},
};

/// Pairwise Master Key with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmkEntry {
    /// Key material
    pub key: PmkKey,
    /// Remaining lifetime in seconds
    pub lifetime: u32,
    /// EAPOL-Key replay counter
    pub replay_counter: u64,
}

/// Pairwise Transient Key with its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtkEntry {
    /// Key material
    pub key: PtkKey,
    /// Remaining lifetime in seconds
    pub lifetime: u32,
}

/// Keys negotiated with one supplicant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityKeys {
    /// Peer the PTK was derived with
    pub ptk_eui64: Option<Eui64>,
    /// Pairwise master key
    pub pmk: Option<PmkEntry>,
    /// Pairwise transient key
    pub ptk: Option<PtkEntry>,
}

impl SecurityKeys {
    /// True if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ptk_eui64.is_none() && self.pmk.is_none() && self.ptk.is_none()
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawKeys {
    ptk_eui64_set: u8,
    ptk_eui64: [u8; 8],
    pmk_set: u8,
    pmk_lifetime: [u8; 4],
    pmk: [u8; PMK_LEN],
    pmk_replay_counter: [u8; 8],
    ptk_set: u8,
    ptk_lifetime: [u8; 4],
    ptk: [u8; PTK_LEN],
}

impl RawKeys {
    fn from_keys(keys: &SecurityKeys) -> Self {
        let mut raw = Self::new_zeroed();

        if let Some(eui) = keys.ptk_eui64 {
            raw.ptk_eui64_set = 1;
            raw.ptk_eui64 = eui.bytes();
        }
        if let Some(pmk) = &keys.pmk {
            raw.pmk_set = 1;
            raw.pmk_lifetime = pmk.lifetime.to_be_bytes();
            raw.pmk = *pmk.key.as_bytes();
            raw.pmk_replay_counter = pmk.replay_counter.to_be_bytes();
        }
        if let Some(ptk) = &keys.ptk {
            raw.ptk_set = 1;
            raw.ptk_lifetime = ptk.lifetime.to_be_bytes();
            raw.ptk = *ptk.key.as_bytes();
        }
        raw
    }

    fn to_keys(self) -> Result<SecurityKeys> {
        let ptk_eui64 =
            read_flag(self.ptk_eui64_set, "ptk_eui64.set")?.then_some(Eui64(self.ptk_eui64));

        let pmk = read_flag(self.pmk_set, "pmk.set")?.then(|| PmkEntry {
            key: PmkKey::new(self.pmk),
            lifetime: u32::from_be_bytes(self.pmk_lifetime),
            replay_counter: u64::from_be_bytes(self.pmk_replay_counter),
        });

        let ptk = read_flag(self.ptk_set, "ptk.set")?.then(|| PtkEntry {
            key: PtkKey::new(self.ptk),
            lifetime: u32::from_be_bytes(self.ptk_lifetime),
        });

        Ok(SecurityKeys { ptk_eui64, pmk, ptk })
    }
}

fn corrupt(tag: RecordTag, actual: usize) -> NvmError {
    NvmError::NvmCorrupt { tag: tag.to_u16(), expected: tag.payload_len(), actual }
}

impl NvmRecord for SecurityKeys {
    const TAG: RecordTag = RecordTag::Keys;

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(RawKeys::from_keys(self).as_bytes());
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        let raw = RawKeys::read_from_bytes(payload).map_err(|_| corrupt(Self::TAG, payload.len()))?;
        raw.to_keys()
    }
}

/// Contents of one numbered key-storage file.
///
/// Binds a supplicant identity to its stored keys so the authenticator can
/// resume the supplicant after a restart without a full handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStorageRecord {
    /// Supplicant identity
    pub eui64: Eui64,
    /// Stored keys
    pub keys: SecurityKeys,
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawKeyStorage {
    eui64: [u8; 8],
    keys: RawKeys,
}

impl NvmRecord for KeyStorageRecord {
    const TAG: RecordTag = RecordTag::KeyStorage;

    fn write_payload(&self, out: &mut Vec<u8>) {
        let raw = RawKeyStorage { eui64: self.eui64.bytes(), keys: RawKeys::from_keys(&self.keys) };
        out.extend_from_slice(raw.as_bytes());
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        let raw =
            RawKeyStorage::read_from_bytes(payload).map_err(|_| corrupt(Self::TAG, payload.len()))?;
        let keys = raw.keys;
        Ok(Self { eui64: Eui64(raw.eui64), keys: keys.to_keys()? })
    }
}

//! Storage abstraction for persisted PAE records.
//!
//! The store is a flat namespace of named byte blobs, one per record. Record
//! encoding lives in `meshpae_nvm`; backends only move bytes. The trait is
//! synchronous: every call completes before the controller continues.

mod chaotic;
mod error;
mod memory;
mod redb;

use std::fmt;

pub use chaotic::ChaoticStore;
pub use error::StorageError;
use meshpae_nvm::KeyStorageIndex;
pub use memory::MemoryStore;

pub use self::redb::RedbStore;

const NETWORK_INFO_NAME: &str = "pae_network_info";
const FRAME_COUNTER_NAME: &str = "pae_frame_counter";
const KEY_STORAGE_INDEX_NAME: &str = "pae_keys_index";
const KEY_STORAGE_PREFIX: &str = "pae_keys_";

/// Name of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreId {
    /// Network identity and GTK key set
    NetworkInfo,
    /// Frame counters and epochs
    FrameCounter,
    /// Bitfield of present key-storage records
    KeyStorageIndex,
    /// Per-supplicant key-storage record `i`
    KeyStorage(u8),
}

impl StoreId {
    /// Blob name used by backends.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::NetworkInfo => NETWORK_INFO_NAME.to_string(),
            Self::FrameCounter => FRAME_COUNTER_NAME.to_string(),
            Self::KeyStorageIndex => KEY_STORAGE_INDEX_NAME.to_string(),
            Self::KeyStorage(i) => format!("{KEY_STORAGE_PREFIX}{i}"),
        }
    }

    /// Parse a blob name produced by [`Self::name`].
    pub fn from_name(name: &str) -> Result<Self, StorageError> {
        match name {
            NETWORK_INFO_NAME => Ok(Self::NetworkInfo),
            FRAME_COUNTER_NAME => Ok(Self::FrameCounter),
            KEY_STORAGE_INDEX_NAME => Ok(Self::KeyStorageIndex),
            _ => name
                .strip_prefix(KEY_STORAGE_PREFIX)
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|i| *i < KeyStorageIndex::CAPACITY)
                .map(Self::KeyStorage)
                .ok_or_else(|| StorageError::UnknownBlob(name.to_string())),
        }
    }

    /// Reject key-storage numbers the index cannot address.
    pub(crate) fn validate(self) -> Result<Self, StorageError> {
        match self {
            Self::KeyStorage(i) if i >= KeyStorageIndex::CAPACITY => {
                Err(StorageError::InvalidRecord(i))
            },
            _ => Ok(self),
        }
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Storage abstraction for PAE records
///
/// Must be Clone (tests keep a handle to inspect what the controller wrote),
/// Send + Sync, and synchronous. Implementations share internal state via
/// Arc, so clones access the same underlying store.
///
/// # Invariants
///
/// - `write` replaces the whole blob atomically: a later `read` returns
///   either the old or the new bytes, never a mix.
/// - `erase` of a missing blob succeeds.
pub trait NvmStore: Clone + Send + Sync + 'static {
    /// Read a blob. `None` if it does not exist.
    fn read(&self, id: StoreId) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or replace a blob.
    fn write(&self, id: StoreId, bytes: &[u8]) -> Result<(), StorageError>;

    /// Remove a blob.
    fn erase(&self, id: StoreId) -> Result<(), StorageError>;

    /// Numbers of every key-storage blob present, ascending.
    ///
    /// Scans the store itself rather than the index, so it is the ground
    /// truth when the index is repaired.
    fn list_key_storage(&self) -> Result<Vec<u8>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for id in [
            StoreId::NetworkInfo,
            StoreId::FrameCounter,
            StoreId::KeyStorageIndex,
            StoreId::KeyStorage(0),
            StoreId::KeyStorage(63),
        ] {
            assert_eq!(StoreId::from_name(&id.name()).unwrap(), id);
        }
    }

    #[test]
    fn rejects_foreign_names() {
        assert!(StoreId::from_name("pae_keys_64").is_err());
        assert!(StoreId::from_name("pae_keys_x").is_err());
        assert!(StoreId::from_name("other").is_err());
    }

    #[test]
    fn validate_bounds_record_numbers() {
        assert!(StoreId::KeyStorage(63).validate().is_ok());
        assert_eq!(StoreId::KeyStorage(64).validate(), Err(StorageError::InvalidRecord(64)));
    }
}

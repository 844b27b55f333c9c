#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use super::{NvmStore, StorageError, StoreId};

/// In-memory store for testing and simulation
///
/// Blobs live in a `BTreeMap` so key-storage listings come out in order. All
/// state is wrapped in Arc<Mutex<>> to allow Clone and shared access; a
/// clone kept by a test observes every write the controller makes. Uses
/// `lock().expect()`, which panics if the mutex is poisoned - acceptable for
/// test code.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<StoreId, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn blob_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").len()
    }
}

impl NvmStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn read(&self, id: StoreId) -> Result<Option<Vec<u8>>, StorageError> {
        let id = id.validate()?;
        Ok(self.inner.lock().expect("Mutex poisoned").get(&id).cloned())
    }

    #[allow(clippy::expect_used)]
    fn write(&self, id: StoreId, bytes: &[u8]) -> Result<(), StorageError> {
        let id = id.validate()?;
        self.inner.lock().expect("Mutex poisoned").insert(id, bytes.to_vec());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn erase(&self, id: StoreId) -> Result<(), StorageError> {
        let id = id.validate()?;
        self.inner.lock().expect("Mutex poisoned").remove(&id);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn list_key_storage(&self) -> Result<Vec<u8>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner
            .keys()
            .filter_map(|id| match id {
                StoreId::KeyStorage(i) => Some(*i),
                _ => None,
            })
            .collect())
    }
}

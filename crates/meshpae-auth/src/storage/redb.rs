//! Redb-backed durable store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety: a
//! write either commits the whole blob or leaves the previous one in place.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};

use super::{NvmStore, StorageError, StoreId};

/// Table: nvm
/// Key: blob name (see [`StoreId::name`])
/// Value: TLV-encoded record bytes
const NVM: TableDefinition<&str, &[u8]> = TableDefinition::new("nvm");

/// Durable store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(NVM).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl NvmStore for RedbStore {
    fn read(&self, id: StoreId) -> Result<Option<Vec<u8>>, StorageError> {
        let name = id.validate()?.name();
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(NVM).map_err(|e| StorageError::Io(e.to_string()))?;

        let value = table.get(name.as_str()).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn write(&self, id: StoreId, bytes: &[u8]) -> Result<(), StorageError> {
        let name = id.validate()?.name();
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(NVM).map_err(|e| StorageError::Io(e.to_string()))?;
            table.insert(name.as_str(), bytes).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn erase(&self, id: StoreId) -> Result<(), StorageError> {
        let name = id.validate()?.name();
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(NVM).map_err(|e| StorageError::Io(e.to_string()))?;
            table.remove(name.as_str()).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn list_key_storage(&self) -> Result<Vec<u8>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(NVM).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut records = Vec::new();
        for result in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (key, _) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            match StoreId::from_name(key.value()) {
                Ok(StoreId::KeyStorage(i)) => records.push(i),
                Ok(_) => {},
                Err(e) => tracing::warn!(error = %e, "ignoring foreign blob"),
            }
        }
        records.sort_unstable();

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn write_read_erase() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        assert_eq!(store.read(StoreId::FrameCounter).unwrap(), None);
        store.write(StoreId::FrameCounter, &[1, 2, 3]).unwrap();
        assert_eq!(store.read(StoreId::FrameCounter).unwrap(), Some(vec![1, 2, 3]));

        store.erase(StoreId::FrameCounter).unwrap();
        store.erase(StoreId::FrameCounter).unwrap();
        assert_eq!(store.read(StoreId::FrameCounter).unwrap(), None);
    }

    #[test]
    fn lists_key_storage_numerically() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();

        // Lexicographic order would put 10 before 2
        for i in [10, 2, 33] {
            store.write(StoreId::KeyStorage(i), &[i]).unwrap();
        }
        store.write(StoreId::NetworkInfo, &[0]).unwrap();

        assert_eq!(store.list_key_storage().unwrap(), vec![2, 10, 33]);
    }

    #[test]
    fn out_of_range_record_rejected() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();
        assert_eq!(store.read(StoreId::KeyStorage(200)), Err(StorageError::InvalidRecord(200)));
    }
}

//! Storage error types.
//!
//! Backends report failures as strings so the trait stays independent of
//! any one database's error type.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// I/O error (file system, database, injected fault)
    #[error("I/O error: {0}")]
    Io(String),

    /// Key-storage record number outside the index range
    #[error("key-storage record {0} out of range")]
    InvalidRecord(u8),

    /// Stored blob name not recognized
    #[error("unknown blob name: {0}")]
    UnknownBlob(String),
}

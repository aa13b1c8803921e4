//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the RocksDB store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record under the given key.
    #[error("record not found")]
    NotFound,

    /// Another access key already holds this name.
    #[error("access key name already in use: {0}")]
    NameTaken(String),

    /// The database was opened without one of the expected column families.
    #[error("column family not found: {0}")]
    MissingColumnFamily(String),

    /// RocksDB rejected the read or write.
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// A stored value or key could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

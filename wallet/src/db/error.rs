use thiserror::Error as ThisError;

/// Errors raised by the storage layer.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The key was expected to exist but is absent.
    #[error("db key not found: {0}")]
    KeyNotFound(String),
    /// The rocksdb backend failed.
    #[error("rocksdb failed: {0}")]
    Rocksdb(#[from] rocksdb::Error),
    /// A stored value could not be (de)serialized.
    #[error("bincode failed: {0}")]
    Bincode(#[from] bincode::Error),
}

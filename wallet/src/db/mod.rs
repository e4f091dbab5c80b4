//! Storage layer for the ledger.
//!
//! Values are bincode-encoded under string keys. The [`Database`] trait is
//! the seam between the repository and the backing store: production code
//! uses the rocksdb-backed [`Db`], tests use an in-memory double.

mod error;
mod plain;

pub use error::Error;
pub use plain::{Db, DbWriteBatch};
#[cfg(test)]
pub use tests::{HashMapDb, HashMapWriteBatch};

use serde::{de::DeserializeOwned, Serialize};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Atomic key-value storage with batched writes and prefix scans.
pub trait Database {
    /// Set of writes applied atomically by [`Database::write`].
    type WriteBatch: WriteBatch;

    /// Get a value, failing if the key is absent.
    fn get<K, V>(&self, key: K) -> Result<V>
    where
        K: AsRef<[u8]>,
        V: DeserializeOwned,
    {
        let opt = self.get_opt(&key)?;

        opt.ok_or_else(|| Error::KeyNotFound(String::from_utf8_lossy(key.as_ref()).into_owned()))
    }

    /// Get a value, or its `Default` if the key is absent.
    fn get_or_default<K, V>(&self, key: K) -> Result<V>
    where
        K: AsRef<[u8]>,
        V: DeserializeOwned + Default,
    {
        Ok(self.get_opt(key)?.unwrap_or_default())
    }

    /// Get a value, or `None` if the key is absent.
    fn get_opt<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: DeserializeOwned;

    /// Whether the key is present.
    fn contains<K>(&self, key: K) -> Result<bool>
    where
        K: AsRef<[u8]>;

    /// Store a value under a key.
    fn put<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize + ?Sized;

    /// Apply a batch of writes atomically.
    fn write(&self, batch: Self::WriteBatch) -> Result<()>;

    /// Flush pending writes to durable storage.
    fn flush(&self) -> Result<()>;

    /// Create an empty write batch.
    fn batch(&self) -> Self::WriteBatch;

    /// Decoded `(key, value)` pairs for every key starting with `prefix`,
    /// in ascending key order.
    fn prefix<V>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned;
}

/// A set of writes applied atomically.
pub trait WriteBatch {
    /// Queue a put.
    fn put<K, V>(&mut self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize + ?Sized;

    /// Queue a deletion.
    fn delete<K>(&mut self, key: K)
    where
        K: AsRef<[u8]>;
}

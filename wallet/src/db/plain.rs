use std::sync::Arc;

use rocksdb::{Direction, IteratorMode};
use serde::{de::DeserializeOwned, Serialize};

use super::{Database, Result, WriteBatch};

/// rocksdb-backed database.
#[derive(Clone)]
pub struct Db {
    db: Arc<rocksdb::DB>,
}

impl Db {
    /// Wrap an open rocksdb handle.
    pub fn new(db: Arc<rocksdb::DB>) -> Self {
        Self { db }
    }
}

impl Database for Db {
    type WriteBatch = DbWriteBatch;

    fn get_opt<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: DeserializeOwned,
    {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn contains<K>(&self, key: K) -> Result<bool>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.db.get(key)?.is_some())
    }

    fn put<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize + ?Sized,
    {
        let bytes = bincode::serialize(value)?;
        self.db.put(key, bytes)?;

        Ok(())
    }

    fn write(&self, batch: Self::WriteBatch) -> Result<()> {
        self.db.write(batch.batch)?;

        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;

        Ok(())
    }

    fn batch(&self) -> Self::WriteBatch {
        DbWriteBatch::default()
    }

    fn prefix<V>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned,
    {
        // IteratorMode::From is correct without a configured prefix
        // extractor; we stop at the first key outside the prefix.
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), bincode::deserialize(&value)?));
        }

        Ok(rows)
    }
}

/// Write batch for [`Db`].
#[derive(Default)]
pub struct DbWriteBatch {
    batch: rocksdb::WriteBatch,
}

impl WriteBatch for DbWriteBatch {
    fn put<K, V>(&mut self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize + ?Sized,
    {
        let bytes = bincode::serialize(value)?;
        self.batch.put(key, bytes);

        Ok(())
    }

    fn delete<K>(&mut self, key: K)
    where
        K: AsRef<[u8]>,
    {
        self.batch.delete(key);
    }
}

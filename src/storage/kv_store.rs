use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use rocksdb::{Options, DB};
use thiserror::Error;

/// Error type for KVStore operations
#[derive(Debug, Error)]
pub enum KVStoreError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDBError(String),

    /// Key not found
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for KVStoreError {
    fn from(err: rocksdb::Error) -> Self {
        KVStoreError::RocksDBError(err.to_string())
    }
}

/// Key-value store trait
///
/// The trie and the state database only rely on this surface; everything
/// else about the backing store is opaque to them.
pub trait KVStore: Send + Sync {
    /// Put a key-value pair
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Delete a key-value pair
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// Iterate over key-value pairs with a prefix, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// Flush any pending writes to disk
    fn flush(&self) -> Result<(), KVStoreError>;
}

/// RocksDB implementation of KVStore
pub struct RocksDBStore {
    db: DB,
}

impl RocksDBStore {
    /// Create a new RocksDBStore
    pub fn new(path: &Path) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to open RocksDB: {}", e)))?;
        Ok(Self { db })
    }
}

impl KVStore for RocksDBStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .put(key, value)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to put key: {}", e)))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.db
            .get(key)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to get key: {}", e)))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .delete(key)
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to delete key: {}", e)))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let mut results = Vec::new();
        let iterator = self
            .db
            .iterator(rocksdb::IteratorMode::From(prefix, rocksdb::Direction::Forward));

        for item in iterator {
            let (key, value) =
                item.map_err(|e| KVStoreError::RocksDBError(format!("Failed to iterate: {}", e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        self.db
            .flush()
            .map_err(|e| KVStoreError::RocksDBError(format!("Failed to flush: {}", e)))
    }
}

/// In-memory implementation of KVStore, used in tests and for ephemeral state
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KVStore for MemoryStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| KVStoreError::Other("lock poisoned".to_string()))?;
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| KVStoreError::Other("lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| KVStoreError::Other("lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| KVStoreError::Other("lock poisoned".to_string()))?;
        Ok(entries.contains_key(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| KVStoreError::Other("lock poisoned".to_string()))?;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn flush(&self) -> Result<(), KVStoreError> {
        Ok(())
    }
}

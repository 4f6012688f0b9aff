use std::sync::Arc;

use num_bigint::BigUint;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::storage::kv_store::KVStoreError;
use crate::storage::trie::TrieError;

/// Error type for state operations
#[derive(Debug, Error)]
pub enum StateError {
    /// Entry does not exist
    #[error("state does not exist")]
    NotExist,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Insufficient balance
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: BigUint,
        available: BigUint,
    },

    /// Snapshot id does not identify a live snapshot
    #[error("invalid snapshot id {0}")]
    InvalidSnapshot(usize),

    /// Read requested at a height this store does not serve
    #[error("height {0} not available")]
    HeightNotAvailable(u64),

    /// Underlying KV store error
    #[error("kv store error: {0}")]
    KVStore(#[from] KVStoreError),

    /// Underlying trie error
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;

/// Filter predicate over (key, value) pairs for range reads
pub type Condition = Arc<dyn Fn(&[u8], &[u8]) -> bool + Send + Sync>;

/// Config for a single state access
///
/// Built with the namespace constructor and chained setters:
/// `StateConfig::namespace(NAMESPACE_STAKING).key(k)`.
#[derive(Clone)]
pub struct StateConfig {
    pub namespace: String,
    pub key: Vec<u8>,
    pub at_height: bool,
    pub height: u64,
    pub min_key: Option<Vec<u8>>,
    pub max_key: Option<Vec<u8>>,
    pub cond: Option<Condition>,
}

impl StateConfig {
    /// Start a config for the given namespace
    pub fn namespace(ns: &str) -> Self {
        Self {
            namespace: ns.to_string(),
            key: Vec::new(),
            at_height: false,
            height: 0,
            min_key: None,
            max_key: None,
            cond: None,
        }
    }

    /// Set the entry key
    pub fn key(mut self, key: Vec<u8>) -> Self {
        self.key = key;
        self
    }

    /// Pin the access to a specific height
    pub fn at_height(mut self, height: u64) -> Self {
        self.at_height = true;
        self.height = height;
        self
    }

    /// Bound a range read to `[min_key, max_key]` (inclusive, lexicographic)
    pub fn range(mut self, min_key: Vec<u8>, max_key: Vec<u8>) -> Self {
        self.min_key = Some(min_key);
        self.max_key = Some(max_key);
        self
    }

    /// Filter a range read with a predicate over (key, value)
    pub fn cond(mut self, cond: Condition) -> Self {
        self.cond = Some(cond);
        self
    }
}

/// Iterator over the results of a filtered range read, in key order
pub struct StateIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

impl StateIterator {
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { entries, pos: 0 }
    }

    /// Number of entries remaining
    pub fn len(&self) -> usize {
        self.entries.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for StateIterator {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.entries.len() {
            return None;
        }
        let item = self.entries[self.pos].clone();
        self.pos += 1;
        Some(item)
    }
}

/// Read access to the state store
pub trait StateReader {
    /// Current height of the store
    fn height(&self) -> StateResult<u64>;

    /// Load one entry; fails with `NotExist` if the key is absent
    fn state_bytes(&self, cfg: &StateConfig) -> StateResult<(u64, Vec<u8>)>;

    /// Filtered range read over a namespace
    fn states_bytes(&self, cfg: &StateConfig) -> StateResult<(u64, StateIterator)>;
}

/// Read-write access to the state store with checkpoint/rollback
pub trait StateManager: StateReader {
    /// Store one entry
    fn put_state_bytes(&mut self, cfg: &StateConfig, value: &[u8]) -> StateResult<u64>;

    /// Delete one entry
    fn del_state(&mut self, cfg: &StateConfig) -> StateResult<u64>;

    /// Checkpoint the uncommitted mutations; returns a snapshot id
    fn snapshot(&mut self) -> usize;

    /// Roll the uncommitted mutations back to a snapshot
    fn revert(&mut self, snapshot: usize) -> StateResult<()>;

    /// Upcast to the read-only view
    fn as_reader(&self) -> &dyn StateReader;
}

/// Load and deserialize one typed entry
pub fn get_state<T: DeserializeOwned>(
    sr: &dyn StateReader,
    cfg: &StateConfig,
) -> StateResult<(u64, T)> {
    let (height, bytes) = sr.state_bytes(cfg)?;
    let value =
        bincode::deserialize(&bytes).map_err(|e| StateError::Deserialization(e.to_string()))?;
    Ok((height, value))
}

/// Serialize and store one typed entry
pub fn put_state<T: Serialize>(
    sm: &mut dyn StateManager,
    cfg: &StateConfig,
    value: &T,
) -> StateResult<u64> {
    let bytes =
        bincode::serialize(value).map_err(|e| StateError::Serialization(e.to_string()))?;
    sm.put_state_bytes(cfg, &bytes)
}

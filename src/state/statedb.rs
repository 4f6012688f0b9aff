use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::state::manager::{
    StateConfig, StateError, StateIterator, StateManager, StateReader, StateResult,
};
use crate::storage::kv_store::KVStore;
use crate::storage::trie::{MerklePatriciaTrie, TrieError};
use crate::types::{hash160, Hash256};

const META_HEIGHT_KEY: &[u8] = b"meta:state_height";
const META_NS_ROOTS_KEY: &[u8] = b"meta:ns_roots";

/// State root produced by a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRoot {
    /// Root hash over all namespace tries
    pub root_hash: Hash256,

    /// Block height at which this state root was calculated
    pub block_height: u64,

    /// Timestamp when this state root was calculated
    pub timestamp: u64,
}

type Overlay = HashMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

/// State database over a KV store and per-namespace Merkle Patricia Tries
///
/// Uncommitted mutations live in an in-memory overlay that supports nested
/// snapshot/revert; `commit` flushes the overlay to the KV store, folds every
/// dirty entry into its namespace trie (trie key = 20-byte hash of the raw
/// key, so namespaces may use raw keys of any length) and derives the global
/// root from the sorted namespace roots.
pub struct StateDb {
    kv: Arc<dyn KVStore>,
    dirty: Overlay,
    snapshots: Vec<Overlay>,
    tries: HashMap<String, MerklePatriciaTrie>,
    ns_roots: BTreeMap<String, Vec<u8>>,
    height: u64,
}

impl StateDb {
    /// Open a state database, resuming from persisted height and namespace
    /// roots if present
    pub fn open(kv: Arc<dyn KVStore>) -> StateResult<Self> {
        let height = match kv.get(META_HEIGHT_KEY)? {
            Some(bytes) if bytes.len() == 8 => u64::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
            Some(_) => return Err(StateError::Deserialization("corrupt height".to_string())),
            None => 0,
        };
        let ns_roots: BTreeMap<String, Vec<u8>> = match kv.get(META_NS_ROOTS_KEY)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| StateError::Deserialization(e.to_string()))?,
            None => BTreeMap::new(),
        };
        Ok(Self {
            kv,
            dirty: HashMap::new(),
            snapshots: Vec::new(),
            tries: HashMap::new(),
            ns_roots,
            height,
        })
    }

    /// Root hash of one namespace trie, if that namespace has been committed
    pub fn namespace_root(&self, ns: &str) -> Option<Vec<u8>> {
        self.ns_roots.get(ns).cloned()
    }

    fn row_key(ns: &str, key: &[u8]) -> Vec<u8> {
        format!("state:{}:{}", ns, hex::encode(key)).into_bytes()
    }

    fn row_prefix(ns: &str) -> Vec<u8> {
        format!("state:{}:", ns).into_bytes()
    }

    fn check_height(&self, cfg: &StateConfig) -> StateResult<()> {
        if cfg.at_height && cfg.height != self.height {
            return Err(StateError::HeightNotAvailable(cfg.height));
        }
        Ok(())
    }

    fn committed_get(&self, ns: &str, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        Ok(self.kv.get(&Self::row_key(ns, key))?)
    }

    fn trie_for(&mut self, ns: &str) -> StateResult<&MerklePatriciaTrie> {
        if !self.tries.contains_key(ns) {
            let mut builder = MerklePatriciaTrie::builder().kv_store(self.kv.clone());
            if let Some(root) = self.ns_roots.get(ns) {
                builder = builder.root_hash(root.clone());
            }
            let trie = builder.build()?;
            self.tries.insert(ns.to_string(), trie);
        }
        Ok(self.tries.get(ns).expect("trie inserted above"))
    }

    /// Flush all uncommitted mutations, advance to `height` and return the
    /// new global state root. Clears the snapshot stack.
    pub fn commit(&mut self, height: u64, timestamp: u64) -> StateResult<StateRoot> {
        let dirty = std::mem::take(&mut self.dirty);
        self.snapshots.clear();

        let mut namespaces: Vec<&String> = dirty.keys().collect();
        namespaces.sort();
        for ns in namespaces {
            let entries = &dirty[ns];
            for (key, value) in entries {
                let row_key = Self::row_key(ns, key);
                let trie_key = hash160(key);
                match value {
                    Some(bytes) => {
                        self.kv.put(&row_key, bytes)?;
                        self.trie_for(ns)?.upsert(&trie_key, bytes)?;
                    }
                    None => {
                        self.kv.delete(&row_key)?;
                        // Deleting a key that never made it into the trie is
                        // a no-op, not an error.
                        match self.trie_for(ns)?.delete(&trie_key) {
                            Ok(()) | Err(TrieError::NotExist) => {}
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
            let root = self.trie_for(ns)?.root_hash();
            self.ns_roots.insert(ns.clone(), root);
        }

        self.height = height;
        self.kv.put(META_HEIGHT_KEY, &height.to_be_bytes())?;
        let ns_roots_bytes = bincode::serialize(&self.ns_roots)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        self.kv.put(META_NS_ROOTS_KEY, &ns_roots_bytes)?;

        let root_hash = self.global_root();
        debug!(
            "state committed at height {} with root {}",
            height,
            hex::encode(root_hash)
        );
        Ok(StateRoot {
            root_hash,
            block_height: height,
            timestamp,
        })
    }

    fn global_root(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        for (ns, root) in &self.ns_roots {
            hasher.update(ns.as_bytes());
            hasher.update([0u8]);
            hasher.update(root);
        }
        hasher.finalize().into()
    }
}

impl StateReader for StateDb {
    fn height(&self) -> StateResult<u64> {
        Ok(self.height)
    }

    fn state_bytes(&self, cfg: &StateConfig) -> StateResult<(u64, Vec<u8>)> {
        self.check_height(cfg)?;
        if let Some(entries) = self.dirty.get(&cfg.namespace) {
            match entries.get(&cfg.key) {
                Some(Some(value)) => return Ok((self.height, value.clone())),
                Some(None) => return Err(StateError::NotExist),
                None => {}
            }
        }
        match self.committed_get(&cfg.namespace, &cfg.key)? {
            Some(value) => Ok((self.height, value)),
            None => Err(StateError::NotExist),
        }
    }

    fn states_bytes(&self, cfg: &StateConfig) -> StateResult<(u64, StateIterator)> {
        self.check_height(cfg)?;

        // Committed rows first, then the overlay wins per key
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        let prefix = Self::row_prefix(&cfg.namespace);
        for (row_key, value) in self.kv.scan_prefix(&prefix)? {
            let hex_key = &row_key[prefix.len()..];
            let key = hex::decode(hex_key)
                .map_err(|e| StateError::Deserialization(format!("corrupt row key: {}", e)))?;
            merged.insert(key, Some(value));
        }
        if let Some(entries) = self.dirty.get(&cfg.namespace) {
            for (key, value) in entries {
                merged.insert(key.clone(), value.clone());
            }
        }

        let entries: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .filter(|(key, value)| {
                if let Some(min) = &cfg.min_key {
                    if key < min {
                        return false;
                    }
                }
                if let Some(max) = &cfg.max_key {
                    if key > max {
                        return false;
                    }
                }
                if let Some(cond) = &cfg.cond {
                    if !cond(key, value) {
                        return false;
                    }
                }
                true
            })
            .collect();
        Ok((self.height, StateIterator::new(entries)))
    }
}

impl StateManager for StateDb {
    fn put_state_bytes(&mut self, cfg: &StateConfig, value: &[u8]) -> StateResult<u64> {
        self.dirty
            .entry(cfg.namespace.clone())
            .or_default()
            .insert(cfg.key.clone(), Some(value.to_vec()));
        Ok(self.height)
    }

    fn del_state(&mut self, cfg: &StateConfig) -> StateResult<u64> {
        self.dirty
            .entry(cfg.namespace.clone())
            .or_default()
            .insert(cfg.key.clone(), None);
        Ok(self.height)
    }

    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.dirty.clone());
        self.snapshots.len() - 1
    }

    fn revert(&mut self, snapshot: usize) -> StateResult<()> {
        if snapshot >= self.snapshots.len() {
            return Err(StateError::InvalidSnapshot(snapshot));
        }
        self.dirty = self.snapshots[snapshot].clone();
        self.snapshots.truncate(snapshot);
        Ok(())
    }

    fn as_reader(&self) -> &dyn StateReader {
        self
    }
}

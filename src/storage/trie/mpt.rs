use std::sync::{Arc, RwLock};

use log::debug;

use crate::storage::kv_store::{KVStore, MemoryStore};
use crate::storage::trie::codec::{decode_node, encode_node};
use crate::storage::trie::node::Node;
use crate::storage::trie::TrieError;
use crate::types::hash160;

/// Function used to derive a node's storage key from its serialization
pub type HashFunc = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Default hash function: 20-byte truncated SHA-256
pub fn default_hash_func() -> HashFunc {
    Arc::new(|data: &[u8]| hash160(data).to_vec())
}

/// Builder for [`MerklePatriciaTrie`]
pub struct TrieBuilder {
    key_length: usize,
    hash_func: HashFunc,
    kv_store: Option<Arc<dyn KVStore>>,
    root_hash: Option<Vec<u8>>,
}

impl TrieBuilder {
    /// Set the fixed key length, in bytes (1..=128)
    pub fn key_length(mut self, len: usize) -> Self {
        self.key_length = len;
        self
    }

    /// Set the hash function used to key nodes in the store
    pub fn hash_func(mut self, hash_func: HashFunc) -> Self {
        self.hash_func = hash_func;
        self
    }

    /// Set the backing key-value store
    pub fn kv_store(mut self, kv: Arc<dyn KVStore>) -> Self {
        self.kv_store = Some(kv);
        self
    }

    /// Bind the trie to an existing root hash
    pub fn root_hash(mut self, hash: Vec<u8>) -> Self {
        self.root_hash = Some(hash);
        self
    }

    /// Build the trie, computing the empty-root sentinel and binding the
    /// initial root (the empty root unless a root hash was supplied)
    pub fn build(self) -> Result<MerklePatriciaTrie, TrieError> {
        if self.key_length == 0 || self.key_length > 128 {
            return Err(TrieError::InvalidConfig(format!(
                "invalid key length {}",
                self.key_length
            )));
        }
        let kv = self
            .kv_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KVStore>);

        let empty_root = Node::empty_branch();
        let empty_root_hash = (self.hash_func)(&encode_node(&empty_root));

        let mut inner = Inner {
            key_length: self.key_length,
            hash_func: self.hash_func,
            kv,
            root: empty_root,
            root_hash: empty_root_hash.clone(),
            empty_root_hash,
        };
        if let Some(hash) = self.root_hash {
            inner.bind_root(&hash)?;
        }
        Ok(MerklePatriciaTrie {
            inner: RwLock::new(inner),
        })
    }
}

/// Merkle Patricia Trie over a pluggable key-value store
///
/// Fixed key length, content addressed, copy-on-write: mutations hash the
/// touched path bottom-up and write each new node under its own hash, so
/// prior roots stay reachable. Readers and writers are serialized through
/// the interior read-write lock.
pub struct MerklePatriciaTrie {
    inner: RwLock<Inner>,
}

struct Inner {
    key_length: usize,
    hash_func: HashFunc,
    kv: Arc<dyn KVStore>,
    /// The root is always a branch, possibly with no children
    root: Node,
    root_hash: Vec<u8>,
    empty_root_hash: Vec<u8>,
}

impl MerklePatriciaTrie {
    /// Start building a trie; defaults: 20-byte keys, truncated SHA-256
    /// hashing, in-memory store
    pub fn builder() -> TrieBuilder {
        TrieBuilder {
            key_length: 20,
            hash_func: default_hash_func(),
            kv_store: None,
            root_hash: None,
        }
    }

    /// Get the value stored under a key
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, TrieError> {
        let inner = self.inner.read().expect("trie lock poisoned");
        inner.check_key(key)?;
        match inner.search(&inner.root, key, 0)? {
            Some(value) => Ok(value),
            None => Err(TrieError::NotExist),
        }
    }

    /// Insert or replace the value stored under a key
    pub fn upsert(&self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        let mut inner = self.inner.write().expect("trie lock poisoned");
        inner.check_key(key)?;
        let root = inner.root.clone();
        let new_root = inner.upsert_at(&root, key, 0, value)?;
        inner.reset_root(new_root)
    }

    /// Delete a key; fails with `NotExist` and leaves the root unchanged if
    /// the key is absent
    pub fn delete(&self, key: &[u8]) -> Result<(), TrieError> {
        let mut inner = self.inner.write().expect("trie lock poisoned");
        inner.check_key(key)?;

        // The root stays a branch whatever happens below it, so the root
        // level bypasses the generic collapse logic.
        let children = match &inner.root {
            Node::Branch { children } => children.clone(),
            _ => return Err(TrieError::InvalidRoot("root is not a branch".to_string())),
        };
        let index = key[0] as usize;
        let child_hash = match &children[index] {
            Some(hash) => hash.clone(),
            None => return Err(TrieError::NotExist),
        };
        let child = inner.load_node(&child_hash)?;
        let replacement = inner.delete_at(&child, key, 1)?;

        let mut new_children = children;
        new_children[index] = match replacement {
            Some(node) => Some(inner.store_node(&node)?),
            None => None,
        };
        inner.reset_root(Node::Branch {
            children: new_children,
        })
    }

    /// Current root hash
    pub fn root_hash(&self) -> Vec<u8> {
        let inner = self.inner.read().expect("trie lock poisoned");
        inner.root_hash.clone()
    }

    /// Rebind the in-memory root to the subtree identified by `hash`,
    /// loading it lazily from the KV store. An empty slice or the
    /// empty-root sentinel reinstalls the empty root.
    pub fn set_root_hash(&self, hash: &[u8]) -> Result<(), TrieError> {
        let mut inner = self.inner.write().expect("trie lock poisoned");
        inner.bind_root(hash)
    }

    /// True iff the current root hash equals the empty-root sentinel
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read().expect("trie lock poisoned");
        inner.root_hash == inner.empty_root_hash
    }

    /// The hash of the empty root, fixed for this trie's configuration
    pub fn empty_root_hash(&self) -> Vec<u8> {
        let inner = self.inner.read().expect("trie lock poisoned");
        inner.empty_root_hash.clone()
    }
}

impl Inner {
    fn check_key(&self, key: &[u8]) -> Result<(), TrieError> {
        if key.len() != self.key_length {
            return Err(TrieError::InvalidKeyLength {
                got: key.len(),
                want: self.key_length,
            });
        }
        Ok(())
    }

    fn store_node(&self, node: &Node) -> Result<Vec<u8>, TrieError> {
        let encoded = encode_node(node);
        let hash = (self.hash_func)(&encoded);
        self.kv.put(&hash, &encoded)?;
        Ok(hash)
    }

    fn load_node(&self, hash: &[u8]) -> Result<Node, TrieError> {
        match self.kv.get(hash)? {
            Some(bytes) => decode_node(&bytes),
            None => Err(TrieError::MissingNode(hex::encode(hash))),
        }
    }

    fn reset_root(&mut self, new_root: Node) -> Result<(), TrieError> {
        let hash = self.store_node(&new_root)?;
        debug!("trie root moved to {}", hex::encode(&hash));
        self.root = new_root;
        self.root_hash = hash;
        Ok(())
    }

    fn bind_root(&mut self, hash: &[u8]) -> Result<(), TrieError> {
        if hash.is_empty() || hash == self.empty_root_hash.as_slice() {
            self.root = Node::empty_branch();
            self.root_hash = self.empty_root_hash.clone();
            return Ok(());
        }
        let node = self.load_node(hash)?;
        match node {
            Node::Branch { .. } => {
                self.root = node;
                self.root_hash = hash.to_vec();
                Ok(())
            }
            _ => Err(TrieError::InvalidRoot(format!(
                "{} is not a branch",
                hex::encode(hash)
            ))),
        }
    }

    fn search(&self, node: &Node, key: &[u8], offset: usize) -> Result<Option<Vec<u8>>, TrieError> {
        match node {
            Node::Leaf { path, value } => {
                if &key[offset..] == path.as_slice() {
                    Ok(Some(value.clone()))
                } else {
                    Ok(None)
                }
            }
            Node::Extension { path, child } => {
                let rest = &key[offset..];
                if rest.len() < path.len() || &rest[..path.len()] != path.as_slice() {
                    return Ok(None);
                }
                let child_node = self.load_node(child)?;
                self.search(&child_node, key, offset + path.len())
            }
            Node::Branch { children } => match &children[key[offset] as usize] {
                Some(hash) => {
                    let child = self.load_node(hash)?;
                    self.search(&child, key, offset + 1)
                }
                None => Ok(None),
            },
        }
    }

    /// Copy-on-write insert below `node`; returns the replacement node.
    /// Newly created descendants are persisted here, the replacement itself
    /// is persisted by the caller.
    fn upsert_at(
        &self,
        node: &Node,
        key: &[u8],
        offset: usize,
        value: &[u8],
    ) -> Result<Node, TrieError> {
        let rest = &key[offset..];
        match node {
            Node::Leaf {
                path,
                value: old_value,
            } => {
                if rest == path.as_slice() {
                    return Ok(Node::leaf(path.clone(), value.to_vec()));
                }
                // Keys are all the same length, so the paths diverge before
                // either one runs out.
                let common = common_prefix_len(path, rest);
                let old_leaf = Node::leaf(path[common + 1..].to_vec(), old_value.clone());
                let new_leaf = Node::leaf(rest[common + 1..].to_vec(), value.to_vec());
                let mut branch = Node::branch_with(path[common], self.store_node(&old_leaf)?);
                if let Node::Branch { children } = &mut branch {
                    children[rest[common] as usize] = Some(self.store_node(&new_leaf)?);
                }
                if common == 0 {
                    Ok(branch)
                } else {
                    let branch_hash = self.store_node(&branch)?;
                    Ok(Node::extension(rest[..common].to_vec(), branch_hash))
                }
            }
            Node::Extension { path, child } => {
                let common = common_prefix_len(path, rest);
                if common == path.len() {
                    let child_node = self.load_node(child)?;
                    let new_child = self.upsert_at(&child_node, key, offset + common, value)?;
                    let child_hash = self.store_node(&new_child)?;
                    return Ok(Node::extension(path.clone(), child_hash));
                }
                // Split the extension where the paths diverge
                let old_hash = if path.len() == common + 1 {
                    child.clone()
                } else {
                    self.store_node(&Node::extension(path[common + 1..].to_vec(), child.clone()))?
                };
                let new_leaf = Node::leaf(rest[common + 1..].to_vec(), value.to_vec());
                let mut branch = Node::branch_with(path[common], old_hash);
                if let Node::Branch { children } = &mut branch {
                    children[rest[common] as usize] = Some(self.store_node(&new_leaf)?);
                }
                if common == 0 {
                    Ok(branch)
                } else {
                    let branch_hash = self.store_node(&branch)?;
                    Ok(Node::extension(path[..common].to_vec(), branch_hash))
                }
            }
            Node::Branch { children } => {
                let index = key[offset] as usize;
                let new_child = match &children[index] {
                    Some(hash) => {
                        let child = self.load_node(hash)?;
                        self.upsert_at(&child, key, offset + 1, value)?
                    }
                    None => Node::leaf(key[offset + 1..].to_vec(), value.to_vec()),
                };
                let child_hash = self.store_node(&new_child)?;
                let mut new_children = children.clone();
                new_children[index] = Some(child_hash);
                Ok(Node::Branch {
                    children: new_children,
                })
            }
        }
    }

    /// Copy-on-write delete below `node`. `Ok(Some(..))` is the replacement
    /// node, `Ok(None)` means the whole subtree disappeared, and
    /// `Err(NotExist)` leaves everything untouched.
    fn delete_at(
        &self,
        node: &Node,
        key: &[u8],
        offset: usize,
    ) -> Result<Option<Node>, TrieError> {
        let rest = &key[offset..];
        match node {
            Node::Leaf { path, .. } => {
                if rest == path.as_slice() {
                    Ok(None)
                } else {
                    Err(TrieError::NotExist)
                }
            }
            Node::Extension { path, child } => {
                if rest.len() < path.len() || &rest[..path.len()] != path.as_slice() {
                    return Err(TrieError::NotExist);
                }
                let child_node = self.load_node(child)?;
                match self.delete_at(&child_node, key, offset + path.len())? {
                    None => Ok(None),
                    // Merge with whatever the child collapsed into
                    Some(Node::Extension {
                        path: child_path,
                        child: grandchild,
                    }) => Ok(Some(Node::extension(
                        concat_paths(path, &child_path),
                        grandchild,
                    ))),
                    Some(Node::Leaf {
                        path: child_path,
                        value,
                    }) => Ok(Some(Node::leaf(concat_paths(path, &child_path), value))),
                    Some(branch) => {
                        let branch_hash = self.store_node(&branch)?;
                        Ok(Some(Node::extension(path.clone(), branch_hash)))
                    }
                }
            }
            Node::Branch { children } => {
                let index = key[offset] as usize;
                let child_hash = match &children[index] {
                    Some(hash) => hash.clone(),
                    None => return Err(TrieError::NotExist),
                };
                let child = self.load_node(&child_hash)?;
                let replacement = self.delete_at(&child, key, offset + 1)?;

                let mut new_children = children.clone();
                if let Some(new_child) = replacement {
                    new_children[index] = Some(self.store_node(&new_child)?);
                    return Ok(Some(Node::Branch {
                        children: new_children,
                    }));
                }
                new_children[index] = None;

                let branch = Node::Branch {
                    children: new_children,
                };
                match branch.child_count() {
                    0 => Ok(None),
                    1 => {
                        // A singleton branch collapses into its only child
                        let (sole_index, sole_hash) =
                            branch.sole_child().map(|(i, h)| (i, h.clone())).expect(
                                "branch with child_count 1 has a sole child",
                            );
                        let only = self.load_node(&sole_hash)?;
                        let collapsed = match only {
                            Node::Leaf { path, value } => {
                                Node::leaf(prepend_byte(sole_index, &path), value)
                            }
                            Node::Extension { path, child } => {
                                Node::extension(prepend_byte(sole_index, &path), child)
                            }
                            Node::Branch { .. } => Node::extension(vec![sole_index], sole_hash),
                        };
                        Ok(Some(collapsed))
                    }
                    _ => Ok(Some(branch)),
                }
            }
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let mut len = 0;
    while len < a.len() && len < b.len() && a[len] == b[len] {
        len += 1;
    }
    len
}

fn concat_paths(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

fn prepend_byte(first: u8, rest: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + rest.len());
    out.push(first);
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_trie(key_length: usize) -> MerklePatriciaTrie {
        MerklePatriciaTrie::builder()
            .key_length(key_length)
            .build()
            .unwrap()
    }

    fn new_trie_on(kv: Arc<dyn KVStore>, key_length: usize) -> MerklePatriciaTrie {
        MerklePatriciaTrie::builder()
            .key_length(key_length)
            .kv_store(kv)
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_trie() {
        let trie = new_trie(4);
        assert!(trie.is_empty());
        assert_eq!(trie.root_hash(), trie.empty_root_hash());
        assert!(matches!(trie.get(&[0, 0, 0, 0]), Err(TrieError::NotExist)));
    }

    #[test]
    fn test_invalid_key_length() {
        let trie = new_trie(4);
        assert!(matches!(
            trie.get(&[1, 2, 3]),
            Err(TrieError::InvalidKeyLength { got: 3, want: 4 })
        ));
        assert!(matches!(
            trie.upsert(&[1, 2, 3, 4, 5], b"v"),
            Err(TrieError::InvalidKeyLength { got: 5, want: 4 })
        ));
        assert!(matches!(
            trie.delete(&[]),
            Err(TrieError::InvalidKeyLength { got: 0, want: 4 })
        ));
    }

    #[test]
    fn test_builder_rejects_bad_key_length() {
        assert!(MerklePatriciaTrie::builder().key_length(0).build().is_err());
        assert!(MerklePatriciaTrie::builder().key_length(129).build().is_err());
        assert!(MerklePatriciaTrie::builder().key_length(128).build().is_ok());
    }

    #[test]
    fn test_insert_get_update() {
        let trie = new_trie(4);

        trie.upsert(&[1, 2, 3, 4], b"value1").unwrap();
        assert_eq!(trie.get(&[1, 2, 3, 4]).unwrap(), b"value1");
        assert!(!trie.is_empty());

        // Replace
        trie.upsert(&[1, 2, 3, 4], b"value2").unwrap();
        assert_eq!(trie.get(&[1, 2, 3, 4]).unwrap(), b"value2");

        // Sibling with shared prefix
        trie.upsert(&[1, 2, 3, 9], b"value3").unwrap();
        assert_eq!(trie.get(&[1, 2, 3, 4]).unwrap(), b"value2");
        assert_eq!(trie.get(&[1, 2, 3, 9]).unwrap(), b"value3");

        // Diverging at the first byte
        trie.upsert(&[9, 2, 3, 4], b"value4").unwrap();
        assert_eq!(trie.get(&[9, 2, 3, 4]).unwrap(), b"value4");

        assert!(matches!(trie.get(&[1, 2, 3, 5]), Err(TrieError::NotExist)));
    }

    #[test]
    fn test_delete_and_rebalance() {
        let trie = new_trie(4);
        let keys: Vec<[u8; 4]> = vec![
            [0, 0, 0, 1],
            [0, 0, 0, 2],
            [0, 1, 0, 0],
            [7, 7, 7, 7],
        ];
        for (i, key) in keys.iter().enumerate() {
            trie.upsert(key, format!("v{}", i).as_bytes()).unwrap();
        }

        trie.delete(&[0, 0, 0, 2]).unwrap();
        assert!(matches!(trie.get(&[0, 0, 0, 2]), Err(TrieError::NotExist)));
        assert_eq!(trie.get(&[0, 0, 0, 1]).unwrap(), b"v0");
        assert_eq!(trie.get(&[0, 1, 0, 0]).unwrap(), b"v2");

        trie.delete(&[0, 1, 0, 0]).unwrap();
        assert_eq!(trie.get(&[0, 0, 0, 1]).unwrap(), b"v0");
        assert_eq!(trie.get(&[7, 7, 7, 7]).unwrap(), b"v3");

        trie.delete(&[0, 0, 0, 1]).unwrap();
        trie.delete(&[7, 7, 7, 7]).unwrap();
        assert!(trie.is_empty());
        assert_eq!(trie.root_hash(), trie.empty_root_hash());
    }

    #[test]
    fn test_delete_absent_key_keeps_root() {
        let trie = new_trie(4);
        trie.upsert(&[1, 2, 3, 4], b"v").unwrap();
        let root = trie.root_hash();

        assert!(matches!(trie.delete(&[1, 2, 3, 5]), Err(TrieError::NotExist)));
        assert!(matches!(trie.delete(&[9, 9, 9, 9]), Err(TrieError::NotExist)));
        assert_eq!(trie.root_hash(), root);
    }

    #[test]
    fn test_canonical_structure_after_delete() {
        // Deleting from a larger trie must leave exactly the structure a
        // fresh build of the remaining keys would produce.
        let keys: Vec<[u8; 4]> = vec![
            [0, 0, 0, 1],
            [0, 0, 0, 2],
            [0, 0, 5, 1],
            [0, 3, 0, 0],
            [8, 0, 0, 1],
        ];
        let full = new_trie(4);
        for key in &keys {
            full.upsert(key, key).unwrap();
        }
        full.delete(&[0, 0, 0, 2]).unwrap();

        let rebuilt = new_trie(4);
        for key in keys.iter().filter(|k| *k != &[0, 0, 0, 2]) {
            rebuilt.upsert(key, key).unwrap();
        }
        assert_eq!(full.root_hash(), rebuilt.root_hash());
    }

    #[test]
    fn test_insertion_order_determinism() {
        let entries: Vec<([u8; 4], &[u8])> = vec![
            ([1, 1, 1, 1], b"a"),
            ([1, 1, 2, 2], b"b"),
            ([3, 0, 0, 0], b"c"),
        ];
        let permutations: Vec<Vec<usize>> = vec![
            vec![0, 1, 2],
            vec![0, 2, 1],
            vec![1, 0, 2],
            vec![1, 2, 0],
            vec![2, 0, 1],
            vec![2, 1, 0],
        ];

        let mut roots = Vec::new();
        for perm in &permutations {
            let trie = new_trie(4);
            for &i in perm {
                let (key, value) = entries[i];
                trie.upsert(&key, value).unwrap();
            }
            roots.push(trie.root_hash());
        }
        for root in &roots[1..] {
            assert_eq!(root, &roots[0]);
        }

        // Deleting one key and re-inserting it matches inserting the other
        // two first and the deleted one last.
        for perm in &permutations {
            let trie = new_trie(4);
            for &i in perm {
                let (key, value) = entries[i];
                trie.upsert(&key, value).unwrap();
            }
            trie.delete(&entries[1].0).unwrap();
            trie.upsert(&entries[1].0, entries[1].1).unwrap();

            let reference = new_trie(4);
            reference.upsert(&entries[0].0, entries[0].1).unwrap();
            reference.upsert(&entries[2].0, entries[2].1).unwrap();
            reference.upsert(&entries[1].0, entries[1].1).unwrap();
            assert_eq!(trie.root_hash(), reference.root_hash());
        }
    }

    #[test]
    fn test_upsert_then_delete_restores_root() {
        let trie = new_trie(4);
        trie.upsert(&[1, 1, 1, 1], b"a").unwrap();
        trie.upsert(&[1, 1, 2, 2], b"b").unwrap();
        let root = trie.root_hash();

        trie.upsert(&[5, 5, 5, 5], b"c").unwrap();
        assert_ne!(trie.root_hash(), root);
        trie.delete(&[5, 5, 5, 5]).unwrap();
        assert_eq!(trie.root_hash(), root);
    }

    #[test]
    fn test_set_root_hash_rebinds_snapshots() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let trie = new_trie_on(kv.clone(), 4);

        trie.upsert(&[1, 1, 1, 1], b"old").unwrap();
        let old_root = trie.root_hash();

        trie.upsert(&[1, 1, 1, 1], b"new").unwrap();
        trie.upsert(&[2, 2, 2, 2], b"extra").unwrap();
        let new_root = trie.root_hash();

        // Historical root is still addressable
        trie.set_root_hash(&old_root).unwrap();
        assert_eq!(trie.root_hash(), old_root);
        assert_eq!(trie.get(&[1, 1, 1, 1]).unwrap(), b"old");
        assert!(matches!(trie.get(&[2, 2, 2, 2]), Err(TrieError::NotExist)));

        trie.set_root_hash(&new_root).unwrap();
        assert_eq!(trie.get(&[1, 1, 1, 1]).unwrap(), b"new");
        assert_eq!(trie.get(&[2, 2, 2, 2]).unwrap(), b"extra");

        // Empty hash and the sentinel both reinstall the empty root
        trie.set_root_hash(&[]).unwrap();
        assert!(trie.is_empty());
        trie.set_root_hash(&new_root).unwrap();
        let sentinel = trie.empty_root_hash();
        trie.set_root_hash(&sentinel).unwrap();
        assert!(trie.is_empty());
    }

    #[test]
    fn test_reopen_from_persisted_root() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let root = {
            let trie = new_trie_on(kv.clone(), 4);
            trie.upsert(&[1, 2, 3, 4], b"persisted").unwrap();
            trie.upsert(&[1, 2, 9, 9], b"sibling").unwrap();
            trie.root_hash()
        };

        let reopened = MerklePatriciaTrie::builder()
            .key_length(4)
            .kv_store(kv)
            .root_hash(root.clone())
            .build()
            .unwrap();
        assert_eq!(reopened.root_hash(), root);
        assert_eq!(reopened.get(&[1, 2, 3, 4]).unwrap(), b"persisted");
        assert_eq!(reopened.get(&[1, 2, 9, 9]).unwrap(), b"sibling");
    }

    #[test]
    fn test_set_root_hash_rejects_non_branch() {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        let trie = new_trie_on(kv.clone(), 4);
        trie.upsert(&[1, 2, 3, 4], b"v").unwrap();

        // A leaf hash is reachable in the store but is not a valid root
        let leaf = Node::leaf(vec![2, 3, 4], b"v".to_vec());
        let encoded = encode_node(&leaf);
        let leaf_hash = hash160(&encoded).to_vec();
        assert!(kv.get(&leaf_hash).unwrap().is_some());
        assert!(matches!(
            trie.set_root_hash(&leaf_hash),
            Err(TrieError::InvalidRoot(_))
        ));

        // Unknown hash fails to load
        assert!(matches!(
            trie.set_root_hash(&[0xee; 20]),
            Err(TrieError::MissingNode(_))
        ));
    }

    #[test]
    fn test_twenty_byte_keys() {
        let trie = new_trie(20);
        let mut key_a = [0u8; 20];
        let mut key_b = [0u8; 20];
        key_a[19] = 1;
        key_b[19] = 2;

        trie.upsert(&key_a, b"a").unwrap();
        trie.upsert(&key_b, b"b").unwrap();
        assert_eq!(trie.get(&key_a).unwrap(), b"a");
        assert_eq!(trie.get(&key_b).unwrap(), b"b");

        trie.delete(&key_a).unwrap();
        assert!(matches!(trie.get(&key_a), Err(TrieError::NotExist)));
        assert_eq!(trie.get(&key_b).unwrap(), b"b");
    }
}

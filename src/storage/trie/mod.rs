//! Merkle Patricia Trie over a pluggable key-value store.
//!
//! The trie is fixed-key-length and content addressed: every node is stored
//! in the KV store under the hash of its canonical serialization, and all
//! edits are copy-on-write. Historical roots therefore remain addressable by
//! hash, which is what snapshot/replay builds on.

pub mod codec;
pub mod mpt;
pub mod node;

pub use mpt::{HashFunc, MerklePatriciaTrie, TrieBuilder};
pub use node::Node;

use thiserror::Error;

use crate::storage::kv_store::KVStoreError;

/// Error type for trie operations
#[derive(Debug, Error)]
pub enum TrieError {
    /// Key length does not match the trie's configured key length
    #[error("invalid key length {got}, expected {want}")]
    InvalidKeyLength { got: usize, want: usize },

    /// Key does not exist in the trie
    #[error("key does not exist")]
    NotExist,

    /// A hash does not resolve to a branch where a root is required
    #[error("invalid root: {0}")]
    InvalidRoot(String),

    /// A stored node failed to decode
    #[error("invalid node encoding: {0}")]
    InvalidNodeEncoding(String),

    /// A referenced node is missing from the KV store
    #[error("node {0} missing from the store")]
    MissingNode(String),

    /// Underlying KV store error
    #[error("kv store error: {0}")]
    KVStore(#[from] KVStoreError),

    /// Invalid builder configuration
    #[error("invalid trie configuration: {0}")]
    InvalidConfig(String),
}

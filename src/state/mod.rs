//! Versioned state access for the protocol layer.
//!
//! `StateReader`/`StateManager` are the contract the staking core consumes;
//! `StateDb` is the concrete implementation backed by the KV store and
//! per-namespace Merkle Patricia Tries.

pub mod manager;
pub mod statedb;

pub use manager::{
    get_state, put_state, Condition, StateConfig, StateError, StateIterator, StateManager,
    StateReader,
};
pub use statedb::{StateDb, StateRoot};

/// Namespace for account records
pub const NAMESPACE_ACCOUNT: &str = "account";
/// Namespace for staking buckets, indices and candidates
pub const NAMESPACE_STAKING: &str = "staking";
/// Namespace for system records such as the reward pool
pub const NAMESPACE_SYSTEM: &str = "system";

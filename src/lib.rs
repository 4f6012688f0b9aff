// Quorumcoin - staking state-transition engine and Merkle Patricia Trie
// for a delegated-proof-of-stake blockchain node.

pub mod account;
pub mod staking;
pub mod state;
pub mod storage;
pub mod types;

// Initialize logging
pub fn init_logger() {
    env_logger::init();
}

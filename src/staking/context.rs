use num_bigint::BigUint;

use crate::types::{Address, Hash256};

/// Per-action context derived from the enclosing signed action
#[derive(Debug, Clone)]
pub struct ActionCtx {
    /// Sender of the action
    pub caller: Address,

    /// Nonce carried by the action
    pub nonce: u64,

    /// Gas price the caller committed to
    pub gas_price: BigUint,

    /// Intrinsic gas of the action
    pub intrinsic_gas: u64,

    /// Hash of the enclosing action
    pub action_hash: Hash256,
}

impl ActionCtx {
    /// Gas fee the action settles: `gas_price * intrinsic_gas`
    pub fn gas_fee(&self) -> BigUint {
        &self.gas_price * BigUint::from(self.intrinsic_gas)
    }
}

/// Per-block context shared by all actions of the block
#[derive(Debug, Clone)]
pub struct BlockCtx {
    /// Height of the block being applied
    pub height: u64,

    /// Block timestamp, Unix seconds
    pub timestamp: u64,

    /// Remaining gas budget of the block
    pub gas_limit: u64,
}

use serde::{Deserialize, Serialize};

use crate::types::{hash256, Address, Hash256};

/// Receipt status codes
///
/// The numeric values are part of the chain's public schema and must not
/// change across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u64)]
pub enum ReceiptStatus {
    Failure = 0,
    Success = 1,
    ErrCandidateNotExist = 200,
    ErrCandidateAlreadyExist = 201,
    ErrCandidateConflict = 202,
    ErrInvalidBucketIndex = 203,
    ErrInvalidBucketType = 204,
    ErrInvalidBucketAmount = 205,
    ErrUnauthorizedOperator = 206,
    ErrInvalidOwner = 207,
    ErrWithdrawBeforeUnstake = 208,
    ErrWithdrawBeforeMaturity = 209,
    ErrNotEnoughBalance = 210,
}

impl ReceiptStatus {
    /// Wire code of the status
    pub fn code(self) -> u64 {
        self as u64
    }
}

/// Event log attached to a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Emitting protocol address
    pub address: Address,

    /// Ordered topic hashes
    pub topics: Vec<Hash256>,

    /// Opaque payload
    pub data: Vec<u8>,

    /// Height of the enclosing block
    pub block_height: u64,

    /// Hash of the enclosing action
    pub action_hash: Hash256,
}

impl Log {
    /// Assemble the topics of a handler log: the handler name, an optional
    /// candidate address, then the voter address, each hashed.
    pub fn topics_for(
        handler_name: &str,
        candidate: Option<&Address>,
        voter: &Address,
    ) -> Vec<Hash256> {
        let mut topics = vec![hash256(handler_name.as_bytes())];
        if let Some(candidate) = candidate {
            topics.push(hash256(candidate.as_ref()));
        }
        topics.push(hash256(voter.as_ref()));
        topics
    }
}

/// Per-action outcome record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub block_height: u64,
    pub action_hash: Hash256,
    pub gas_consumed: u64,
    pub contract_address: Address,
    pub logs: Vec<Log>,
}

use thiserror::Error;

use crate::staking::candidate::CandidateError;
use crate::staking::candidate_center::CenterError;
use crate::staking::receipt::ReceiptStatus;
use crate::state::manager::StateError;

/// Fatal protocol errors; these abort block application instead of
/// producing a receipt
#[derive(Debug, Error)]
pub enum StakingError {
    /// State access failed
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Candidate arithmetic or validation failed
    #[error("candidate error: {0}")]
    Candidate(#[from] CandidateError),

    /// Candidate center rejected an update
    #[error("candidate center error: {0}")]
    Center(#[from] CenterError),

    /// Block gas budget cannot cover the action's intrinsic gas
    #[error("block gas limit {gas_limit} below intrinsic gas {intrinsic_gas}")]
    HitGasLimit { gas_limit: u64, intrinsic_gas: u64 },

    /// Persistent state contradicts itself
    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    /// Caller or bucket could not be loaded for a non-receipted reason
    #[error("internal failure: {0}")]
    Internal(String),

    /// Malformed action payload
    #[error("invalid action: {0}")]
    InvalidAction(String),
}

/// User-visible handler failure: the action settles with `status` instead of
/// mutating bucket/candidate state
#[derive(Debug)]
pub struct FetchError {
    /// Human-readable cause, logged at debug level
    pub cause: String,

    /// Status code the receipt carries
    pub status: ReceiptStatus,
}

impl FetchError {
    pub fn new(status: ReceiptStatus, cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            status,
        }
    }
}

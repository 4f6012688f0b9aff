//! Staking protocol: buckets, candidates and the action state machine.
//!
//! The protocol consumes signed staking actions, enforces the economic
//! preconditions, mutates persistent state through the state manager and
//! emits receipts. The in-memory candidate center mirrors the persisted
//! candidate set and is kept consistent with it after every successful
//! action.

pub mod actions;
pub mod bucket;
pub mod candidate;
pub mod candidate_center;
pub mod config;
pub mod context;
pub mod errors;
pub mod protocol;
pub mod receipt;

pub use actions::{
    Action, CandidateRegister, CandidateUpdate, ChangeCandidate, CreateStake, DepositToStake,
    Restake, TransferStake, Unstake, WithdrawStake,
};
pub use bucket::VoteBucket;
pub use candidate::Candidate;
pub use candidate_center::{CandidateCenter, CenterError};
pub use config::{StakingConfig, VoteWeightConfig};
pub use context::{ActionCtx, BlockCtx};
pub use errors::{FetchError, StakingError};
pub use protocol::Protocol;
pub use receipt::{Log, Receipt, ReceiptStatus};

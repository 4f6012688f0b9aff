use num_bigint::BigUint;

use crate::types::Address;

/// Longest admissible candidate name
pub const MAX_CANDIDATE_NAME_LENGTH: usize = 12;

/// Candidate names are short lowercase alphanumerics
pub fn is_valid_candidate_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_CANDIDATE_NAME_LENGTH
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Stake a new bucket for a named candidate
#[derive(Debug, Clone)]
pub struct CreateStake {
    pub candidate_name: String,
    pub amount: BigUint,
    pub duration_days: u32,
    pub auto_stake: bool,
}

/// Start unstaking a bucket
#[derive(Debug, Clone)]
pub struct Unstake {
    pub bucket_index: u64,
}

/// Withdraw a matured, unstaked bucket
#[derive(Debug, Clone)]
pub struct WithdrawStake {
    pub bucket_index: u64,
}

/// Move a bucket's vote to another candidate
#[derive(Debug, Clone)]
pub struct ChangeCandidate {
    pub candidate_name: String,
    pub bucket_index: u64,
}

/// Hand a bucket over to another voter
#[derive(Debug, Clone)]
pub struct TransferStake {
    pub voter: Address,
    pub bucket_index: u64,
}

/// Grow an auto-stake bucket
#[derive(Debug, Clone)]
pub struct DepositToStake {
    pub bucket_index: u64,
    pub amount: BigUint,
}

/// Update a bucket's duration and auto-stake flag
#[derive(Debug, Clone)]
pub struct Restake {
    pub bucket_index: u64,
    pub duration_days: u32,
    pub auto_stake: bool,
}

/// Register a candidate with its self-staking bucket
#[derive(Debug, Clone)]
pub struct CandidateRegister {
    pub name: String,
    pub operator: Address,
    pub reward: Address,
    /// Candidate owner; defaults to the caller when absent
    pub owner: Option<Address>,
    pub amount: BigUint,
    pub duration_days: u32,
    pub auto_stake: bool,
}

/// Overwrite selected candidate fields
#[derive(Debug, Clone)]
pub struct CandidateUpdate {
    pub name: Option<String>,
    pub operator: Option<Address>,
    pub reward: Option<Address>,
}

/// The fixed action set of the staking protocol
#[derive(Debug, Clone)]
pub enum Action {
    CreateStake(CreateStake),
    Unstake(Unstake),
    WithdrawStake(WithdrawStake),
    ChangeCandidate(ChangeCandidate),
    TransferStake(TransferStake),
    DepositToStake(DepositToStake),
    Restake(Restake),
    CandidateRegister(CandidateRegister),
    CandidateUpdate(CandidateUpdate),
}

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::state::manager::{get_state, put_state, StateConfig, StateError, StateResult};
use crate::state::{StateManager, StateReader, NAMESPACE_STAKING};
use crate::types::Address;

/// Seconds in a staking day
pub const DAY_SECS: u64 = 24 * 60 * 60;

// Single-byte prefixes partitioning the staking namespace
const PREFIX_BUCKET: u8 = 0x00;
const PREFIX_BUCKET_COUNT: u8 = 0x10;
const PREFIX_VOTER_INDEX: u8 = 0x20;
const PREFIX_CAND_INDEX: u8 = 0x30;
pub(crate) const PREFIX_CANDIDATE: u8 = 0x40;

/// A single unit of stake, tied to one voter and one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteBucket {
    /// Candidate the bucket votes for
    pub candidate: Address,

    /// Voter owning the bucket
    pub owner: Address,

    /// Staked amount
    pub staked_amount: BigUint,

    /// Staked duration in seconds (whole days at creation)
    pub staked_duration_secs: u64,

    /// Creation timestamp, Unix seconds
    pub create_time: u64,

    /// When the stake started counting
    pub stake_start_time: u64,

    /// When unstaking started; zero means still staked
    pub unstake_start_time: u64,

    /// Whether the stake renews automatically
    pub auto_stake: bool,
}

impl VoteBucket {
    /// Create a bucket at `now` for `duration_days` whole days
    pub fn new(
        candidate: Address,
        owner: Address,
        staked_amount: BigUint,
        duration_days: u32,
        now: u64,
        auto_stake: bool,
    ) -> Self {
        Self {
            candidate,
            owner,
            staked_amount,
            staked_duration_secs: u64::from(duration_days) * DAY_SECS,
            create_time: now,
            stake_start_time: now,
            unstake_start_time: 0,
            auto_stake,
        }
    }

    /// Whether unstaking has started
    pub fn is_unstaked(&self) -> bool {
        self.unstake_start_time != 0
    }

    /// Staked duration in whole days
    pub fn staked_duration_days(&self) -> u64 {
        self.staked_duration_secs / DAY_SECS
    }
}

/// Set of bucket indices hanging off one owner or candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketIndices(pub Vec<u64>);

impl BucketIndices {
    /// Add an index if not already present
    pub fn add(&mut self, index: u64) {
        if !self.0.contains(&index) {
            self.0.push(index);
        }
    }

    /// Remove an index if present
    pub fn remove(&mut self, index: u64) {
        self.0.retain(|&i| i != index);
    }

    pub fn contains(&self, index: u64) -> bool {
        self.0.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn bucket_key(index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(PREFIX_BUCKET);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn bucket_count_key() -> Vec<u8> {
    vec![PREFIX_BUCKET_COUNT]
}

fn prefixed_addr_key(prefix: u8, addr: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(prefix);
    key.extend_from_slice(addr.as_ref());
    key
}

fn staking_cfg(key: Vec<u8>) -> StateConfig {
    StateConfig::namespace(NAMESPACE_STAKING).key(key)
}

/// Load a bucket by index
pub fn get_bucket(sr: &dyn StateReader, index: u64) -> StateResult<VoteBucket> {
    let (_, bucket) = get_state::<VoteBucket>(sr, &staking_cfg(bucket_key(index)))?;
    Ok(bucket)
}

/// Next bucket index to be assigned
pub fn total_bucket_count(sr: &dyn StateReader) -> StateResult<u64> {
    match get_state::<u64>(sr, &staking_cfg(bucket_count_key())) {
        Ok((_, count)) => Ok(count),
        Err(StateError::NotExist) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Persist a new bucket, allocating the next index
pub fn put_bucket(sm: &mut dyn StateManager, bucket: &VoteBucket) -> StateResult<u64> {
    let index = total_bucket_count(sm.as_reader())?;
    put_state(sm, &staking_cfg(bucket_key(index)), bucket)?;
    put_state(sm, &staking_cfg(bucket_count_key()), &(index + 1))?;
    Ok(index)
}

/// Overwrite an existing bucket
pub fn update_bucket(sm: &mut dyn StateManager, index: u64, bucket: &VoteBucket) -> StateResult<()> {
    put_state(sm, &staking_cfg(bucket_key(index)), bucket)?;
    Ok(())
}

/// Delete a bucket record
pub fn del_bucket(sm: &mut dyn StateManager, index: u64) -> StateResult<()> {
    sm.del_state(&staking_cfg(bucket_key(index)))?;
    Ok(())
}

fn load_indices(sr: &dyn StateReader, key: Vec<u8>) -> StateResult<BucketIndices> {
    match get_state::<BucketIndices>(sr, &staking_cfg(key)) {
        Ok((_, indices)) => Ok(indices),
        Err(StateError::NotExist) => Ok(BucketIndices::default()),
        Err(e) => Err(e),
    }
}

fn add_index(sm: &mut dyn StateManager, key: Vec<u8>, index: u64) -> StateResult<()> {
    let mut indices = load_indices(sm.as_reader(), key.clone())?;
    indices.add(index);
    put_state(sm, &staking_cfg(key), &indices)?;
    Ok(())
}

fn remove_index(sm: &mut dyn StateManager, key: Vec<u8>, index: u64) -> StateResult<()> {
    let mut indices = load_indices(sm.as_reader(), key.clone())?;
    indices.remove(index);
    if indices.is_empty() {
        // An empty set reads the same as an absent one; drop the row
        sm.del_state(&staking_cfg(key))?;
    } else {
        put_state(sm, &staking_cfg(key), &indices)?;
    }
    Ok(())
}

/// Bucket indices owned by a voter
pub fn voter_bucket_indices(sr: &dyn StateReader, owner: &Address) -> StateResult<BucketIndices> {
    load_indices(sr, prefixed_addr_key(PREFIX_VOTER_INDEX, owner))
}

/// Record a bucket index under its owner
pub fn put_voter_bucket_index(
    sm: &mut dyn StateManager,
    owner: &Address,
    index: u64,
) -> StateResult<()> {
    add_index(sm, prefixed_addr_key(PREFIX_VOTER_INDEX, owner), index)
}

/// Drop a bucket index from its owner's set
pub fn del_voter_bucket_index(
    sm: &mut dyn StateManager,
    owner: &Address,
    index: u64,
) -> StateResult<()> {
    remove_index(sm, prefixed_addr_key(PREFIX_VOTER_INDEX, owner), index)
}

/// Bucket indices voting for a candidate
pub fn cand_bucket_indices(
    sr: &dyn StateReader,
    candidate: &Address,
) -> StateResult<BucketIndices> {
    load_indices(sr, prefixed_addr_key(PREFIX_CAND_INDEX, candidate))
}

/// Record a bucket index under its candidate
pub fn put_cand_bucket_index(
    sm: &mut dyn StateManager,
    candidate: &Address,
    index: u64,
) -> StateResult<()> {
    add_index(sm, prefixed_addr_key(PREFIX_CAND_INDEX, candidate), index)
}

/// Drop a bucket index from its candidate's set
pub fn del_cand_bucket_index(
    sm: &mut dyn StateManager,
    candidate: &Address,
    index: u64,
) -> StateResult<()> {
    remove_index(sm, prefixed_addr_key(PREFIX_CAND_INDEX, candidate), index)
}

/// Persist a bucket together with both of its index entries
pub fn put_bucket_and_index(sm: &mut dyn StateManager, bucket: &VoteBucket) -> StateResult<u64> {
    let index = put_bucket(sm, bucket)?;
    put_voter_bucket_index(sm, &bucket.owner, index)?;
    put_cand_bucket_index(sm, &bucket.candidate, index)?;
    Ok(index)
}

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::staking::actions::is_valid_candidate_name;
use crate::staking::bucket::PREFIX_CANDIDATE;
use crate::state::manager::{get_state, put_state, StateConfig, StateResult};
use crate::state::{StateManager, StateReader, NAMESPACE_STAKING};
use crate::types::Address;

/// Candidate record errors
#[derive(Debug, Error)]
pub enum CandidateError {
    /// Vote subtraction went below zero
    #[error("vote underflow for candidate {0}")]
    VoteUnderflow(Address),

    /// Candidate name fails the acceptance rules
    #[error("invalid candidate name {0:?}")]
    InvalidName(String),
}

/// A delegate eligible to receive votes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Owner address; the candidate's identity
    pub owner: Address,

    /// Operator address running the node
    pub operator: Address,

    /// Reward destination address
    pub reward: Address,

    /// Registered name, unique among live candidates
    pub name: String,

    /// Accumulated weighted votes
    pub votes: BigUint,

    /// Index of the candidate's self-staking bucket
    pub self_stake_bucket_idx: u64,

    /// Amount staked in the self-staking bucket
    pub self_stake: BigUint,
}

impl Candidate {
    /// Validate the record's invariants
    pub fn validate(&self) -> Result<(), CandidateError> {
        if !is_valid_candidate_name(&self.name) {
            return Err(CandidateError::InvalidName(self.name.clone()));
        }
        Ok(())
    }

    /// Add weighted votes
    pub fn add_vote(&mut self, weight: &BigUint) {
        self.votes += weight;
    }

    /// Subtract weighted votes; underflow means the books are broken
    pub fn sub_vote(&mut self, weight: &BigUint) -> Result<(), CandidateError> {
        if self.votes < *weight {
            return Err(CandidateError::VoteUnderflow(self.owner));
        }
        self.votes -= weight;
        Ok(())
    }

    /// Grow the self-stake
    pub fn add_self_stake(&mut self, amount: &BigUint) {
        self.self_stake += amount;
    }
}

fn candidate_key(owner: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_CANDIDATE);
    key.extend_from_slice(owner.as_ref());
    key
}

fn candidate_cfg(owner: &Address) -> StateConfig {
    StateConfig::namespace(NAMESPACE_STAKING).key(candidate_key(owner))
}

/// Load a candidate by owner
pub fn get_candidate(sr: &dyn StateReader, owner: &Address) -> StateResult<Candidate> {
    let (_, candidate) = get_state::<Candidate>(sr, &candidate_cfg(owner))?;
    Ok(candidate)
}

/// Persist a candidate record
pub fn put_candidate(sm: &mut dyn StateManager, candidate: &Candidate) -> StateResult<()> {
    put_state(sm, &candidate_cfg(&candidate.owner), candidate)?;
    Ok(())
}

/// Range config covering every persisted candidate record
pub fn all_candidates_cfg() -> StateConfig {
    // Candidate keys are PREFIX_CANDIDATE followed by the 20-byte owner;
    // [PREFIX_CANDIDATE] .. [PREFIX_CANDIDATE + 1] bounds them all.
    StateConfig::namespace(NAMESPACE_STAKING)
        .range(vec![PREFIX_CANDIDATE], vec![PREFIX_CANDIDATE + 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateDb;
    use crate::storage::kv_store::MemoryStore;
    use std::sync::Arc;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn candidate(owner: u8, name: &str) -> Candidate {
        Candidate {
            owner: addr(owner),
            operator: addr(owner + 100),
            reward: addr(owner + 200),
            name: name.to_string(),
            votes: BigUint::from(0u32),
            self_stake_bucket_idx: 0,
            self_stake: BigUint::from(0u32),
        }
    }

    #[test]
    fn test_vote_accounting() {
        let mut c = candidate(1, "alpha");
        c.add_vote(&BigUint::from(30u32));
        c.add_vote(&BigUint::from(12u32));
        assert_eq!(c.votes, BigUint::from(42u32));

        c.sub_vote(&BigUint::from(42u32)).unwrap();
        assert_eq!(c.votes, BigUint::from(0u32));

        assert!(matches!(
            c.sub_vote(&BigUint::from(1u32)),
            Err(CandidateError::VoteUnderflow(_))
        ));
    }

    #[test]
    fn test_validate_name() {
        assert!(candidate(1, "alpha").validate().is_ok());
        assert!(candidate(1, "").validate().is_err());
        assert!(candidate(1, "TooLoudName").validate().is_err());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let mut db = StateDb::open(Arc::new(MemoryStore::new())).unwrap();
        let c = candidate(1, "alpha");
        put_candidate(&mut db, &c).unwrap();
        assert_eq!(get_candidate(&db, &c.owner).unwrap(), c);
    }

    #[test]
    fn test_all_candidates_range() {
        let mut db = StateDb::open(Arc::new(MemoryStore::new())).unwrap();
        put_candidate(&mut db, &candidate(1, "alpha")).unwrap();
        put_candidate(&mut db, &candidate(2, "beta")).unwrap();
        // A bucket-count row in the same namespace must not leak into the range
        crate::staking::bucket::put_bucket(
            &mut db,
            &crate::staking::bucket::VoteBucket::new(
                addr(1),
                addr(2),
                BigUint::from(5u32),
                1,
                0,
                false,
            ),
        )
        .unwrap();

        let (_, iter) = db.states_bytes(&all_candidates_cfg()).unwrap();
        let entries: Vec<_> = iter.collect();
        assert_eq!(entries.len(), 2);
    }
}

use std::collections::HashMap;

use thiserror::Error;

use crate::staking::candidate::{all_candidates_cfg, Candidate};
use crate::state::manager::{StateError, StateResult};
use crate::state::StateReader;
use crate::types::Address;

/// Errors raised when an upsert would break an index invariant
#[derive(Debug, Error)]
pub enum CenterError {
    /// Name already claimed by another candidate
    #[error("candidate name {0:?} already exists")]
    NameCollision(String),

    /// Operator already claimed by another candidate
    #[error("operator {0} already in use")]
    OperatorCollision(Address),

    /// Self-staking bucket already claimed by another candidate
    #[error("self-staking bucket {0} already in use")]
    SelfStakeBucketCollision(u64),
}

/// In-memory candidate index
///
/// Advisory only: the authoritative candidate set lives in the trie. The
/// block applier updates the center after trie writes succeed and restores
/// it from state with [`CandidateCenter::restore_from`] after a revert.
#[derive(Debug, Clone, Default)]
pub struct CandidateCenter {
    by_owner: HashMap<Address, Candidate>,
    name_to_owner: HashMap<String, Address>,
    operator_to_owner: HashMap<Address, Address>,
    bucket_to_owner: HashMap<u64, Address>,
}

impl CandidateCenter {
    /// Create an empty center
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the center from the persisted candidate set
    pub fn restore_from(sr: &dyn StateReader) -> StateResult<Self> {
        let mut center = Self::new();
        let (_, iter) = sr.states_bytes(&all_candidates_cfg())?;
        for (_, bytes) in iter {
            let candidate: Candidate = bincode::deserialize(&bytes)
                .map_err(|e| StateError::Deserialization(e.to_string()))?;
            center.upsert(candidate).map_err(|e| {
                StateError::Deserialization(format!("persisted candidates collide: {}", e))
            })?;
        }
        Ok(center)
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.by_owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    /// Insert or replace a candidate
    ///
    /// A collision on name, operator or self-staking bucket with a
    /// *different* owner is rejected; matching the owner makes the call an
    /// update of that candidate. All four indices are rebuilt atomically.
    pub fn upsert(&mut self, candidate: Candidate) -> Result<(), CenterError> {
        if let Some(owner) = self.name_to_owner.get(&candidate.name) {
            if *owner != candidate.owner {
                return Err(CenterError::NameCollision(candidate.name));
            }
        }
        if let Some(owner) = self.operator_to_owner.get(&candidate.operator) {
            if *owner != candidate.owner {
                return Err(CenterError::OperatorCollision(candidate.operator));
            }
        }
        if let Some(owner) = self.bucket_to_owner.get(&candidate.self_stake_bucket_idx) {
            if *owner != candidate.owner {
                return Err(CenterError::SelfStakeBucketCollision(
                    candidate.self_stake_bucket_idx,
                ));
            }
        }

        // Drop the previous record's index entries before re-inserting
        if let Some(previous) = self.by_owner.remove(&candidate.owner) {
            self.name_to_owner.remove(&previous.name);
            self.operator_to_owner.remove(&previous.operator);
            self.bucket_to_owner.remove(&previous.self_stake_bucket_idx);
        }
        self.name_to_owner
            .insert(candidate.name.clone(), candidate.owner);
        self.operator_to_owner
            .insert(candidate.operator, candidate.owner);
        self.bucket_to_owner
            .insert(candidate.self_stake_bucket_idx, candidate.owner);
        self.by_owner.insert(candidate.owner, candidate);
        Ok(())
    }

    /// Remove a candidate and all of its index entries
    pub fn delete(&mut self, owner: &Address) {
        if let Some(previous) = self.by_owner.remove(owner) {
            self.name_to_owner.remove(&previous.name);
            self.operator_to_owner.remove(&previous.operator);
            self.bucket_to_owner.remove(&previous.self_stake_bucket_idx);
        }
    }

    pub fn get_by_owner(&self, owner: &Address) -> Option<Candidate> {
        self.by_owner.get(owner).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Candidate> {
        self.name_to_owner
            .get(name)
            .and_then(|owner| self.by_owner.get(owner))
            .cloned()
    }

    pub fn get_by_operator(&self, operator: &Address) -> Option<Candidate> {
        self.operator_to_owner
            .get(operator)
            .and_then(|owner| self.by_owner.get(owner))
            .cloned()
    }

    pub fn get_by_self_staking_bucket(&self, index: u64) -> Option<Candidate> {
        self.bucket_to_owner
            .get(&index)
            .and_then(|owner| self.by_owner.get(owner))
            .cloned()
    }

    pub fn contains_self_staking_bucket(&self, index: u64) -> bool {
        self.bucket_to_owner.contains_key(&index)
    }

    /// All candidates, in unspecified order
    pub fn all(&self) -> Vec<Candidate> {
        self.by_owner.values().cloned().collect()
    }
}

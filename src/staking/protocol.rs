use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::account::{self, increase_nonce, load_account, store_account, Account, DepositGas};
use crate::staking::actions::{
    is_valid_candidate_name, Action, CandidateRegister, CandidateUpdate, ChangeCandidate,
    CreateStake, DepositToStake, Restake, TransferStake, Unstake, WithdrawStake,
};
use crate::staking::bucket::{
    del_bucket, del_cand_bucket_index, del_voter_bucket_index, get_bucket, put_bucket_and_index,
    put_cand_bucket_index, put_voter_bucket_index, update_bucket, VoteBucket, DAY_SECS,
};
use crate::staking::candidate::{put_candidate, Candidate};
use crate::staking::candidate_center::CandidateCenter;
use crate::staking::config::StakingConfig;
use crate::staking::context::{ActionCtx, BlockCtx};
use crate::staking::errors::{FetchError, StakingError};
use crate::staking::receipt::{Log, Receipt, ReceiptStatus};
use crate::state::manager::{StateError, StateManager, StateReader};
use crate::types::Address;

/// Handler name of createStake
pub const HANDLE_CREATE_STAKE: &str = "createStake";
/// Handler name of unstake
pub const HANDLE_UNSTAKE: &str = "unstake";
/// Handler name of withdrawStake
pub const HANDLE_WITHDRAW_STAKE: &str = "withdrawStake";
/// Handler name of changeCandidate
pub const HANDLE_CHANGE_CANDIDATE: &str = "changeCandidate";
/// Handler name of transferStake
pub const HANDLE_TRANSFER_STAKE: &str = "transferStake";
/// Handler name of depositToStake
pub const HANDLE_DEPOSIT_TO_STAKE: &str = "depositToStake";
/// Handler name of restake
pub const HANDLE_RESTAKE: &str = "restake";
/// Handler name of candidateRegister
pub const HANDLE_CANDIDATE_REGISTER: &str = "candidateRegister";
/// Handler name of candidateUpdate
pub const HANDLE_CANDIDATE_UPDATE: &str = "candidateUpdate";

/// The staking protocol
///
/// Owns the in-memory candidate center, the protocol configuration and the
/// gas-deposit hook. One instance serves one block applier; handlers are
/// invoked sequentially for the actions of a block.
pub struct Protocol {
    addr: Address,
    config: StakingConfig,
    in_mem_candidates: CandidateCenter,
    deposit_gas: DepositGas,
}

impl Protocol {
    /// Create a protocol instance with the default gas-deposit hook
    pub fn new(config: StakingConfig) -> Self {
        Self {
            addr: Address::of_protocol(b"staking"),
            config,
            in_mem_candidates: CandidateCenter::new(),
            deposit_gas: account::deposit_gas,
        }
    }

    /// Replace the gas-deposit hook
    pub fn with_deposit_gas(mut self, hook: DepositGas) -> Self {
        self.deposit_gas = hook;
        self
    }

    /// Address receipts carry as the contract address
    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    /// Read access to the in-memory candidate center
    pub fn candidate_center(&self) -> &CandidateCenter {
        &self.in_mem_candidates
    }

    /// Rebuild the candidate center from persisted state; the block applier
    /// calls this after reverting a block that had already touched the center
    pub fn restore_candidates(&mut self, sr: &dyn StateReader) -> Result<(), StakingError> {
        self.in_mem_candidates = CandidateCenter::restore_from(sr)?;
        Ok(())
    }

    /// Apply one action; returns its receipt, or an error that aborts block
    /// application
    pub fn handle(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        action: &Action,
        sm: &mut dyn StateManager,
    ) -> Result<Receipt, StakingError> {
        let snapshot = sm.snapshot();
        match action {
            Action::CreateStake(act) => {
                self.handle_create_stake(action_ctx, block_ctx, act, sm, snapshot)
            }
            Action::Unstake(act) => self.handle_unstake(action_ctx, block_ctx, act, sm, snapshot),
            Action::WithdrawStake(act) => {
                self.handle_withdraw_stake(action_ctx, block_ctx, act, sm, snapshot)
            }
            Action::ChangeCandidate(act) => {
                self.handle_change_candidate(action_ctx, block_ctx, act, sm, snapshot)
            }
            Action::TransferStake(act) => {
                self.handle_transfer_stake(action_ctx, block_ctx, act, sm, snapshot)
            }
            Action::DepositToStake(act) => {
                self.handle_deposit_to_stake(action_ctx, block_ctx, act, sm, snapshot)
            }
            Action::Restake(act) => self.handle_restake(action_ctx, block_ctx, act, sm, snapshot),
            Action::CandidateRegister(act) => {
                self.handle_candidate_register(action_ctx, block_ctx, act, sm, snapshot)
            }
            Action::CandidateUpdate(act) => {
                self.handle_candidate_update(action_ctx, block_ctx, act, sm, snapshot)
            }
        }
    }

    fn handle_create_stake(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &CreateStake,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (mut staker, gas_fee) = match self.fetch_caller(action_ctx, sm.as_reader(), &act.amount)
        {
            Ok(pair) => pair,
            Err((err, gas_fee)) => {
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
            }
        };

        // Create new bucket and bucket index
        let mut candidate = match self.in_mem_candidates.get_by_name(&act.candidate_name) {
            Some(candidate) => candidate,
            None => {
                let err = FetchError::new(
                    ReceiptStatus::ErrCandidateNotExist,
                    format!("candidate {:?} not found in candidate center", act.candidate_name),
                );
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee);
            }
        };
        let bucket = VoteBucket::new(
            candidate.owner,
            action_ctx.caller,
            act.amount.clone(),
            act.duration_days,
            block_ctx.timestamp,
            act.auto_stake,
        );
        let bucket_idx = put_bucket_and_index(sm, &bucket)?;

        // Update candidate
        let weighted_vote = self.calculate_vote_weight(&bucket, false);
        candidate.add_vote(&weighted_vote);
        put_candidate(sm, &candidate)?;

        // Update staker balance
        staker.sub_balance(&act.amount)?;
        store_account(sm, &action_ctx.caller, &staker)?;

        let log = self.create_log(
            action_ctx,
            block_ctx,
            HANDLE_CREATE_STAKE,
            Some(&candidate.owner),
            bucket_idx.to_be_bytes().to_vec(),
        );
        let receipt = self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )?;
        self.in_mem_candidates.upsert(candidate)?;
        Ok(receipt)
    }

    fn handle_unstake(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &Unstake,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (_, gas_fee) = match self.fetch_caller(action_ctx, sm.as_reader(), &BigUint::zero()) {
            Ok(pair) => pair,
            Err((err, gas_fee)) => {
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
            }
        };

        let mut bucket =
            match self.fetch_bucket(action_ctx, sm.as_reader(), act.bucket_index, true, true) {
                Ok(bucket) => bucket,
                Err(err) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };

        bucket.unstake_start_time = block_ctx.timestamp;
        update_bucket(sm, act.bucket_index, &bucket)?;

        let mut candidate = self
            .in_mem_candidates
            .get_by_owner(&bucket.candidate)
            .ok_or_else(|| {
                StakingError::Inconsistent(format!(
                    "candidate {} missing from candidate center",
                    bucket.candidate
                ))
            })?;
        let self_staking = self
            .in_mem_candidates
            .contains_self_staking_bucket(act.bucket_index);
        let weighted_vote = self.calculate_vote_weight(&bucket, self_staking);
        candidate.sub_vote(&weighted_vote)?;
        // An unstaking self-staking bucket no longer counts as self stake
        if self_staking {
            candidate.self_stake = BigUint::zero();
        }
        put_candidate(sm, &candidate)?;

        let log = self.create_log(action_ctx, block_ctx, HANDLE_UNSTAKE, None, Vec::new());
        let receipt = self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )?;
        self.in_mem_candidates.upsert(candidate)?;
        Ok(receipt)
    }

    fn handle_withdraw_stake(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &WithdrawStake,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (mut withdrawer, gas_fee) =
            match self.fetch_caller(action_ctx, sm.as_reader(), &BigUint::zero()) {
                Ok(pair) => pair,
                Err((err, gas_fee)) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };

        let bucket =
            match self.fetch_bucket(action_ctx, sm.as_reader(), act.bucket_index, true, true) {
                Ok(bucket) => bucket,
                Err(err) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };

        // Check unstake time
        if !bucket.is_unstaked() {
            let err = FetchError::new(
                ReceiptStatus::ErrWithdrawBeforeUnstake,
                "bucket has not been unstaked",
            );
            return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee);
        }
        let matures_at = bucket.unstake_start_time + self.config.withdraw_waiting_period_secs;
        if block_ctx.timestamp < matures_at {
            let err = FetchError::new(
                ReceiptStatus::ErrWithdrawBeforeMaturity,
                format!(
                    "stake is not ready to withdraw, current time {}, required time {}",
                    block_ctx.timestamp, matures_at
                ),
            );
            return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee);
        }

        // Delete bucket and bucket index
        del_bucket(sm, act.bucket_index)?;
        del_cand_bucket_index(sm, &bucket.candidate, act.bucket_index)?;
        del_voter_bucket_index(sm, &bucket.owner, act.bucket_index)?;

        // Update withdrawer balance
        withdrawer.add_balance(&bucket.staked_amount);
        store_account(sm, &action_ctx.caller, &withdrawer)?;

        let log = self.create_log(action_ctx, block_ctx, HANDLE_WITHDRAW_STAKE, None, Vec::new());
        self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )
    }

    fn handle_change_candidate(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &ChangeCandidate,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (_, gas_fee) = match self.fetch_caller(action_ctx, sm.as_reader(), &BigUint::zero()) {
            Ok(pair) => pair,
            Err((err, gas_fee)) => {
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
            }
        };

        let mut candidate = match self.in_mem_candidates.get_by_name(&act.candidate_name) {
            Some(candidate) => candidate,
            None => {
                let err = FetchError::new(
                    ReceiptStatus::ErrCandidateNotExist,
                    format!("candidate {:?} not found in candidate center", act.candidate_name),
                );
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee);
            }
        };

        let mut bucket =
            match self.fetch_bucket(action_ctx, sm.as_reader(), act.bucket_index, true, false) {
                Ok(bucket) => bucket,
                Err(err) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };

        let mut prev_candidate = self
            .in_mem_candidates
            .get_by_owner(&bucket.candidate)
            .ok_or_else(|| {
                StakingError::Inconsistent(format!(
                    "candidate {} missing from candidate center",
                    bucket.candidate
                ))
            })?;

        // Update bucket index
        del_cand_bucket_index(sm, &bucket.candidate, act.bucket_index)?;
        put_cand_bucket_index(sm, &candidate.owner, act.bucket_index)?;
        // Update bucket
        bucket.candidate = candidate.owner;
        update_bucket(sm, act.bucket_index, &bucket)?;

        let weighted_votes = self.calculate_vote_weight(&bucket, false);

        // Update previous candidate
        prev_candidate.sub_vote(&weighted_votes)?;
        put_candidate(sm, &prev_candidate)?;

        // Update current candidate
        candidate.add_vote(&weighted_votes);
        put_candidate(sm, &candidate)?;

        let log = self.create_log(
            action_ctx,
            block_ctx,
            HANDLE_CHANGE_CANDIDATE,
            Some(&candidate.owner),
            Vec::new(),
        );
        let receipt = self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )?;
        self.in_mem_candidates.upsert(prev_candidate)?;
        self.in_mem_candidates.upsert(candidate)?;
        Ok(receipt)
    }

    fn handle_transfer_stake(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &TransferStake,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (_, gas_fee) = match self.fetch_caller(action_ctx, sm.as_reader(), &BigUint::zero()) {
            Ok(pair) => pair,
            Err((err, gas_fee)) => {
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
            }
        };

        let mut bucket =
            match self.fetch_bucket(action_ctx, sm.as_reader(), act.bucket_index, true, false) {
                Ok(bucket) => bucket,
                Err(err) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };

        // Update bucket index
        del_voter_bucket_index(sm, &bucket.owner, act.bucket_index)?;
        put_voter_bucket_index(sm, &act.voter, act.bucket_index)?;

        // Update bucket; votes stay with the candidate
        bucket.owner = act.voter;
        update_bucket(sm, act.bucket_index, &bucket)?;

        let log = self.create_log(action_ctx, block_ctx, HANDLE_TRANSFER_STAKE, None, Vec::new());
        self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )
    }

    fn handle_deposit_to_stake(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &DepositToStake,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (mut depositor, gas_fee) =
            match self.fetch_caller(action_ctx, sm.as_reader(), &act.amount) {
                Ok(pair) => pair,
                Err((err, gas_fee)) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };

        // Anyone may deposit, but only into an auto-stake bucket
        let mut bucket =
            match self.fetch_bucket(action_ctx, sm.as_reader(), act.bucket_index, false, true) {
                Ok(bucket) => bucket,
                Err(err) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };
        if !bucket.auto_stake {
            let err = FetchError::new(
                ReceiptStatus::ErrInvalidBucketType,
                "deposit is only allowed on auto-stake bucket",
            );
            return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee);
        }
        let mut candidate = self
            .in_mem_candidates
            .get_by_owner(&bucket.candidate)
            .ok_or_else(|| {
                StakingError::Inconsistent(format!(
                    "candidate {} missing from candidate center",
                    bucket.candidate
                ))
            })?;

        let self_staking = self
            .in_mem_candidates
            .contains_self_staking_bucket(act.bucket_index);
        let prev_weighted_votes = self.calculate_vote_weight(&bucket, self_staking);

        // Update bucket
        bucket.staked_amount += &act.amount;
        update_bucket(sm, act.bucket_index, &bucket)?;

        // Update candidate
        candidate.sub_vote(&prev_weighted_votes)?;
        let weighted_votes = self.calculate_vote_weight(&bucket, self_staking);
        candidate.add_vote(&weighted_votes);
        if self_staking {
            candidate.add_self_stake(&act.amount);
        }
        put_candidate(sm, &candidate)?;

        // Update depositor balance
        depositor.sub_balance(&act.amount)?;
        store_account(sm, &action_ctx.caller, &depositor)?;

        let log = self.create_log(action_ctx, block_ctx, HANDLE_DEPOSIT_TO_STAKE, None, Vec::new());
        let receipt = self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )?;
        self.in_mem_candidates.upsert(candidate)?;
        Ok(receipt)
    }

    fn handle_restake(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &Restake,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (_, gas_fee) = match self.fetch_caller(action_ctx, sm.as_reader(), &BigUint::zero()) {
            Ok(pair) => pair,
            Err((err, gas_fee)) => {
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
            }
        };

        let mut bucket =
            match self.fetch_bucket(action_ctx, sm.as_reader(), act.bucket_index, true, true) {
                Ok(bucket) => bucket,
                Err(err) => {
                    return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
                }
            };

        let mut candidate = self
            .in_mem_candidates
            .get_by_owner(&bucket.candidate)
            .ok_or_else(|| {
                StakingError::Inconsistent(format!(
                    "candidate {} missing from candidate center",
                    bucket.candidate
                ))
            })?;

        let self_staking = self
            .in_mem_candidates
            .contains_self_staking_bucket(act.bucket_index);
        let prev_weighted_votes = self.calculate_vote_weight(&bucket, self_staking);

        // Update bucket
        bucket.staked_duration_secs = u64::from(act.duration_days) * DAY_SECS;
        bucket.auto_stake = act.auto_stake;
        update_bucket(sm, act.bucket_index, &bucket)?;

        // Update candidate
        candidate.sub_vote(&prev_weighted_votes)?;
        let weighted_votes = self.calculate_vote_weight(&bucket, self_staking);
        candidate.add_vote(&weighted_votes);
        put_candidate(sm, &candidate)?;

        let log = self.create_log(action_ctx, block_ctx, HANDLE_RESTAKE, None, Vec::new());
        let receipt = self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )?;
        self.in_mem_candidates.upsert(candidate)?;
        Ok(receipt)
    }

    fn handle_candidate_register(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &CandidateRegister,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        if !is_valid_candidate_name(&act.name) {
            return Err(StakingError::InvalidAction(format!(
                "invalid candidate name {:?}",
                act.name
            )));
        }
        let registration_fee = self.config.registration_fee.clone();
        let required = &act.amount + &registration_fee;

        let (mut caller, gas_fee) = match self.fetch_caller(action_ctx, sm.as_reader(), &required) {
            Ok(pair) => pair,
            Err((err, gas_fee)) => {
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
            }
        };

        let owner = act.owner.unwrap_or(action_ctx.caller);
        let bucket = VoteBucket::new(
            owner,
            owner,
            act.amount.clone(),
            act.duration_days,
            block_ctx.timestamp,
            act.auto_stake,
        );
        let bucket_idx = put_bucket_and_index(sm, &bucket)?;

        let candidate = Candidate {
            owner,
            operator: act.operator,
            reward: act.reward,
            name: act.name.clone(),
            votes: self.calculate_vote_weight(&bucket, true),
            self_stake_bucket_idx: bucket_idx,
            self_stake: act.amount.clone(),
        };
        put_candidate(sm, &candidate)?;

        // Update caller balance
        caller.sub_balance(&act.amount)?;
        store_account(sm, &action_ctx.caller, &caller)?;

        // Put the registration fee to the reward pool
        (self.deposit_gas)(sm, &action_ctx.caller, &registration_fee)?;

        let log = self.create_log(
            action_ctx,
            block_ctx,
            HANDLE_CANDIDATE_REGISTER,
            Some(&owner),
            bucket_idx.to_be_bytes().to_vec(),
        );
        let receipt = self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )?;
        self.in_mem_candidates.upsert(candidate)?;
        Ok(receipt)
    }

    fn handle_candidate_update(
        &mut self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        act: &CandidateUpdate,
        sm: &mut dyn StateManager,
        snapshot: usize,
    ) -> Result<Receipt, StakingError> {
        let (_, gas_fee) = match self.fetch_caller(action_ctx, sm.as_reader(), &BigUint::zero()) {
            Ok(pair) => pair,
            Err((err, gas_fee)) => {
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee)
            }
        };

        // Only the owner can update its candidate
        let mut candidate = match self.in_mem_candidates.get_by_owner(&action_ctx.caller) {
            Some(candidate) => candidate,
            None => {
                let err = FetchError::new(
                    ReceiptStatus::ErrCandidateNotExist,
                    format!("caller {} does not own a candidate", action_ctx.caller),
                );
                return self.settle_failure(action_ctx, block_ctx, sm, snapshot, err, gas_fee);
            }
        };

        if let Some(name) = &act.name {
            if !is_valid_candidate_name(name) {
                return Err(StakingError::InvalidAction(format!(
                    "invalid candidate name {:?}",
                    name
                )));
            }
            candidate.name = name.clone();
        }
        if let Some(operator) = &act.operator {
            candidate.operator = *operator;
        }
        if let Some(reward) = &act.reward {
            candidate.reward = *reward;
        }
        put_candidate(sm, &candidate)?;

        let log = self.create_log(action_ctx, block_ctx, HANDLE_CANDIDATE_UPDATE, None, Vec::new());
        let receipt = self.settle_action(
            action_ctx,
            block_ctx,
            sm,
            ReceiptStatus::Success,
            gas_fee,
            vec![log],
        )?;
        self.in_mem_candidates.upsert(candidate)?;
        Ok(receipt)
    }

    /// Weighted vote contribution of a bucket
    ///
    /// `amount * (10_000 + bonus_bp) / 10_000` where the bonus accumulates
    /// the capped duration bonus, the auto-stake bonus and the self-stake
    /// bonus. Integer arithmetic throughout.
    pub fn calculate_vote_weight(&self, bucket: &VoteBucket, self_stake: bool) -> BigUint {
        let weights = &self.config.vote_weight;
        let mut bonus_bp = (bucket.staked_duration_days() * weights.duration_bonus_per_day_bp)
            .min(weights.duration_bonus_cap_bp);
        if bucket.auto_stake {
            bonus_bp += weights.auto_stake_bonus_bp;
        }
        if self_stake {
            bonus_bp += weights.self_stake_bonus_bp;
        }
        &bucket.staked_amount * BigUint::from(10_000u64 + bonus_bp) / BigUint::from(10_000u64)
    }

    /// Load the caller and compute the gas fee, checking that the balance
    /// covers `amount` plus gas. On `ErrNotEnoughBalance` the returned gas
    /// fee is clamped to the balance so settlement still charges what the
    /// caller can afford.
    fn fetch_caller(
        &self,
        action_ctx: &ActionCtx,
        sr: &dyn StateReader,
        amount: &BigUint,
    ) -> Result<(Account, BigUint), (FetchError, BigUint)> {
        let caller = match load_account(sr, &action_ctx.caller) {
            Ok(account) => account,
            Err(e) => {
                let err = FetchError::new(
                    ReceiptStatus::Failure,
                    format!(
                        "failed to load the account of caller {}: {}",
                        action_ctx.caller, e
                    ),
                );
                return Err((err, BigUint::zero()));
            }
        };
        let mut gas_fee = action_ctx.gas_fee();
        let required = amount + &gas_fee;
        if required > caller.balance {
            let err = FetchError::new(
                ReceiptStatus::ErrNotEnoughBalance,
                format!(
                    "caller {} balance {}, required amount {}",
                    action_ctx.caller, caller.balance, required
                ),
            );
            if gas_fee > caller.balance {
                gas_fee = caller.balance.clone();
            }
            return Err((err, gas_fee));
        }
        Ok((caller, gas_fee))
    }

    /// Load a bucket and check ownership and self-staking constraints
    fn fetch_bucket(
        &self,
        action_ctx: &ActionCtx,
        sr: &dyn StateReader,
        index: u64,
        check_owner: bool,
        allow_self_staking: bool,
    ) -> Result<VoteBucket, FetchError> {
        let bucket = match get_bucket(sr, index) {
            Ok(bucket) => bucket,
            Err(StateError::NotExist) => {
                return Err(FetchError::new(
                    ReceiptStatus::ErrInvalidBucketIndex,
                    format!("no bucket at index {}", index),
                ))
            }
            Err(e) => {
                return Err(FetchError::new(
                    ReceiptStatus::Failure,
                    format!("failed to fetch bucket by index {}: {}", index, e),
                ))
            }
        };
        if check_owner && bucket.owner != action_ctx.caller {
            return Err(FetchError::new(
                ReceiptStatus::ErrUnauthorizedOperator,
                format!(
                    "bucket owner {} does not match action caller {}",
                    bucket.owner, action_ctx.caller
                ),
            ));
        }
        if !allow_self_staking && self.in_mem_candidates.contains_self_staking_bucket(index) {
            return Err(FetchError::new(
                ReceiptStatus::ErrInvalidBucketType,
                "self staking bucket cannot be processed",
            ));
        }
        Ok(bucket)
    }

    /// Revert to the handler-entry snapshot and settle a receipted failure;
    /// a `Failure` status escalates to a fatal error instead
    fn settle_failure(
        &self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        sm: &mut dyn StateManager,
        snapshot: usize,
        err: FetchError,
        gas_fee: BigUint,
    ) -> Result<Receipt, StakingError> {
        if err.status == ReceiptStatus::Failure {
            return Err(StakingError::Internal(err.cause));
        }
        debug!("staking action failed: {}", err.cause);
        sm.revert(snapshot)?;
        self.settle_action(action_ctx, block_ctx, sm, err.status, gas_fee, Vec::new())
    }

    /// Deposit the gas fee, advance the caller's nonce and build the receipt
    fn settle_action(
        &self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        sm: &mut dyn StateManager,
        status: ReceiptStatus,
        gas_fee: BigUint,
        logs: Vec<Log>,
    ) -> Result<Receipt, StakingError> {
        if block_ctx.gas_limit < action_ctx.intrinsic_gas {
            return Err(StakingError::HitGasLimit {
                gas_limit: block_ctx.gas_limit,
                intrinsic_gas: action_ctx.intrinsic_gas,
            });
        }
        (self.deposit_gas)(sm, &action_ctx.caller, &gas_fee)?;
        increase_nonce(sm, &action_ctx.caller, action_ctx.nonce)?;
        Ok(Receipt {
            status,
            block_height: block_ctx.height,
            action_hash: action_ctx.action_hash,
            gas_consumed: action_ctx.intrinsic_gas,
            contract_address: self.addr,
            logs,
        })
    }

    fn create_log(
        &self,
        action_ctx: &ActionCtx,
        block_ctx: &BlockCtx,
        handler_name: &str,
        candidate: Option<&Address>,
        data: Vec<u8>,
    ) -> Log {
        Log {
            address: self.addr,
            topics: Log::topics_for(handler_name, candidate, &action_ctx.caller),
            data,
            block_height: block_ctx.height,
            action_hash: action_ctx.action_hash,
        }
    }
}

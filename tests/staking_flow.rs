//! End-to-end staking flows over an in-memory state database.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;

use quorumcoin::account::{load_account, reward_pool, store_account, Account};
use quorumcoin::staking::bucket::{
    cand_bucket_indices, get_bucket, total_bucket_count, voter_bucket_indices,
};
use quorumcoin::staking::candidate::get_candidate;
use quorumcoin::staking::{
    Action, ActionCtx, BlockCtx, CandidateRegister, ChangeCandidate, CreateStake, DepositToStake,
    Protocol, Receipt, ReceiptStatus, StakingConfig, TransferStake, Unstake, WithdrawStake,
};
use quorumcoin::state::manager::StateError;
use quorumcoin::state::StateDb;
use quorumcoin::storage::kv_store::MemoryStore;
use quorumcoin::types::Address;

fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

fn new_db() -> StateDb {
    StateDb::open(Arc::new(MemoryStore::new())).unwrap()
}

fn ctx(caller: Address, nonce: u64, gas_price: u32, intrinsic_gas: u64) -> ActionCtx {
    ActionCtx {
        caller,
        nonce,
        gas_price: BigUint::from(gas_price),
        intrinsic_gas,
        action_hash: [nonce as u8; 32],
    }
}

fn blk(timestamp: u64) -> BlockCtx {
    BlockCtx {
        height: 1,
        timestamp,
        gas_limit: 1_000_000,
    }
}

fn test_config() -> StakingConfig {
    StakingConfig {
        registration_fee: BigUint::from(10u32),
        ..StakingConfig::default()
    }
}

fn fund(db: &mut StateDb, who: Address, balance: u32) {
    store_account(db, &who, &Account::with_balance(BigUint::from(balance))).unwrap();
}

fn register(
    protocol: &mut Protocol,
    db: &mut StateDb,
    caller: Address,
    name: &str,
    amount: u32,
    auto_stake: bool,
    nonce: u64,
    timestamp: u64,
) -> Receipt {
    let action = Action::CandidateRegister(CandidateRegister {
        name: name.to_string(),
        operator: Address::new({
            let mut bytes = [0xa0u8; 20];
            bytes[19] = caller.as_bytes()[0];
            bytes
        }),
        reward: caller,
        owner: None,
        amount: BigUint::from(amount),
        duration_days: 7,
        auto_stake,
    });
    protocol
        .handle(&ctx(caller, nonce, 1, 1), &blk(timestamp), &action, db)
        .unwrap()
}

/// Every candidate in the center must match its persisted record.
fn assert_center_consistent(protocol: &Protocol, db: &StateDb) {
    for candidate in protocol.candidate_center().all() {
        let persisted = get_candidate(db, &candidate.owner).unwrap();
        assert_eq!(candidate, persisted);
    }
}

#[test]
fn register_unstake_withdraw_lifecycle() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let waiting_period = protocol.config().withdraw_waiting_period_secs;
    let caller = addr(1);
    fund(&mut db, caller, 1_000);

    // Register: balance 1000 - amount 100 - fee 10 - gas 1 = 889
    let t0 = 1_000;
    let receipt = register(&mut protocol, &mut db, caller, "alpha", 100, false, 1, t0);
    assert_eq!(receipt.status, ReceiptStatus::Success);
    assert_eq!(receipt.gas_consumed, 1);
    assert_eq!(receipt.contract_address, protocol.address());
    assert_eq!(receipt.logs.len(), 1);
    assert_eq!(receipt.logs[0].data, 0u64.to_be_bytes().to_vec());

    let account = load_account(&db, &caller).unwrap();
    assert_eq!(account.balance, BigUint::from(889u32));
    assert_eq!(account.nonce, 1);
    // Registration fee and gas both land in the reward pool
    assert_eq!(reward_pool(&db).unwrap(), BigUint::from(11u32));

    let candidate = get_candidate(&db, &caller).unwrap();
    assert_eq!(candidate.self_stake, BigUint::from(100u32));
    assert_eq!(candidate.self_stake_bucket_idx, 0);
    // weight(100, 7 days, no auto, self) = 100 * 10614 / 10000
    assert_eq!(candidate.votes, BigUint::from(106u32));

    let bucket = get_bucket(&db, 0).unwrap();
    assert_eq!(bucket.owner, caller);
    assert_eq!(bucket.candidate, caller);
    assert!(!bucket.is_unstaked());
    assert!(voter_bucket_indices(&db, &caller).unwrap().contains(0));
    assert!(cand_bucket_indices(&db, &caller).unwrap().contains(0));
    assert_center_consistent(&protocol, &db);

    // Unstake at t1, free of gas
    let t1 = t0 + 50;
    let receipt = protocol
        .handle(
            &ctx(caller, 2, 0, 1),
            &blk(t1),
            &Action::Unstake(Unstake { bucket_index: 0 }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);

    let candidate = get_candidate(&db, &caller).unwrap();
    assert!(candidate.votes.is_zero());
    assert!(candidate.self_stake.is_zero());
    assert_eq!(get_bucket(&db, 0).unwrap().unstake_start_time, t1);
    assert_center_consistent(&protocol, &db);

    // One second before maturity the withdrawal is rejected but still settles
    let receipt = protocol
        .handle(
            &ctx(caller, 3, 0, 1),
            &blk(t1 + waiting_period - 1),
            &Action::WithdrawStake(WithdrawStake { bucket_index: 0 }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::ErrWithdrawBeforeMaturity);
    assert!(get_bucket(&db, 0).is_ok());
    assert_eq!(load_account(&db, &caller).unwrap().nonce, 3);

    // Exactly at maturity it succeeds: balance 889 + 100 = 989
    let receipt = protocol
        .handle(
            &ctx(caller, 4, 0, 1),
            &blk(t1 + waiting_period),
            &Action::WithdrawStake(WithdrawStake { bucket_index: 0 }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);

    let account = load_account(&db, &caller).unwrap();
    assert_eq!(account.balance, BigUint::from(989u32));
    assert_eq!(account.nonce, 4);
    assert!(matches!(get_bucket(&db, 0), Err(StateError::NotExist)));
    assert!(voter_bucket_indices(&db, &caller).unwrap().is_empty());
    assert!(cand_bucket_indices(&db, &caller).unwrap().is_empty());
}

#[test]
fn withdraw_requires_unstake_first() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let caller = addr(1);
    fund(&mut db, caller, 1_000);
    register(&mut protocol, &mut db, caller, "alpha", 100, false, 1, 1_000);

    let receipt = protocol
        .handle(
            &ctx(caller, 2, 0, 1),
            &blk(2_000),
            &Action::WithdrawStake(WithdrawStake { bucket_index: 0 }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::ErrWithdrawBeforeUnstake);
    assert!(get_bucket(&db, 0).is_ok());
}

#[test]
fn create_stake_and_change_candidate() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let owner_a = addr(1);
    let owner_b = addr(2);
    let voter = addr(3);
    fund(&mut db, owner_a, 1_000);
    fund(&mut db, owner_b, 1_000);
    fund(&mut db, voter, 1_000);

    register(&mut protocol, &mut db, owner_a, "alpha", 100, false, 1, 1_000);
    register(&mut protocol, &mut db, owner_b, "beta", 100, false, 1, 1_000);
    let votes_a = get_candidate(&db, &owner_a).unwrap().votes;
    let votes_b = get_candidate(&db, &owner_b).unwrap().votes;

    // Voter stakes 50 for alpha
    let receipt = protocol
        .handle(
            &ctx(voter, 1, 1, 1),
            &blk(1_100),
            &Action::CreateStake(CreateStake {
                candidate_name: "alpha".to_string(),
                amount: BigUint::from(50u32),
                duration_days: 7,
                auto_stake: false,
            }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);
    let bucket_idx = 2; // after the two self-staking buckets
    assert_eq!(receipt.logs[0].data, (bucket_idx as u64).to_be_bytes().to_vec());

    // weight(50, 7 days, no auto, not self) = 50 * 10014 / 10000 = 50
    let weight = BigUint::from(50u32);
    assert_eq!(
        get_candidate(&db, &owner_a).unwrap().votes,
        &votes_a + &weight
    );
    assert_eq!(load_account(&db, &voter).unwrap().balance, BigUint::from(949u32));
    assert!(cand_bucket_indices(&db, &owner_a).unwrap().contains(bucket_idx));
    assert_center_consistent(&protocol, &db);

    // Move the bucket from alpha to beta
    let receipt = protocol
        .handle(
            &ctx(voter, 2, 1, 1),
            &blk(1_200),
            &Action::ChangeCandidate(ChangeCandidate {
                candidate_name: "beta".to_string(),
                bucket_index: bucket_idx,
            }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);

    assert_eq!(get_candidate(&db, &owner_a).unwrap().votes, votes_a);
    assert_eq!(
        get_candidate(&db, &owner_b).unwrap().votes,
        &votes_b + &weight
    );
    assert_eq!(get_bucket(&db, bucket_idx).unwrap().candidate, owner_b);
    assert!(!cand_bucket_indices(&db, &owner_a).unwrap().contains(bucket_idx));
    assert!(cand_bucket_indices(&db, &owner_b).unwrap().contains(bucket_idx));
    assert_center_consistent(&protocol, &db);
}

#[test]
fn deposit_rejected_on_non_auto_stake_bucket() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let owner = addr(1);
    let depositor = addr(4);
    fund(&mut db, owner, 1_000);
    fund(&mut db, depositor, 500);
    register(&mut protocol, &mut db, owner, "alpha", 100, false, 1, 1_000);

    let candidate_before = get_candidate(&db, &owner).unwrap();
    let bucket_before = get_bucket(&db, 0).unwrap();

    let receipt = protocol
        .handle(
            &ctx(depositor, 1, 1, 1),
            &blk(1_100),
            &Action::DepositToStake(DepositToStake {
                bucket_index: 0,
                amount: BigUint::from(50u32),
            }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::ErrInvalidBucketType);

    // Gas settled, everything else rolled back
    let account = load_account(&db, &depositor).unwrap();
    assert_eq!(account.balance, BigUint::from(499u32));
    assert_eq!(account.nonce, 1);
    assert_eq!(get_bucket(&db, 0).unwrap(), bucket_before);
    assert_eq!(get_candidate(&db, &owner).unwrap(), candidate_before);
}

#[test]
fn deposit_grows_auto_stake_self_bucket() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let owner = addr(1);
    let depositor = addr(4);
    fund(&mut db, owner, 1_000);
    fund(&mut db, depositor, 500);
    register(&mut protocol, &mut db, owner, "alpha", 100, true, 1, 1_000);

    // weight(100, 7 days, auto, self) = 100 * 10864 / 10000 = 108
    assert_eq!(
        get_candidate(&db, &owner).unwrap().votes,
        BigUint::from(108u32)
    );

    // A third party deposits 50; ownership is not checked
    let receipt = protocol
        .handle(
            &ctx(depositor, 1, 1, 1),
            &blk(1_100),
            &Action::DepositToStake(DepositToStake {
                bucket_index: 0,
                amount: BigUint::from(50u32),
            }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);

    let candidate = get_candidate(&db, &owner).unwrap();
    // weight(150, 7 days, auto, self) = 150 * 10864 / 10000 = 162
    assert_eq!(candidate.votes, BigUint::from(162u32));
    assert_eq!(candidate.self_stake, BigUint::from(150u32));
    assert_eq!(
        get_bucket(&db, 0).unwrap().staked_amount,
        BigUint::from(150u32)
    );
    assert_eq!(
        load_account(&db, &depositor).unwrap().balance,
        BigUint::from(449u32)
    );
    assert_center_consistent(&protocol, &db);
}

#[test]
fn insufficient_balance_settles_whole_balance_as_gas() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let caller = addr(7);
    fund(&mut db, caller, 5);

    // gas fee = 10 * 1 = 10 > balance
    let receipt = protocol
        .handle(
            &ctx(caller, 1, 10, 1),
            &blk(1_000),
            &Action::CreateStake(CreateStake {
                candidate_name: "alpha".to_string(),
                amount: BigUint::from(100u32),
                duration_days: 7,
                auto_stake: false,
            }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::ErrNotEnoughBalance);

    let account = load_account(&db, &caller).unwrap();
    assert!(account.balance.is_zero());
    assert_eq!(account.nonce, 1);
    assert_eq!(reward_pool(&db).unwrap(), BigUint::from(5u32));
    assert_eq!(total_bucket_count(&db).unwrap(), 0);
}

#[test]
fn transfer_stake_moves_ownership_not_votes() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let owner = addr(1);
    let voter_x = addr(5);
    let voter_y = addr(6);
    fund(&mut db, owner, 1_000);
    fund(&mut db, voter_x, 1_000);
    register(&mut protocol, &mut db, owner, "alpha", 100, false, 1, 1_000);

    protocol
        .handle(
            &ctx(voter_x, 1, 1, 1),
            &blk(1_100),
            &Action::CreateStake(CreateStake {
                candidate_name: "alpha".to_string(),
                amount: BigUint::from(50u32),
                duration_days: 7,
                auto_stake: false,
            }),
            &mut db,
        )
        .unwrap();
    let bucket_idx = 1;
    let votes_before = get_candidate(&db, &owner).unwrap().votes;

    let receipt = protocol
        .handle(
            &ctx(voter_x, 2, 1, 1),
            &blk(1_200),
            &Action::TransferStake(TransferStake {
                voter: voter_y,
                bucket_index: bucket_idx,
            }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);

    assert!(!voter_bucket_indices(&db, &voter_x).unwrap().contains(bucket_idx));
    assert!(voter_bucket_indices(&db, &voter_y).unwrap().contains(bucket_idx));
    assert_eq!(get_bucket(&db, bucket_idx).unwrap().owner, voter_y);
    assert_eq!(get_candidate(&db, &owner).unwrap().votes, votes_before);

    // The previous owner no longer controls the bucket
    let receipt = protocol
        .handle(
            &ctx(voter_x, 3, 1, 1),
            &blk(1_300),
            &Action::Unstake(Unstake {
                bucket_index: bucket_idx,
            }),
            &mut db,
        )
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::ErrUnauthorizedOperator);
}

#[test]
fn state_commits_and_center_restores() {
    let mut db = new_db();
    let mut protocol = Protocol::new(test_config());
    let owner = addr(1);
    fund(&mut db, owner, 1_000);
    register(&mut protocol, &mut db, owner, "alpha", 100, false, 1, 1_000);

    let root = db.commit(1, 1_000).unwrap();
    assert_eq!(root.block_height, 1);

    // A fresh protocol recovers the candidate set from persisted state
    let mut restored = Protocol::new(test_config());
    restored.restore_candidates(&db).unwrap();
    assert_eq!(restored.candidate_center().len(), 1);
    let candidate = restored.candidate_center().get_by_name("alpha").unwrap();
    assert_eq!(candidate.owner, owner);
    assert!(restored.candidate_center().contains_self_staking_bucket(0));
}

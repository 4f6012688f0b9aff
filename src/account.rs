//! Account records and the gas settlement hooks the staking protocol calls.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::state::manager::{get_state, put_state, StateConfig, StateError, StateResult};
use crate::state::{StateManager, StateReader, NAMESPACE_ACCOUNT, NAMESPACE_SYSTEM};
use crate::types::Address;

/// System-namespace key of the reward pool accumulator
pub const REWARD_POOL_KEY: &[u8] = b"rewardPool";

/// Account state: balance and nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account balance
    pub balance: BigUint,

    /// Highest action nonce observed for this account
    pub nonce: u64,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: BigUint::zero(),
            nonce: 0,
        }
    }
}

impl Account {
    /// Create an account with an initial balance
    pub fn with_balance(balance: BigUint) -> Self {
        Self { balance, nonce: 0 }
    }

    /// Add to the balance
    pub fn add_balance(&mut self, amount: &BigUint) {
        self.balance += amount;
    }

    /// Subtract from the balance; fails if the balance is insufficient
    pub fn sub_balance(&mut self, amount: &BigUint) -> StateResult<()> {
        if self.balance < *amount {
            return Err(StateError::InsufficientBalance {
                required: amount.clone(),
                available: self.balance.clone(),
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

fn account_config(addr: &Address) -> StateConfig {
    StateConfig::namespace(NAMESPACE_ACCOUNT).key(addr.as_ref().to_vec())
}

/// Load an account; an absent address reads as a fresh empty account
pub fn load_account(sr: &dyn StateReader, addr: &Address) -> StateResult<Account> {
    match get_state::<Account>(sr, &account_config(addr)) {
        Ok((_, account)) => Ok(account),
        Err(StateError::NotExist) => Ok(Account::default()),
        Err(e) => Err(e),
    }
}

/// Store an account record
pub fn store_account(
    sm: &mut dyn StateManager,
    addr: &Address,
    account: &Account,
) -> StateResult<()> {
    put_state(sm, &account_config(addr), account)?;
    Ok(())
}

/// Signature of the gas-deposit hook the staking protocol calls
pub type DepositGas = fn(&mut dyn StateManager, &Address, &BigUint) -> StateResult<()>;

/// Deposit a fee into the reward pool, debiting the payer
///
/// The payer is charged `min(amount, balance)`; settlement pre-clamps the
/// gas fee so a larger charge only appears in abnormal flows.
pub fn deposit_gas(sm: &mut dyn StateManager, payer: &Address, amount: &BigUint) -> StateResult<()> {
    let mut account = load_account(sm.as_reader(), payer)?;
    let paid = if *amount > account.balance {
        account.balance.clone()
    } else {
        amount.clone()
    };
    account.balance -= &paid;
    store_account(sm, payer, &account)?;

    let cfg = StateConfig::namespace(NAMESPACE_SYSTEM).key(REWARD_POOL_KEY.to_vec());
    let mut pool = match get_state::<BigUint>(sm.as_reader(), &cfg) {
        Ok((_, pool)) => pool,
        Err(StateError::NotExist) => BigUint::zero(),
        Err(e) => return Err(e),
    };
    pool += &paid;
    put_state(sm, &cfg, &pool)?;
    Ok(())
}

/// Current balance of the reward pool
pub fn reward_pool(sr: &dyn StateReader) -> StateResult<BigUint> {
    let cfg = StateConfig::namespace(NAMESPACE_SYSTEM).key(REWARD_POOL_KEY.to_vec());
    match get_state::<BigUint>(sr, &cfg) {
        Ok((_, pool)) => Ok(pool),
        Err(StateError::NotExist) => Ok(BigUint::zero()),
        Err(e) => Err(e),
    }
}

/// Advance an account's nonce to `max(current, nonce)` and store it back
pub fn increase_nonce(sm: &mut dyn StateManager, addr: &Address, nonce: u64) -> StateResult<()> {
    let mut account = load_account(sm.as_reader(), addr)?;
    if nonce > account.nonce {
        account.nonce = nonce;
    }
    store_account(sm, addr, &account)
}

use num_bigint::BigUint;

/// Basis-point coefficients of the vote-weight formula
///
/// The weight of a bucket is
/// `amount * (10_000 + bonus_bp) / 10_000` where `bonus_bp` sums the
/// duration bonus (per staked day, capped), the auto-stake bonus and the
/// self-stake bonus. Integer arithmetic only; the result feeds consensus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteWeightConfig {
    /// Bonus per whole staked day, in basis points
    pub duration_bonus_per_day_bp: u64,

    /// Cap on the accumulated duration bonus, in basis points
    pub duration_bonus_cap_bp: u64,

    /// Bonus for auto-stake buckets, in basis points
    pub auto_stake_bonus_bp: u64,

    /// Bonus for a candidate's self-staking bucket, in basis points
    pub self_stake_bonus_bp: u64,
}

impl Default for VoteWeightConfig {
    fn default() -> Self {
        Self {
            duration_bonus_per_day_bp: 2,
            duration_bonus_cap_bp: 700,
            auto_stake_bonus_bp: 250,
            self_stake_bonus_bp: 600,
        }
    }
}

/// Protocol configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingConfig {
    /// How long an unstaked bucket must wait before withdrawal, in seconds
    pub withdraw_waiting_period_secs: u64,

    /// One-time fee deposited to the reward pool on candidate registration
    pub registration_fee: BigUint,

    /// Minimum amount for a new stake
    pub min_stake_amount: BigUint,

    /// Vote-weight coefficients
    pub vote_weight: VoteWeightConfig,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            withdraw_waiting_period_secs: 3 * 24 * 60 * 60,
            registration_fee: BigUint::from(100u32),
            min_stake_amount: BigUint::from(1u32),
            vote_weight: VoteWeightConfig::default(),
        }
    }
}

//! Ledger state: global totals, append-only epoch snapshots, per-account
//! lazily-settled records.

use serde::{Deserialize, Serialize};

use farmpool_common::SCALE;

/// Immutable record written exactly once, when an epoch opens (i.e. the
/// previous epoch closed). `snapshots[e]` describes the start of epoch `e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    /// Cumulative profit factor `P` within the current era, scaled.
    /// Restarts at 1.0 when an era ends in total loss.
    pub profit_factor: u128,
    /// Cumulative reward per staked unit `S1` (scaled by the running
    /// profit factor, so settlement across compounding is one division).
    pub reward_per_staked: u128,
    /// Cumulative reward per merely-available unit `S2`.
    pub reward_per_available: u128,
    /// True when this epoch is a reset point: the close that opened it
    /// drove the profit factor to exactly zero, wiping all prior stake.
    pub reset: bool,
}

impl EpochSnapshot {
    /// The implicit snapshot for epoch 0.
    pub fn genesis() -> Self {
        EpochSnapshot {
            profit_factor: SCALE,
            reward_per_staked: 0,
            reward_per_available: 0,
            reset: false,
        }
    }
}

/// Global ledger totals and running cumulative sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    /// Every unit ever deposited and not yet withdrawn, staked or not.
    pub total_deposited: u128,
    /// Units currently staked in the external pool. Zero while suspended.
    pub total_staked: u128,
    /// Deposits queued to be staked at the next epoch close.
    pub total_pending_stake: u128,
    /// Settled stake queued to leave the pool at the next epoch close.
    pub total_pending_unstake: u128,
    /// Stake pulled out of the pool by an emergency withdraw, awaiting
    /// either per-account withdrawal or a recover.
    pub suspended_stake: u128,
    /// Monotonic epoch counter, starts at 0.
    pub epoch: u64,
    pub epoch_start_time: u64,
    pub is_emergency: bool,
    /// Last time the continuous reward accrual ran.
    pub last_accrual_time: u64,
    /// Cumulative emission already consumed by the running sums.
    pub last_total_issued: u128,
    /// Running profit factor of the current era.
    pub profit_factor: u128,
    /// Running cumulative reward per staked unit (`S1`).
    pub reward_per_staked: u128,
    /// Running cumulative reward per available unit (`S2`).
    pub reward_per_available: u128,
}

impl Default for GlobalState {
    fn default() -> Self {
        GlobalState {
            total_deposited: 0,
            total_staked: 0,
            total_pending_stake: 0,
            total_pending_unstake: 0,
            suspended_stake: 0,
            epoch: 0,
            epoch_start_time: 0,
            is_emergency: false,
            last_accrual_time: 0,
            last_total_issued: 0,
            profit_factor: SCALE,
            reward_per_staked: 0,
            reward_per_available: 0,
        }
    }
}

/// One depositor's record. Created zeroed on first deposit, destroyed once
/// every component drains to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Deposited, not yet staked.
    pub pending_stake: u128,
    /// Stake valued as of the snapshot at `last_settled_epoch`.
    pub staked: u128,
    /// Settled-out stake awaiting withdrawal.
    pub unstaked: u128,
    pub last_settled_epoch: u64,
    pub unstake_requested: bool,
    /// Accrued, unclaimed reward tokens.
    pub unclaimed_reward: u128,
    /// `S1` mark at the last settlement touch.
    pub reward_per_staked_seen: u128,
    /// `S2` mark at the last settlement touch.
    pub reward_per_available_seen: u128,
}

impl AccountState {
    /// A freshly-zeroed record anchored at the current epoch and sums.
    pub fn open_at(epoch: u64, reward_per_staked: u128, reward_per_available: u128) -> Self {
        AccountState {
            pending_stake: 0,
            staked: 0,
            unstaked: 0,
            last_settled_epoch: epoch,
            unstake_requested: false,
            unclaimed_reward: 0,
            reward_per_staked_seen: reward_per_staked,
            reward_per_available_seen: reward_per_available,
        }
    }

    /// True when nothing is left to track.
    pub fn is_drained(&self) -> bool {
        self.pending_stake == 0
            && self.staked == 0
            && self.unstaked == 0
            && self.unclaimed_reward == 0
    }
}

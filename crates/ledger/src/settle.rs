//! Pure account settlement.
//!
//! Brings an account from its last-settled epoch to the current epoch in
//! O(1): one hop to the snapshot that closed its epoch (where pending
//! stake/unstake realize), one jump across the remaining epochs, plus the
//! continuous intra-epoch reward tail. A reset point inside the jumped
//! range costs one extra hop and zeroes the traversed stake.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use farmpool_common::{mul_div, SCALE};

use crate::state::{AccountState, EpochSnapshot};

/// Singly linked chain of reset epochs, newest first. Kept as a small map
/// `reset epoch -> previous reset epoch` so settlement can find the first
/// reset inside a range without scanning all epochs. The walk is bounded by
/// the number of total-loss epochs, which is expected to be zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetChain {
    last: Option<u64>,
    prev: BTreeMap<u64, u64>,
}

impl ResetChain {
    /// Record `epoch` as a reset point. Epochs only move forward, so each
    /// recorded epoch is greater than the last.
    pub fn record(&mut self, epoch: u64) {
        if let Some(last) = self.last {
            self.prev.insert(epoch, last);
        }
        self.last = Some(epoch);
    }

    /// Smallest reset epoch `r` with `after < r <= upto`, if any.
    pub fn first_reset_in(&self, after: u64, upto: u64) -> Option<u64> {
        let mut cursor = self.last;
        let mut found = None;
        while let Some(r) = cursor {
            if r <= after {
                break;
            }
            if r <= upto {
                found = Some(r);
            }
            cursor = self.prev.get(&r).copied();
        }
        found
    }

    pub fn last_reset(&self) -> Option<u64> {
        self.last
    }
}

/// Settle `account` up to `epoch` and the running sums.
///
/// Pure: returns the settled copy, mutating nothing. The staked component
/// of the result is valued as of the snapshot at `epoch`, with any pending
/// stake/unstake realized exactly once at the first boundary crossed.
pub fn settle_account(
    account: &AccountState,
    snapshots: &[EpochSnapshot],
    resets: &ResetChain,
    epoch: u64,
    reward_per_staked_now: u128,
    reward_per_available_now: u128,
) -> AccountState {
    let mut a = *account;

    if a.last_settled_epoch < epoch {
        let b = a.last_settled_epoch;
        let base = snapshots[b as usize];
        let boundary = snapshots[(b + 1) as usize];

        // Rest of epoch `b`, up to the close that ended it.
        if a.staked > 0 && base.profit_factor > 0 {
            a.unclaimed_reward += mul_div(
                a.staked,
                boundary.reward_per_staked - a.reward_per_staked_seen,
                base.profit_factor,
            );
        }
        let available = a.pending_stake + a.unstaked;
        if available > 0 {
            a.unclaimed_reward += mul_div(
                available,
                boundary.reward_per_available - a.reward_per_available_seen,
                SCALE,
            );
        }

        // Realize the boundary: the stake compounds into the new epoch's
        // valuation (or is wiped if that close was a total loss), an
        // unstake request converts stake to withdrawable, pending stake
        // joins the pool.
        let mut staked_value = if boundary.reset || base.profit_factor == 0 {
            0
        } else {
            mul_div(a.staked, boundary.profit_factor, base.profit_factor)
        };
        if a.unstake_requested {
            a.unstaked += staked_value;
            staked_value = 0;
            a.unstake_requested = false;
        }
        a.staked = staked_value + a.pending_stake;
        a.pending_stake = 0;
        a.reward_per_staked_seen = boundary.reward_per_staked;
        a.reward_per_available_seen = boundary.reward_per_available;

        // Jump the remaining closed epochs in one step. Available balances
        // do not compound, so their reward accrues in the common tail; only
        // the staked component needs the snapshot difference here.
        if epoch > b + 1 {
            let target = snapshots[epoch as usize];
            if a.staked > 0 {
                match resets.first_reset_in(b + 1, epoch) {
                    Some(r) => {
                        // Second O(1) hop: stop at the reset point, zero
                        // the traversed stake.
                        let stop = snapshots[r as usize];
                        a.unclaimed_reward += mul_div(
                            a.staked,
                            stop.reward_per_staked - boundary.reward_per_staked,
                            boundary.profit_factor,
                        );
                        a.staked = 0;
                    }
                    None => {
                        a.unclaimed_reward += mul_div(
                            a.staked,
                            target.reward_per_staked - boundary.reward_per_staked,
                            boundary.profit_factor,
                        );
                        a.staked =
                            mul_div(a.staked, target.profit_factor, boundary.profit_factor);
                    }
                }
            }
            a.reward_per_staked_seen = target.reward_per_staked;
        }
        a.last_settled_epoch = epoch;
    }

    // Continuous tail inside the current epoch.
    let era_base = snapshots[epoch as usize].profit_factor;
    if a.staked > 0 && era_base > 0 {
        a.unclaimed_reward += mul_div(
            a.staked,
            reward_per_staked_now - a.reward_per_staked_seen,
            era_base,
        );
    }
    let available = a.pending_stake + a.unstaked;
    if available > 0 {
        a.unclaimed_reward += mul_div(
            available,
            reward_per_available_now - a.reward_per_available_seen,
            SCALE,
        );
    }
    a.reward_per_staked_seen = reward_per_staked_now;
    a.reward_per_available_seen = reward_per_available_now;
    a
}

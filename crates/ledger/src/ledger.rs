//! The production fixed-point ledger: eight sequential operations over
//! global totals, append-only epoch snapshots and lazily-settled accounts.
//!
//! Every operation validates on a settled copy before committing, so a
//! rejected call leaves the ledger exactly as it was. The one permitted
//! side effect of any call is the global reward accrual, which is a pure
//! function of the timestamp.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use farmpool_common::{
    fixed_mul, mul_div, EpochOutcome, Event, EventKind, FarmConfig, FarmError, UserId, SCALE,
};

use crate::settle::{settle_account, ResetChain};
use crate::state::{AccountState, EpochSnapshot, GlobalState};

/// Settled balances of one account, as an external caller sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    /// Withdrawable principal (unstaked plus, in emergency, staked).
    pub available: u128,
    /// Current value of the staked principal.
    pub staked: u128,
    /// Deposited this epoch, staking at the next close.
    pub pending_stake: u128,
    pub unstake_requested: bool,
    /// Accrued reward tokens not yet paid out.
    pub unclaimed_reward: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLedger {
    cfg: FarmConfig,
    /// Wall-clock time the emission schedule started.
    start_time: u64,
    global: GlobalState,
    /// `snapshots[e]` is the state at the start of epoch `e`.
    snapshots: Vec<EpochSnapshot>,
    accounts: BTreeMap<UserId, AccountState>,
    resets: ResetChain,
    /// Principal paid out per user over the ledger's lifetime.
    paid_principal: BTreeMap<UserId, u128>,
    /// Reward tokens paid out per user over the ledger's lifetime.
    paid_reward: BTreeMap<UserId, u128>,
}

impl RewardLedger {
    pub fn new(cfg: FarmConfig, start_time: u64) -> Self {
        let mut global = GlobalState::default();
        global.epoch_start_time = start_time;
        global.last_accrual_time = start_time;
        RewardLedger {
            cfg,
            start_time,
            global,
            snapshots: vec![EpochSnapshot::genesis()],
            accounts: BTreeMap::new(),
            resets: ResetChain::default(),
            paid_principal: BTreeMap::new(),
            paid_reward: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &FarmConfig {
        &self.cfg
    }

    pub fn global(&self) -> &GlobalState {
        &self.global
    }

    pub fn snapshots(&self) -> &[EpochSnapshot] {
        &self.snapshots
    }

    pub fn accounts(&self) -> &BTreeMap<UserId, AccountState> {
        &self.accounts
    }

    pub fn paid_principal(&self) -> &BTreeMap<UserId, u128> {
        &self.paid_principal
    }

    pub fn paid_reward(&self) -> &BTreeMap<UserId, u128> {
        &self.paid_reward
    }

    /// Dispatch one event. Returns the principal paid out, zero for
    /// operations that pay nothing.
    pub fn apply(&mut self, event: &Event) -> Result<u128, FarmError> {
        let now = event.timestamp;
        match &event.kind {
            EventKind::Deposit { user, amount } => self.deposit(*user, *amount, now).map(|_| 0),
            EventKind::Unstake { user } => self.unstake(*user, now).map(|_| 0),
            EventKind::Withdraw { user } => self.withdraw(*user, now),
            EventKind::UnstakeAndWithdraw { user, outcome } => {
                self.unstake_and_withdraw(*user, *outcome, now)
            }
            EventKind::Claim { user } => self.claim(*user, now).map(|_| 0),
            EventKind::NewEpoch { outcome } => self.new_epoch(*outcome, now).map(|_| 0),
            EventKind::EmergencyWithdraw { outcome } => {
                self.emergency_withdraw(*outcome, now).map(|_| 0)
            }
            EventKind::EmergencyRecover => self.emergency_recover(now).map(|_| 0),
        }
    }

    /// Queue `amount` for staking at the next epoch close. Allowed during
    /// an emergency; the deposit simply stays pending.
    pub fn deposit(&mut self, user: UserId, amount: u128, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if amount < self.cfg.min_deposit {
            return Err(FarmError::BelowMinimumDeposit);
        }
        let mut account = self.settled_or_new(user);
        account.pending_stake += amount;
        self.accounts.insert(user, account);
        self.global.total_pending_stake += amount;
        self.global.total_deposited += amount;
        Ok(())
    }

    /// Request that the settled stake leave the pool at the next close.
    /// Repeating the request before that close is a no-op.
    pub fn unstake(&mut self, user: UserId, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if self.global.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        let mut account = self.settled(user).ok_or(FarmError::NothingToUnstake)?;
        if account.staked == 0 {
            return Err(FarmError::NothingToUnstake);
        }
        if !account.unstake_requested {
            account.unstake_requested = true;
            self.global.total_pending_unstake += account.staked;
        }
        self.accounts.insert(user, account);
        Ok(())
    }

    /// Pay out everything withdrawable: pending and unstaked principal,
    /// plus the staked principal while the pool is suspended. Accrued
    /// reward tokens are flushed as part of the payout. Returns the
    /// principal paid.
    pub fn withdraw(&mut self, user: UserId, now: u64) -> Result<u128, FarmError> {
        self.accrue(now);
        let mut account = self.settled(user).ok_or(FarmError::NothingToWithdraw)?;
        let emergency = self.global.is_emergency;
        let principal = if emergency {
            account.pending_stake + account.unstaked + account.staked
        } else {
            account.pending_stake + account.unstaked
        };
        if principal == 0 {
            return Err(FarmError::NothingToWithdraw);
        }

        self.global.total_pending_stake -= account.pending_stake;
        self.global.total_deposited -= principal;
        account.pending_stake = 0;
        account.unstaked = 0;
        if emergency {
            self.global.suspended_stake -= account.staked;
            account.staked = 0;
        }
        let reward = account.unclaimed_reward;
        account.unclaimed_reward = 0;

        *self.paid_principal.entry(user).or_default() += principal;
        *self.paid_reward.entry(user).or_default() += reward;
        self.commit(user, account);
        Ok(principal)
    }

    /// Pay out accrued reward tokens only. Returns the amount paid.
    pub fn claim(&mut self, user: UserId, now: u64) -> Result<u128, FarmError> {
        self.accrue(now);
        let mut account = self.settled(user).ok_or(FarmError::NothingToClaim)?;
        let reward = account.unclaimed_reward;
        if reward == 0 {
            return Err(FarmError::NothingToClaim);
        }
        account.unclaimed_reward = 0;
        *self.paid_reward.entry(user).or_default() += reward;
        self.commit(user, account);
        Ok(reward)
    }

    /// Close the current epoch with `outcome` and open the next one.
    pub fn new_epoch(&mut self, outcome: EpochOutcome, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if self.global.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        self.close_epoch(outcome, now);
        Ok(())
    }

    /// Unstake and withdraw in one call, rolling the epoch over in between
    /// so the stake settles immediately. The close may not resolve to a
    /// reward; losses already realized by the pool are allowed and shrink
    /// the payout. The caller leaves with everything, including a deposit
    /// still pending in the closed epoch, so the account drains to zero.
    /// Returns the principal paid, possibly zero after a total loss.
    pub fn unstake_and_withdraw(
        &mut self,
        user: UserId,
        outcome: EpochOutcome,
        now: u64,
    ) -> Result<u128, FarmError> {
        self.accrue(now);
        if self.global.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        let (reward_component, _) = outcome.resolve(self.global.total_staked);
        if reward_component != 0 {
            return Err(FarmError::NonZeroRewardOnUnstakeAndWithdraw);
        }
        let mut account = self.settled(user).ok_or(FarmError::NothingToUnstake)?;
        if account.staked == 0 {
            return Err(FarmError::NothingToUnstake);
        }
        // The pending deposit leaves with the caller instead of folding
        // into the pool at the close.
        let pending = account.pending_stake;
        account.pending_stake = 0;
        self.global.total_pending_stake -= pending;
        if !account.unstake_requested {
            account.unstake_requested = true;
            self.global.total_pending_unstake += account.staked;
        }
        self.accounts.insert(user, account);

        self.close_epoch(outcome, now);

        let mut account = self.settled_or_new(user);
        let principal = pending + account.unstaked;
        self.global.total_deposited -= principal;
        account.unstaked = 0;
        let reward = account.unclaimed_reward;
        account.unclaimed_reward = 0;

        if principal > 0 {
            *self.paid_principal.entry(user).or_default() += principal;
        }
        if reward > 0 {
            *self.paid_reward.entry(user).or_default() += reward;
        }
        self.commit(user, account);
        Ok(principal)
    }

    /// Close the epoch, then pull the whole staked position out of the
    /// external pool. Until a recover, withdrawals pay staked principal
    /// out directly and no epoch can close.
    pub fn emergency_withdraw(&mut self, outcome: EpochOutcome, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if self.global.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        self.close_epoch(outcome, now);
        self.global.suspended_stake = self.global.total_staked;
        self.global.total_staked = 0;
        self.global.is_emergency = true;
        Ok(())
    }

    /// Return the suspended stake to the external pool. No epoch rolls
    /// over; account valuations are exactly as they were.
    pub fn emergency_recover(&mut self, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if !self.global.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        self.global.total_staked = self.global.suspended_stake;
        self.global.suspended_stake = 0;
        self.global.is_emergency = false;
        Ok(())
    }

    /// Settled balances of `user` as of `now`, without mutating anything.
    pub fn account_balances(&self, user: UserId, now: u64) -> Option<AccountBalances> {
        let account = self.accounts.get(&user)?;
        let (s1, s2) = self.preview_sums(now);
        let settled = settle_account(
            account,
            &self.snapshots,
            &self.resets,
            self.global.epoch,
            s1,
            s2,
        );
        let (available, staked) = if self.global.is_emergency {
            (settled.unstaked + settled.staked, settled.staked)
        } else {
            (settled.unstaked, settled.staked)
        };
        Some(AccountBalances {
            available,
            staked,
            pending_stake: settled.pending_stake,
            unstake_requested: settled.unstake_requested,
            unclaimed_reward: settled.unclaimed_reward,
        })
    }

    /// `(total_deposited, total_staked)` with the suspended stake counted
    /// as staked, mirroring what depositors collectively own.
    pub fn total_balances(&self) -> (u128, u128) {
        (
            self.global.total_deposited,
            self.global.total_staked + self.global.suspended_stake,
        )
    }

    /// Cumulative reward-token emission consumed so far, including the
    /// share forfeited while the pool was empty.
    pub fn total_issued(&self) -> u128 {
        self.global.last_total_issued
    }

    /// Fold elapsed emission into the running cumulative sums. Emission
    /// over a window with nothing deposited is forfeited; the marker still
    /// advances.
    fn accrue(&mut self, now: u64) {
        let now = now.max(self.global.last_accrual_time);
        let issued = self.cfg.emission_at(now - self.start_time);
        // The emission curve is monotone; the saturation keeps a dip of
        // rounding dust at a period boundary from aborting an operation.
        let delta = issued.saturating_sub(self.global.last_total_issued);
        if delta > 0 && self.global.total_deposited > 0 {
            let per_unit = mul_div(delta, SCALE, self.global.total_deposited);
            self.global.reward_per_available += per_unit;
            self.global.reward_per_staked += fixed_mul(per_unit, self.global.profit_factor);
        }
        self.global.last_total_issued = issued.max(self.global.last_total_issued);
        self.global.last_accrual_time = now;
    }

    /// The running sums as they would stand after `accrue(now)`.
    fn preview_sums(&self, now: u64) -> (u128, u128) {
        let now = now.max(self.global.last_accrual_time);
        let issued = self.cfg.emission_at(now - self.start_time);
        let delta = issued.saturating_sub(self.global.last_total_issued);
        if delta > 0 && self.global.total_deposited > 0 {
            let per_unit = mul_div(delta, SCALE, self.global.total_deposited);
            (
                self.global.reward_per_staked + fixed_mul(per_unit, self.global.profit_factor),
                self.global.reward_per_available + per_unit,
            )
        } else {
            (self.global.reward_per_staked, self.global.reward_per_available)
        }
    }

    /// Apply `outcome` to the staked pool, fold both pending queues, and
    /// open the next epoch with a fresh snapshot.
    fn close_epoch(&mut self, outcome: EpochOutcome, now: u64) {
        let staked = self.global.total_staked;
        let (reward, loss) = outcome.resolve(staked);
        let new_staked_value = staked - loss + reward;
        let factor = if staked == 0 {
            SCALE
        } else {
            mul_div(SCALE, new_staked_value, staked)
        };

        let unstake_out =
            fixed_mul(self.global.total_pending_unstake, factor).min(new_staked_value);
        self.global.total_staked =
            new_staked_value - unstake_out + self.global.total_pending_stake;
        self.global.total_deposited = self.global.total_deposited + reward - loss;
        self.global.total_pending_stake = 0;
        self.global.total_pending_unstake = 0;

        let new_profit_factor = fixed_mul(self.global.profit_factor, factor);
        self.global.epoch += 1;
        let reset = staked > 0 && new_profit_factor == 0;
        if reset {
            // A total loss ends the era: restart the factor so later
            // stakes compound from a clean base.
            self.resets.record(self.global.epoch);
            self.global.profit_factor = SCALE;
        } else {
            self.global.profit_factor = new_profit_factor;
        }
        self.snapshots.push(EpochSnapshot {
            profit_factor: self.global.profit_factor,
            reward_per_staked: self.global.reward_per_staked,
            reward_per_available: self.global.reward_per_available,
            reset,
        });
        self.global.epoch_start_time = now;
    }

    /// The account settled to the present, or `None` if unknown.
    fn settled(&self, user: UserId) -> Option<AccountState> {
        self.accounts.get(&user).map(|account| {
            settle_account(
                account,
                &self.snapshots,
                &self.resets,
                self.global.epoch,
                self.global.reward_per_staked,
                self.global.reward_per_available,
            )
        })
    }

    /// Like [`Self::settled`], opening a zeroed record for new depositors.
    fn settled_or_new(&self, user: UserId) -> AccountState {
        self.settled(user).unwrap_or_else(|| {
            AccountState::open_at(
                self.global.epoch,
                self.global.reward_per_staked,
                self.global.reward_per_available,
            )
        })
    }

    /// Store the settled record, dropping it once fully drained.
    fn commit(&mut self, user: UserId, account: AccountState) {
        if account.is_drained() {
            self.accounts.remove(&user);
        } else {
            self.accounts.insert(user, account);
        }
    }
}

//! The eager rational simulator.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use farmpool_common::{EpochOutcome, Event, EventKind, FarmConfig, FarmError, UserId, SCALE};

use crate::emission::exact_capped_emission;

fn rat(units: u128) -> BigRational {
    BigRational::from_integer(BigInt::from(units))
}

fn scaled(units: u128) -> BigRational {
    BigRational::new(BigInt::from(units), BigInt::from(SCALE))
}

/// One account, every component an exact rational in scaled units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAccount {
    pub pending_stake: BigRational,
    pub staked: BigRational,
    pub unstaked: BigRational,
    pub unstake_requested: bool,
    pub unclaimed_reward: BigRational,
}

impl RefAccount {
    fn new() -> Self {
        RefAccount {
            pending_stake: BigRational::zero(),
            staked: BigRational::zero(),
            unstaked: BigRational::zero(),
            unstake_requested: false,
            unclaimed_reward: BigRational::zero(),
        }
    }

    /// Principal the account owns, staked or not.
    pub fn principal(&self) -> BigRational {
        &self.pending_stake + &self.staked + &self.unstaked
    }

    fn is_drained(&self) -> bool {
        self.pending_stake.is_zero()
            && self.staked.is_zero()
            && self.unstaked.is_zero()
            && self.unclaimed_reward.is_zero()
    }
}

/// Exact mirror of the production ledger. No snapshots, no cumulative
/// sums: every epoch close and every reward accrual walks all accounts.
#[derive(Debug, Clone)]
pub struct ReferenceFarm {
    cfg: FarmConfig,
    start_time: u64,
    last_accrual_time: u64,
    /// Cumulative emission already distributed or forfeited.
    issued: BigRational,
    epoch: u64,
    is_emergency: bool,
    /// Farm-held stake nobody owns: rewards realized against an empty
    /// pool. Compounds with every close like any other staked unit.
    residual: BigRational,
    accounts: BTreeMap<UserId, RefAccount>,
    paid_principal: BTreeMap<UserId, BigRational>,
    paid_reward: BTreeMap<UserId, BigRational>,
}

impl ReferenceFarm {
    pub fn new(cfg: FarmConfig, start_time: u64) -> Self {
        ReferenceFarm {
            cfg,
            start_time,
            last_accrual_time: start_time,
            issued: BigRational::zero(),
            epoch: 0,
            is_emergency: false,
            residual: BigRational::zero(),
            accounts: BTreeMap::new(),
            paid_principal: BTreeMap::new(),
            paid_reward: BTreeMap::new(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_emergency(&self) -> bool {
        self.is_emergency
    }

    pub fn accounts(&self) -> &BTreeMap<UserId, RefAccount> {
        &self.accounts
    }

    pub fn paid_principal(&self) -> &BTreeMap<UserId, BigRational> {
        &self.paid_principal
    }

    pub fn paid_reward(&self) -> &BTreeMap<UserId, BigRational> {
        &self.paid_reward
    }

    pub fn total_deposited(&self) -> BigRational {
        self.accounts.values().map(RefAccount::principal).sum::<BigRational>() + &self.residual
    }

    pub fn total_staked(&self) -> BigRational {
        self.accounts.values().map(|a| a.staked.clone()).sum::<BigRational>() + &self.residual
    }

    pub fn total_issued(&self) -> BigRational {
        self.issued.clone()
    }

    /// Dispatch one event; returns the principal paid out.
    pub fn apply(&mut self, event: &Event) -> Result<BigRational, FarmError> {
        let now = event.timestamp;
        let zero = || BigRational::zero();
        match &event.kind {
            EventKind::Deposit { user, amount } => {
                self.deposit(*user, *amount, now).map(|_| zero())
            }
            EventKind::Unstake { user } => self.unstake(*user, now).map(|_| zero()),
            EventKind::Withdraw { user } => self.withdraw(*user, now),
            EventKind::UnstakeAndWithdraw { user, outcome } => {
                self.unstake_and_withdraw(*user, *outcome, now)
            }
            EventKind::Claim { user } => self.claim(*user, now).map(|_| zero()),
            EventKind::NewEpoch { outcome } => self.new_epoch(*outcome, now).map(|_| zero()),
            EventKind::EmergencyWithdraw { outcome } => {
                self.emergency_withdraw(*outcome, now).map(|_| zero())
            }
            EventKind::EmergencyRecover => self.emergency_recover(now).map(|_| zero()),
        }
    }

    pub fn deposit(&mut self, user: UserId, amount: u128, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if amount < self.cfg.min_deposit {
            return Err(FarmError::BelowMinimumDeposit);
        }
        let account = self.accounts.entry(user).or_insert_with(RefAccount::new);
        account.pending_stake += rat(amount);
        Ok(())
    }

    pub fn unstake(&mut self, user: UserId, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if self.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        let account = self
            .accounts
            .get_mut(&user)
            .ok_or(FarmError::NothingToUnstake)?;
        if account.staked.is_zero() {
            return Err(FarmError::NothingToUnstake);
        }
        account.unstake_requested = true;
        Ok(())
    }

    pub fn withdraw(&mut self, user: UserId, now: u64) -> Result<BigRational, FarmError> {
        self.accrue(now);
        let emergency = self.is_emergency;
        let account = self
            .accounts
            .get_mut(&user)
            .ok_or(FarmError::NothingToWithdraw)?;
        let principal = if emergency {
            account.principal()
        } else {
            &account.pending_stake + &account.unstaked
        };
        if principal.is_zero() {
            return Err(FarmError::NothingToWithdraw);
        }
        account.pending_stake = BigRational::zero();
        account.unstaked = BigRational::zero();
        if emergency {
            account.staked = BigRational::zero();
            account.unstake_requested = false;
        }
        let reward = std::mem::replace(&mut account.unclaimed_reward, BigRational::zero());
        self.pay(user, &principal, &reward);
        self.prune(user);
        Ok(principal)
    }

    pub fn claim(&mut self, user: UserId, now: u64) -> Result<BigRational, FarmError> {
        self.accrue(now);
        let account = self
            .accounts
            .get_mut(&user)
            .ok_or(FarmError::NothingToClaim)?;
        if account.unclaimed_reward.is_zero() {
            return Err(FarmError::NothingToClaim);
        }
        let reward = std::mem::replace(&mut account.unclaimed_reward, BigRational::zero());
        self.pay(user, &BigRational::zero(), &reward);
        self.prune(user);
        Ok(reward)
    }

    pub fn new_epoch(&mut self, outcome: EpochOutcome, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if self.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        self.close_epoch(outcome);
        Ok(())
    }

    pub fn unstake_and_withdraw(
        &mut self,
        user: UserId,
        outcome: EpochOutcome,
        now: u64,
    ) -> Result<BigRational, FarmError> {
        self.accrue(now);
        if self.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        let (reward_component, _) = resolve_exact(&outcome, &self.total_staked());
        if !reward_component.is_zero() {
            return Err(FarmError::NonZeroRewardOnUnstakeAndWithdraw);
        }
        // The pending deposit leaves with the caller instead of folding
        // into the pool at the close.
        let pending = {
            let account = self
                .accounts
                .get_mut(&user)
                .ok_or(FarmError::NothingToUnstake)?;
            if account.staked.is_zero() {
                return Err(FarmError::NothingToUnstake);
            }
            account.unstake_requested = true;
            std::mem::replace(&mut account.pending_stake, BigRational::zero())
        };
        self.close_epoch(outcome);

        let account = match self.accounts.get_mut(&user) {
            Some(a) => a,
            None => {
                self.pay(user, &pending, &BigRational::zero());
                return Ok(pending);
            }
        };
        let principal = &pending + &account.unstaked;
        account.unstaked = BigRational::zero();
        let reward = std::mem::replace(&mut account.unclaimed_reward, BigRational::zero());
        self.pay(user, &principal, &reward);
        self.prune(user);
        Ok(principal)
    }

    pub fn emergency_withdraw(&mut self, outcome: EpochOutcome, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if self.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        self.close_epoch(outcome);
        self.is_emergency = true;
        Ok(())
    }

    pub fn emergency_recover(&mut self, now: u64) -> Result<(), FarmError> {
        self.accrue(now);
        if !self.is_emergency {
            return Err(FarmError::InvalidStateForOperation);
        }
        self.is_emergency = false;
        Ok(())
    }

    /// Distribute elapsed emission proportionally over every deposited
    /// unit. Emission over an empty pool is forfeited.
    fn accrue(&mut self, now: u64) {
        let now = now.max(self.last_accrual_time);
        let elapsed = now - self.start_time;
        let issued = exact_capped_emission(&self.cfg.schedule, self.cfg.reward_total, elapsed);
        let delta = &issued - &self.issued;
        if !delta.is_zero() {
            let total = self.total_deposited();
            if !total.is_zero() {
                for account in self.accounts.values_mut() {
                    let share = &delta * account.principal() / &total;
                    account.unclaimed_reward += share;
                }
            }
        }
        self.issued = issued;
        self.last_accrual_time = now;
    }

    fn close_epoch(&mut self, outcome: EpochOutcome) {
        let staked_total = self.total_staked();
        let (reward, loss) = resolve_exact(&outcome, &staked_total);
        let factor = if staked_total.is_zero() {
            // A reward realized against an empty pool has no owner; it
            // stays behind as farm-held stake.
            self.residual += reward;
            BigRational::one()
        } else {
            (&staked_total - loss + reward) / &staked_total
        };
        self.residual *= &factor;
        for account in self.accounts.values_mut() {
            account.staked *= &factor;
            if account.unstake_requested {
                let released = std::mem::replace(&mut account.staked, BigRational::zero());
                account.unstaked += released;
                account.unstake_requested = false;
            }
            let pending = std::mem::replace(&mut account.pending_stake, BigRational::zero());
            account.staked += pending;
        }
        self.epoch += 1;
    }

    fn pay(&mut self, user: UserId, principal: &BigRational, reward: &BigRational) {
        if !principal.is_zero() {
            *self
                .paid_principal
                .entry(user)
                .or_insert_with(BigRational::zero) += principal;
        }
        if !reward.is_zero() {
            *self
                .paid_reward
                .entry(user)
                .or_insert_with(BigRational::zero) += reward;
        }
    }

    fn prune(&mut self, user: UserId) {
        if self.accounts.get(&user).map_or(false, RefAccount::is_drained) {
            self.accounts.remove(&user);
        }
    }
}

/// Resolve an outcome against an exact staked total.
fn resolve_exact(outcome: &EpochOutcome, staked: &BigRational) -> (BigRational, BigRational) {
    match *outcome {
        EpochOutcome::Absolute { reward, loss } => {
            (rat(reward), rat(loss).min(staked.clone()))
        }
        EpochOutcome::Multipliers {
            profit_factor,
            survival_factor,
        } => {
            let after_profit = staked * scaled(profit_factor);
            let after_loss = (staked * scaled(survival_factor)).min(after_profit.clone());
            let loss = staked - after_loss.clone().min(staked.clone());
            (after_profit - after_loss, loss)
        }
    }
}

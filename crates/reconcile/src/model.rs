//! The common surface both ledger models expose to the replay harness.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};

use farmpool_common::{Event, FarmError, UserId};
use farmpool_ledger::RewardLedger;
use farmpool_reference::{ReferenceFarm, RefAccount};

pub(crate) fn rat(units: u128) -> BigRational {
    BigRational::from_integer(BigInt::from(units))
}

/// `fixed - exact` truncated to whole scaled units, saturating at the
/// i128 range.
pub fn diff_units(fixed: u128, exact: &BigRational) -> i128 {
    let diff = rat(fixed) - exact;
    let trunc = diff.to_integer();
    trunc.to_i128().unwrap_or(if trunc.sign() == num_bigint::Sign::Minus {
        i128::MIN
    } else {
        i128::MAX
    })
}

/// One user's balances at the end of a replay, in scaled units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTerminal {
    /// Principal still inside the farm, staked or not.
    pub principal: BigRational,
    /// The staked share of that principal.
    pub staked: BigRational,
    pub unclaimed_reward: BigRational,
    /// Lifetime principal paid out.
    pub paid_principal: BigRational,
    /// Lifetime reward tokens paid out.
    pub paid_reward: BigRational,
}

impl UserTerminal {
    fn zeroed() -> Self {
        UserTerminal {
            principal: BigRational::zero(),
            staked: BigRational::zero(),
            unclaimed_reward: BigRational::zero(),
            paid_principal: BigRational::zero(),
            paid_reward: BigRational::zero(),
        }
    }
}

/// Everything the reconciler compares after a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalState {
    pub users: BTreeMap<UserId, UserTerminal>,
    pub total_deposited: BigRational,
    pub total_staked: BigRational,
    pub total_issued: BigRational,
}

/// A ledger model the harness can drive. Payouts are reported as exact
/// rationals so the fixed-point model's truncation shows up as a
/// measurable difference rather than a conversion artifact.
pub trait FarmModel {
    fn apply(&mut self, event: &Event) -> Result<BigRational, FarmError>;
    fn terminal_state(&self) -> TerminalState;
}

impl FarmModel for RewardLedger {
    fn apply(&mut self, event: &Event) -> Result<BigRational, FarmError> {
        RewardLedger::apply(self, event).map(rat)
    }

    fn terminal_state(&self) -> TerminalState {
        let now = self.global().last_accrual_time;
        let emergency = self.global().is_emergency;
        let mut users: BTreeMap<UserId, UserTerminal> = BTreeMap::new();
        for &user in self.accounts().keys() {
            // Settled view at the clock's current position.
            let b = match self.account_balances(user, now) {
                Some(b) => b,
                None => continue,
            };
            let unstaked = if emergency {
                rat(b.available - b.staked)
            } else {
                rat(b.available)
            };
            let entry = users.entry(user).or_insert_with(UserTerminal::zeroed);
            entry.principal = rat(b.pending_stake) + rat(b.staked) + unstaked;
            entry.staked = rat(b.staked);
            entry.unclaimed_reward = rat(b.unclaimed_reward);
        }
        for (&user, &paid) in self.paid_principal() {
            users.entry(user).or_insert_with(UserTerminal::zeroed).paid_principal = rat(paid);
        }
        for (&user, &paid) in self.paid_reward() {
            users.entry(user).or_insert_with(UserTerminal::zeroed).paid_reward = rat(paid);
        }
        let (total_deposited, total_staked) = self.total_balances();
        TerminalState {
            users,
            total_deposited: rat(total_deposited),
            total_staked: rat(total_staked),
            total_issued: rat(self.total_issued()),
        }
    }
}

impl FarmModel for ReferenceFarm {
    fn apply(&mut self, event: &Event) -> Result<BigRational, FarmError> {
        ReferenceFarm::apply(self, event)
    }

    fn terminal_state(&self) -> TerminalState {
        let mut users: BTreeMap<UserId, UserTerminal> = BTreeMap::new();
        for (&user, account) in self.accounts() {
            let entry = users.entry(user).or_insert_with(UserTerminal::zeroed);
            entry.principal = RefAccount::principal(account);
            entry.staked = account.staked.clone();
            entry.unclaimed_reward = account.unclaimed_reward.clone();
        }
        for (user, paid) in self.paid_principal() {
            users.entry(*user).or_insert_with(UserTerminal::zeroed).paid_principal =
                paid.clone();
        }
        for (user, paid) in self.paid_reward() {
            users.entry(*user).or_insert_with(UserTerminal::zeroed).paid_reward = paid.clone();
        }
        TerminalState {
            users,
            total_deposited: self.total_deposited(),
            total_staked: self.total_staked(),
            total_issued: self.total_issued(),
        }
    }
}

//! The replay harness: drive both models through a log, diff the results.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use farmpool_common::{Event, FarmConfig, SCALE};
use farmpool_ledger::RewardLedger;
use farmpool_reference::ReferenceFarm;

use crate::model::{FarmModel, TerminalState};

/// Absolute tolerance for a single compared quantity, in scaled units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tolerance(BigRational);

impl Tolerance {
    /// Exact equality only.
    pub fn zero() -> Self {
        Tolerance(BigRational::zero())
    }

    /// Tolerance in raw scaled units (1 == 10^-18 tokens).
    pub fn units(units: u128) -> Self {
        Tolerance(BigRational::from_integer(BigInt::from(units)))
    }

    /// One billionth of a token. Generous against truncation dust while
    /// still catching any real accounting fault.
    pub fn nano_token() -> Self {
        Tolerance::units(SCALE / 1_000_000_000)
    }

    fn allows(&self, difference: &BigRational) -> bool {
        difference.abs() <= self.0
    }
}

/// Why one event's handling differed between the models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDivergence {
    /// Both accepted, payouts further apart than the tolerance.
    Payout {
        ledger: BigRational,
        reference: BigRational,
    },
    /// One model accepted what the other rejected.
    Acceptance,
    /// Both rejected, with different errors.
    ErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub index: usize,
    pub timestamp: u64,
    pub kind: EventDivergence,
}

/// A terminal-state field out of tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalDivergence {
    /// `None` for a global total.
    pub user: Option<farmpool_common::UserId>,
    pub field: &'static str,
    pub difference: BigRational,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub events: usize,
    /// Events both models rejected, with matching errors.
    pub rejections: usize,
    pub event_divergences: Vec<Divergence>,
    pub terminal_divergences: Vec<TerminalDivergence>,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.event_divergences.is_empty() && self.terminal_divergences.is_empty()
    }
}

/// Replay `events` through a fresh pair of models and reconcile.
pub fn replay(
    cfg: FarmConfig,
    start_time: u64,
    events: &[Event],
    tolerance: &Tolerance,
) -> ReplayReport {
    let mut ledger = RewardLedger::new(cfg, start_time);
    let mut reference = ReferenceFarm::new(cfg, start_time);
    replay_into(&mut ledger, &mut reference, events, tolerance)
}

/// Replay into caller-provided models, reconciling as it goes.
pub fn replay_into(
    ledger: &mut RewardLedger,
    reference: &mut ReferenceFarm,
    events: &[Event],
    tolerance: &Tolerance,
) -> ReplayReport {
    let mut report = ReplayReport {
        events: events.len(),
        rejections: 0,
        event_divergences: Vec::new(),
        terminal_divergences: Vec::new(),
    };

    for (index, event) in events.iter().enumerate() {
        let fixed = FarmModel::apply(ledger, event);
        let exact = FarmModel::apply(reference, event);
        let kind = match (&fixed, &exact) {
            (Ok(a), Ok(b)) => {
                let difference = a - b;
                if tolerance.allows(&difference) {
                    continue;
                }
                EventDivergence::Payout {
                    ledger: a.clone(),
                    reference: b.clone(),
                }
            }
            (Err(a), Err(b)) => {
                if a == b {
                    report.rejections += 1;
                    continue;
                }
                EventDivergence::ErrorKind
            }
            _ => EventDivergence::Acceptance,
        };
        log::warn!(
            "event {} at t={} diverged: {:?} (ledger {:?}, reference {:?})",
            index,
            event.timestamp,
            kind,
            fixed,
            exact
        );
        report.event_divergences.push(Divergence {
            index,
            timestamp: event.timestamp,
            kind,
        });
    }

    report.terminal_divergences = diff_terminal(
        &ledger.terminal_state(),
        &reference.terminal_state(),
        tolerance,
    );
    for d in &report.terminal_divergences {
        log::warn!(
            "terminal {:?}/{} off by {} scaled units",
            d.user,
            d.field,
            d.difference
        );
    }
    report
}

/// Field-by-field diff of two terminal states, keeping what the tolerance
/// rejects.
pub fn diff_terminal(
    ledger: &TerminalState,
    reference: &TerminalState,
    tolerance: &Tolerance,
) -> Vec<TerminalDivergence> {
    let mut out = Vec::new();
    let mut push = |user, field, difference: BigRational| {
        if !tolerance.allows(&difference) {
            out.push(TerminalDivergence {
                user,
                field,
                difference,
            });
        }
    };

    push(
        None,
        "total_deposited",
        &ledger.total_deposited - &reference.total_deposited,
    );
    push(
        None,
        "total_staked",
        &ledger.total_staked - &reference.total_staked,
    );
    push(
        None,
        "total_issued",
        &ledger.total_issued - &reference.total_issued,
    );

    let users = ledger.users.keys().chain(reference.users.keys());
    let mut seen = std::collections::BTreeSet::new();
    for &user in users {
        if !seen.insert(user) {
            continue;
        }
        let zero = BigRational::zero();
        let field = |pick: fn(&crate::model::UserTerminal) -> &BigRational,
                     state: &TerminalState|
         -> BigRational {
            state.users.get(&user).map_or(zero.clone(), |u| pick(u).clone())
        };
        for (name, pick) in [
            ("principal", (|u| &u.principal) as fn(&crate::model::UserTerminal) -> &BigRational),
            ("staked", |u| &u.staked),
            ("unclaimed_reward", |u| &u.unclaimed_reward),
            ("paid_principal", |u| &u.paid_principal),
            ("paid_reward", |u| &u.paid_reward),
        ] {
            push(Some(user), name, field(pick, ledger) - field(pick, reference));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmpool_common::{DecaySchedule, EpochOutcome, EventKind};

    const DAY: u64 = 86_400;

    fn config() -> FarmConfig {
        FarmConfig::new(
            1_000 * SCALE,
            100 * DAY,
            DecaySchedule {
                rate_per_sec: 1_000 * SCALE / (100 * DAY) as u128,
                decay_factor: SCALE,
                decay_period_secs: 100 * DAY,
            },
        )
    }

    fn scripted_log() -> Vec<Event> {
        vec![
            Event::new(0, EventKind::Deposit { user: 1, amount: 1_000 * SCALE }),
            Event::new(10, EventKind::Deposit { user: 2, amount: 3_000 * SCALE }),
            Event::new(DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
            Event::new(
                2 * DAY,
                EventKind::NewEpoch {
                    outcome: EpochOutcome::Multipliers {
                        profit_factor: SCALE + SCALE / 200,
                        survival_factor: SCALE - SCALE / 100,
                    },
                },
            ),
            Event::new(2 * DAY + 100, EventKind::Unstake { user: 1 }),
            Event::new(3 * DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
            Event::new(3 * DAY + 50, EventKind::Withdraw { user: 1 }),
            Event::new(3 * DAY + 60, EventKind::Claim { user: 2 }),
        ]
    }

    #[test]
    fn scripted_log_reconciles_within_dust() {
        let report = replay(config(), 0, &scripted_log(), &Tolerance::nano_token());
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn reward_at_an_empty_first_close_reconciles() {
        // The first close lands before anything is staked; both models
        // must keep the ownerless reward inside the pool totals.
        let events = vec![
            Event::new(0, EventKind::Deposit { user: 1, amount: 1_000 * SCALE }),
            Event::new(
                DAY,
                EventKind::NewEpoch {
                    outcome: EpochOutcome::Absolute {
                        reward: 10 * SCALE,
                        loss: 0,
                    },
                },
            ),
            Event::new(2 * DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
        ];
        let report = replay(config(), 0, &events, &Tolerance::nano_token());
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn matching_rejections_are_not_divergences() {
        let events = vec![
            Event::new(0, EventKind::Withdraw { user: 9 }),
            Event::new(1, EventKind::Deposit { user: 1, amount: SCALE / 2 }),
            Event::new(2, EventKind::EmergencyRecover),
        ];
        let report = replay(config(), 0, &events, &Tolerance::zero());
        assert!(report.is_clean());
        assert_eq!(report.rejections, 3);
    }

    #[test]
    fn zero_tolerance_exposes_truncation_dust() {
        // A 1/3 profit multiplier against a stake with a ragged low digit
        // is not representable in fixed point, so an exact comparison must
        // find dust on the compounded stake.
        let events = vec![
            Event::new(0, EventKind::Deposit { user: 1, amount: 1_000 * SCALE + 7 }),
            Event::new(DAY, EventKind::NewEpoch { outcome: EpochOutcome::NEUTRAL }),
            Event::new(
                2 * DAY,
                EventKind::NewEpoch {
                    outcome: EpochOutcome::Multipliers {
                        profit_factor: SCALE + SCALE / 3,
                        survival_factor: SCALE,
                    },
                },
            ),
        ];
        let strict = replay(config(), 0, &events, &Tolerance::zero());
        assert!(!strict.terminal_divergences.is_empty());
        let lenient = replay(config(), 0, &events, &Tolerance::nano_token());
        assert!(lenient.is_clean(), "{:?}", lenient);
    }
}

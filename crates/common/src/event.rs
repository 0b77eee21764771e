//! The shared event-log format.
//!
//! An event log is an ordered (timestamp-sorted) sequence of typed records;
//! replaying the same log through two independent ledger models is how the
//! reconciler attributes divergence to fixed-point truncation.

use serde::{Deserialize, Serialize};

use crate::math::fixed_mul;

/// Account identity within one ledger instance.
pub type UserId = u32;

/// The external pooled outcome realized at an epoch boundary: either
/// absolute amounts, or multipliers applied to the staked total. The two
/// forms are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochOutcome {
    /// Absolute reward gained and principal lost by the pooled stake.
    Absolute { reward: u128, loss: u128 },
    /// `profit_factor` fixes the stake's net value for the epoch at
    /// `staked * profit_factor`; `survival_factor` splits the change into a
    /// minted reward and a depleted-principal loss. Both 18-decimal fixed
    /// point. A full wipe is `profit_factor == 0`.
    Multipliers {
        profit_factor: u128,
        survival_factor: u128,
    },
}

impl EpochOutcome {
    /// An outcome that leaves the pooled stake untouched.
    pub const NEUTRAL: EpochOutcome = EpochOutcome::Absolute { reward: 0, loss: 0 };

    /// Resolve to absolute `(reward, loss)` against the given staked total.
    /// For multipliers, `reward - loss` always nets to
    /// `staked * profit_factor - staked`.
    pub fn resolve(&self, staked: u128) -> (u128, u128) {
        match *self {
            EpochOutcome::Absolute { reward, loss } => (reward, loss.min(staked)),
            EpochOutcome::Multipliers {
                profit_factor,
                survival_factor,
            } => {
                let after_profit = fixed_mul(staked, profit_factor);
                let after_loss = fixed_mul(staked, survival_factor).min(after_profit);
                (after_profit - after_loss, staked - after_loss.min(staked))
            }
        }
    }
}

/// One replayable ledger event. Externally tagged in JSON so the u128
/// amounts stream through serde without content buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Deposit { user: UserId, amount: u128 },
    Unstake { user: UserId },
    Withdraw { user: UserId },
    UnstakeAndWithdraw { user: UserId, outcome: EpochOutcome },
    Claim { user: UserId },
    NewEpoch { outcome: EpochOutcome },
    EmergencyWithdraw { outcome: EpochOutcome },
    EmergencyRecover,
}

/// An event with its position on the shared clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since ledger construction.
    pub timestamp: u64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(timestamp: u64, kind: EventKind) -> Self {
        Event { timestamp, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::SCALE;

    #[test]
    fn multiplier_outcome_resolves_like_the_generator() {
        let staked = 1000 * SCALE;
        // 0.5% profit, 1% principal loss.
        let outcome = EpochOutcome::Multipliers {
            profit_factor: SCALE + SCALE / 200,
            survival_factor: SCALE - SCALE / 100,
        };
        let (reward, loss) = outcome.resolve(staked);
        assert_eq!(reward, 15 * SCALE);
        assert_eq!(loss, 10 * SCALE);
    }

    #[test]
    fn total_loss_resolves_to_full_principal() {
        let staked = 7 * SCALE;
        let outcome = EpochOutcome::Multipliers {
            profit_factor: 0,
            survival_factor: 0,
        };
        assert_eq!(outcome.resolve(staked), (0, staked));
    }

    #[test]
    fn event_log_round_trips_through_json() {
        let events = vec![
            Event::new(
                0,
                EventKind::Deposit {
                    user: 3,
                    amount: 200 * SCALE,
                },
            ),
            Event::new(
                86_400,
                EventKind::NewEpoch {
                    outcome: EpochOutcome::Absolute {
                        reward: SCALE,
                        loss: 0,
                    },
                },
            ),
            Event::new(86_500, EventKind::EmergencyRecover),
        ];
        let json = serde_json::to_string(&events).unwrap();
        let back: Vec<Event> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, events);
    }
}

//! Per-ledger configuration.
//!
//! One explicit value per ledger instance instead of process-wide
//! constants: the fixed-point scale is compile-time, everything else
//! (minimum deposit, emission schedule) travels with the instance.

use serde::{Deserialize, Serialize};

use crate::decay::DecaySchedule;
use crate::math::SCALE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Hard floor for a single deposit, in scaled units.
    pub min_deposit: u128,
    /// Total reward-token emission cap (`Q`).
    pub reward_total: u128,
    /// Intended distribution period in seconds (`T`).
    pub distribution_secs: u64,
    /// Emission schedule: initial rate, decay factor, decay period.
    pub schedule: DecaySchedule,
}

impl FarmConfig {
    /// A configuration with the standard 1-unit deposit floor.
    pub fn new(reward_total: u128, distribution_secs: u64, schedule: DecaySchedule) -> Self {
        FarmConfig {
            min_deposit: SCALE,
            reward_total,
            distribution_secs,
            schedule,
        }
    }

    /// Cumulative reward-token emission at `now`, capped by the total.
    pub fn emission_at(&self, now: u64) -> u128 {
        crate::decay::cumulative_emission(
            self.schedule.rate_per_sec,
            self.schedule.decay_factor,
            self.schedule.decay_period_secs,
            now,
        )
        .min(self.reward_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_is_capped_at_the_total() {
        // Flat 1-token-per-second schedule that would overshoot after 100s.
        let cfg = FarmConfig::new(
            100 * SCALE,
            100,
            DecaySchedule {
                rate_per_sec: SCALE,
                decay_factor: SCALE,
                decay_period_secs: 100,
            },
        );
        assert_eq!(cfg.emission_at(40), 40 * SCALE);
        assert_eq!(cfg.emission_at(100), 100 * SCALE);
        assert_eq!(cfg.emission_at(100_000), 100 * SCALE);
    }
}

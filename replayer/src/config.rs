//! Replayer configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use farmpool_common::{solve_decay_schedule, FarmConfig, SCALE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the JSON event log to replay
    pub events_path: String,

    /// Total reward-token emission cap, in whole tokens
    pub reward_total_tokens: u64,

    /// Full distribution period in seconds
    pub distribution_secs: u64,

    /// Emission target: this many tokens...
    pub target_tokens: u64,

    /// ...within this many seconds of the start
    pub target_secs: u64,

    /// Length of one decay period in seconds
    pub decay_period_secs: u64,

    /// Reconciliation tolerance in raw scaled units (1e-18 tokens)
    pub tolerance_units: u64,

    /// Ledger construction time on the event clock
    pub start_time: u64,
}

impl Config {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FARMPOOL_REPLAYER_CONFIG")
            .unwrap_or_else(|_| "replayer-config.toml".to_string());

        let config_str = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config file: {}", config_path))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Default configuration: a 100k-token schedule delivering half within
    /// the first quarter of a 100-day distribution.
    pub fn default_local() -> Self {
        Self {
            events_path: "events.json".to_string(),
            reward_total_tokens: 100_000,
            distribution_secs: 100 * 86_400,
            target_tokens: 50_000,
            target_secs: 25 * 86_400,
            decay_period_secs: 86_400,
            tolerance_units: 1_000_000_000, // one nano-token
            start_time: 0,
        }
    }

    /// Solve the emission schedule and assemble the ledger configuration.
    pub fn farm_config(&self) -> Result<FarmConfig> {
        let total = self.reward_total_tokens as u128 * SCALE;
        let schedule = solve_decay_schedule(
            total,
            self.distribution_secs,
            self.target_tokens as u128 * SCALE,
            self.target_secs,
            self.decay_period_secs,
        )
        .context("Emission target is not satisfiable by any decay factor")?;
        Ok(FarmConfig::new(total, self.distribution_secs, schedule))
    }
}

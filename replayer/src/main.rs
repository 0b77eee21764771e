//! Farmpool Replayer
//!
//! Offline tool that replays a recorded event log through the production
//! fixed-point ledger and the exact rational reference model side by side,
//! and reports every payout or terminal balance that diverges beyond the
//! configured tolerance.

mod config;

use anyhow::{Context, Result};
use config::Config;

use farmpool_common::Event;
use farmpool_reconcile::{replay, Tolerance};

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Farmpool Replayer");

    // Load configuration
    let config = Config::load().unwrap_or_else(|_| {
        log::warn!("Failed to load config, using default local config");
        Config::default_local()
    });

    let farm_config = config.farm_config()?;
    log::info!(
        "Emission schedule: {} units/sec, decay factor {}, period {}s",
        farm_config.schedule.rate_per_sec,
        farm_config.schedule.decay_factor,
        farm_config.schedule.decay_period_secs
    );

    let events = load_events(&config.events_path)?;
    log::info!("Loaded {} events from {}", events.len(), config.events_path);

    let tolerance = Tolerance::units(config.tolerance_units as u128);
    let report = replay(farm_config, config.start_time, &events, &tolerance);

    log::info!(
        "Replayed {} events ({} matching rejections)",
        report.events,
        report.rejections
    );

    if report.is_clean() {
        log::info!("Models reconcile within tolerance");
        return Ok(());
    }

    for d in &report.event_divergences {
        log::error!("event {} at t={}: {:?}", d.index, d.timestamp, d.kind);
    }
    for d in &report.terminal_divergences {
        match d.user {
            Some(user) => log::error!(
                "terminal divergence: user {} {} off by {} scaled units",
                user,
                d.field,
                d.difference
            ),
            None => log::error!(
                "terminal divergence: {} off by {} scaled units",
                d.field,
                d.difference
            ),
        }
    }
    anyhow::bail!(
        "{} event and {} terminal divergences",
        report.event_divergences.len(),
        report.terminal_divergences.len()
    )
}

/// Load a timestamp-sorted event log from a JSON file.
fn load_events(path: &str) -> Result<Vec<Event>> {
    let raw = std::fs::read_to_string(path)
        .context(format!("Failed to read event log: {}", path))?;
    let mut events: Vec<Event> =
        serde_json::from_str(&raw).context("Failed to parse event log JSON")?;
    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

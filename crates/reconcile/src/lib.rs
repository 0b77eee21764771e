//! Cross-model reconciliation.
//!
//! Feeds one event log to the production fixed-point ledger and the exact
//! rational reference model, compares every payout and the terminal
//! balances, and attributes any difference beyond a truncation-dust
//! tolerance to a real divergence.

pub mod generate;
pub mod model;
pub mod replay;

pub use generate::*;
pub use model::*;
pub use replay::*;

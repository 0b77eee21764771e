//! Exact-arithmetic reference model.
//!
//! The same eight operations as the production ledger, computed in
//! arbitrary-precision rationals with eager per-account iteration instead
//! of lazy snapshot settlement. Slow and simple on purpose: every payout
//! the production ledger makes must sit within truncation dust of this
//! model's answer.

pub mod emission;
pub mod simulator;

pub use emission::*;
pub use simulator::*;

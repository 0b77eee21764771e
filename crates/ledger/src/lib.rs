//! Production-faithful fixed-point reward ledger.
//!
//! A single-threaded, strictly sequential state machine tracking many
//! depositors' stakes in a pooled yield-bearing position. Stakes compound
//! through a per-epoch profit factor, a decaying secondary reward token
//! accrues continuously to every deposited unit, and per-account balances
//! are settled lazily in O(1) from append-only epoch snapshots.
//!
//! All arithmetic is 18-decimal fixed point; divisions truncate toward
//! zero so rounding dust stays in the pool and never leaks to an account.

pub mod ledger;
pub mod packing;
pub mod settle;
pub mod state;

pub use ledger::*;
pub use packing::*;
pub use state::*;

//! Shared types for the farmpool ledger: fixed-point math, the reward decay
//! schedule solver, the event-log format and the error taxonomy.

pub mod config;
pub mod decay;
pub mod error;
pub mod event;
pub mod math;

pub use config::*;
pub use decay::*;
pub use error::*;
pub use event::*;
pub use math::*;

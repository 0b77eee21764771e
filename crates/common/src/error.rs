//! Error taxonomy shared by every farmpool model.
//!
//! Precondition violations are rejected synchronously and must leave state
//! untouched; `UnsatisfiableSchedule` is fatal to a configuration and is
//! surfaced before any ledger is constructed.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FarmError {
    /// Deposit below the 1-unit floor.
    #[error("minimum deposit is 1 unit")]
    BelowMinimumDeposit,

    /// Unstake requested with no settled stake.
    #[error("nothing to unstake")]
    NothingToUnstake,

    /// Withdraw requested with no withdrawable balance.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// Claim requested with no accrued reward.
    #[error("nothing to claim")]
    NothingToClaim,

    /// Operation attempted in the wrong ledger state (e.g. a new epoch
    /// while suspended, or a recover while running normally).
    #[error("invalid state for operation")]
    InvalidStateForOperation,

    /// The requested emission ratio cannot be met by any decay factor.
    #[error("unsatisfiable decay schedule")]
    UnsatisfiableSchedule,

    /// `unstake_and_withdraw` outcomes must carry a zero reward component.
    /// Rewards only ever arrive via epoch closes; a nonzero reward here is a
    /// caller logic fault, not a recoverable condition.
    #[error("unstake-and-withdraw outcome carries a reward")]
    NonZeroRewardOnUnstakeAndWithdraw,
}

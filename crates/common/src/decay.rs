//! Geometric reward-decay schedule: solves the per-second emission rate and
//! per-period decay factor from a target "deliver Q1 of Q by T1 of T", and
//! evaluates the cumulative emission curve.
//!
//! With rate `R`, factor `F` and decay period `eT`, emission after `n` whole
//! periods is the closed form `R * eT * (1 - F^n) / (1 - F)`; the remainder
//! of a partial period accrues at the fully-decayed rate `R * F^n`.

use std::cmp::Ordering;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::FarmError;
use crate::math::{fixed_pow, SCALE};

/// A solved emission schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecaySchedule {
    /// Tokens emitted per second at the start of the schedule.
    pub rate_per_sec: u128,
    /// Per-period multiplicative decay of the rate, 18-decimal fixed point.
    pub decay_factor: u128,
    /// Length of one decay period in seconds.
    pub decay_period_secs: u64,
}

/// Cumulative tokens emitted after `elapsed_secs`, for rate `rate`, decay
/// factor `factor` and decay period `period_secs`.
pub fn cumulative_emission(rate: u128, factor: u128, period_secs: u64, elapsed_secs: u64) -> u128 {
    if factor == SCALE {
        // No decay: a flat line.
        return rate * elapsed_secs as u128;
    }
    let periods = elapsed_secs / period_secs;
    let f_pow = fixed_pow(factor, periods);
    // Scaled geometric-series sum (1 - F^n) / (1 - F), descaled once after
    // the rate and period are folded in.
    let cum_fraction =
        U256::from(SCALE - f_pow) * U256::from(SCALE) / U256::from(SCALE - factor);
    let whole = U256::from(rate) * cum_fraction * U256::from(period_secs) / U256::from(SCALE);
    let remainder_secs = elapsed_secs - periods * period_secs;
    let partial = U256::from(rate) * U256::from(f_pow) * U256::from(remainder_secs)
        / U256::from(SCALE);
    (whole + partial).low_u128()
}

/// Solve `(rate, factor)` such that roughly `target_amount` of `total` is
/// emitted within `target_secs` of `period_secs`, and the emission over the
/// full period never exceeds `total`.
///
/// Both periods must be positive multiples of `decay_period_secs`, the
/// target strictly inside `(0, total)` x `(0, period_secs)`, and the ratio
/// `target_amount / total` achievable by some factor in `[0, 1)`; anything
/// else is an unsatisfiable schedule.
pub fn solve_decay_schedule(
    total: u128,
    period_secs: u64,
    target_amount: u128,
    target_secs: u64,
    decay_period_secs: u64,
) -> Result<DecaySchedule, FarmError> {
    if total == 0 || target_amount == 0 || target_amount >= total {
        return Err(FarmError::UnsatisfiableSchedule);
    }
    if decay_period_secs == 0
        || target_secs == 0
        || target_secs >= period_secs
        || target_secs % decay_period_secs != 0
        || period_secs % decay_period_secs != 0
    {
        return Err(FarmError::UnsatisfiableSchedule);
    }
    let periods_to_target = target_secs / decay_period_secs;
    let periods_total = period_secs / decay_period_secs;

    // Step 1: binary search the factor making
    //   (1 - F^n) / (1 - F^N) ~ target_amount / total.
    // The left side is monotone non-increasing in F over [0, 1), tending to
    // n/N as F -> 1 and to 1 as F -> 0, which justifies the search. The
    // requested ratio must lie inside that achievable band.
    let (mut lo, mut hi) = (1u128, SCALE - 1);
    let reachable_at_lo =
        ratio_cmp(lo, periods_to_target, periods_total, target_amount, total) != Ordering::Less;
    let reachable_at_hi = ratio_cmp(hi, periods_to_target, periods_total, target_amount, total)
        != Ordering::Greater;
    if !reachable_at_lo || !reachable_at_hi {
        return Err(FarmError::UnsatisfiableSchedule);
    }
    while hi - lo >= 1 {
        let mid = lo + (hi - lo + 1) / 2;
        // Ties favor the larger factor candidate.
        match ratio_cmp(mid, periods_to_target, periods_total, target_amount, total) {
            Ordering::Less => hi = mid - 1,
            _ => lo = mid,
        }
    }
    let factor = lo;

    // Step 2: largest rate whose full-period emission stays within `total`.
    let (mut lo, mut hi) = (1u128, total);
    while hi - lo >= 1 {
        let mid = lo + (hi - lo + 1) / 2;
        if cumulative_emission(mid, factor, decay_period_secs, period_secs) > total {
            hi = mid - 1;
        } else {
            lo = mid;
        }
    }

    Ok(DecaySchedule {
        rate_per_sec: lo,
        decay_factor: factor,
        decay_period_secs,
    })
}

/// Compares `(1 - f^n) / (1 - f^N)` against `target / total` exactly, by
/// cross-multiplication over 256 bits.
fn ratio_cmp(f: u128, n: u64, big_n: u64, target: u128, total: u128) -> Ordering {
    let num = SCALE - fixed_pow(f, n);
    let den = SCALE - fixed_pow(f, big_n);
    (U256::from(num) * U256::from(total)).cmp(&(U256::from(den) * U256::from(target)))
}

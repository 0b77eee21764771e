//! Exact cumulative emission of the decaying reward schedule.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use farmpool_common::{DecaySchedule, SCALE};

fn ratio(n: u128, d: u128) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

/// Cumulative emission at `elapsed_secs`, uncapped, as an exact rational
/// in scaled units. The rate holds for one decay period, then multiplies
/// by the factor:
///
/// `R * period * (1 - f^n) / (1 - f) + R * f^n * (elapsed - n * period)`
///
/// with `n` the number of whole periods elapsed and `f` the decay factor
/// as a rational. A factor of one degenerates to the flat `R * elapsed`.
pub fn exact_emission(schedule: &DecaySchedule, elapsed_secs: u64) -> BigRational {
    let rate = ratio(schedule.rate_per_sec, 1);
    if schedule.decay_factor >= SCALE || schedule.decay_period_secs == 0 {
        return rate * BigRational::from_integer(BigInt::from(elapsed_secs));
    }
    let f = ratio(schedule.decay_factor, SCALE);
    let n = elapsed_secs / schedule.decay_period_secs;
    let remainder = elapsed_secs - n * schedule.decay_period_secs;

    let f_n = pow_ratio(&f, n);
    let period = BigRational::from_integer(BigInt::from(schedule.decay_period_secs));
    let whole = &rate * period * (BigRational::one() - &f_n)
        / (BigRational::one() - &f);
    let partial = rate * f_n * BigRational::from_integer(BigInt::from(remainder));
    whole + partial
}

/// Emission capped at the configured total.
pub fn exact_capped_emission(
    schedule: &DecaySchedule,
    reward_total: u128,
    elapsed_secs: u64,
) -> BigRational {
    let cap = BigRational::from_integer(BigInt::from(reward_total));
    exact_emission(schedule, elapsed_secs).min(cap)
}

fn pow_ratio(base: &BigRational, mut exponent: u64) -> BigRational {
    let mut result = BigRational::one();
    let mut acc = base.clone();
    while exponent > 0 {
        if exponent & 1 == 1 {
            result *= &acc;
        }
        exponent >>= 1;
        if exponent > 0 {
            acc = &acc * &acc;
        }
    }
    result
}

/// Convert a scaled-unit rational down to u128 units, truncating.
pub fn to_units(value: &BigRational) -> u128 {
    let trunc = value.to_integer();
    if trunc < BigInt::zero() {
        return 0;
    }
    let (_, digits) = trunc.to_u64_digits();
    match digits.len() {
        0 => 0,
        1 => digits[0] as u128,
        2 => (digits[1] as u128) << 64 | digits[0] as u128,
        _ => u128::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_schedule_is_linear() {
        let schedule = DecaySchedule {
            rate_per_sec: 3 * SCALE,
            decay_factor: SCALE,
            decay_period_secs: 100,
        };
        assert_eq!(
            exact_emission(&schedule, 50),
            BigRational::from_integer(BigInt::from(150u32) * BigInt::from(SCALE))
        );
    }

    #[test]
    fn halving_schedule_sums_the_series() {
        // 100/sec for 10s, halving each period: 1000 + 500 + 250 = 1750.
        let schedule = DecaySchedule {
            rate_per_sec: 100 * SCALE,
            decay_factor: SCALE / 2,
            decay_period_secs: 10,
        };
        assert_eq!(
            exact_emission(&schedule, 30),
            BigRational::from_integer(BigInt::from(1750u32) * BigInt::from(SCALE))
        );
    }

    #[test]
    fn partial_period_accrues_at_the_current_rate() {
        let schedule = DecaySchedule {
            rate_per_sec: 100 * SCALE,
            decay_factor: SCALE / 2,
            decay_period_secs: 10,
        };
        // One full period plus 4s at the halved rate: 1000 + 200.
        assert_eq!(
            exact_emission(&schedule, 14),
            BigRational::from_integer(BigInt::from(1200u32) * BigInt::from(SCALE))
        );
    }

    #[test]
    fn cap_applies() {
        let schedule = DecaySchedule {
            rate_per_sec: SCALE,
            decay_factor: SCALE,
            decay_period_secs: 1,
        };
        assert_eq!(
            exact_capped_emission(&schedule, 10 * SCALE, 1_000),
            BigRational::from_integer(BigInt::from(10u32) * BigInt::from(SCALE))
        );
    }

    #[test]
    fn unit_truncation() {
        assert_eq!(to_units(&ratio(7 * SCALE + 999, 1)), 7 * SCALE + 999);
        assert_eq!(to_units(&ratio(5, 2)), 2);
        assert_eq!(to_units(&BigRational::zero()), 0);
    }
}

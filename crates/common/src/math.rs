//! 18-decimal fixed-point primitives.
//!
//! All monetary quantities are unsigned integers scaled by `SCALE` (10^18).
//! Multiplication rounds half-up and goes through a 256-bit intermediate so
//! products of supply-cap-sized amounts cannot overflow; every division in
//! the ledger truncates toward zero, which keeps rounding dust in the pool.

use primitive_types::U256;

/// Fixed-point scaling factor ("1 unit" = 10^18).
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Exponent ceiling for [`fixed_pow`]; larger exponents are clamped so the
/// squaring loop stays bounded.
pub const MAX_POW_EXPONENT: u64 = 500_000_000;

/// Fixed-point multiply with round-half-up: `(x*y + SCALE/2) / SCALE`.
pub fn fixed_mul(x: u128, y: u128) -> u128 {
    let wide = U256::from(x) * U256::from(y) + U256::from(SCALE / 2);
    let out = wide / U256::from(SCALE);
    // Products of in-range amounts (< 2^128 * 10^18) always fit back in u128
    // after descaling.
    out.low_u128()
}

/// `base^exponent` for an 18-decimal base and integer exponent, by repeated
/// squaring over [`fixed_mul`].
pub fn fixed_pow(base: u128, exponent: u64) -> u128 {
    let mut n = exponent.min(MAX_POW_EXPONENT);
    if n == 0 {
        return SCALE;
    }
    let mut x = base;
    let mut y = SCALE;
    while n > 1 {
        if n % 2 == 0 {
            x = fixed_mul(x, x);
            n /= 2;
        } else {
            y = fixed_mul(x, y);
            x = fixed_mul(x, x);
            n = (n - 1) / 2;
        }
    }
    fixed_mul(x, y)
}

/// `amount * numerator / denominator` over a 256-bit intermediate,
/// truncating toward zero. Returns 0 when the denominator is zero.
pub fn mul_div(amount: u128, numerator: u128, denominator: u128) -> u128 {
    if denominator == 0 {
        return 0;
    }
    let wide = U256::from(amount) * U256::from(numerator) / U256::from(denominator);
    wide.low_u128()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_mul_rounds_half_up() {
        assert_eq!(fixed_mul(SCALE, SCALE), SCALE);
        assert_eq!(fixed_mul(3, SCALE / 2), 2); // 1.5 rounds up
        assert_eq!(fixed_mul(1, SCALE / 2 - 1), 0);
        assert_eq!(fixed_mul(0, SCALE), 0);
    }

    #[test]
    fn fixed_mul_supply_cap_no_overflow() {
        // 10^9 tokens of 10^18 precision squared needs ~180 bits.
        let cap = 1_000_000_000 * SCALE;
        assert_eq!(fixed_mul(cap, SCALE), cap);
        assert_eq!(fixed_mul(cap, 2 * SCALE), 2 * cap);
    }

    #[test]
    fn fixed_pow_identities() {
        assert_eq!(fixed_pow(SCALE / 2, 0), SCALE);
        assert_eq!(fixed_pow(SCALE / 2, 1), SCALE / 2);
        assert_eq!(fixed_pow(SCALE, 1_000_000), SCALE);
        // 0.5^2 = 0.25
        assert_eq!(fixed_pow(SCALE / 2, 2), SCALE / 4);
    }

    #[test]
    fn fixed_pow_underflows_to_zero() {
        assert_eq!(fixed_pow(SCALE / 2, 1000), 0);
    }

    #[test]
    fn fixed_pow_clamps_huge_exponents() {
        // A base one unit under SCALE loses ~1e-18 per multiply, so at the
        // clamp the result sits just below SCALE rather than at zero.
        let clamped = fixed_pow(SCALE - 1, u64::MAX);
        assert_eq!(clamped, fixed_pow(SCALE - 1, MAX_POW_EXPONENT));
        assert!(clamped < SCALE);
        assert!(clamped > SCALE - 10 * MAX_POW_EXPONENT as u128);
    }

    #[test]
    fn mul_div_truncates() {
        assert_eq!(mul_div(10, 1, 3), 3);
        assert_eq!(mul_div(10, 0, 3), 0);
        assert_eq!(mul_div(10, 1, 0), 0);
    }

    proptest::proptest! {
        #[test]
        fn fixed_mul_within_half_unit_of_exact(
            x in 0u128..1_000_000_000 * SCALE,
            y in 0u128..10 * SCALE,
        ) {
            // |fixed_mul(x, y) - x*y/SCALE| <= 1/2, checked in wide math.
            let exact2 = U256::from(x) * U256::from(y) * U256::from(2u8) / U256::from(SCALE);
            let got2 = U256::from(fixed_mul(x, y)) * U256::from(2u8);
            let diff = if got2 > exact2 { got2 - exact2 } else { exact2 - got2 };
            proptest::prop_assert!(diff <= U256::one());
        }

        #[test]
        fn mul_div_is_the_floor(
            amount in 0u128..1_000_000_000 * SCALE,
            num in 0u128..10 * SCALE,
            den in 1u128..10 * SCALE,
        ) {
            let q = U256::from(mul_div(amount, num, den));
            let product = U256::from(amount) * U256::from(num);
            proptest::prop_assert!(q * U256::from(den) <= product);
            proptest::prop_assert!((q + U256::one()) * U256::from(den) > product);
        }
    }
}

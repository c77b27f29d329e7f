//! AMM Calculator
//!
//! Integer-exact swap math for constant-product pools (x * y = k) and the
//! basis-point metrics derived from quotes. All intermediates run in
//! `BigUint` so products of two `u128` amounts never overflow; every
//! division floors exactly like the on-chain arithmetic unless the name
//! says `ceil`.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use swapline_core::Amount;

use crate::constants::fees::{BPS_DENOMINATOR, MAX_POOL_FEE_BPS};
use crate::state::CurveError;

fn big(v: u128) -> BigUint {
    BigUint::from(v)
}

fn to_amount(v: BigUint) -> Result<Amount, CurveError> {
    v.to_u128().ok_or(CurveError::Overflow)
}

/// `floor(a * b / d)`, `None` on overflow or a zero divisor
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    (big(a) * big(b) / big(d)).to_u128()
}

/// `ceil(a * b / d)`, `None` on overflow or a zero divisor
pub fn mul_div_ceil(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    let d = big(d);
    let product = big(a) * big(b);
    let q = (&product + &d - 1u32) / d;
    q.to_u128()
}

/// Input left after the pool fee: `floor(amount * (10000 - fee) / 10000)`
pub fn amount_after_fee(amount_in: Amount, fee_bps: u32) -> Result<Amount, CurveError> {
    if fee_bps > BPS_DENOMINATOR {
        return Err(CurveError::InvalidFee(fee_bps));
    }
    let keep = (BPS_DENOMINATOR - fee_bps) as u128;
    mul_div(amount_in, keep, BPS_DENOMINATOR as u128).ok_or(CurveError::Overflow)
}

/// Exact-in output of a constant-product pool
///
/// Formula: out = reserve_out - floor(reserve_in * reserve_out / (reserve_in + after_fee))
pub fn calculate_output(
    reserve_in: Amount,
    reserve_out: Amount,
    amount_in: Amount,
    fee_bps: u32,
) -> Result<Amount, CurveError> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(CurveError::NoLiquidity);
    }
    if amount_in == 0 {
        return Err(CurveError::ZeroAmount);
    }
    let after_fee = amount_after_fee(amount_in, fee_bps)?;
    if after_fee == 0 {
        return Err(CurveError::ZeroOutput);
    }

    let k = big(reserve_in) * big(reserve_out);
    let remaining = k / (big(reserve_in) + big(after_fee));
    // remaining < reserve_out always holds since after_fee > 0
    if remaining.is_zero() {
        return Err(CurveError::InsufficientLiquidity);
    }
    to_amount(big(reserve_out) - remaining)
}

/// Exact-out input of a constant-product pool: the smallest `amount_in`
/// for which [`calculate_output`] yields at least `amount_out`.
///
/// Formula: net = floor(k / (reserve_out - amount_out + 1)) + 1 - reserve_in,
/// then in = ceil(net * 10000 / (10000 - fee))
pub fn calculate_input(
    reserve_in: Amount,
    reserve_out: Amount,
    amount_out: Amount,
    fee_bps: u32,
) -> Result<Amount, CurveError> {
    if reserve_in == 0 || reserve_out == 0 {
        return Err(CurveError::NoLiquidity);
    }
    if amount_out == 0 {
        return Err(CurveError::ZeroAmount);
    }
    if amount_out >= reserve_out {
        return Err(CurveError::InsufficientLiquidity);
    }
    if fee_bps > MAX_POOL_FEE_BPS {
        return Err(CurveError::InvalidFee(fee_bps));
    }

    let k = big(reserve_in) * big(reserve_out);
    let divisor = big(reserve_out - amount_out + 1);
    let net = k / divisor + 1u32 - big(reserve_in);

    let keep = big((BPS_DENOMINATOR - fee_bps) as u128);
    let gross = (net * BPS_DENOMINATOR + &keep - 1u32) / keep;
    to_amount(gross)
}

/// Decimal price of `amount_out / amount_in`, for display only
pub fn calculate_price(amount_in: Amount, amount_out: Amount) -> f64 {
    if amount_in == 0 {
        return 0.0;
    }
    amount_out as f64 / amount_in as f64
}

/// Price impact in bps of a trade relative to a small reference trade on the
/// same route. Never negative.
///
/// Formula: (ref_out * in - out * ref_in) * 10000 / (ref_out * in)
pub fn calculate_price_impact_bps(
    reference_in: Amount,
    reference_out: Amount,
    amount_in: Amount,
    amount_out: Amount,
) -> u32 {
    let reference_rate = big(reference_out) * big(amount_in);
    let rate = big(amount_out) * big(reference_in);
    if reference_rate.is_zero() || rate >= reference_rate {
        return 0;
    }
    let bps = (reference_rate.clone() - rate) * BPS_DENOMINATOR / reference_rate;
    bps.to_u32().unwrap_or(u32::MAX)
}

/// Spread in bps between a forward trade and the inverse-direction trade
///
/// With forward = out / in and reverse = rev_out / rev_in:
/// |forward - 1/reverse| / forward * 10000 = |out * rev_out - in * rev_in| * 10000 / (out * rev_out)
pub fn calculate_spread_bps(
    amount_in: Amount,
    amount_out: Amount,
    reverse_in: Amount,
    reverse_out: Amount,
) -> u32 {
    let forward = big(amount_out) * big(reverse_out);
    let inverse = big(amount_in) * big(reverse_in);
    if forward.is_zero() {
        return 0;
    }
    let diff = if forward >= inverse {
        &forward - &inverse
    } else {
        &inverse - &forward
    };
    (diff * BPS_DENOMINATOR / forward)
        .to_u32()
        .unwrap_or(u32::MAX)
}

/// Apply slippage tolerance to an output amount (floors)
pub fn apply_slippage(output: Amount, slippage_bps: u32) -> Amount {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps) as u128;
    mul_div(output, keep, BPS_DENOMINATOR as u128).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // 1,000,000 USDC (6 decimals) against 2,000 WBNB (18 decimals)
    const USDC_RESERVE: Amount = 1_000_000_000_000;
    const WBNB_RESERVE: Amount = 2_000_000_000_000_000_000_000;

    #[test]
    fn test_golden_usdc_wbnb_swap() {
        // 1,000 USDC in at 25 bps: 997.5 USDC after the fee
        assert_eq!(amount_after_fee(1_000_000_000, 25).unwrap(), 997_500_000);
        let out = calculate_output(USDC_RESERVE, WBNB_RESERVE, 1_000_000_000, 25).unwrap();
        assert_eq!(out, 1_993_011_970_559_367_032);
    }

    #[test]
    fn test_golden_whole_units() {
        // Whole-unit reserves: 997.5 floors to 997, 2e9 / 1000997 floors to 1998
        let out = calculate_output(1_000_000, 2_000, 1_000, 25).unwrap();
        assert_eq!(out, 2);
    }

    #[test]
    fn test_golden_exact_out_inverse() {
        let amount_in =
            calculate_input(USDC_RESERVE, WBNB_RESERVE, 1_993_011_970_559_367_032, 25).unwrap();
        assert_eq!(amount_in, 1_000_000_000);
    }

    #[test]
    fn test_errors() {
        assert_eq!(calculate_output(0, 10, 5, 30), Err(CurveError::NoLiquidity));
        assert_eq!(calculate_output(10, 0, 5, 30), Err(CurveError::NoLiquidity));
        assert_eq!(calculate_output(10, 10, 0, 30), Err(CurveError::ZeroAmount));
        assert_eq!(calculate_output(1_000, 1_000, 1, 30), Err(CurveError::ZeroOutput));
        assert_eq!(calculate_input(1_000, 1_000, 1_000, 30), Err(CurveError::InsufficientLiquidity));
        assert_eq!(calculate_input(1_000, 1_000, 2_000, 30), Err(CurveError::InsufficientLiquidity));
        assert_eq!(calculate_input(0, 1_000, 10, 30), Err(CurveError::NoLiquidity));
    }

    #[test]
    fn test_price_impact() {
        // Reference 10 -> 20 (rate 2.0), trade 100 -> 180 (rate 1.8): 10%
        assert_eq!(calculate_price_impact_bps(10, 20, 100, 180), 1_000);
        // Better than reference clamps to zero
        assert_eq!(calculate_price_impact_bps(10, 20, 100, 250), 0);
    }

    #[test]
    fn test_spread() {
        // forward 2.0; reverse 0.5 -> no spread
        assert_eq!(calculate_spread_bps(100, 200, 200, 100), 0);
        // forward 2.0; reverse 0.45 -> 1/0.45 = 2.222.. -> 1111 bps
        assert_eq!(calculate_spread_bps(100, 200, 200, 90), 1_111);
    }

    #[test]
    fn test_apply_slippage() {
        assert_eq!(apply_slippage(1_000, 50), 995);
        assert_eq!(apply_slippage(1_000, 20_000), 0);
    }

    #[test]
    fn test_mul_div_ceil() {
        assert_eq!(mul_div_ceil(10, 3, 4), Some(8));
        assert_eq!(mul_div_ceil(8, 1, 4), Some(2));
        assert_eq!(mul_div(u128::MAX, 2, 1), None);
        assert_eq!(mul_div(1, 1, 0), None);
    }

    proptest! {
        #[test]
        fn prop_output_bounded(
            reserve_in in 1_000u128..1_000_000_000_000_000_000_000,
            reserve_out in 1_000u128..1_000_000_000_000_000_000_000,
            amount_in in 1_000u128..1_000_000_000_000_000_000_000,
            fee in 0u32..1_000,
        ) {
            if let Ok(out) = calculate_output(reserve_in, reserve_out, amount_in, fee) {
                prop_assert!(out > 0);
                prop_assert!(out < reserve_out);
            }
        }

        #[test]
        fn prop_output_increasing_in_amount(
            reserve in 1_000_000_000u128..1_000_000_000_000_000_000,
            amount in 1_000_000u128..1_000_000_000_000,
        ) {
            let small = calculate_output(reserve, reserve, amount, 30).unwrap();
            let large = calculate_output(reserve, reserve, amount * 2, 30).unwrap();
            prop_assert!(large > small);
        }

        #[test]
        fn prop_output_decreasing_in_fee(
            reserve in 1_000_000_000_000u128..1_000_000_000_000_000_000,
            amount in 1_000_000_000u128..1_000_000_000_000,
            fee in 0u32..5_000,
        ) {
            let cheap = calculate_output(reserve, reserve, amount, fee).unwrap();
            let dear = calculate_output(reserve, reserve, amount, fee + 100).unwrap();
            prop_assert!(cheap > dear);
        }

        #[test]
        fn prop_round_trip_not_profitable(
            reserve_in in 1_000_000u128..1_000_000_000_000_000_000_000,
            reserve_out in 1_000_000u128..1_000_000_000_000_000_000_000,
            amount_in in 1_000u128..1_000_000_000_000_000,
            fee in 0u32..1_000,
        ) {
            if let Ok(out) = calculate_output(reserve_in, reserve_out, amount_in, fee) {
                let back = calculate_input(reserve_in, reserve_out, out, fee).unwrap();
                prop_assert!(back <= amount_in);
                // and the minimal input really buys the output
                prop_assert!(calculate_output(reserve_in, reserve_out, back, fee).unwrap() >= out);
            }
        }
    }
}

//! Tick Math
//!
//! Square-root price arithmetic for concentrated-liquidity pools. Prices are
//! Q64.96 fixed-point values of `sqrt(token1 / token0)` stored in `u128`;
//! intermediates use `BigUint` so `liquidity << 96` times a price is exact.
//! Rounding always favors the pool: inputs round up, outputs round down.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

pub use chain_client::sqrt_price::{amount0_delta, amount1_delta};
use chain_client::sqrt_price::{self, div_ceil};

use crate::constants::fees::{BPS_DENOMINATOR, MAX_POOL_FEE_BPS};
use crate::constants::ticks::{MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, RESOLUTION};
use crate::state::CurveError;

fn to_u128(v: BigUint) -> Result<u128, CurveError> {
    v.to_u128().ok_or(CurveError::Overflow)
}

/// `sqrt(1.0001^tick) * 2^96`, rounded up
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<u128, CurveError> {
    sqrt_price::sqrt_ratio_at_tick(tick).ok_or(CurveError::TickOutOfRange(tick))
}

/// Greatest tick whose square-root price is at most `sqrt_price_x96`
pub fn tick_at_sqrt_ratio(sqrt_price_x96: u128) -> Result<i32, CurveError> {
    if !(MIN_SQRT_RATIO..=MAX_SQRT_RATIO).contains(&sqrt_price_x96) {
        return Err(CurveError::PriceOutOfRange(sqrt_price_x96));
    }
    let (mut lo, mut hi) = (MIN_TICK, MAX_TICK);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}

fn next_from_amount0_rounding_up(
    sqrt_price: u128,
    liquidity: u128,
    amount: u128,
    add: bool,
) -> Result<u128, CurveError> {
    if amount == 0 {
        return Ok(sqrt_price);
    }
    if liquidity == 0 {
        return Err(CurveError::InsufficientLiquidity);
    }
    let numerator = BigUint::from(liquidity) << RESOLUTION;
    let product = BigUint::from(amount) * sqrt_price;
    let denominator = if add {
        &numerator + product
    } else {
        if product >= numerator {
            return Err(CurveError::InsufficientLiquidity);
        }
        &numerator - product
    };
    to_u128(div_ceil(numerator * sqrt_price, &denominator))
}

fn next_from_amount1_rounding_down(
    sqrt_price: u128,
    liquidity: u128,
    amount: u128,
    add: bool,
) -> Result<u128, CurveError> {
    if liquidity == 0 {
        return Err(CurveError::InsufficientLiquidity);
    }
    let shifted = BigUint::from(amount) << RESOLUTION;
    let liquidity = BigUint::from(liquidity);
    if add {
        to_u128(BigUint::from(sqrt_price) + shifted / liquidity)
    } else {
        let quotient = div_ceil(shifted, &liquidity);
        let current = BigUint::from(sqrt_price);
        if current <= quotient {
            return Err(CurveError::InsufficientLiquidity);
        }
        to_u128(current - quotient)
    }
}

/// Price after adding `amount_in` of the input token
pub fn next_sqrt_price_from_input(
    sqrt_price: u128,
    liquidity: u128,
    amount_in: u128,
    zero_for_one: bool,
) -> Result<u128, CurveError> {
    if zero_for_one {
        next_from_amount0_rounding_up(sqrt_price, liquidity, amount_in, true)
    } else {
        next_from_amount1_rounding_down(sqrt_price, liquidity, amount_in, true)
    }
}

/// Price after removing `amount_out` of the output token
pub fn next_sqrt_price_from_output(
    sqrt_price: u128,
    liquidity: u128,
    amount_out: u128,
    zero_for_one: bool,
) -> Result<u128, CurveError> {
    if zero_for_one {
        next_from_amount1_rounding_down(sqrt_price, liquidity, amount_out, false)
    } else {
        next_from_amount0_rounding_up(sqrt_price, liquidity, amount_out, false)
    }
}

/// One slice of a swap within a single tick range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next: u128,
    pub amount_in: u128,
    pub amount_out: u128,
    pub fee_amount: u128,
}

/// Swap within one range, from `current` toward `target`, until either the
/// target is reached or `remaining` is used up. `remaining` is the input
/// (fee included) for exact-in and the output still owed for exact-out.
pub fn compute_swap_step(
    current: u128,
    target: u128,
    liquidity: u128,
    remaining: u128,
    exact_in: bool,
    fee_bps: u32,
) -> Result<SwapStep, CurveError> {
    if fee_bps > MAX_POOL_FEE_BPS {
        return Err(CurveError::InvalidFee(fee_bps));
    }
    let zero_for_one = current >= target;
    let keep = (BPS_DENOMINATOR - fee_bps) as u128;

    let (sqrt_price_next, max_amount) = if exact_in {
        let less_fee = BigUint::from(remaining) * keep / BPS_DENOMINATOR;
        let amount_in_max = if zero_for_one {
            amount0_delta(target, current, liquidity, true)
        } else {
            amount1_delta(current, target, liquidity, true)
        };
        let next = if less_fee >= amount_in_max {
            target
        } else {
            next_sqrt_price_from_input(current, liquidity, to_u128(less_fee)?, zero_for_one)?
        };
        (next, amount_in_max)
    } else {
        let amount_out_max = if zero_for_one {
            amount1_delta(target, current, liquidity, false)
        } else {
            amount0_delta(current, target, liquidity, false)
        };
        let next = if BigUint::from(remaining) >= amount_out_max {
            target
        } else {
            next_sqrt_price_from_output(current, liquidity, remaining, zero_for_one)?
        };
        (next, amount_out_max)
    };

    let reached = sqrt_price_next == target;
    let (amount_in, mut amount_out) = if zero_for_one {
        (
            if reached && exact_in {
                max_amount.clone()
            } else {
                amount0_delta(sqrt_price_next, current, liquidity, true)
            },
            if reached && !exact_in {
                max_amount
            } else {
                amount1_delta(sqrt_price_next, current, liquidity, false)
            },
        )
    } else {
        (
            if reached && exact_in {
                max_amount.clone()
            } else {
                amount1_delta(current, sqrt_price_next, liquidity, true)
            },
            if reached && !exact_in {
                max_amount
            } else {
                amount0_delta(current, sqrt_price_next, liquidity, false)
            },
        )
    };

    if !exact_in && amount_out > BigUint::from(remaining) {
        amount_out = BigUint::from(remaining);
    }
    let amount_in = to_u128(amount_in)?;
    let amount_out = to_u128(amount_out)?;

    let fee_amount = if exact_in && !reached {
        // The whole remainder is spent; what the price move did not use is fee.
        remaining.checked_sub(amount_in).ok_or(CurveError::Overflow)?
    } else {
        let fee = div_ceil(BigUint::from(amount_in) * fee_bps, &BigUint::from(keep));
        to_u128(fee)?
    };

    Ok(SwapStep {
        sqrt_price_next,
        amount_in,
        amount_out,
        fee_amount,
    })
}

//! Concentrated-Liquidity Swap Simulation
//!
//! Fills a swap one tick range at a time: starting at the pool's current
//! square-root price, consume the liquidity active in the current range,
//! cross into the next initialized tick, and repeat. Each range crossed (or
//! partially used) is one slice.

use chain_client::ConcentratedState;
use swapline_core::Amount;

use crate::constants::ticks::{MAX_SQRT_RATIO, MIN_SQRT_RATIO};
use crate::state::{CurveError, SwapMode};
use crate::tick_math::{compute_swap_step, sqrt_ratio_at_tick, tick_at_sqrt_ratio};

/// Swap parameters for one concentrated-liquidity hop
#[derive(Debug, Clone, Copy)]
pub struct CrossingParams {
    pub zero_for_one: bool,
    pub amount: Amount,
    pub mode: SwapMode,
    /// Price the swap may not move past; hitting it before the fill
    /// completes is an error rather than a partial fill
    pub sqrt_price_limit: Option<u128>,
    pub max_slices: usize,
}

/// Outcome of walking the tick ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingSwap {
    pub amount_in: Amount,
    pub amount_out: Amount,
    pub fee_paid: Amount,
    pub sqrt_price_x96: u128,
    pub tick: i32,
    pub liquidity: u128,
    pub slices: usize,
}

impl CrossingSwap {
    /// Write the post-swap price, tick, and active liquidity into `state`.
    pub fn apply(&self, state: &mut ConcentratedState) {
        state.sqrt_price_x96 = self.sqrt_price_x96;
        state.tick = self.tick;
        state.liquidity = self.liquidity;
    }
}

fn cross_tick(liquidity: u128, liquidity_net: i128, zero_for_one: bool) -> Result<u128, CurveError> {
    // Moving down exits the range the tick opened.
    let delta = if zero_for_one {
        liquidity_net.checked_neg().ok_or(CurveError::Overflow)?
    } else {
        liquidity_net
    };
    let next = if delta >= 0 {
        liquidity.checked_add(delta.unsigned_abs())
    } else {
        liquidity.checked_sub(delta.unsigned_abs())
    };
    next.ok_or(CurveError::InsufficientLiquidity)
}

pub fn simulate_swap(
    state: &ConcentratedState,
    fee_bps: u32,
    params: &CrossingParams,
) -> Result<CrossingSwap, CurveError> {
    if params.amount == 0 {
        return Err(CurveError::ZeroAmount);
    }
    if state.is_empty() {
        return Err(CurveError::NoLiquidity);
    }
    // The tick cursor walks by position
    if !state.is_sorted() {
        return Err(CurveError::UnsortedTicks);
    }
    let zero_for_one = params.zero_for_one;
    let exact_in = params.mode == SwapMode::ExactIn;
    let start = state.sqrt_price_x96;
    if !(MIN_SQRT_RATIO..MAX_SQRT_RATIO).contains(&start) {
        return Err(CurveError::PriceOutOfRange(start));
    }

    let limit = match params.sqrt_price_limit {
        Some(limit) => {
            let valid = if zero_for_one {
                limit < start && limit > MIN_SQRT_RATIO
            } else {
                limit > start && limit < MAX_SQRT_RATIO
            };
            if !valid {
                return Err(CurveError::PriceLimitReached);
            }
            limit
        }
        None if zero_for_one => MIN_SQRT_RATIO + 1,
        None => MAX_SQRT_RATIO - 1,
    };

    let ticks = &state.ticks;
    let mut cursor = if zero_for_one {
        ticks.iter().rposition(|t| t.index <= state.tick)
    } else {
        ticks.iter().position(|t| t.index > state.tick)
    };

    let mut remaining = params.amount;
    let mut calculated: Amount = 0;
    let mut fee_paid: Amount = 0;
    let mut sqrt_price = start;
    let mut tick = state.tick;
    let mut liquidity = state.liquidity;
    let mut slices = 0usize;

    while remaining > 0 {
        if sqrt_price == limit {
            return Err(if params.sqrt_price_limit.is_some() {
                CurveError::PriceLimitReached
            } else {
                CurveError::InsufficientLiquidity
            });
        }
        let next_tick = cursor.map(|i| ticks[i]);
        if next_tick.is_none() && liquidity == 0 {
            return Err(CurveError::InsufficientLiquidity);
        }

        slices += 1;
        if slices > params.max_slices {
            return Err(CurveError::TooManySlices(params.max_slices));
        }

        let tick_price = match next_tick {
            Some(t) => sqrt_ratio_at_tick(t.index)?,
            None if zero_for_one => MIN_SQRT_RATIO,
            None => MAX_SQRT_RATIO,
        };
        let target = if zero_for_one {
            tick_price.max(limit)
        } else {
            tick_price.min(limit)
        };

        let step = compute_swap_step(sqrt_price, target, liquidity, remaining, exact_in, fee_bps)?;
        sqrt_price = step.sqrt_price_next;
        fee_paid = fee_paid.checked_add(step.fee_amount).ok_or(CurveError::Overflow)?;
        if exact_in {
            let spent = step.amount_in + step.fee_amount;
            remaining = remaining.checked_sub(spent).ok_or(CurveError::Overflow)?;
            calculated = calculated.checked_add(step.amount_out).ok_or(CurveError::Overflow)?;
        } else {
            remaining = remaining.checked_sub(step.amount_out).ok_or(CurveError::Overflow)?;
            calculated = calculated
                .checked_add(step.amount_in + step.fee_amount)
                .ok_or(CurveError::Overflow)?;
        }

        match next_tick {
            Some(t) if sqrt_price == tick_price => {
                liquidity = cross_tick(liquidity, t.liquidity_net, zero_for_one)?;
                tick = if zero_for_one { t.index - 1 } else { t.index };
                cursor = if zero_for_one {
                    cursor.and_then(|i| i.checked_sub(1))
                } else {
                    cursor.map(|i| i + 1).filter(|&i| i < ticks.len())
                };
            }
            _ => tick = tick_at_sqrt_ratio(sqrt_price)?,
        }
    }

    let (amount_in, amount_out) = if exact_in {
        (params.amount, calculated)
    } else {
        (calculated, params.amount)
    };
    if amount_out == 0 {
        return Err(CurveError::ZeroOutput);
    }

    Ok(CrossingSwap {
        amount_in,
        amount_out,
        fee_paid,
        sqrt_price_x96: sqrt_price,
        tick,
        liquidity,
        slices,
    })
}

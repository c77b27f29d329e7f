//! Square-root price primitives
//!
//! Q64.96 prices of `sqrt(token1 / token0)` and the token amounts a range of
//! liquidity spans between two prices. The ledger uses them to fund
//! concentrated-liquidity pools; the swap math builds on the same functions.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

pub const MIN_TICK: i32 = -887_272;

/// Highest tick whose square-root price still fits in a `u128`
pub const MAX_TICK: i32 = 443_636;

/// `sqrt_ratio_at_tick(MIN_TICK)`
pub const MIN_SQRT_RATIO: u128 = 4_295_128_739;

/// `sqrt_ratio_at_tick(MAX_TICK)`
pub const MAX_SQRT_RATIO: u128 = 340_275_971_719_517_849_884_101_479_065_584_693_834;

/// Fractional bits of a Q64.96 price
pub const RESOLUTION: u32 = 96;

/// Magic multipliers: entry `i` is `2^128 / sqrt(1.0001^(2^(i+1)))`,
/// indexed by the bits of `|tick|` above bit 0.
const TICK_RATIO_STEPS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// Multiplier applied when bit 0 of `|tick|` is set
const TICK_RATIO_ODD: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

pub fn div_ceil(n: BigUint, d: &BigUint) -> BigUint {
    (n + d - 1u32) / d
}

/// `sqrt(1.0001^tick) * 2^96`, rounded up. `None` outside `[MIN_TICK, MAX_TICK]`.
pub fn sqrt_ratio_at_tick(tick: i32) -> Option<u128> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return None;
    }
    let abs = tick.unsigned_abs();

    let mut ratio = if abs & 1 != 0 {
        BigUint::from(TICK_RATIO_ODD)
    } else {
        BigUint::one() << 128u32
    };
    for (bit, multiplier) in TICK_RATIO_STEPS {
        if abs & bit != 0 {
            ratio = (ratio * multiplier) >> 128u32;
        }
    }
    if tick > 0 {
        let max = (BigUint::one() << 256u32) - 1u32;
        ratio = max / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let remainder_mask = (BigUint::one() << 32u32) - 1u32;
    let round = if (&ratio & remainder_mask).is_zero() { 0u32 } else { 1u32 };
    ((ratio >> 32u32) + round).to_u128()
}

/// token0 needed to move between two prices with `liquidity` active
pub fn amount0_delta(sqrt_a: u128, sqrt_b: u128, liquidity: u128, round_up: bool) -> BigUint {
    let (lower, upper) = if sqrt_a <= sqrt_b {
        (sqrt_a, sqrt_b)
    } else {
        (sqrt_b, sqrt_a)
    };
    if lower == 0 {
        return BigUint::zero();
    }
    let numerator = (BigUint::from(liquidity) << RESOLUTION) * (upper - lower);
    let (lower, upper) = (BigUint::from(lower), BigUint::from(upper));
    if round_up {
        div_ceil(div_ceil(numerator, &upper), &lower)
    } else {
        numerator / upper / lower
    }
}

/// token1 needed to move between two prices with `liquidity` active
pub fn amount1_delta(sqrt_a: u128, sqrt_b: u128, liquidity: u128, round_up: bool) -> BigUint {
    let diff = sqrt_a.abs_diff(sqrt_b);
    let product = BigUint::from(liquidity) * diff;
    if round_up {
        div_ceil(product, &(BigUint::one() << RESOLUTION))
    } else {
        product >> RESOLUTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_match_constants() {
        assert_eq!(sqrt_ratio_at_tick(0), Some(1 << 96));
        assert_eq!(sqrt_ratio_at_tick(MIN_TICK), Some(MIN_SQRT_RATIO));
        assert_eq!(sqrt_ratio_at_tick(MAX_TICK), Some(MAX_SQRT_RATIO));
        assert_eq!(sqrt_ratio_at_tick(MAX_TICK + 1), None);
    }

    #[test]
    fn test_deltas_split_additively() {
        let liquidity = 1_000_000_000_000_000_000u128;
        let (a, c) = (sqrt_ratio_at_tick(-600).unwrap(), sqrt_ratio_at_tick(600).unwrap());
        let b = 1u128 << 96;
        let whole = amount1_delta(a, c, liquidity, true);
        let parts = amount1_delta(a, b, liquidity, false) + amount1_delta(b, c, liquidity, false);
        assert!(parts <= whole);

        let whole = amount0_delta(a, c, liquidity, true);
        let parts = amount0_delta(a, b, liquidity, false) + amount0_delta(b, c, liquidity, false);
        assert!(parts <= whole);
    }
}

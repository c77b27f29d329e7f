//! Pool state snapshots
//!
//! A snapshot is a read-only view of one liquidity contract at one block.
//! The ledger owns the live copy; adapters only ever see clones.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use swapline_core::{Address, Amount};

use crate::sqrt_price::{amount0_delta, amount1_delta, sqrt_ratio_at_tick, MAX_SQRT_RATIO, MIN_SQRT_RATIO};

/// Liquidity-source design of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// V2-style `x · y = k` pools
    ConstantProduct,
    /// V3/Algebra-style tick-ranged pools
    ConcentratedLiquidity,
}

impl PoolKind {
    pub const ALL: [PoolKind; 2] = [PoolKind::ConstantProduct, PoolKind::ConcentratedLiquidity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConstantProduct => "constant_product",
            Self::ConcentratedLiquidity => "concentrated_liquidity",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An initialized tick boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInfo {
    pub index: i32,
    /// Liquidity added when the price crosses this tick moving up
    /// (subtracted when moving down)
    pub liquidity_net: i128,
}

/// Concentrated-liquidity pool state. Ticks are sorted on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawConcentratedState")]
pub struct ConcentratedState {
    /// Current √(token1/token0) price as a Q64.96 fixed-point number
    pub sqrt_price_x96: u128,
    /// Current tick
    pub tick: i32,
    /// Liquidity active in the current tick range
    pub liquidity: u128,
    /// Initialized ticks, sorted ascending by index
    pub ticks: Vec<TickInfo>,
}

impl ConcentratedState {
    /// Sort ticks and drop duplicates, keeping the first occurrence.
    pub fn normalize(&mut self) {
        self.ticks.sort_by_key(|t| t.index);
        self.ticks.dedup_by_key(|t| t.index);
    }

    pub fn is_sorted(&self) -> bool {
        self.ticks.windows(2).all(|w| w[0].index < w[1].index)
    }

    /// True when no range holds liquidity at all
    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.ticks.iter().all(|t| t.liquidity_net == 0)
    }

    /// `(token0, token1)` the pool must hold to back every range, rounded up.
    /// Ranges above the current price hold token0, ranges below hold token1.
    /// `None` if a tick is out of range or the nets drive liquidity negative.
    /// Expects sorted ticks.
    pub fn locked_amounts(&self) -> Option<(Amount, Amount)> {
        let mut amount0 = BigUint::zero();
        let mut liquidity = self.liquidity;
        let mut lower = self.sqrt_price_x96;
        for t in self.ticks.iter().filter(|t| t.index > self.tick) {
            let upper = sqrt_ratio_at_tick(t.index)?.max(lower);
            amount0 += amount0_delta(lower, upper, liquidity, true);
            liquidity = liquidity.checked_add_signed(t.liquidity_net)?;
            lower = upper;
        }
        if liquidity > 0 {
            amount0 += amount0_delta(lower, MAX_SQRT_RATIO, liquidity, true);
        }

        let mut amount1 = BigUint::zero();
        let mut liquidity = self.liquidity;
        let mut upper = self.sqrt_price_x96;
        for t in self.ticks.iter().rev().filter(|t| t.index <= self.tick) {
            let lower = sqrt_ratio_at_tick(t.index)?.min(upper);
            amount1 += amount1_delta(lower, upper, liquidity, true);
            liquidity = liquidity.checked_add_signed(t.liquidity_net.checked_neg()?)?;
            upper = lower;
        }
        if liquidity > 0 {
            amount1 += amount1_delta(MIN_SQRT_RATIO, upper, liquidity, true);
        }

        Some((amount0.to_u128()?, amount1.to_u128()?))
    }
}

#[derive(Deserialize)]
struct RawConcentratedState {
    sqrt_price_x96: u128,
    tick: i32,
    liquidity: u128,
    #[serde(default)]
    ticks: Vec<TickInfo>,
}

impl From<RawConcentratedState> for ConcentratedState {
    fn from(raw: RawConcentratedState) -> Self {
        let mut state = ConcentratedState {
            sqrt_price_x96: raw.sqrt_price_x96,
            tick: raw.tick,
            liquidity: raw.liquidity,
            ticks: raw.ticks,
        };
        state.normalize();
        state
    }
}

/// Liquidity state by pool design
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolLiquidity {
    ConstantProduct { reserve0: Amount, reserve1: Amount },
    ConcentratedLiquidity(ConcentratedState),
}

/// Pool state at a given block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub address: Address,
    /// Ordered pair: `token0 < token1`
    pub token0: Address,
    pub token1: Address,
    /// Swap fee tier in basis points
    pub fee_bps: u32,
    pub liquidity: PoolLiquidity,
}

impl PoolSnapshot {
    /// Build a constant-product snapshot, ordering the pair.
    pub fn constant_product(
        address: Address,
        (token_a, reserve_a): (Address, Amount),
        (token_b, reserve_b): (Address, Amount),
        fee_bps: u32,
    ) -> Self {
        let (token0, reserve0, token1, reserve1) = if token_a <= token_b {
            (token_a, reserve_a, token_b, reserve_b)
        } else {
            (token_b, reserve_b, token_a, reserve_a)
        };
        Self {
            address,
            token0,
            token1,
            fee_bps,
            liquidity: PoolLiquidity::ConstantProduct { reserve0, reserve1 },
        }
    }

    /// Build a concentrated-liquidity snapshot. `token0` must sort before
    /// `token1`; the price is expressed as token1 per token0.
    pub fn concentrated(
        address: Address,
        token0: Address,
        token1: Address,
        fee_bps: u32,
        mut state: ConcentratedState,
    ) -> Self {
        state.normalize();
        Self {
            address,
            token0,
            token1,
            fee_bps,
            liquidity: PoolLiquidity::ConcentratedLiquidity(state),
        }
    }

    pub fn kind(&self) -> PoolKind {
        match self.liquidity {
            PoolLiquidity::ConstantProduct { .. } => PoolKind::ConstantProduct,
            PoolLiquidity::ConcentratedLiquidity(_) => PoolKind::ConcentratedLiquidity,
        }
    }

    pub fn has_token(&self, token: &Address) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// True if the pool trades exactly this pair, in either order
    pub fn trades_pair(&self, token_a: &Address, token_b: &Address) -> bool {
        token_a != token_b && self.has_token(token_a) && self.has_token(token_b)
    }

    /// Whether selling `token_in` moves the pool from token0 to token1
    pub fn zero_for_one(&self, token_in: &Address) -> bool {
        self.token0 == *token_in
    }

    /// `(reserve_in, reserve_out)` for a constant-product pool
    pub fn reserves_for(&self, token_in: &Address) -> Option<(Amount, Amount)> {
        match self.liquidity {
            PoolLiquidity::ConstantProduct { reserve0, reserve1 } => {
                if self.token0 == *token_in {
                    Some((reserve0, reserve1))
                } else if self.token1 == *token_in {
                    Some((reserve1, reserve0))
                } else {
                    None
                }
            }
            PoolLiquidity::ConcentratedLiquidity(_) => None,
        }
    }

    /// Zero discoverable liquidity: routes through this pool are pruned
    pub fn is_empty(&self) -> bool {
        match &self.liquidity {
            PoolLiquidity::ConstantProduct { reserve0, reserve1 } => {
                *reserve0 == 0 || *reserve1 == 0
            }
            PoolLiquidity::ConcentratedLiquidity(state) => state.is_empty(),
        }
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.liquidity {
            PoolLiquidity::ConstantProduct { reserve0, reserve1 } => write!(
                f,
                "CP Pool {} | {}: {} | {}: {}",
                self.address.short(),
                self.token0.short(),
                reserve0,
                self.token1.short(),
                reserve1
            ),
            PoolLiquidity::ConcentratedLiquidity(state) => write!(
                f,
                "CL Pool {} | tick {} | L {}",
                self.address.short(),
                state.tick,
                state.liquidity
            ),
        }
    }
}

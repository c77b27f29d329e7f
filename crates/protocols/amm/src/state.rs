//! AMM State Types
//!
//! Routes, quotes, swap requests and the errors raised by pool math.

use std::collections::HashSet;
use std::fmt;

use chain_client::PoolKind;
use serde::{Deserialize, Serialize};
use swapline_core::constants::{BPS_DENOMINATOR, MAX_BPS};
use swapline_core::{Address, Amount, BlockHeight, ChainId, FeeSide, RouterError};
use thiserror::Error;

use crate::calculator::{mul_div, mul_div_ceil};
use crate::constants::ticks::{MAX_SQRT_RATIO, MIN_SQRT_RATIO};

/// Which side of the trade the caller fixes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapMode {
    #[default]
    ExactIn,
    ExactOut,
}

/// One pool traversal within a route
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    pub kind: PoolKind,
    pub pool: Address,
    pub token_in: Address,
    pub token_out: Address,
}

impl Hop {
    /// The same pool traversed the other way
    pub fn reversed(&self) -> Self {
        Self {
            kind: self.kind,
            pool: self.pool.clone(),
            token_in: self.token_out.clone(),
            token_out: self.token_in.clone(),
        }
    }
}

/// Ordered, chained sequence of hops. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RouteParts")]
pub struct Route {
    hops: Vec<Hop>,
}

#[derive(Deserialize)]
struct RouteParts {
    hops: Vec<Hop>,
}

impl TryFrom<RouteParts> for Route {
    type Error = RouterError;

    fn try_from(parts: RouteParts) -> Result<Self, Self::Error> {
        Route::new(parts.hops)
    }
}

impl Route {
    /// Build a route, checking that hops chain and no pool repeats.
    pub fn new(hops: Vec<Hop>) -> Result<Self, RouterError> {
        if hops.is_empty() {
            return Err(RouterError::invalid_route("route has no hops"));
        }
        let mut seen = HashSet::with_capacity(hops.len());
        for (i, hop) in hops.iter().enumerate() {
            if hop.token_in == hop.token_out {
                return Err(RouterError::invalid_route(format!(
                    "hop {} swaps {} into itself",
                    i, hop.token_in
                )));
            }
            if !seen.insert(&hop.pool) {
                return Err(RouterError::invalid_route(format!(
                    "pool {} used twice",
                    hop.pool
                )));
            }
            if let Some(next) = hops.get(i + 1) {
                if hop.token_out != next.token_in {
                    return Err(RouterError::invalid_route(format!(
                        "hop {} outputs {} but hop {} takes {}",
                        i,
                        hop.token_out,
                        i + 1,
                        next.token_in
                    )));
                }
            }
        }
        Ok(Self { hops })
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn token_in(&self) -> &Address {
        &self.hops[0].token_in
    }

    pub fn token_out(&self) -> &Address {
        &self.hops[self.hops.len() - 1].token_out
    }

    /// Pool addresses in traversal order; the identity used for dedup and tie-breaks
    pub fn pool_sequence(&self) -> Vec<Address> {
        self.hops.iter().map(|h| h.pool.clone()).collect()
    }

    pub fn uses_pool(&self, pool: &Address) -> bool {
        self.hops.iter().any(|h| h.pool == *pool)
    }

    /// The route walked backwards, from `token_out` to `token_in`
    pub fn reversed(&self) -> Self {
        Self {
            hops: self.hops.iter().rev().map(Hop::reversed).collect(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token_in().short())?;
        for hop in &self.hops {
            write!(f, " -[{}]-> {}", hop.pool.short(), hop.token_out.short())?;
        }
        Ok(())
    }
}

/// Result of running one hop through its pool's math
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopQuote {
    pub pool: Address,
    pub amount_in: Amount,
    pub amount_out: Amount,
    /// Pool fee charged on this hop, in the hop's input token
    pub pool_fee: Amount,
    pub zero_for_one: bool,
    /// Square-root price after the hop (concentrated-liquidity pools only)
    pub sqrt_price_after: Option<u128>,
    /// Tick ranges consumed (1 for constant-product pools)
    pub slices: usize,
}

/// Off-chain quote request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub chain_id: ChainId,
    pub token_in: Address,
    pub token_out: Address,
    /// Input for exact-in, desired output for exact-out
    pub amount: Amount,
    #[serde(default)]
    pub mode: SwapMode,
    /// Override for `RoutingConfig::allow_partial_sources`
    #[serde(default)]
    pub allow_partial: Option<bool>,
}

/// Best route with its amounts and price metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub route: Route,
    pub mode: SwapMode,
    /// Gross amount the caller pays, protocol fee included
    pub amount_in: Amount,
    /// Net amount the recipient receives, protocol fee excluded
    pub amount_out: Amount,
    pub protocol_fee: Amount,
    pub fee_side: FeeSide,
    pub hops: Vec<HopQuote>,
    /// Output per unit of input at the requested size
    pub forward_price: f64,
    /// Output per unit of input for the inverse direction
    pub reverse_price: f64,
    pub spread_bps: u32,
    pub price_impact_bps: u32,
    pub block_height: BlockHeight,
    pub quoted_at_ms: u64,
    pub expires_at_ms: u64,
    /// Pools left out because their state could not be fetched
    #[serde(default)]
    pub excluded_pools: Vec<Address>,
}

/// Caller-facing limits enforced by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapBounds {
    ExactIn {
        amount_in: Amount,
        min_amount_out: Amount,
    },
    ExactOut {
        amount_out: Amount,
        max_amount_in: Amount,
    },
}

impl Quote {
    /// Past its validity window and must be re-derived before use
    pub fn is_stale(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Built while some pools were unreachable
    pub fn is_degraded(&self) -> bool {
        !self.excluded_pools.is_empty()
    }

    /// Execution bounds for a given tolerance. Exact-in floors the minimum
    /// output; exact-out ceils the maximum input.
    pub fn bounds(&self, max_slippage_bps: u32) -> Result<SwapBounds, RouterError> {
        if max_slippage_bps > MAX_BPS {
            return Err(RouterError::invalid_amount(format!(
                "slippage {} bps exceeds {}",
                max_slippage_bps, MAX_BPS
            )));
        }
        let denom = BPS_DENOMINATOR as Amount;
        let bps = max_slippage_bps as Amount;
        Ok(match self.mode {
            SwapMode::ExactIn => SwapBounds::ExactIn {
                amount_in: self.amount_in,
                min_amount_out: mul_div(self.amount_out, denom - bps, denom).unwrap_or(0),
            },
            SwapMode::ExactOut => SwapBounds::ExactOut {
                amount_out: self.amount_out,
                max_amount_in: mul_div_ceil(self.amount_in, denom + bps, denom)
                    .unwrap_or(Amount::MAX),
            },
        })
    }

    /// Per-hop square-root price guards: each concentrated-liquidity hop may
    /// end at most `max_slippage_bps` past the quoted ending price.
    pub fn sqrt_price_limits(&self, max_slippage_bps: u32) -> Vec<Option<u128>> {
        let denom = BPS_DENOMINATOR as u128;
        let bps = max_slippage_bps.min(MAX_BPS) as u128;
        self.hops
            .iter()
            .map(|hop| {
                hop.sqrt_price_after.map(|end| {
                    let limit = if hop.zero_for_one {
                        mul_div(end, denom - bps, denom).unwrap_or(MIN_SQRT_RATIO)
                    } else {
                        mul_div_ceil(end, denom + bps, denom).unwrap_or(MAX_SQRT_RATIO)
                    };
                    limit.clamp(MIN_SQRT_RATIO + 1, MAX_SQRT_RATIO - 1)
                })
            })
            .collect()
    }
}

/// Failure inside a single pool's math, before it is tied to a pool address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("Pool has no liquidity")]
    NoLiquidity,

    #[error("Insufficient liquidity for swap")]
    InsufficientLiquidity,

    #[error("Amount must be positive")]
    ZeroAmount,

    #[error("Amount too small to produce any output")]
    ZeroOutput,

    #[error("Fee tier {0} bps out of range")]
    InvalidFee(u32),

    #[error("Tick {0} out of range")]
    TickOutOfRange(i32),

    #[error("Square-root price {0} out of range")]
    PriceOutOfRange(u128),

    #[error("Square-root price limit reached")]
    PriceLimitReached,

    #[error("More than {0} tick slices needed")]
    TooManySlices(usize),

    #[error("Initialized ticks are not sorted")]
    UnsortedTicks,

    #[error("Arithmetic overflow")]
    Overflow,
}

impl CurveError {
    /// Attach the pool address and map into the router taxonomy.
    pub fn at_pool(self, pool: &Address) -> RouterError {
        match self {
            Self::NoLiquidity => RouterError::NoLiquidity { pool: pool.clone() },
            Self::InsufficientLiquidity => RouterError::InsufficientLiquidity { pool: pool.clone() },
            Self::TooManySlices(max_slices) => RouterError::PathTooComplex {
                pool: pool.clone(),
                max_slices,
            },
            Self::ZeroAmount
            | Self::ZeroOutput
            | Self::InvalidFee(_)
            | Self::PriceLimitReached
            | Self::Overflow => RouterError::invalid_amount(format!("pool {}: {}", pool, self)),
            Self::TickOutOfRange(_) | Self::PriceOutOfRange(_) | Self::UnsortedTicks => {
                RouterError::config(format!("pool {}: {}", pool, self))
            }
        }
    }
}

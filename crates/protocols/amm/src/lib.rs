//! AMM Routing Engine
//!
//! Discovers routes across constant-product and concentrated-liquidity
//! pools, quotes them with integer-exact pool math, and executes the chosen
//! route atomically with protocol-fee settlement.

pub mod adapter;
pub mod calculator;
pub mod concentrated;
pub mod constants;
pub mod executor;
pub mod fees;
pub mod fetch;
pub mod paths;
pub mod quote;
pub mod state;
pub mod tick_math;

// Re-exports
pub use adapter::{
    Adapter, AdapterRegistry, ConcentratedLiquidityAdapter, ConstantProductAdapter, SharedRegistry,
};
pub use calculator::{
    calculate_input, calculate_output, calculate_price, calculate_price_impact_bps,
    calculate_spread_bps,
};
pub use concentrated::{simulate_swap, CrossingParams, CrossingSwap};
pub use executor::{ExecutionRequest, ExecutionState, SwapReceipt, SwapRouter};
pub use fees::{gross_for_net, split_fee, FeeModule, FeeSchedule, FeeSplit};
pub use fetch::{fetch_pool_states, FetchedPools};
pub use paths::{prune_illiquid, CandidateRoutes, PathFinder};
pub use quote::{evaluate_route, now_ms, QuoteEngine, RouteEvaluation};
pub use state::{CurveError, Hop, HopQuote, Quote, QuoteRequest, Route, SwapBounds, SwapMode};

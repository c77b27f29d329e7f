//! AMM Constants
//!
//! Fee denominators and concentrated-liquidity price bounds.

/// Fee constants
pub mod fees {
    pub use swapline_core::constants::BPS_DENOMINATOR;

    /// Highest pool fee tier a curve accepts (the whole input would be fee)
    pub const MAX_POOL_FEE_BPS: u32 = BPS_DENOMINATOR - 1;
}

/// Tick and square-root price bounds for concentrated-liquidity pools
pub mod ticks {
    pub use chain_client::sqrt_price::{
        MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, RESOLUTION,
    };
}

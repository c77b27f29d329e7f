//! Data Transfer Objects for API requests and responses
//!
//! Token amounts travel as decimal strings: raw `u128` values do not fit a
//! JSON number on most clients.

use amm::{ExecutionState, HopQuote, Quote, Route, SwapMode, SwapReceipt};
use serde::{Deserialize, Serialize};
use swapline_core::{Address, Amount, BlockHeight, FeeSide, RouterError};

/// Serialize an [`Amount`] as a decimal string.
pub mod amount_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use swapline_core::Amount;

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", raw, e)))
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub chain_id: u64,
    pub block_height: BlockHeight,
}

impl HealthResponse {
    pub fn new(chain_id: u64, block_height: BlockHeight) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            chain_id,
            block_height,
        }
    }
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}

impl From<&RouterError> for ApiError {
    fn from(err: &RouterError) -> Self {
        Self::new(err.error_code(), err.to_string())
    }
}

/// POST /quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteApiRequest {
    pub chain_id: u64,
    pub token_in: Address,
    pub token_out: Address,
    #[serde(with = "amount_str")]
    pub amount: Amount,
    #[serde(default)]
    pub mode: SwapMode,
    #[serde(default)]
    pub allow_partial: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopDto {
    pub pool: Address,
    #[serde(with = "amount_str")]
    pub amount_in: Amount,
    #[serde(with = "amount_str")]
    pub amount_out: Amount,
    #[serde(with = "amount_str")]
    pub pool_fee: Amount,
    pub sqrt_price_after: Option<String>,
    pub slices: usize,
}

impl From<&HopQuote> for HopDto {
    fn from(hop: &HopQuote) -> Self {
        Self {
            pool: hop.pool.clone(),
            amount_in: hop.amount_in,
            amount_out: hop.amount_out,
            pool_fee: hop.pool_fee,
            sqrt_price_after: hop.sqrt_price_after.map(|p| p.to_string()),
            slices: hop.slices,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    /// Pass to POST /swap to execute this quote
    pub quote_id: String,
    pub route: Route,
    pub mode: SwapMode,
    #[serde(with = "amount_str")]
    pub amount_in: Amount,
    #[serde(with = "amount_str")]
    pub amount_out: Amount,
    #[serde(with = "amount_str")]
    pub protocol_fee: Amount,
    pub fee_side: FeeSide,
    pub hops: Vec<HopDto>,
    pub forward_price: f64,
    pub reverse_price: f64,
    pub spread_bps: u32,
    pub price_impact_bps: u32,
    pub block_height: BlockHeight,
    pub expires_at_ms: u64,
    pub excluded_pools: Vec<Address>,
    pub degraded: bool,
}

impl QuoteResponse {
    pub fn new(quote_id: String, quote: &Quote) -> Self {
        Self {
            quote_id,
            route: quote.route.clone(),
            mode: quote.mode,
            amount_in: quote.amount_in,
            amount_out: quote.amount_out,
            protocol_fee: quote.protocol_fee,
            fee_side: quote.fee_side,
            hops: quote.hops.iter().map(HopDto::from).collect(),
            forward_price: quote.forward_price,
            reverse_price: quote.reverse_price,
            spread_bps: quote.spread_bps,
            price_impact_bps: quote.price_impact_bps,
            block_height: quote.block_height,
            expires_at_ms: quote.expires_at_ms,
            excluded_pools: quote.excluded_pools.clone(),
            degraded: quote.is_degraded(),
        }
    }
}

/// POST /swap: quote (or reuse a stored quote) and execute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapApiRequest {
    pub caller: Address,
    pub token_in: Address,
    pub token_out: Address,
    #[serde(with = "amount_str")]
    pub amount: Amount,
    #[serde(default)]
    pub mode: SwapMode,
    pub max_slippage_bps: u32,
    pub recipient: Address,
    pub deadline: u64,
    /// Pay with the native asset instead of an approved token
    #[serde(default)]
    pub pay_native: bool,
    /// Quote previously returned by POST /quote
    #[serde(default)]
    pub quote_id: Option<String>,
}

/// POST /execute: the router entry point with explicit bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteApiRequest {
    pub caller: Address,
    pub route: Route,
    #[serde(with = "amount_str")]
    pub amount_in: Amount,
    #[serde(with = "amount_str")]
    pub min_amount_out: Amount,
    pub recipient: Address,
    pub deadline: u64,
    /// Native value attached to the call
    #[serde(default, with = "amount_str")]
    pub value: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapReceiptResponse {
    pub tx_id: String,
    pub route: Route,
    #[serde(with = "amount_str")]
    pub amount_in: Amount,
    #[serde(with = "amount_str")]
    pub amount_out: Amount,
    #[serde(with = "amount_str")]
    pub fee: Amount,
    pub fee_side: FeeSide,
    pub fee_token: Address,
    pub hops: Vec<HopDto>,
    pub transitions: Vec<ExecutionState>,
    pub block_height: BlockHeight,
}

impl From<SwapReceipt> for SwapReceiptResponse {
    fn from(receipt: SwapReceipt) -> Self {
        Self {
            tx_id: receipt.tx_id.to_string(),
            hops: receipt.hops.iter().map(HopDto::from).collect(),
            route: receipt.route,
            amount_in: receipt.amount_in,
            amount_out: receipt.amount_out,
            fee: receipt.fee.fee,
            fee_side: receipt.fee_side,
            fee_token: receipt.fee_token,
            transitions: receipt.transitions,
            block_height: receipt.block_height,
        }
    }
}

/// POST /admin/fee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetFeeRequest {
    pub caller: Address,
    pub bps: u32,
    pub treasury: Address,
}

/// POST /admin/adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAdaptersRequest {
    pub caller: Address,
    pub concentrated_liquidity: Address,
    pub constant_product: Address,
    /// Defaults to the configured slice cap
    #[serde(default)]
    pub max_slices: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub ok: bool,
}

/// GET /fees/accrued/:token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccruedFeesResponse {
    pub token: Address,
    #[serde(with = "amount_str")]
    pub amount: Amount,
}

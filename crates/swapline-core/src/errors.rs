//! Error types for Swapline

use thiserror::Error;

use crate::types::{Address, Amount};

/// Core errors that can occur in Swapline
#[derive(Debug, Error)]
pub enum Error {
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Chain data provider and ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Pool {pool} unreachable: {reason}")]
    Unreachable { pool: Address, reason: String },

    #[error("Request timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Pool not found: {pool}")]
    PoolNotFound { pool: Address },

    #[error("Insufficient balance of {token} for {owner}: need {required}, have {available}")]
    InsufficientBalance {
        token: Address,
        owner: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Insufficient allowance of {token} from {owner} to {spender}: need {required}, have {available}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Transfer of {token} to {to} rejected")]
    TransferRejected { token: Address, to: Address },
}

/// Routing, quoting and execution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("Configuration error: {reason}")]
    ConfigurationError { reason: String },

    #[error("Pool {pool} has no liquidity")]
    NoLiquidity { pool: Address },

    #[error("Insufficient liquidity in pool {pool}")]
    InsufficientLiquidity { pool: Address },

    #[error("Swap through pool {pool} needs more than {max_slices} tick slices")]
    PathTooComplex { pool: Address, max_slices: usize },

    #[error("No viable route: {reason}")]
    LiquidityUnavailable { reason: String },

    #[error("Slippage exceeded: realized {realized}, bound {bound}")]
    SlippageExceeded { realized: Amount, bound: Amount },

    #[error("Deadline {deadline} expired (block time {now})")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("Caller {caller} is not authorized")]
    Unauthorized { caller: Address },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Invalid route: {message}")]
    InvalidRoute { message: String },

    #[error("Quote cancelled")]
    Cancelled,

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Result type alias for Swapline operations
pub type Result<T> = std::result::Result<T, Error>;

impl RouterError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            reason: reason.into(),
        }
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }

    pub fn invalid_route(message: impl Into<String>) -> Self {
        Self::InvalidRoute {
            message: message.into(),
        }
    }

    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigurationError { .. } => "configuration_error",
            Self::NoLiquidity { .. } => "no_liquidity",
            Self::InsufficientLiquidity { .. } => "insufficient_liquidity",
            Self::PathTooComplex { .. } => "path_too_complex",
            Self::LiquidityUnavailable { .. } => "liquidity_unavailable",
            Self::SlippageExceeded { .. } => "slippage_exceeded",
            Self::DeadlineExpired { .. } => "deadline_expired",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InvalidRoute { .. } => "invalid_route",
            Self::Cancelled => "cancelled",
            Self::Chain(ChainError::InsufficientBalance { .. }) => "insufficient_balance",
            Self::Chain(ChainError::InsufficientAllowance { .. }) => "insufficient_allowance",
            Self::Chain(ChainError::TransferRejected { .. }) => "transfer_rejected",
            Self::Chain(ChainError::PoolNotFound { .. }) => "pool_not_found",
            Self::Chain(_) => "chain_unavailable",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount { .. } | Self::InvalidRoute { .. } => 400,
            Self::Unauthorized { .. } => 403,
            Self::Chain(ChainError::PoolNotFound { .. }) => 404,
            Self::DeadlineExpired { .. } | Self::SlippageExceeded { .. } => 409,
            Self::NoLiquidity { .. }
            | Self::InsufficientLiquidity { .. }
            | Self::PathTooComplex { .. } => 422,
            Self::Chain(ChainError::InsufficientBalance { .. })
            | Self::Chain(ChainError::InsufficientAllowance { .. })
            | Self::Chain(ChainError::TransferRejected { .. }) => 422,
            Self::Cancelled => 499,
            Self::ConfigurationError { .. } => 500,
            Self::LiquidityUnavailable { .. } | Self::Chain(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_error_codes() {
        let err = RouterError::SlippageExceeded {
            realized: 98,
            bound: 100,
        };
        assert_eq!(err.error_code(), "slippage_exceeded");
        assert_eq!(err.status_code(), 409);

        let err = RouterError::Unauthorized {
            caller: Address::repeat_byte(9),
        };
        assert_eq!(err.error_code(), "unauthorized");
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_chain_errors_keep_precise_code() {
        let err: RouterError = ChainError::InsufficientAllowance {
            token: Address::repeat_byte(1),
            owner: Address::repeat_byte(2),
            spender: Address::repeat_byte(3),
            required: 10,
            available: 0,
        }
        .into();
        assert_eq!(err.error_code(), "insufficient_allowance");

        let err: RouterError = ChainError::Timeout { millis: 50 }.into();
        assert_eq!(err.error_code(), "chain_unavailable");
        assert_eq!(err.status_code(), 503);
    }
}

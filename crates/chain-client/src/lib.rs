//! chain-client: Chain Data Provider capability and in-memory ledger
//!
//! Pool state is read through [`ChainDataProvider`]; execution mutates a
//! [`Ledger`] inside all-or-nothing transactions.

pub mod ledger;
pub mod memory;
pub mod pools;
pub mod provider;
pub mod sqrt_price;

use std::future::Future;
use std::time::Duration;

use swapline_core::ChainError;

pub use ledger::{BlockInfo, Ledger, LedgerState, Transaction};
pub use memory::{AllowanceEntry, BalanceEntry, ChainFixture, Fault, InMemoryChain};
pub use pools::{ConcentratedState, PoolKind, PoolLiquidity, PoolSnapshot, TickInfo};
pub use provider::ChainDataProvider;

/// Result type for chain client operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Wrap a provider call with a timeout. A timeout becomes [`ChainError::Timeout`].
pub async fn timed_request<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ChainError::Timeout {
            millis: timeout.as_millis() as u64,
        })?
}

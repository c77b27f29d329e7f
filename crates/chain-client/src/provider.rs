//! Chain Data Provider capability
//!
//! The quote side only ever reads chain state through this trait, so a
//! JSON-RPC backed implementation can replace the in-memory one without
//! touching the routing code.

use async_trait::async_trait;
use swapline_core::{Address, ChainError};

use crate::ledger::BlockInfo;
use crate::pools::{PoolKind, PoolSnapshot};

#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Latest block
    async fn block(&self) -> Result<BlockInfo, ChainError>;

    /// Pools of `kind` trading `token_a`/`token_b`, sorted by address
    async fn pools_for_pair(
        &self,
        kind: PoolKind,
        token_a: &Address,
        token_b: &Address,
    ) -> Result<Vec<Address>, ChainError>;

    /// Live state of one pool
    async fn pool_state(&self, pool: &Address) -> Result<PoolSnapshot, ChainError>;
}

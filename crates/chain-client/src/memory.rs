//! Ledger-backed Chain Data Provider
//!
//! Serves pool state straight from a [`Ledger`], with optional per-pool
//! faults (unreachable, slow) for exercising degraded quoting.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swapline_core::{Address, Amount, ChainError, Error};
use tokio::sync::RwLock;

use crate::ledger::{BlockInfo, Ledger};
use crate::pools::{PoolKind, PoolSnapshot};
use crate::provider::ChainDataProvider;

/// Simulated failure for one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Unreachable,
    Latency(Duration),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub token: Address,
    pub owner: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceEntry {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// Serializable initial chain state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainFixture {
    #[serde(default)]
    pub block: BlockInfo,
    #[serde(default)]
    pub pools: Vec<PoolSnapshot>,
    /// Extra balances on top of the reserves minted for constant-product pools
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    #[serde(default)]
    pub allowances: Vec<AllowanceEntry>,
}

impl ChainFixture {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// In-memory chain
#[derive(Debug, Clone, Default)]
pub struct InMemoryChain {
    ledger: Ledger,
    faults: Arc<RwLock<HashMap<Address, Fault>>>,
}

impl InMemoryChain {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            faults: Arc::default(),
        }
    }

    pub async fn from_fixture(fixture: ChainFixture) -> Self {
        let ledger = Ledger::new();
        ledger.set_block(fixture.block).await;
        for pool in fixture.pools {
            ledger.add_pool(pool).await;
        }
        for b in fixture.balances {
            ledger.mint(&b.token, &b.owner, b.amount).await;
        }
        for a in fixture.allowances {
            ledger.approve(&a.token, &a.owner, &a.spender, a.amount).await;
        }
        tracing::info!(height = fixture.block.height, "Loaded chain fixture");
        Self::new(ledger)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub async fn set_fault(&self, pool: &Address, fault: Fault) {
        self.faults.write().await.insert(pool.clone(), fault);
    }

    pub async fn clear_fault(&self, pool: &Address) {
        self.faults.write().await.remove(pool);
    }
}

#[async_trait]
impl ChainDataProvider for InMemoryChain {
    async fn block(&self) -> Result<BlockInfo, ChainError> {
        Ok(self.ledger.block().await)
    }

    async fn pools_for_pair(
        &self,
        kind: PoolKind,
        token_a: &Address,
        token_b: &Address,
    ) -> Result<Vec<Address>, ChainError> {
        // Pools are kept in a BTreeMap, so the result is already sorted.
        Ok(self
            .ledger
            .read(|state| {
                state
                    .pools()
                    .filter(|p| p.kind() == kind && p.trades_pair(token_a, token_b))
                    .map(|p| p.address.clone())
                    .collect()
            })
            .await)
    }

    async fn pool_state(&self, pool: &Address) -> Result<PoolSnapshot, ChainError> {
        let fault = self.faults.read().await.get(pool).copied();
        match fault {
            Some(Fault::Unreachable) => {
                return Err(ChainError::Unreachable {
                    pool: pool.clone(),
                    reason: "simulated outage".into(),
                })
            }
            Some(Fault::Latency(delay)) => tokio::time::sleep(delay).await,
            None => {}
        }
        self.ledger.pool(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp_pool(addr: u8, a: u8, b: u8) -> PoolSnapshot {
        PoolSnapshot::constant_product(
            Address::repeat_byte(addr),
            (Address::repeat_byte(a), 1_000),
            (Address::repeat_byte(b), 1_000),
            30,
        )
    }

    #[tokio::test]
    async fn test_pools_for_pair_filters_kind_and_tokens() {
        let chain = InMemoryChain::from_fixture(ChainFixture {
            pools: vec![cp_pool(0xa2, 1, 2), cp_pool(0xa1, 2, 1), cp_pool(0xa3, 1, 3)],
            ..ChainFixture::default()
        })
        .await;

        let (t1, t2) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let found = chain
            .pools_for_pair(PoolKind::ConstantProduct, &t1, &t2)
            .await
            .unwrap();
        assert_eq!(found, vec![Address::repeat_byte(0xa1), Address::repeat_byte(0xa2)]);

        let none = chain
            .pools_for_pair(PoolKind::ConcentratedLiquidity, &t1, &t2)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_fault() {
        let chain = InMemoryChain::from_fixture(ChainFixture {
            pools: vec![cp_pool(0xa1, 1, 2)],
            ..ChainFixture::default()
        })
        .await;
        let pool = Address::repeat_byte(0xa1);

        chain.set_fault(&pool, Fault::Unreachable).await;
        assert!(matches!(
            chain.pool_state(&pool).await,
            Err(ChainError::Unreachable { .. })
        ));

        chain.clear_fault(&pool).await;
        assert!(chain.pool_state(&pool).await.is_ok());
    }

    #[test]
    fn test_fixture_deserialization() {
        let json = r#"{
            "block": {"height": 10, "timestamp": 1700000000},
            "pools": [{
                "address": "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1",
                "token0": "0x0101010101010101010101010101010101010101",
                "token1": "0x0202020202020202020202020202020202020202",
                "fee_bps": 25,
                "liquidity": {"constant_product": {"reserve0": 1000, "reserve1": 2000}}
            }],
            "balances": [{
                "token": "0x0101010101010101010101010101010101010101",
                "owner": "0x0909090909090909090909090909090909090909",
                "amount": 50
            }]
        }"#;
        let fixture: ChainFixture = serde_json::from_str(json).unwrap();
        assert_eq!(fixture.pools.len(), 1);
        assert_eq!(fixture.pools[0].kind(), PoolKind::ConstantProduct);
        assert_eq!(fixture.block.height, 10);
    }
}

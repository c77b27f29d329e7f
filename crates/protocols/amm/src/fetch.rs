//! Pool State Fetching
//!
//! Loads live state for every distinct pool a set of candidate routes
//! touches. Fetches run concurrently, bounded by a worker count, each under
//! its own timeout. A pool that fails or times out is reported as
//! unreachable instead of failing the batch.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chain_client::{timed_request, ChainDataProvider, PoolSnapshot};
use futures::stream::{self, StreamExt};
use swapline_core::Address;

/// Result of one fetch round
#[derive(Debug, Clone, Default)]
pub struct FetchedPools {
    pub pools: HashMap<Address, PoolSnapshot>,
    /// Pools that errored or timed out, sorted
    pub unreachable: Vec<Address>,
}

impl FetchedPools {
    pub fn get(&self, pool: &Address) -> Option<&PoolSnapshot> {
        self.pools.get(pool)
    }
}

/// Fetch every distinct pool in `pools` with at most `max_parallel` requests
/// in flight.
pub async fn fetch_pool_states<'a>(
    provider: &dyn ChainDataProvider,
    pools: impl IntoIterator<Item = &'a Address>,
    timeout: Duration,
    max_parallel: usize,
) -> FetchedPools {
    let distinct: BTreeSet<Address> = pools.into_iter().cloned().collect();
    if distinct.is_empty() {
        return FetchedPools::default();
    }
    let workers = distinct.len().min(max_parallel).max(1);

    let results: Vec<_> = stream::iter(distinct)
        .map(|pool: Address| async move {
            let state = timed_request(timeout, provider.pool_state(&pool)).await;
            (pool, state)
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut fetched = FetchedPools::default();
    for (pool, result) in results {
        match result {
            Ok(snapshot) => {
                fetched.pools.insert(pool, snapshot);
            }
            Err(e) => {
                tracing::warn!(pool = %pool, error = %e, "Excluding unreachable pool");
                fetched.unreachable.push(pool);
            }
        }
    }
    fetched.unreachable.sort();

    tracing::debug!(
        fetched = fetched.pools.len(),
        unreachable = fetched.unreachable.len(),
        workers,
        "Fetched pool states"
    );
    fetched
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_client::{ChainFixture, Fault, InMemoryChain};

    fn pool(addr: u8) -> PoolSnapshot {
        PoolSnapshot::constant_product(
            Address::repeat_byte(addr),
            (Address::repeat_byte(1), 1_000),
            (Address::repeat_byte(2), 1_000),
            30,
        )
    }

    async fn chain() -> InMemoryChain {
        InMemoryChain::from_fixture(ChainFixture {
            pools: vec![pool(0xa1), pool(0xa2), pool(0xa3)],
            ..ChainFixture::default()
        })
        .await
    }

    #[tokio::test]
    async fn test_fetch_dedups_and_collects() {
        let chain = chain().await;
        let wanted = [
            Address::repeat_byte(0xa1),
            Address::repeat_byte(0xa2),
            Address::repeat_byte(0xa1),
        ];
        let fetched = fetch_pool_states(&chain, &wanted, Duration::from_secs(1), 4).await;
        assert_eq!(fetched.pools.len(), 2);
        assert!(fetched.unreachable.is_empty());
        assert!(fetched.get(&Address::repeat_byte(0xa2)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_and_failing_pools_are_excluded() {
        let chain = chain().await;
        chain
            .set_fault(&Address::repeat_byte(0xa2), Fault::Latency(Duration::from_secs(10)))
            .await;
        chain
            .set_fault(&Address::repeat_byte(0xa3), Fault::Unreachable)
            .await;

        let wanted = [
            Address::repeat_byte(0xa1),
            Address::repeat_byte(0xa2),
            Address::repeat_byte(0xa3),
            Address::repeat_byte(0xa4),
        ];
        let fetched = fetch_pool_states(&chain, &wanted, Duration::from_millis(200), 2).await;
        assert_eq!(fetched.pools.len(), 1);
        assert_eq!(
            fetched.unreachable,
            vec![
                Address::repeat_byte(0xa2),
                Address::repeat_byte(0xa3),
                Address::repeat_byte(0xa4)
            ]
        );
    }
}

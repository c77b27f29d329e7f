//! Path Finder
//!
//! Enumerates candidate routes between two tokens:
//!
//! 1. Direct pools for `(token_in, token_out)` of every registered kind
//! 2. Routes through each hub token, one kind choice per hop
//! 3. With `max_hops >= 3`, routes through two distinct hubs
//!
//! Token sequences come from an explicit work queue bounded by `max_hops`,
//! so the search never recurses. Pools for each segment are discovered
//! concurrently; routes are the product of the per-segment pool lists,
//! deduplicated by their ordered pool sequence.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use chain_client::{timed_request, ChainDataProvider, PoolKind, PoolSnapshot};
use futures::stream::{self, StreamExt};
use swapline_core::{Address, RouterError, RoutingConfig};

use crate::state::{Hop, Route};

/// Unordered token pair, stored low-high
type Segment = (Address, Address);

fn segment(a: &Address, b: &Address) -> Segment {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Routes found for one request
#[derive(Debug, Clone, Default)]
pub struct CandidateRoutes {
    pub routes: Vec<Route>,
    /// Segments whose pool discovery failed or timed out
    pub failed_segments: Vec<(Address, Address)>,
}

impl CandidateRoutes {
    /// Distinct pools across all routes
    pub fn pools(&self) -> Vec<&Address> {
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .flat_map(|r| r.hops().iter().map(|h| &h.pool))
            .filter(|p| seen.insert(*p))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PathFinder {
    hub_tokens: Vec<Address>,
    max_hops: usize,
}

impl PathFinder {
    pub fn new(hub_tokens: Vec<Address>, max_hops: usize) -> Self {
        // Hubs are tried in a fixed order regardless of config order
        let mut hub_tokens = hub_tokens;
        hub_tokens.sort();
        hub_tokens.dedup();
        Self {
            hub_tokens,
            max_hops: max_hops.max(1),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(config.hub_tokens.clone(), config.max_hops)
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Token sequences from `token_in` to `token_out`, shortest first.
    pub fn token_paths(&self, token_in: &Address, token_out: &Address) -> Vec<Vec<Address>> {
        let mut complete = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(vec![token_in.clone()]);

        while let Some(path) = queue.pop_front() {
            // hops used so far
            let hops = path.len() - 1;
            if hops >= self.max_hops {
                continue;
            }
            let mut direct = path.clone();
            direct.push(token_out.clone());
            complete.push(direct);

            // A hub only makes sense if one more hop still fits after it.
            if hops + 2 > self.max_hops {
                continue;
            }
            for hub in &self.hub_tokens {
                if hub == token_in || hub == token_out || path.contains(hub) {
                    continue;
                }
                let mut next = path.clone();
                next.push(hub.clone());
                queue.push_back(next);
            }
        }
        complete
    }

    /// Discover pools for every segment of every token path and assemble
    /// candidate routes.
    pub async fn find_routes(
        &self,
        provider: &dyn ChainDataProvider,
        kinds: &[PoolKind],
        token_in: &Address,
        token_out: &Address,
        timeout: Duration,
        max_parallel: usize,
    ) -> Result<CandidateRoutes, RouterError> {
        if token_in == token_out {
            return Err(RouterError::invalid_route("token_in equals token_out"));
        }
        let token_paths = self.token_paths(token_in, token_out);

        let mut segments: Vec<Segment> = token_paths
            .iter()
            .flat_map(|p| p.windows(2).map(|w| segment(&w[0], &w[1])))
            .collect();
        segments.sort();
        segments.dedup();

        let lookups: Vec<(Segment, PoolKind)> = segments
            .iter()
            .flat_map(|s| kinds.iter().map(move |k| (s.clone(), *k)))
            .collect();
        let workers = lookups.len().min(max_parallel).max(1);

        let results: Vec<_> = stream::iter(lookups)
            .map(|(seg, kind)| async move {
                let found = timed_request(timeout, provider.pools_for_pair(kind, &seg.0, &seg.1)).await;
                (seg, kind, found)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut pools_by_segment: BTreeMap<Segment, Vec<(PoolKind, Address)>> = BTreeMap::new();
        let mut failed = Vec::new();
        for (seg, kind, found) in results {
            match found {
                Ok(pools) => pools_by_segment
                    .entry(seg)
                    .or_default()
                    .extend(pools.into_iter().map(|p| (kind, p))),
                Err(e) => {
                    tracing::warn!(
                        token_a = %seg.0,
                        token_b = %seg.1,
                        kind = %kind,
                        error = %e,
                        "Pool discovery failed"
                    );
                    failed.push(seg);
                }
            }
        }
        for pools in pools_by_segment.values_mut() {
            pools.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        }
        failed.sort();
        failed.dedup();

        let routes = assemble_routes(&token_paths, &pools_by_segment);
        tracing::debug!(
            token_paths = token_paths.len(),
            routes = routes.len(),
            failed_segments = failed.len(),
            "Candidate routes assembled"
        );
        Ok(CandidateRoutes {
            routes,
            failed_segments: failed,
        })
    }
}

/// Expand token paths into hop sequences. Iterative: a stack of partial
/// routes, one pool choice per segment. Pools never repeat within a route
/// and identical pool sequences are kept once.
fn assemble_routes(
    token_paths: &[Vec<Address>],
    pools_by_segment: &BTreeMap<Segment, Vec<(PoolKind, Address)>>,
) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut seen: HashSet<Vec<Address>> = HashSet::new();

    for path in token_paths {
        let hop_count = path.len() - 1;
        let mut stack: Vec<Vec<Hop>> = vec![Vec::with_capacity(hop_count)];
        while let Some(partial) = stack.pop() {
            let i = partial.len();
            if i == hop_count {
                let key: Vec<Address> = partial.iter().map(|h| h.pool.clone()).collect();
                if seen.insert(key) {
                    if let Ok(route) = Route::new(partial) {
                        routes.push(route);
                    }
                }
                continue;
            }
            let (from, to) = (&path[i], &path[i + 1]);
            let Some(options) = pools_by_segment.get(&segment(from, to)) else {
                continue;
            };
            // Reverse so the smallest address is expanded first
            for (kind, pool) in options.iter().rev() {
                if partial.iter().any(|h| h.pool == *pool) {
                    continue;
                }
                let mut next = partial.clone();
                next.push(Hop {
                    kind: *kind,
                    pool: pool.clone(),
                    token_in: from.clone(),
                    token_out: to.clone(),
                });
                stack.push(next);
            }
        }
    }
    routes
}

/// Keep routes whose every pool was fetched and holds liquidity.
pub fn prune_illiquid(routes: Vec<Route>, pools: &HashMap<Address, PoolSnapshot>) -> Vec<Route> {
    let before = routes.len();
    let kept: Vec<Route> = routes
        .into_iter()
        .filter(|route| {
            route
                .hops()
                .iter()
                .all(|h| pools.get(&h.pool).is_some_and(|p| !p.is_empty()))
        })
        .collect();
    if kept.len() < before {
        tracing::debug!(pruned = before - kept.len(), kept = kept.len(), "Pruned routes");
    }
    kept
}

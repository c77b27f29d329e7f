//! Quote Engine
//!
//! Evaluates every candidate route against one consistent set of pool
//! snapshots and picks the best:
//!
//! - exact-in: largest net output
//! - exact-out: smallest gross input
//!
//! Ties go to the route with fewer hops, then to the lexicographically
//! smaller pool sequence. The chosen quote carries forward/reverse price,
//! spread and price impact.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chain_client::{timed_request, ChainDataProvider, PoolKind, PoolSnapshot};
use chrono::Utc;
use swapline_core::{Address, Amount, ChainId, FeeSide, RouterError, RoutingConfig, SpreadNotional};
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterRegistry, SharedRegistry};
use crate::calculator::{calculate_price, calculate_price_impact_bps, calculate_spread_bps};
use crate::constants::fees::BPS_DENOMINATOR;
use crate::fees::{FeeModule, FeeSchedule};
use crate::fetch::fetch_pool_states;
use crate::paths::{prune_illiquid, PathFinder};
use crate::state::{HopQuote, Quote, QuoteRequest, Route, SwapMode};

/// Wall-clock milliseconds used for quote validity windows
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// One route priced end to end, protocol fee included
#[derive(Debug, Clone)]
pub struct RouteEvaluation {
    pub route: Route,
    /// Gross input paid by the caller
    pub amount_in: Amount,
    /// Net output delivered to the recipient
    pub amount_out: Amount,
    pub protocol_fee: Amount,
    pub hops: Vec<HopQuote>,
}

impl RouteEvaluation {
    /// Input entering the first pool
    pub fn route_in(&self) -> Amount {
        self.hops.first().map(|h| h.amount_in).unwrap_or(0)
    }

    /// Output leaving the last pool
    pub fn route_out(&self) -> Amount {
        self.hops.last().map(|h| h.amount_out).unwrap_or(0)
    }
}

fn pool_for<'a>(
    pools: &'a HashMap<Address, PoolSnapshot>,
    pool: &Address,
) -> Result<&'a PoolSnapshot, RouterError> {
    pools.get(pool).ok_or_else(|| RouterError::LiquidityUnavailable {
        reason: format!("no state for pool {}", pool),
    })
}

/// Chain exact-in hops along `route`, each hop's output feeding the next.
pub fn quote_forward(
    registry: &AdapterRegistry,
    pools: &HashMap<Address, PoolSnapshot>,
    route: &Route,
    amount_in: Amount,
) -> Result<Vec<HopQuote>, RouterError> {
    let mut amount = amount_in;
    let mut hops = Vec::with_capacity(route.len());
    for hop in route.hops() {
        let adapter = registry.get(hop.kind)?;
        let quoted = adapter.quote(
            pool_for(pools, &hop.pool)?,
            &hop.token_in,
            &hop.token_out,
            amount,
            SwapMode::ExactIn,
        )?;
        amount = quoted.amount_out;
        hops.push(quoted);
    }
    Ok(hops)
}

/// Walk `route` backwards from a desired final output, each hop's required
/// input becoming the previous hop's desired output. Hops are returned in
/// route order.
pub fn quote_backward(
    registry: &AdapterRegistry,
    pools: &HashMap<Address, PoolSnapshot>,
    route: &Route,
    amount_out: Amount,
) -> Result<Vec<HopQuote>, RouterError> {
    let mut amount = amount_out;
    let mut hops = Vec::with_capacity(route.len());
    for hop in route.hops().iter().rev() {
        let adapter = registry.get(hop.kind)?;
        let quoted = adapter.quote(
            pool_for(pools, &hop.pool)?,
            &hop.token_in,
            &hop.token_out,
            amount,
            SwapMode::ExactOut,
        )?;
        amount = quoted.amount_in;
        hops.push(quoted);
    }
    hops.reverse();
    Ok(hops)
}

/// Price one route including the protocol fee on its configured side.
pub fn evaluate_route(
    registry: &AdapterRegistry,
    fees: &FeeModule,
    pools: &HashMap<Address, PoolSnapshot>,
    route: &Route,
    amount: Amount,
    mode: SwapMode,
) -> Result<RouteEvaluation, RouterError> {
    match mode {
        SwapMode::ExactIn => {
            let (swap_in, input_fee) = match fees.side() {
                FeeSide::Input => {
                    let split = fees.split(amount);
                    (split.net, split.fee)
                }
                FeeSide::Output => (amount, 0),
            };
            if swap_in == 0 {
                return Err(RouterError::invalid_amount("nothing left to swap after protocol fee"));
            }
            let hops = quote_forward(registry, pools, route, swap_in)?;
            let gross_out = hops.last().map(|h| h.amount_out).unwrap_or(0);
            let (amount_out, output_fee) = match fees.side() {
                FeeSide::Input => (gross_out, 0),
                FeeSide::Output => {
                    let split = fees.split(gross_out);
                    (split.net, split.fee)
                }
            };
            Ok(RouteEvaluation {
                route: route.clone(),
                amount_in: amount,
                amount_out,
                protocol_fee: input_fee + output_fee,
                hops,
            })
        }
        SwapMode::ExactOut => {
            let gross_out = match fees.side() {
                FeeSide::Output => fees.gross_for_net(amount)?,
                FeeSide::Input => amount,
            };
            let hops = quote_backward(registry, pools, route, gross_out)?;
            let route_in = hops.first().map(|h| h.amount_in).unwrap_or(0);
            let amount_in = match fees.side() {
                FeeSide::Input => fees.gross_for_net(route_in)?,
                FeeSide::Output => route_in,
            };
            Ok(RouteEvaluation {
                route: route.clone(),
                amount_in,
                amount_out: amount,
                protocol_fee: (amount_in - route_in) + (gross_out - amount),
                hops,
            })
        }
    }
}

/// Ordering where the best evaluation sorts first.
fn rank(mode: SwapMode, a: &RouteEvaluation, b: &RouteEvaluation) -> Ordering {
    let by_amount = match mode {
        SwapMode::ExactIn => b.amount_out.cmp(&a.amount_out),
        SwapMode::ExactOut => a.amount_in.cmp(&b.amount_in),
    };
    by_amount
        .then_with(|| a.route.len().cmp(&b.route.len()))
        .then_with(|| a.route.pool_sequence().cmp(&b.route.pool_sequence()))
}

/// Reverse price and spread for a chosen evaluation
struct SpreadMetrics {
    reverse_price: f64,
    spread_bps: u32,
}

pub struct QuoteEngine {
    provider: Arc<dyn ChainDataProvider>,
    registry: SharedRegistry,
    fees: FeeSchedule,
    chain_id: ChainId,
    config: RoutingConfig,
    path_finder: PathFinder,
}

impl QuoteEngine {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        registry: SharedRegistry,
        fees: FeeSchedule,
        chain_id: ChainId,
        config: RoutingConfig,
    ) -> Self {
        let path_finder = PathFinder::from_config(&config);
        Self {
            provider,
            registry,
            fees,
            chain_id,
            config,
            path_finder,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn ChainDataProvider> {
        &self.provider
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.config.fetch_timeout_ms)
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote, RouterError> {
        self.quote_with_cancel(request, &CancellationToken::new()).await
    }

    /// Quote that gives up as soon as `cancel` fires. In-flight fetches are
    /// dropped with the derivation future.
    pub async fn quote_with_cancel(
        &self,
        request: &QuoteRequest,
        cancel: &CancellationToken,
    ) -> Result<Quote, RouterError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(
                    token_in = %request.token_in,
                    token_out = %request.token_out,
                    "Quote cancelled"
                );
                Err(RouterError::Cancelled)
            }
            result = self.derive(request) => result,
        }
    }

    /// Return `quote` unchanged while it is fresh, otherwise derive it again
    /// for the same pair, size and mode.
    pub async fn refresh(&self, quote: Quote) -> Result<Quote, RouterError> {
        if !quote.is_stale(now_ms()) {
            return Ok(quote);
        }
        tracing::debug!(route = %quote.route, "Re-deriving stale quote");
        let amount = match quote.mode {
            SwapMode::ExactIn => quote.amount_in,
            SwapMode::ExactOut => quote.amount_out,
        };
        let request = QuoteRequest {
            chain_id: self.chain_id,
            token_in: quote.route.token_in().clone(),
            token_out: quote.route.token_out().clone(),
            amount,
            mode: quote.mode,
            allow_partial: None,
        };
        self.quote(&request).await
    }

    async fn derive(&self, request: &QuoteRequest) -> Result<Quote, RouterError> {
        if request.chain_id != self.chain_id {
            return Err(RouterError::invalid_route(format!(
                "chain {} is not served here (serving {})",
                request.chain_id, self.chain_id
            )));
        }
        if request.token_in == request.token_out {
            return Err(RouterError::invalid_route("token_in equals token_out"));
        }
        if request.amount == 0 {
            return Err(RouterError::invalid_amount("amount must be greater than zero"));
        }

        // One consistent view of adapters and fees for the whole quote
        let registry = self.registry.read().await.clone();
        if registry.is_empty() {
            return Err(RouterError::config("no adapters registered"));
        }
        let fees = self.fees.snapshot().await;
        let kinds: Vec<PoolKind> = registry.kinds().collect();
        let allow_partial = request
            .allow_partial
            .unwrap_or(self.config.allow_partial_sources);
        let timeout = self.fetch_timeout();

        let block = timed_request(timeout, self.provider.block()).await?;

        let candidates = self
            .path_finder
            .find_routes(
                self.provider.as_ref(),
                &kinds,
                &request.token_in,
                &request.token_out,
                timeout,
                self.config.max_parallel_fetches,
            )
            .await?;
        if !candidates.failed_segments.is_empty() && !allow_partial {
            return Err(RouterError::LiquidityUnavailable {
                reason: format!(
                    "pool discovery failed for {} token pair(s) and partial sources are not allowed",
                    candidates.failed_segments.len()
                ),
            });
        }

        let fetched = fetch_pool_states(
            self.provider.as_ref(),
            candidates.pools(),
            timeout,
            self.config.max_parallel_fetches,
        )
        .await;
        if !fetched.unreachable.is_empty() && !allow_partial {
            return Err(RouterError::LiquidityUnavailable {
                reason: format!(
                    "{} pool(s) unreachable and partial sources are not allowed",
                    fetched.unreachable.len()
                ),
            });
        }

        let routes = prune_illiquid(candidates.routes, &fetched.pools);
        if routes.is_empty() {
            return Err(RouterError::LiquidityUnavailable {
                reason: format!(
                    "no viable route from {} to {}",
                    request.token_in, request.token_out
                ),
            });
        }

        let mut best: Option<RouteEvaluation> = None;
        let mut first_error: Option<RouterError> = None;
        for route in &routes {
            match evaluate_route(&registry, &fees, &fetched.pools, route, request.amount, request.mode) {
                Ok(eval) => {
                    tracing::debug!(
                        route = %route,
                        amount_in = %eval.amount_in,
                        amount_out = %eval.amount_out,
                        "Route evaluated"
                    );
                    let better = best
                        .as_ref()
                        .map_or(true, |current| rank(request.mode, &eval, current) == Ordering::Less);
                    if better {
                        best = Some(eval);
                    }
                }
                Err(e) => {
                    tracing::debug!(route = %route, error = %e, "Route rejected");
                    first_error.get_or_insert(e);
                }
            }
        }
        let Some(best) = best else {
            return Err(first_error.unwrap_or_else(|| RouterError::LiquidityUnavailable {
                reason: "no route could be evaluated".into(),
            }));
        };

        let spread = self.spread_metrics(&registry, &fees, &fetched.pools, &best);
        let price_impact_bps = self.price_impact(&registry, &fetched.pools, &best);
        let quoted_at_ms = now_ms();

        tracing::info!(
            route = %best.route,
            hops = best.route.len(),
            amount_in = %best.amount_in,
            amount_out = %best.amount_out,
            spread_bps = spread.spread_bps,
            price_impact_bps,
            candidates = routes.len(),
            excluded = fetched.unreachable.len(),
            "Quote derived"
        );

        Ok(Quote {
            forward_price: calculate_price(best.amount_in, best.amount_out),
            reverse_price: spread.reverse_price,
            spread_bps: spread.spread_bps,
            price_impact_bps,
            route: best.route,
            mode: request.mode,
            amount_in: best.amount_in,
            amount_out: best.amount_out,
            protocol_fee: best.protocol_fee,
            fee_side: fees.side(),
            hops: best.hops,
            block_height: block.height,
            quoted_at_ms,
            expires_at_ms: quoted_at_ms.saturating_add(self.config.quote_validity_ms),
            excluded_pools: fetched.unreachable,
        })
    }

    /// Quote the inverse direction on the reversed best route. With
    /// [`SpreadNotional::Requested`] the reverse trade sells what the forward
    /// trade delivers; with [`SpreadNotional::Reference`] both directions are
    /// taken at the reference size. An unquotable reverse direction reports
    /// a zero reverse price and a full 10000 bps spread.
    fn spread_metrics(
        &self,
        registry: &AdapterRegistry,
        fees: &FeeModule,
        pools: &HashMap<Address, PoolSnapshot>,
        best: &RouteEvaluation,
    ) -> SpreadMetrics {
        let unquotable = SpreadMetrics {
            reverse_price: 0.0,
            spread_bps: BPS_DENOMINATOR,
        };
        let reversed = best.route.reversed();

        let forward = match self.config.spread_notional {
            SpreadNotional::Requested => Ok((best.amount_in, best.amount_out)),
            SpreadNotional::Reference => {
                let size = self.config.reference_size.resolve(best.amount_in);
                evaluate_route(registry, fees, pools, &best.route, size, SwapMode::ExactIn)
                    .map(|e| (e.amount_in, e.amount_out))
            }
        };
        let Ok((forward_in, forward_out)) = forward else {
            return unquotable;
        };
        match evaluate_route(registry, fees, pools, &reversed, forward_out, SwapMode::ExactIn) {
            Ok(reverse) => SpreadMetrics {
                reverse_price: calculate_price(reverse.amount_in, reverse.amount_out),
                spread_bps: calculate_spread_bps(
                    forward_in,
                    forward_out,
                    reverse.amount_in,
                    reverse.amount_out,
                )
                .min(BPS_DENOMINATOR),
            },
            Err(e) => {
                tracing::debug!(route = %reversed, error = %e, "Reverse quote failed");
                unquotable
            }
        }
    }

    /// Rate at the requested size against the rate at the reference size on
    /// the same pools, protocol fee excluded.
    fn price_impact(
        &self,
        registry: &AdapterRegistry,
        pools: &HashMap<Address, PoolSnapshot>,
        best: &RouteEvaluation,
    ) -> u32 {
        let (route_in, route_out) = (best.route_in(), best.route_out());
        let reference_in = self.config.reference_size.resolve(route_in).min(route_in);
        match quote_forward(registry, pools, &best.route, reference_in) {
            Ok(hops) => {
                let reference_out = hops.last().map(|h| h.amount_out).unwrap_or(0);
                calculate_price_impact_bps(reference_in, reference_out, route_in, route_out)
            }
            Err(e) => {
                tracing::debug!(route = %best.route, error = %e, "Reference quote failed");
                0
            }
        }
    }
}

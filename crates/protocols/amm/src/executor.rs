//! Swap Router
//!
//! Executes a chosen route inside one ledger transaction:
//!
//! ```text
//! Quoted -> Approved -> Executing(0) -> ... -> Executing(n-1) -> Settled
//!                                                            \-> Reverted
//! ```
//!
//! Funds are pulled from the caller (or wrapped from the attached native
//! value), the protocol fee is sent to the treasury, each hop's output feeds
//! the next hop, and the caller's bound is checked before anything is
//! published. Any failure discards the whole transaction.

use std::collections::HashMap;

use chain_client::{Ledger, PoolSnapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use swapline_core::{
    Address, Amount, BlockHeight, ChainConfig, ChainError, DeployedContracts, DeploymentRecord,
    FeeSide, RouterError, TxId,
};

use crate::adapter::{ConcentratedLiquidityAdapter, ConstantProductAdapter, SharedRegistry};
use crate::fees::{FeeSchedule, FeeSplit};
use crate::quote::evaluate_route;
use crate::state::{HopQuote, Quote, Route, SwapBounds, SwapMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    Quoted,
    Approved,
    Executing { hop: usize },
    Settled,
    Reverted,
}

/// On-chain swap entry point arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub caller: Address,
    pub route: Route,
    pub bounds: SwapBounds,
    pub recipient: Address,
    /// Unix seconds
    pub deadline: u64,
    /// Native asset attached to the call
    #[serde(default)]
    pub value: Amount,
    /// Per-hop square-root price guards, empty for none
    #[serde(default)]
    pub sqrt_price_limits: Vec<Option<u128>>,
}

impl ExecutionRequest {
    /// Turn a quote into an execution request with bounds and price guards
    /// derived from `max_slippage_bps`. With `pay_native` the maximum input
    /// is attached as native value.
    pub fn from_quote(
        quote: &Quote,
        caller: Address,
        recipient: Address,
        deadline: u64,
        max_slippage_bps: u32,
        pay_native: bool,
    ) -> Result<Self, RouterError> {
        let bounds = quote.bounds(max_slippage_bps)?;
        Ok(Self {
            caller,
            route: quote.route.clone(),
            bounds,
            recipient,
            deadline,
            value: if pay_native { max_payment(&bounds) } else { 0 },
            sqrt_price_limits: quote.sqrt_price_limits(max_slippage_bps),
        })
    }
}

/// Most the caller can be charged under `bounds`
fn max_payment(bounds: &SwapBounds) -> Amount {
    match *bounds {
        SwapBounds::ExactIn { amount_in, .. } => amount_in,
        SwapBounds::ExactOut { max_amount_in, .. } => max_amount_in,
    }
}

/// Result of a settled swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub tx_id: TxId,
    pub route: Route,
    /// Gross input taken from the caller
    pub amount_in: Amount,
    /// Net output paid to the recipient
    pub amount_out: Amount,
    /// Split on the charged side; `fee + net == gross`
    pub fee: FeeSplit,
    pub fee_side: FeeSide,
    pub fee_token: Address,
    pub hops: Vec<HopQuote>,
    pub transitions: Vec<ExecutionState>,
    pub block_height: BlockHeight,
}

/// What the transaction closure hands back on success
struct Settlement {
    amount_in: Amount,
    amount_out: Amount,
    fee: FeeSplit,
    fee_side: FeeSide,
    fee_token: Address,
    hops: Vec<HopQuote>,
    block_height: BlockHeight,
}

pub struct SwapRouter {
    address: Address,
    owner: Address,
    wrapped_native: Address,
    ledger: Ledger,
    registry: SharedRegistry,
    fees: FeeSchedule,
}

impl SwapRouter {
    pub fn new(
        address: Address,
        owner: Address,
        wrapped_native: Address,
        ledger: Ledger,
        registry: SharedRegistry,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            address,
            owner,
            wrapped_native,
            ledger,
            registry,
            fees,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    fn authorize(&self, caller: &Address) -> Result<(), RouterError> {
        if *caller != self.owner {
            tracing::warn!(caller = %caller, "Rejected admin call");
            return Err(RouterError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Owner-gated replacement of both adapters.
    pub async fn set_adapters(
        &self,
        caller: &Address,
        cl: ConcentratedLiquidityAdapter,
        cp: ConstantProductAdapter,
    ) -> Result<(), RouterError> {
        self.authorize(caller)?;
        tracing::info!(
            concentrated_liquidity = %cl.address,
            constant_product = %cp.address,
            "Adapters updated"
        );
        self.registry.write().await.set_adapters(cl, cp);
        Ok(())
    }

    /// Owner-gated fee update.
    pub async fn set_fee(&self, caller: &Address, bps: u32, treasury: Address) -> Result<(), RouterError> {
        self.authorize(caller)?;
        self.fees.set_fee(caller, bps, treasury).await
    }

    /// Deployment record for this router and its adapters
    pub async fn deployment_record(&self, chain: &ChainConfig) -> Result<DeploymentRecord, RouterError> {
        let adapters = self
            .registry
            .read()
            .await
            .addresses()
            .ok_or_else(|| RouterError::config("both adapters must be set before recording a deployment"))?;
        let fees = self.fees.config().await;
        Ok(DeploymentRecord {
            chain_id: chain.chain_id,
            network: chain.network,
            contracts: DeployedContracts {
                adapters,
                router: self.address.clone(),
            },
            owner: self.owner.clone(),
            treasury: fees.treasury,
            timestamp: Utc::now(),
        })
    }

    /// Execute `request` atomically. On failure nothing is published and the
    /// precise cause is returned.
    pub async fn swap(&self, request: &ExecutionRequest) -> Result<SwapReceipt, RouterError> {
        let mut transitions = vec![ExecutionState::Quoted];
        match self.execute(request, &mut transitions).await {
            Ok((settlement, tx_id)) => {
                self.fees
                    .record_accrual(&settlement.fee_token, settlement.fee.fee)
                    .await;
                transitions.push(ExecutionState::Settled);
                tracing::info!(
                    tx_id = %tx_id,
                    route = %request.route,
                    amount_in = %settlement.amount_in,
                    amount_out = %settlement.amount_out,
                    fee = %settlement.fee.fee,
                    "Swap settled"
                );
                Ok(SwapReceipt {
                    tx_id,
                    route: request.route.clone(),
                    amount_in: settlement.amount_in,
                    amount_out: settlement.amount_out,
                    fee: settlement.fee,
                    fee_side: settlement.fee_side,
                    fee_token: settlement.fee_token,
                    hops: settlement.hops,
                    transitions,
                    block_height: settlement.block_height,
                })
            }
            Err(e) => {
                let reached = transitions.last().copied();
                transitions.push(ExecutionState::Reverted);
                tracing::warn!(
                    route = %request.route,
                    caller = %request.caller,
                    reached = ?reached,
                    error = %e,
                    "Swap reverted"
                );
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        transitions: &mut Vec<ExecutionState>,
    ) -> Result<(Settlement, TxId), RouterError> {
        let route = &request.route;
        let limits = &request.sqrt_price_limits;
        if request.recipient.is_zero() {
            return Err(RouterError::invalid_route("recipient is the zero address"));
        }
        if !limits.is_empty() && limits.len() != route.len() {
            return Err(RouterError::invalid_route(format!(
                "{} price guards for {} hops",
                limits.len(),
                route.len()
            )));
        }
        let requested = match request.bounds {
            SwapBounds::ExactIn { amount_in, .. } => amount_in,
            SwapBounds::ExactOut { amount_out, .. } => amount_out,
        };
        if requested == 0 {
            return Err(RouterError::invalid_amount("amount must be greater than zero"));
        }

        // Fail fast, before any pool is touched
        let now = self.ledger.block().await.timestamp;
        check_deadline(request.deadline, now)?;

        let registry = self.registry.read().await.clone();
        for hop in route.hops() {
            registry.get(hop.kind)?;
        }
        let fees = self.fees.snapshot().await;
        fees.check_wiring()?;

        let token_in = route.token_in();
        let token_out = route.token_out();
        let payment = max_payment(&request.bounds);
        let pay_native = request.value > 0;
        if pay_native {
            if *token_in != self.wrapped_native {
                return Err(RouterError::invalid_route(format!(
                    "native payment requires a route starting at {}",
                    self.wrapped_native
                )));
            }
            if request.value != payment {
                return Err(RouterError::invalid_amount(format!(
                    "attached value {} does not match {}",
                    request.value, payment
                )));
            }
        } else {
            let available = self
                .ledger
                .allowance(token_in, &request.caller, &self.address)
                .await;
            if available < payment {
                return Err(ChainError::InsufficientAllowance {
                    token: token_in.clone(),
                    owner: request.caller.clone(),
                    spender: self.address.clone(),
                    required: payment,
                    available,
                }
                .into());
            }
        }
        transitions.push(ExecutionState::Approved);

        let router = &self.address;
        self.ledger
            .transact(|tx| {
                let block = tx.block();
                check_deadline(request.deadline, block.timestamp)?;

                let gross_in = match request.bounds {
                    SwapBounds::ExactIn { amount_in, .. } => amount_in,
                    SwapBounds::ExactOut {
                        amount_out,
                        max_amount_in,
                    } => {
                        // Size the input against live pool state, not the quote
                        let pools = route
                            .hops()
                            .iter()
                            .map(|h| Ok((h.pool.clone(), tx.pool(&h.pool)?.clone())))
                            .collect::<Result<HashMap<Address, PoolSnapshot>, ChainError>>()?;
                        let required =
                            evaluate_route(&registry, &fees, &pools, route, amount_out, SwapMode::ExactOut)?
                                .amount_in;
                        if required > max_amount_in {
                            return Err(RouterError::SlippageExceeded {
                                realized: required,
                                bound: max_amount_in,
                            });
                        }
                        required
                    }
                };

                if pay_native {
                    tx.wrap_native(&self.wrapped_native, &request.caller, router, gross_in)?;
                } else {
                    tx.transfer_from(token_in, &request.caller, router, router, gross_in)?;
                }

                let input_split = match fees.side() {
                    FeeSide::Input => {
                        let split = fees.split(gross_in);
                        if split.fee > 0 {
                            tx.transfer(token_in, router, fees.treasury(), split.fee)?;
                        }
                        Some(split)
                    }
                    FeeSide::Output => None,
                };

                let mut amount = input_split.map_or(gross_in, |s| s.net);
                let mut hops = Vec::with_capacity(route.len());
                for (i, hop) in route.hops().iter().enumerate() {
                    transitions.push(ExecutionState::Executing { hop: i });
                    let adapter = registry.get(hop.kind)?;
                    let limit = limits.get(i).copied().flatten();
                    let filled = adapter.swap(
                        tx,
                        &hop.pool,
                        &hop.token_in,
                        &hop.token_out,
                        amount,
                        router,
                        router,
                        limit,
                    )?;
                    amount = filled.amount_out;
                    hops.push(filled);
                }

                let (fee, fee_token, net_out) = match input_split {
                    Some(split) => (split, token_in.clone(), amount),
                    None => {
                        let split = fees.split(amount);
                        if split.fee > 0 {
                            tx.transfer(token_out, router, fees.treasury(), split.fee)?;
                        }
                        (split, token_out.clone(), split.net)
                    }
                };

                let minimum = match request.bounds {
                    SwapBounds::ExactIn { min_amount_out, .. } => min_amount_out,
                    SwapBounds::ExactOut { amount_out, .. } => amount_out,
                };
                if net_out < minimum {
                    return Err(RouterError::SlippageExceeded {
                        realized: net_out,
                        bound: minimum,
                    });
                }
                tx.transfer(token_out, router, &request.recipient, net_out)?;

                Ok(Settlement {
                    amount_in: gross_in,
                    amount_out: net_out,
                    fee,
                    fee_side: fees.side(),
                    fee_token,
                    hops,
                    block_height: block.height,
                })
            })
            .await
    }
}

fn check_deadline(deadline: u64, now: u64) -> Result<(), RouterError> {
    if now > deadline {
        return Err(RouterError::DeadlineExpired { deadline, now });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterRegistry;
    use crate::fees::FeeModule;
    use crate::quote::QuoteEngine;
    use crate::state::QuoteRequest;
    use chain_client::{BlockInfo, ChainFixture, ConcentratedState, InMemoryChain, PoolKind, TickInfo};
    use std::sync::Arc;
    use swapline_core::{ChainId, FeeConfig, RoutingConfig};

    const START: Amount = 100_000;

    fn tok(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn router_addr() -> Address {
        tok(0xd0)
    }
    fn owner() -> Address {
        tok(0x0a)
    }
    fn treasury() -> Address {
        tok(0x7e)
    }
    fn caller() -> Address {
        tok(0xca)
    }
    fn recipient() -> Address {
        tok(0xcb)
    }
    fn wrapped() -> Address {
        tok(0x0e)
    }

    fn registry() -> SharedRegistry {
        AdapterRegistry::from_pair(
            ConcentratedLiquidityAdapter {
                address: tok(0xc1),
                max_slices: 64,
            },
            ConstantProductAdapter { address: tok(0xc2) },
        )
        .into_shared()
    }

    fn fees(bps: u32, side: FeeSide) -> FeeSchedule {
        FeeSchedule::new(
            FeeModule::new(
                FeeConfig {
                    bps,
                    treasury: treasury(),
                    side,
                },
                owner(),
            )
            .unwrap(),
        )
    }

    const CL_LIQUIDITY: u128 = 1_000_000_000_000_000_000;

    /// One range over ticks [-600, 600] around price 1
    fn cl_state() -> ConcentratedState {
        ConcentratedState {
            sqrt_price_x96: 1 << 96,
            tick: 0,
            liquidity: CL_LIQUIDITY,
            ticks: vec![
                TickInfo { index: -600, liquidity_net: CL_LIQUIDITY as i128 },
                TickInfo { index: 600, liquidity_net: -(CL_LIQUIDITY as i128) },
            ],
        }
    }

    struct Harness {
        chain: InMemoryChain,
        router: SwapRouter,
    }

    impl Harness {
        async fn new(fee_bps: u32, side: FeeSide) -> Self {
            Self::with_registry(fee_bps, side, registry()).await
        }

        async fn with_registry(fee_bps: u32, side: FeeSide, registry: SharedRegistry) -> Self {
            let chain = InMemoryChain::from_fixture(ChainFixture {
                block: BlockInfo {
                    height: 7,
                    timestamp: 1_000,
                },
                pools: vec![
                    PoolSnapshot::constant_product(tok(0xa1), (tok(1), 1_000_000), (tok(2), 1_000_000), 30),
                    PoolSnapshot::constant_product(tok(0xa2), (wrapped(), 1_000_000), (tok(2), 1_000_000), 30),
                    PoolSnapshot::concentrated(tok(0xb1), tok(2), tok(3), 5, cl_state()),
                ],
                ..ChainFixture::default()
            })
            .await;
            let ledger = chain.ledger();
            ledger.mint(&tok(1), &caller(), START).await;
            ledger.approve(&tok(1), &caller(), &router_addr(), START).await;
            let router = SwapRouter::new(
                router_addr(),
                owner(),
                wrapped(),
                ledger.clone(),
                registry,
                fees(fee_bps, side),
            );
            Self { chain, router }
        }

        fn ledger(&self) -> &Ledger {
            self.chain.ledger()
        }

        async fn balance(&self, token: u8, owner: &Address) -> Amount {
            self.ledger().balance_of(&tok(token), owner).await
        }

        async fn pool(&self, addr: u8) -> PoolSnapshot {
            self.ledger().pool(&tok(addr)).await.unwrap()
        }
    }

    fn direct_route() -> Route {
        Route::new(vec![crate::state::Hop {
            kind: chain_client::PoolKind::ConstantProduct,
            pool: tok(0xa1),
            token_in: tok(1),
            token_out: tok(2),
        }])
        .unwrap()
    }

    fn hop(kind: PoolKind, pool: u8, token_in: u8, token_out: u8) -> crate::state::Hop {
        crate::state::Hop {
            kind,
            pool: tok(pool),
            token_in: tok(token_in),
            token_out: tok(token_out),
        }
    }

    /// tok1 -> tok2 on the constant-product pool, then tok2 -> tok3 on the
    /// concentrated-liquidity pool
    fn two_hop_route() -> Route {
        Route::new(vec![
            hop(PoolKind::ConstantProduct, 0xa1, 1, 2),
            hop(PoolKind::ConcentratedLiquidity, 0xb1, 2, 3),
        ])
        .unwrap()
    }

    fn engine(h: &Harness) -> QuoteEngine {
        QuoteEngine::new(
            Arc::new(h.chain.clone()),
            h.router.registry().clone(),
            h.router.fees().clone(),
            ChainId(31337),
            RoutingConfig {
                hub_tokens: vec![tok(2)],
                ..RoutingConfig::default()
            },
        )
    }

    fn quote_request(token_in: u8, token_out: u8, amount: Amount) -> QuoteRequest {
        QuoteRequest {
            chain_id: ChainId(31337),
            token_in: tok(token_in),
            token_out: tok(token_out),
            amount,
            mode: SwapMode::ExactIn,
            allow_partial: None,
        }
    }

    fn exact_in(amount_in: Amount, min_amount_out: Amount) -> ExecutionRequest {
        ExecutionRequest {
            caller: caller(),
            route: direct_route(),
            bounds: SwapBounds::ExactIn {
                amount_in,
                min_amount_out,
            },
            recipient: recipient(),
            deadline: 2_000,
            value: 0,
            sqrt_price_limits: vec![],
        }
    }

    #[tokio::test]
    async fn test_input_fee_settles_to_treasury() {
        let h = Harness::new(30, FeeSide::Input).await;
        let receipt = h.router.swap(&exact_in(10_000, 1)).await.unwrap();

        assert_eq!(
            receipt.fee,
            FeeSplit {
                gross: 10_000,
                fee: 30,
                net: 9_970
            }
        );
        assert_eq!(receipt.fee.fee + receipt.fee.net, receipt.fee.gross);
        assert_eq!(receipt.fee_token, tok(1));
        assert_eq!(receipt.hops[0].amount_in, 9_970);
        assert_eq!(h.balance(1, &treasury()).await, 30);
        assert_eq!(h.balance(1, &caller()).await, START - 10_000);
        assert_eq!(h.balance(2, &recipient()).await, receipt.amount_out);
        assert_eq!(h.balance(1, &router_addr()).await, 0);
        assert_eq!(h.balance(2, &router_addr()).await, 0);
        assert_eq!(h.router.fees().accrued(&tok(1)).await, 30);
        assert_eq!(receipt.block_height, 7);
        assert_eq!(
            receipt.transitions,
            vec![
                ExecutionState::Quoted,
                ExecutionState::Approved,
                ExecutionState::Executing { hop: 0 },
                ExecutionState::Settled
            ]
        );
    }

    #[tokio::test]
    async fn test_output_fee_settles_to_treasury() {
        let h = Harness::new(30, FeeSide::Output).await;
        let receipt = h.router.swap(&exact_in(10_000, 1)).await.unwrap();

        let gross_out = receipt.hops[0].amount_out;
        assert_eq!(receipt.fee.gross, gross_out);
        assert_eq!(receipt.fee.fee + receipt.amount_out, gross_out);
        assert_eq!(receipt.fee_token, tok(2));
        assert_eq!(h.balance(2, &treasury()).await, receipt.fee.fee);
        assert_eq!(h.balance(2, &recipient()).await, receipt.amount_out);
        assert_eq!(h.router.fees().accrued(&tok(2)).await, receipt.fee.fee);
    }

    #[tokio::test]
    async fn test_min_out_breach_reverts_everything() {
        let h = Harness::new(30, FeeSide::Input).await;
        let pool_before = h.pool(0xa1).await;

        let err = h.router.swap(&exact_in(10_000, 1_000_000)).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::SlippageExceeded { bound: 1_000_000, .. }
        ));

        assert_eq!(h.balance(1, &caller()).await, START);
        assert_eq!(h.balance(1, &treasury()).await, 0);
        assert_eq!(h.balance(2, &recipient()).await, 0);
        assert_eq!(h.pool(0xa1).await, pool_before);
        assert_eq!(h.ledger().allowance(&tok(1), &caller(), &router_addr()).await, START);
        assert_eq!(h.router.fees().accrued(&tok(1)).await, 0);
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_fast() {
        let h = Harness::new(30, FeeSide::Input).await;
        let pool_before = h.pool(0xa1).await;
        let request = ExecutionRequest {
            deadline: 999,
            ..exact_in(10_000, 1)
        };
        let err = h.router.swap(&request).await.unwrap_err();
        assert_eq!(
            err,
            RouterError::DeadlineExpired {
                deadline: 999,
                now: 1_000
            }
        );
        assert_eq!(h.pool(0xa1).await, pool_before);
        assert_eq!(h.balance(1, &caller()).await, START);
    }

    #[tokio::test]
    async fn test_failed_fee_transfer_reverts_swap() {
        let h = Harness::new(30, FeeSide::Output).await;
        h.ledger().freeze(&treasury()).await;
        let pool_before = h.pool(0xa1).await;

        let err = h.router.swap(&exact_in(10_000, 1)).await.unwrap_err();
        assert_eq!(err.error_code(), "transfer_rejected");
        assert_eq!(h.pool(0xa1).await, pool_before);
        assert_eq!(h.balance(1, &caller()).await, START);
        assert_eq!(h.balance(2, &recipient()).await, 0);
    }

    #[tokio::test]
    async fn test_allowance_checked_before_transfer() {
        let h = Harness::new(30, FeeSide::Input).await;
        h.ledger().approve(&tok(1), &caller(), &router_addr(), 5).await;
        let err = h.router.swap(&exact_in(10_000, 1)).await.unwrap_err();
        assert_eq!(err.error_code(), "insufficient_allowance");
        assert_eq!(h.balance(1, &caller()).await, START);
    }

    #[tokio::test]
    async fn test_native_payment_is_wrapped() {
        let h = Harness::new(30, FeeSide::Input).await;
        h.ledger().mint(&Address::native(), &caller(), 50_000).await;
        let route = Route::new(vec![crate::state::Hop {
            kind: chain_client::PoolKind::ConstantProduct,
            pool: tok(0xa2),
            token_in: wrapped(),
            token_out: tok(2),
        }])
        .unwrap();
        let request = ExecutionRequest {
            route,
            value: 10_000,
            ..exact_in(10_000, 1)
        };

        let receipt = h.router.swap(&request).await.unwrap();
        assert_eq!(h.ledger().balance_of(&Address::native(), &caller()).await, 40_000);
        assert_eq!(h.balance(0x0e, &treasury()).await, 30);
        assert_eq!(h.balance(2, &recipient()).await, receipt.amount_out);

        let mismatched = ExecutionRequest {
            value: 9_000,
            ..request
        };
        let err = h.router.swap(&mismatched).await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidAmount { .. }));

        // Native value cannot pay for a route that does not start at the wrapped token
        let wrong_token = ExecutionRequest {
            value: 10_000,
            ..exact_in(10_000, 1)
        };
        assert!(matches!(
            h.router.swap(&wrong_token).await,
            Err(RouterError::InvalidRoute { .. })
        ));
    }

    #[tokio::test]
    async fn test_exact_out_within_bound() {
        let h = Harness::new(30, FeeSide::Input).await;
        let request = ExecutionRequest {
            bounds: SwapBounds::ExactOut {
                amount_out: 5_000,
                max_amount_in: 6_000,
            },
            ..exact_in(0, 0)
        };
        let receipt = h.router.swap(&request).await.unwrap();
        assert!(receipt.amount_out >= 5_000);
        assert!(receipt.amount_in <= 6_000);
        assert_eq!(h.balance(1, &caller()).await, START - receipt.amount_in);
        assert_eq!(h.balance(2, &recipient()).await, receipt.amount_out);

        let tight = ExecutionRequest {
            bounds: SwapBounds::ExactOut {
                amount_out: 5_000,
                max_amount_in: 100,
            },
            ..request
        };
        assert!(matches!(
            h.router.swap(&tight).await,
            Err(RouterError::SlippageExceeded { bound: 100, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_adapter_is_configuration_error() {
        let mut only_cl = AdapterRegistry::new();
        only_cl.register(crate::adapter::Adapter::ConcentratedLiquidity(
            ConcentratedLiquidityAdapter {
                address: tok(0xc1),
                max_slices: 64,
            },
        ));
        let h = Harness::with_registry(30, FeeSide::Input, only_cl.into_shared()).await;
        let err = h.router.swap(&exact_in(10_000, 1)).await.unwrap_err();
        assert!(matches!(err, RouterError::ConfigurationError { .. }));
        assert_eq!(h.balance(1, &caller()).await, START);
    }

    #[tokio::test]
    async fn test_admin_calls_are_owner_gated() {
        let h = Harness::new(30, FeeSide::Input).await;
        let stranger = tok(0x66);

        let err = h
            .router
            .set_fee(&stranger, 10, treasury())
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Unauthorized { .. }));

        let cl = ConcentratedLiquidityAdapter {
            address: tok(0xe1),
            max_slices: 8,
        };
        let cp = ConstantProductAdapter { address: tok(0xe2) };
        let err = h
            .router
            .set_adapters(&stranger, cl.clone(), cp.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Unauthorized { .. }));

        h.router.set_fee(&owner(), 10, treasury()).await.unwrap();
        assert_eq!(h.router.fees().config().await.bps, 10);
        h.router.set_adapters(&owner(), cl, cp).await.unwrap();
        let addresses = h.router.registry().read().await.addresses().unwrap();
        assert_eq!(addresses.constant_product, tok(0xe2));
    }

    #[tokio::test]
    async fn test_deployment_record() {
        let h = Harness::new(30, FeeSide::Input).await;
        let record = h
            .router
            .deployment_record(&ChainConfig::default())
            .await
            .unwrap();
        assert_eq!(record.contracts.router, router_addr());
        assert_eq!(record.contracts.adapters.concentrated_liquidity, tok(0xc1));
        assert_eq!(record.treasury, treasury());
    }

    #[tokio::test]
    async fn test_quote_then_execute_with_price_moving_in_between() {
        let h = Harness::new(30, FeeSide::Input).await;
        let engine = QuoteEngine::new(
            Arc::new(h.chain.clone()),
            h.router.registry().clone(),
            h.router.fees().clone(),
            ChainId(31337),
            RoutingConfig::default(),
        );
        let quote = engine
            .quote(&QuoteRequest {
                chain_id: ChainId(31337),
                token_in: tok(1),
                token_out: tok(2),
                amount: 10_000,
                mode: SwapMode::ExactIn,
                allow_partial: None,
            })
            .await
            .unwrap();

        // Someone else trades the same pool first
        let other = tok(0xef);
        h.ledger().mint(&tok(1), &other, 50_000).await;
        h.ledger().approve(&tok(1), &other, &router_addr(), 50_000).await;
        let front = ExecutionRequest {
            caller: other.clone(),
            recipient: other,
            ..exact_in(50_000, 1)
        };
        h.router.swap(&front).await.unwrap();

        let request =
            ExecutionRequest::from_quote(&quote, caller(), recipient(), 2_000, 50, false).unwrap();
        let err = h.router.swap(&request).await.unwrap_err();
        assert_eq!(err.error_code(), "slippage_exceeded");
        assert_eq!(h.balance(1, &caller()).await, START);

        let loose =
            ExecutionRequest::from_quote(&quote, caller(), recipient(), 2_000, 2_000, false).unwrap();
        let receipt = h.router.swap(&loose).await.unwrap();
        assert!(receipt.amount_out < quote.amount_out);
    }

    #[tokio::test]
    async fn test_two_hop_route_leaves_nothing_on_router() {
        let h = Harness::new(30, FeeSide::Input).await;
        let cl_before = h.pool(0xb1).await;
        let cl_tok3_before = h.balance(3, &tok(0xb1)).await;
        let request = ExecutionRequest {
            route: two_hop_route(),
            ..exact_in(10_000, 1)
        };

        let receipt = h.router.swap(&request).await.unwrap();
        assert_eq!(receipt.hops.len(), 2);
        assert_eq!(receipt.hops[0].amount_in, 9_970);
        assert_eq!(receipt.hops[1].amount_in, receipt.hops[0].amount_out);
        assert_eq!(receipt.amount_out, receipt.hops[1].amount_out);
        assert!(receipt.hops[1].sqrt_price_after.is_some());
        assert_eq!(
            receipt.transitions,
            vec![
                ExecutionState::Quoted,
                ExecutionState::Approved,
                ExecutionState::Executing { hop: 0 },
                ExecutionState::Executing { hop: 1 },
                ExecutionState::Settled
            ]
        );

        // The intermediate token passes through the router without residue
        for token in [1, 2, 3] {
            assert_eq!(h.balance(token, &router_addr()).await, 0);
        }
        assert_eq!(h.balance(3, &recipient()).await, receipt.amount_out);
        assert_eq!(h.balance(1, &caller()).await, START - 10_000);
        assert_eq!(h.balance(1, &treasury()).await, 30);
        assert_eq!(
            h.balance(3, &tok(0xb1)).await,
            cl_tok3_before - receipt.amount_out
        );
        assert_ne!(h.pool(0xb1).await, cl_before);
    }

    #[tokio::test]
    async fn test_concentrated_hop_executes_as_quoted() {
        let h = Harness::new(30, FeeSide::Input).await;
        let quote = engine(&h).quote(&quote_request(1, 3, 10_000)).await.unwrap();
        assert_eq!(quote.route, two_hop_route());

        // Without price guards
        let unguarded = ExecutionRequest {
            sqrt_price_limits: vec![],
            ..ExecutionRequest::from_quote(&quote, caller(), recipient(), 2_000, 50, false).unwrap()
        };
        let receipt = h.router.swap(&unguarded).await.unwrap();
        assert_eq!(receipt.amount_out, quote.amount_out);

        // With guards derived from a fresh quote
        let quote = engine(&h).quote(&quote_request(1, 3, 10_000)).await.unwrap();
        let guarded =
            ExecutionRequest::from_quote(&quote, caller(), recipient(), 2_000, 50, false).unwrap();
        assert_eq!(guarded.sqrt_price_limits.len(), 2);
        assert_eq!(guarded.sqrt_price_limits[0], None);
        assert!(guarded.sqrt_price_limits[1].is_some());
        let receipt = h.router.swap(&guarded).await.unwrap();
        assert_eq!(receipt.amount_out, quote.amount_out);
        assert_eq!(h.balance(1, &caller()).await, START - 20_000);
        assert_eq!(h.balance(2, &router_addr()).await, 0);
    }

    #[tokio::test]
    async fn test_concentrated_price_guard_reverts_everything() {
        let h = Harness::new(30, FeeSide::Input).await;
        let quote = engine(&h).quote(&quote_request(1, 3, 10_000)).await.unwrap();
        let request =
            ExecutionRequest::from_quote(&quote, caller(), recipient(), 2_000, 50, false).unwrap();
        let guard = request.sqrt_price_limits[1].unwrap();

        // Another trader pushes the concentrated pool's price past the guard
        let other = tok(0xef);
        let push = 10_000_000_000_000_000;
        h.ledger().mint(&tok(2), &other, push).await;
        h.ledger().approve(&tok(2), &other, &router_addr(), push).await;
        let front = ExecutionRequest {
            caller: other.clone(),
            recipient: other,
            route: Route::new(vec![hop(PoolKind::ConcentratedLiquidity, 0xb1, 2, 3)]).unwrap(),
            ..exact_in(push, 1)
        };
        h.router.swap(&front).await.unwrap();

        let pools_before = (h.pool(0xa1).await, h.pool(0xb1).await);
        let mut balances_before = Vec::new();
        for holder in [caller(), recipient(), router_addr(), treasury(), tok(0xa1), tok(0xb1)] {
            for token in [1, 2, 3] {
                balances_before.push(h.balance(token, &holder).await);
            }
        }
        let accrued_before = h.router.fees().accrued(&tok(1)).await;

        let err = h.router.swap(&request).await.unwrap_err();
        match err {
            RouterError::SlippageExceeded { realized, bound } => {
                assert_eq!(bound, guard);
                assert!(realized < guard);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!((h.pool(0xa1).await, h.pool(0xb1).await), pools_before);
        let mut balances_after = Vec::new();
        for holder in [caller(), recipient(), router_addr(), treasury(), tok(0xa1), tok(0xb1)] {
            for token in [1, 2, 3] {
                balances_after.push(h.balance(token, &holder).await);
            }
        }
        assert_eq!(balances_after, balances_before);
        assert_eq!(h.balance(1, &caller()).await, START);
        assert_eq!(h.router.fees().accrued(&tok(1)).await, accrued_before);
        assert_eq!(
            h.ledger().allowance(&tok(1), &caller(), &router_addr()).await,
            START
        );
    }
}

//! Pool Adapters
//!
//! One adapter per liquidity design. Both expose the same `{quote, swap}`
//! capability and are dispatched by pool kind through [`AdapterRegistry`];
//! adding a design means adding a variant.

use std::collections::BTreeMap;
use std::sync::Arc;

use chain_client::{ConcentratedState, PoolKind, PoolLiquidity, PoolSnapshot, Transaction};
use serde::{Deserialize, Serialize};
use swapline_core::{AdapterAddresses, Address, Amount, RouterError};
use tokio::sync::RwLock;

use crate::calculator::{amount_after_fee, calculate_input, calculate_output};
use crate::concentrated::{simulate_swap, CrossingParams, CrossingSwap};
use crate::state::{CurveError, HopQuote, SwapMode};

/// V2-style `x * y = k` pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantProductAdapter {
    pub address: Address,
}

/// V3/Algebra-style tick-ranged pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcentratedLiquidityAdapter {
    pub address: Address,
    /// Tick ranges one hop may walk before giving up
    pub max_slices: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adapter {
    ConstantProduct(ConstantProductAdapter),
    ConcentratedLiquidity(ConcentratedLiquidityAdapter),
}

impl Adapter {
    pub fn kind(&self) -> PoolKind {
        match self {
            Self::ConstantProduct(_) => PoolKind::ConstantProduct,
            Self::ConcentratedLiquidity(_) => PoolKind::ConcentratedLiquidity,
        }
    }

    pub fn address(&self) -> &Address {
        match self {
            Self::ConstantProduct(a) => &a.address,
            Self::ConcentratedLiquidity(a) => &a.address,
        }
    }

    /// Quote one hop against a pool snapshot. `amount` is the input for
    /// exact-in and the desired output for exact-out.
    pub fn quote(
        &self,
        pool: &PoolSnapshot,
        token_in: &Address,
        token_out: &Address,
        amount: Amount,
        mode: SwapMode,
    ) -> Result<HopQuote, RouterError> {
        self.quote_with_limit(pool, token_in, token_out, amount, mode, None)
    }

    /// [`Adapter::quote`] with a square-root price guard. The guard only
    /// applies to concentrated-liquidity pools.
    pub fn quote_with_limit(
        &self,
        pool: &PoolSnapshot,
        token_in: &Address,
        token_out: &Address,
        amount: Amount,
        mode: SwapMode,
        sqrt_price_limit: Option<u128>,
    ) -> Result<HopQuote, RouterError> {
        self.check_pool(pool, token_in, token_out)?;
        match self {
            Self::ConstantProduct(_) => quote_constant_product(pool, token_in, amount, mode),
            Self::ConcentratedLiquidity(adapter) => {
                let swap =
                    run_crossing(pool, token_in, amount, mode, sqrt_price_limit, adapter.max_slices)?;
                Ok(HopQuote {
                    pool: pool.address.clone(),
                    amount_in: swap.amount_in,
                    amount_out: swap.amount_out,
                    pool_fee: swap.fee_paid,
                    zero_for_one: pool.zero_for_one(token_in),
                    sqrt_price_after: Some(swap.sqrt_price_x96),
                    slices: swap.slices,
                })
            }
        }
    }

    /// Execute an exact-in hop inside a ledger transaction: pull `amount_in`
    /// from `payer` into the pool, move the pool to its post-swap state, and
    /// pay the output to `recipient`.
    #[allow(clippy::too_many_arguments)]
    pub fn swap(
        &self,
        tx: &mut Transaction,
        pool: &Address,
        token_in: &Address,
        token_out: &Address,
        amount_in: Amount,
        payer: &Address,
        recipient: &Address,
        sqrt_price_limit: Option<u128>,
    ) -> Result<HopQuote, RouterError> {
        let mut snapshot = tx.pool(pool)?.clone();
        self.check_pool(&snapshot, token_in, token_out)?;

        let hop = match self {
            Self::ConstantProduct(_) => {
                let hop = quote_constant_product(&snapshot, token_in, amount_in, SwapMode::ExactIn)?;
                apply_constant_product(&mut snapshot, &hop)?;
                hop
            }
            Self::ConcentratedLiquidity(adapter) => {
                let zero_for_one = snapshot.zero_for_one(token_in);
                let fee_bps = snapshot.fee_bps;
                let PoolLiquidity::ConcentratedLiquidity(state) = &mut snapshot.liquidity else {
                    return Err(missing_ticks(pool));
                };
                let params = CrossingParams {
                    zero_for_one,
                    amount: amount_in,
                    mode: SwapMode::ExactIn,
                    sqrt_price_limit,
                    max_slices: adapter.max_slices,
                };
                let swap = crossing_or_slippage(state, fee_bps, &params, pool)?;
                swap.apply(state);
                HopQuote {
                    pool: pool.clone(),
                    amount_in: swap.amount_in,
                    amount_out: swap.amount_out,
                    pool_fee: swap.fee_paid,
                    zero_for_one,
                    sqrt_price_after: Some(swap.sqrt_price_x96),
                    slices: swap.slices,
                }
            }
        };

        tx.transfer(token_in, payer, pool, hop.amount_in)?;
        tx.set_pool(snapshot)?;
        tx.transfer(token_out, pool, recipient, hop.amount_out)?;

        tracing::debug!(
            pool = %pool,
            adapter = %self.kind(),
            amount_in = %hop.amount_in,
            amount_out = %hop.amount_out,
            "Hop executed"
        );
        Ok(hop)
    }

    fn check_pool(
        &self,
        pool: &PoolSnapshot,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<(), RouterError> {
        if pool.kind() != self.kind() {
            return Err(kind_mismatch(self, pool));
        }
        if !pool.trades_pair(token_in, token_out) {
            return Err(RouterError::invalid_route(format!(
                "pool {} does not trade {} -> {}",
                pool.address, token_in, token_out
            )));
        }
        Ok(())
    }
}

fn kind_mismatch(adapter: &Adapter, pool: &PoolSnapshot) -> RouterError {
    RouterError::config(format!(
        "{} adapter cannot serve {} pool {}",
        adapter.kind(),
        pool.kind(),
        pool.address
    ))
}

fn quote_constant_product(
    pool: &PoolSnapshot,
    token_in: &Address,
    amount: Amount,
    mode: SwapMode,
) -> Result<HopQuote, RouterError> {
    let (reserve_in, reserve_out) = pool
        .reserves_for(token_in)
        .ok_or_else(|| missing_reserves(&pool.address))?;
    let at_pool = |e: CurveError| e.at_pool(&pool.address);

    let (amount_in, amount_out) = match mode {
        SwapMode::ExactIn => (
            amount,
            calculate_output(reserve_in, reserve_out, amount, pool.fee_bps).map_err(at_pool)?,
        ),
        SwapMode::ExactOut => (
            calculate_input(reserve_in, reserve_out, amount, pool.fee_bps).map_err(at_pool)?,
            amount,
        ),
    };
    let pool_fee = amount_in - amount_after_fee(amount_in, pool.fee_bps).map_err(at_pool)?;

    Ok(HopQuote {
        pool: pool.address.clone(),
        amount_in,
        amount_out,
        pool_fee,
        zero_for_one: pool.zero_for_one(token_in),
        sqrt_price_after: None,
        slices: 1,
    })
}

fn missing_reserves(pool: &Address) -> RouterError {
    RouterError::config(format!("pool {} has no constant-product reserves", pool))
}

fn missing_ticks(pool: &Address) -> RouterError {
    RouterError::config(format!("pool {} has no tick state", pool))
}

/// Move the reserves by an executed hop. The whole input, pool fee
/// included, stays in the pool.
fn apply_constant_product(snapshot: &mut PoolSnapshot, hop: &HopQuote) -> Result<(), RouterError> {
    let PoolLiquidity::ConstantProduct { reserve0, reserve1 } = &mut snapshot.liquidity else {
        return Err(missing_reserves(&hop.pool));
    };
    let (reserve_in, reserve_out) = if hop.zero_for_one {
        (reserve0, reserve1)
    } else {
        (reserve1, reserve0)
    };
    *reserve_in = reserve_in
        .checked_add(hop.amount_in)
        .ok_or_else(|| CurveError::Overflow.at_pool(&hop.pool))?;
    // amount_out < reserve_out is guaranteed by the curve
    *reserve_out -= hop.amount_out;
    Ok(())
}

fn run_crossing(
    pool: &PoolSnapshot,
    token_in: &Address,
    amount: Amount,
    mode: SwapMode,
    sqrt_price_limit: Option<u128>,
    max_slices: usize,
) -> Result<CrossingSwap, RouterError> {
    let PoolLiquidity::ConcentratedLiquidity(state) = &pool.liquidity else {
        return Err(missing_ticks(&pool.address));
    };
    let params = CrossingParams {
        zero_for_one: pool.zero_for_one(token_in),
        amount,
        mode,
        sqrt_price_limit,
        max_slices,
    };
    crossing_or_slippage(state, pool.fee_bps, &params, &pool.address)
}

/// Run the tick walk. Hitting the price guard is reported as slippage, with
/// the unguarded ending price as the realized value.
fn crossing_or_slippage(
    state: &ConcentratedState,
    fee_bps: u32,
    params: &CrossingParams,
    pool: &Address,
) -> Result<CrossingSwap, RouterError> {
    match simulate_swap(state, fee_bps, params) {
        Ok(swap) => Ok(swap),
        Err(CurveError::PriceLimitReached) => {
            let bound = params.sqrt_price_limit.unwrap_or_default();
            let unguarded = CrossingParams {
                sqrt_price_limit: None,
                ..*params
            };
            let realized = simulate_swap(state, fee_bps, &unguarded)
                .map(|s| s.sqrt_price_x96)
                .unwrap_or(state.sqrt_price_x96);
            Err(RouterError::SlippageExceeded { realized, bound })
        }
        Err(e) => Err(e.at_pool(pool)),
    }
}

/// Adapters by pool kind
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<PoolKind, Adapter>,
}

/// Registry shared between the quote engine and the router; replaced
/// wholesale by the owner-gated `set_adapters`
pub type SharedRegistry = Arc<RwLock<AdapterRegistry>>;

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pair(cl: ConcentratedLiquidityAdapter, cp: ConstantProductAdapter) -> Self {
        let mut registry = Self::new();
        registry.set_adapters(cl, cp);
        registry
    }

    /// Register an adapter, replacing the previous one of the same kind.
    pub fn register(&mut self, adapter: Adapter) -> Option<Adapter> {
        self.adapters.insert(adapter.kind(), adapter)
    }

    pub fn set_adapters(&mut self, cl: ConcentratedLiquidityAdapter, cp: ConstantProductAdapter) {
        self.register(Adapter::ConcentratedLiquidity(cl));
        self.register(Adapter::ConstantProduct(cp));
    }

    pub fn get(&self, kind: PoolKind) -> Result<&Adapter, RouterError> {
        self.adapters
            .get(&kind)
            .ok_or_else(|| RouterError::config(format!("no {} adapter registered", kind)))
    }

    /// Registered kinds, in a fixed order
    pub fn kinds(&self) -> impl Iterator<Item = PoolKind> + '_ {
        self.adapters.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Addresses for the deployment record; `None` until both kinds are wired
    pub fn addresses(&self) -> Option<AdapterAddresses> {
        Some(AdapterAddresses {
            concentrated_liquidity: self
                .adapters
                .get(&PoolKind::ConcentratedLiquidity)?
                .address()
                .clone(),
            constant_product: self.adapters.get(&PoolKind::ConstantProduct)?.address().clone(),
        })
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick_math::sqrt_ratio_at_tick;
    use chain_client::{Ledger, TickInfo};

    fn tok(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn cp_adapter() -> Adapter {
        Adapter::ConstantProduct(ConstantProductAdapter { address: tok(0xc2) })
    }

    fn cl_adapter() -> Adapter {
        Adapter::ConcentratedLiquidity(ConcentratedLiquidityAdapter {
            address: tok(0xc1),
            max_slices: 64,
        })
    }

    fn cp_pool() -> PoolSnapshot {
        PoolSnapshot::constant_product(tok(0xa1), (tok(1), 1_000_000), (tok(2), 2_000_000), 30)
    }

    fn cl_pool() -> PoolSnapshot {
        let liquidity = 1_000_000_000_000_000_000u128;
        PoolSnapshot::concentrated(
            tok(0xb1),
            tok(1),
            tok(2),
            5,
            ConcentratedState {
                sqrt_price_x96: 1 << 96,
                tick: 0,
                liquidity,
                ticks: vec![
                    TickInfo { index: -600, liquidity_net: liquidity as i128 },
                    TickInfo { index: 600, liquidity_net: -(liquidity as i128) },
                ],
            },
        )
    }

    #[test]
    fn test_constant_product_quote_both_modes() {
        let pool = cp_pool();
        let exact_in = cp_adapter()
            .quote(&pool, &tok(1), &tok(2), 10_000, SwapMode::ExactIn)
            .unwrap();
        assert_eq!(exact_in.amount_out, calculate_output(1_000_000, 2_000_000, 10_000, 30).unwrap());
        assert_eq!(exact_in.pool_fee, 30);
        assert!(exact_in.zero_for_one);

        let exact_out = cp_adapter()
            .quote(&pool, &tok(1), &tok(2), exact_in.amount_out, SwapMode::ExactOut)
            .unwrap();
        assert!(exact_out.amount_in <= 10_000);
    }

    #[test]
    fn test_quote_rejects_wrong_kind_and_pair() {
        let err = cl_adapter()
            .quote(&cp_pool(), &tok(1), &tok(2), 10, SwapMode::ExactIn)
            .unwrap_err();
        assert!(matches!(err, RouterError::ConfigurationError { .. }));

        let err = cp_adapter()
            .quote(&cp_pool(), &tok(1), &tok(3), 10, SwapMode::ExactIn)
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidRoute { .. }));
    }

    #[test]
    fn test_concentrated_quote_reports_end_price() {
        let hop = cl_adapter()
            .quote(&cl_pool(), &tok(2), &tok(1), 1_000_000_000_000, SwapMode::ExactIn)
            .unwrap();
        assert!(!hop.zero_for_one);
        assert!(hop.sqrt_price_after.unwrap() > 1 << 96);
        assert_eq!(hop.slices, 1);
    }

    #[test]
    fn test_concentrated_price_guard_is_slippage() {
        let limit = sqrt_ratio_at_tick(1).unwrap();
        let err = cl_adapter()
            .quote_with_limit(
                &cl_pool(),
                &tok(2),
                &tok(1),
                1_000_000_000_000_000,
                SwapMode::ExactIn,
                Some(limit),
            )
            .unwrap_err();
        match err {
            RouterError::SlippageExceeded { realized, bound } => {
                assert_eq!(bound, limit);
                assert!(realized > limit);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_swap_moves_funds_and_reserves() {
        let ledger = Ledger::new();
        let pool = cp_pool();
        ledger.add_pool(pool.clone()).await;
        let (router, user) = (tok(0xee), tok(0x55));
        ledger.mint(&tok(1), &router, 10_000).await;

        let (hop, _) = ledger
            .transact(|tx| {
                cp_adapter().swap(tx, &pool.address, &tok(1), &tok(2), 10_000, &router, &user, None)
            })
            .await
            .unwrap();

        assert_eq!(ledger.balance_of(&tok(2), &user).await, hop.amount_out);
        assert_eq!(ledger.balance_of(&tok(1), &router).await, 0);
        let after = ledger.pool(&pool.address).await.unwrap();
        assert_eq!(after.reserves_for(&tok(1)), Some((1_010_000, 2_000_000 - hop.amount_out)));
    }

    #[tokio::test]
    async fn test_concentrated_swap_updates_price() {
        let ledger = Ledger::new();
        let pool = cl_pool();
        ledger.add_pool(pool.clone()).await;
        let funded = ledger.balance_of(&tok(1), &pool.address).await;
        assert!(funded > 0);
        let (router, user) = (tok(0xee), tok(0x55));
        ledger.mint(&tok(2), &router, 1_000_000_000).await;

        let (hop, _) = ledger
            .transact(|tx| {
                cl_adapter().swap(tx, &pool.address, &tok(2), &tok(1), 1_000_000_000, &router, &user, None)
            })
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(&tok(1), &pool.address).await, funded - hop.amount_out);

        let after = ledger.pool(&pool.address).await.unwrap();
        match after.liquidity {
            PoolLiquidity::ConcentratedLiquidity(state) => assert!(state.sqrt_price_x96 > 1 << 96),
            _ => unreachable!(),
        }
        assert!(ledger.balance_of(&tok(1), &user).await > 0);
    }

    #[test]
    fn test_registry() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.get(PoolKind::ConstantProduct).is_err());
        assert!(registry.addresses().is_none());

        registry.set_adapters(
            ConcentratedLiquidityAdapter { address: tok(0xc1), max_slices: 8 },
            ConstantProductAdapter { address: tok(0xc2) },
        );
        assert_eq!(registry.kinds().count(), 2);
        let addresses = registry.addresses().unwrap();
        assert_eq!(addresses.constant_product, tok(0xc2));

        let replaced = registry.register(cp_adapter());
        assert!(replaced.is_some());
    }
}

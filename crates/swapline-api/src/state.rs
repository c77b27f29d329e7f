//! Application state shared across API handlers

use std::collections::HashMap;
use std::sync::Arc;

use amm::{
    now_ms, AdapterRegistry, ConcentratedLiquidityAdapter, ConstantProductAdapter, FeeModule,
    FeeSchedule, Quote, QuoteEngine, SwapRouter,
};
use chain_client::InMemoryChain;
use swapline_core::{AppConfig, ChainConfig, RouterError};
use tokio::sync::RwLock;

/// How long an expired quote stays retrievable for re-derivation
const QUOTE_RETENTION_MS: u64 = 60_000;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    chain: ChainConfig,
    engine: QuoteEngine,
    router: SwapRouter,
    /// quote id -> quote handed out by POST /quote
    quotes: RwLock<HashMap<String, Quote>>,
}

impl AppState {
    pub fn new(chain: ChainConfig, engine: QuoteEngine, router: SwapRouter) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                chain,
                engine,
                router,
                quotes: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Wire the engine and router for `config` on top of an in-memory chain.
    pub fn from_config(config: &AppConfig, chain: InMemoryChain) -> Result<Self, RouterError> {
        let contracts = &config.contracts;
        let registry = AdapterRegistry::from_pair(
            ConcentratedLiquidityAdapter {
                address: contracts.adapters.concentrated_liquidity.clone(),
                max_slices: config.routing.max_cl_slices,
            },
            ConstantProductAdapter {
                address: contracts.adapters.constant_product.clone(),
            },
        )
        .into_shared();
        let fees = FeeSchedule::new(FeeModule::new(config.fee.clone(), config.owner.clone())?);

        let router = SwapRouter::new(
            contracts.router.clone(),
            config.owner.clone(),
            config.chain.wrapped_native.clone(),
            chain.ledger().clone(),
            registry.clone(),
            fees.clone(),
        );
        let engine = QuoteEngine::new(
            Arc::new(chain),
            registry,
            fees,
            config.chain.chain_id,
            config.routing.clone(),
        );
        Ok(Self::new(config.chain.clone(), engine, router))
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.inner.chain
    }

    pub fn engine(&self) -> &QuoteEngine {
        &self.inner.engine
    }

    pub fn router(&self) -> &SwapRouter {
        &self.inner.router
    }

    /// Keep a quote for later execution and return its id.
    pub async fn store_quote(&self, quote: Quote) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        let mut quotes = self.inner.quotes.write().await;
        quotes.retain(|_, q| q.expires_at_ms.saturating_add(QUOTE_RETENTION_MS) > now);
        quotes.insert(id.clone(), quote);
        id
    }

    pub async fn quote(&self, id: &str) -> Option<Quote> {
        self.inner.quotes.read().await.get(id).cloned()
    }
}

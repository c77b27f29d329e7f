//! Configuration types for Swapline

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::deployment::DeployedContracts;
use crate::errors::Error;
use crate::types::constants::{BPS_DENOMINATOR, MAX_BPS};
use crate::types::{Address, Amount, ChainId, Network};

/// Chain the engine routes on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,

    pub network: Network,

    /// Wrapped form of the native asset (e.g. WBNB, WETH). Native-asset
    /// payments are wrapped into this token before the first hop.
    pub wrapped_native: Address,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: ChainId(31337),
            network: Network::Local,
            wrapped_native: Address::repeat_byte(0x0e),
        }
    }
}

/// Notional used for the small-size reference quote behind
/// `priceImpactBps` (and `spreadBps` when [`SpreadNotional::Reference`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSize {
    /// Fixed raw amount of the input token
    Fixed(Amount),
    /// Fraction of the requested input, in basis points (never below 1 unit)
    FractionBps(u32),
}

impl ReferenceSize {
    /// Resolve the reference input amount for a requested input amount.
    pub fn resolve(&self, requested: Amount) -> Amount {
        match *self {
            Self::Fixed(amount) => amount.max(1),
            Self::FractionBps(bps) => {
                let scaled = requested
                    .checked_mul(bps as Amount)
                    .map(|v| v / BPS_DENOMINATOR as Amount)
                    .unwrap_or((requested / BPS_DENOMINATOR as Amount) * bps as Amount);
                scaled.max(1)
            }
        }
    }
}

impl Default for ReferenceSize {
    fn default() -> Self {
        Self::FractionBps(10)
    }
}

/// Notional at which the reverse quote behind `spreadBps` is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadNotional {
    /// Quote the inverse direction at the caller's requested size
    #[default]
    Requested,
    /// Quote both directions at the reference size
    Reference,
}

/// Path search and quoting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Intermediate tokens tried for multi-hop routes
    pub hub_tokens: Vec<Address>,

    /// Maximum hops per route
    pub max_hops: usize,

    /// Maximum tick slices a concentrated-liquidity hop may consume
    pub max_cl_slices: usize,

    /// Per-pool state fetch timeout
    pub fetch_timeout_ms: u64,

    /// Upper bound on concurrent pool state fetches
    pub max_parallel_fetches: usize,

    /// How long a quote stays usable before it must be re-derived
    pub quote_validity_ms: u64,

    /// Accept quotes built while some pools were unreachable
    pub allow_partial_sources: bool,

    pub reference_size: ReferenceSize,

    pub spread_notional: SpreadNotional,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            hub_tokens: Vec::new(),
            max_hops: 3,
            max_cl_slices: 64,
            fetch_timeout_ms: 2_000,
            max_parallel_fetches: 16,
            quote_validity_ms: 3_000,
            allow_partial_sources: true,
            reference_size: ReferenceSize::default(),
            spread_notional: SpreadNotional::default(),
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_hops == 0 {
            return Err(Error::Config("max_hops must be at least 1".into()));
        }
        if self.max_cl_slices == 0 {
            return Err(Error::Config("max_cl_slices must be at least 1".into()));
        }
        if self.max_parallel_fetches == 0 {
            return Err(Error::Config("max_parallel_fetches must be at least 1".into()));
        }
        if let ReferenceSize::FractionBps(bps) = self.reference_size {
            if bps == 0 || bps > MAX_BPS {
                return Err(Error::Config(format!(
                    "reference fraction {} bps outside (0, {}]",
                    bps, MAX_BPS
                )));
            }
        }
        Ok(())
    }
}

/// Which side of the swap the protocol fee is taken from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSide {
    /// Deducted from the gross input before the first hop
    #[default]
    Input,
    /// Deducted from the gross output after the last hop
    Output,
}

/// Protocol fee configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee in basis points, `0..=10000`
    pub bps: u32,

    /// Address receiving protocol fee proceeds
    pub treasury: Address,

    #[serde(default)]
    pub side: FeeSide,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            bps: 0,
            treasury: Address::zero(),
            side: FeeSide::Input,
        }
    }
}

impl FeeConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.bps > MAX_BPS {
            return Err(Error::Config(format!(
                "fee {} bps exceeds {}",
                self.bps, MAX_BPS
            )));
        }
        if self.bps > 0 && self.treasury.is_zero() {
            return Err(Error::Config("non-zero fee requires a treasury".into()));
        }
        Ok(())
    }
}

/// HTTP API listener and browser access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Interface to bind
    pub host: IpAddr,

    pub port: u16,

    /// Origins allowed by CORS. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 18545,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), Error> {
        for origin in &self.cors_origins {
            let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
            if !scheme_ok || origin.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(Error::Config(format!("invalid CORS origin {:?}", origin)));
            }
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub fee: FeeConfig,

    /// Owner allowed to call the administrative operations
    pub owner: Address,

    /// Router and adapter addresses
    #[serde(default)]
    pub contracts: DeployedContracts,

    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            routing: RoutingConfig::default(),
            fee: FeeConfig::default(),
            owner: Address::zero(),
            contracts: DeployedContracts::default(),
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.routing.validate()?;
        self.fee.validate()?;
        self.api.validate()?;
        if self.owner.is_zero() {
            return Err(Error::Config("owner must be set".into()));
        }
        if self.contracts.router.is_zero() {
            return Err(Error::Config("router address must be set".into()));
        }
        Ok(())
    }
}

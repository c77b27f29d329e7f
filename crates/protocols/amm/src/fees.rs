//! Fee & Treasury Module
//!
//! Holds the protocol fee configuration and per-token accrual bookkeeping.
//! The quote engine reads it to predict net amounts; the router reads it to
//! deduct the fee and forward it to the treasury. Only the owner may change
//! it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use swapline_core::constants::{BPS_DENOMINATOR, MAX_BPS};
use swapline_core::{Address, Amount, Error, FeeConfig, FeeSide, RouterError};
use tokio::sync::RwLock;

use crate::calculator::mul_div;

/// A gross amount divided into protocol fee and net. `fee + net == gross`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub gross: Amount,
    pub fee: Amount,
    pub net: Amount,
}

/// Split `gross`, flooring the fee.
pub fn split_fee(bps: u32, gross: Amount) -> FeeSplit {
    let fee = mul_div(gross, bps.min(MAX_BPS) as u128, BPS_DENOMINATOR as u128).unwrap_or(gross);
    FeeSplit {
        gross,
        fee,
        net: gross - fee,
    }
}

/// Smallest gross whose [`split_fee`] leaves exactly `net`.
///
/// `gross - floor(gross * bps / D) = ceil(gross * (D - bps) / D)`, so the
/// minimum is `floor((net - 1) * D / (D - bps)) + 1`.
pub fn gross_for_net(bps: u32, net: Amount) -> Result<Amount, RouterError> {
    if net == 0 {
        return Ok(0);
    }
    if bps >= BPS_DENOMINATOR {
        return Err(RouterError::config(
            "a 100% protocol fee leaves nothing to deliver",
        ));
    }
    let keep = (BPS_DENOMINATOR - bps) as u128;
    mul_div(net - 1, BPS_DENOMINATOR as u128, keep)
        .and_then(|g| g.checked_add(1))
        .ok_or_else(|| RouterError::invalid_amount("amount too large after protocol fee"))
}

fn into_router_error(err: Error) -> RouterError {
    match err {
        Error::Config(reason) => RouterError::config(reason),
        other => RouterError::config(other.to_string()),
    }
}

/// Fee configuration plus accrued totals
#[derive(Debug, Clone)]
pub struct FeeModule {
    config: FeeConfig,
    owner: Address,
    /// token -> total fee settled to the treasury
    accrued: BTreeMap<Address, Amount>,
}

impl FeeModule {
    pub fn new(config: FeeConfig, owner: Address) -> Result<Self, RouterError> {
        config.validate().map_err(into_router_error)?;
        Ok(Self {
            config,
            owner,
            accrued: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn bps(&self) -> u32 {
        self.config.bps
    }

    pub fn side(&self) -> FeeSide {
        self.config.side
    }

    pub fn treasury(&self) -> &Address {
        &self.config.treasury
    }

    pub fn split(&self, gross: Amount) -> FeeSplit {
        split_fee(self.config.bps, gross)
    }

    pub fn gross_for_net(&self, net: Amount) -> Result<Amount, RouterError> {
        gross_for_net(self.config.bps, net)
    }

    /// Ready to settle fees: a charging module needs somewhere to send them.
    pub fn check_wiring(&self) -> Result<(), RouterError> {
        if self.config.bps > 0 && self.config.treasury.is_zero() {
            return Err(RouterError::config("protocol fee set but no treasury"));
        }
        Ok(())
    }

    /// Owner-gated update of the fee rate and treasury.
    pub fn set_fee(&mut self, caller: &Address, bps: u32, treasury: Address) -> Result<(), RouterError> {
        if *caller != self.owner {
            return Err(RouterError::Unauthorized {
                caller: caller.clone(),
            });
        }
        if bps > MAX_BPS {
            return Err(RouterError::invalid_amount(format!(
                "fee {} bps exceeds {}",
                bps, MAX_BPS
            )));
        }
        let config = FeeConfig {
            bps,
            treasury,
            side: self.config.side,
        };
        config.validate().map_err(into_router_error)?;
        self.config = config;
        Ok(())
    }

    pub fn record_accrual(&mut self, token: &Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        let entry = self.accrued.entry(token.clone()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn accrued(&self, token: &Address) -> Amount {
        self.accrued.get(token).copied().unwrap_or(0)
    }
}

/// Shared handle to the fee module
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    inner: Arc<RwLock<FeeModule>>,
}

impl FeeSchedule {
    pub fn new(module: FeeModule) -> Self {
        Self {
            inner: Arc::new(RwLock::new(module)),
        }
    }

    /// Consistent copy for one quote or one execution
    pub async fn snapshot(&self) -> FeeModule {
        self.inner.read().await.clone()
    }

    pub async fn config(&self) -> FeeConfig {
        self.inner.read().await.config.clone()
    }

    pub async fn set_fee(&self, caller: &Address, bps: u32, treasury: Address) -> Result<(), RouterError> {
        let mut module = self.inner.write().await;
        module.set_fee(caller, bps, treasury)?;
        tracing::info!(bps, treasury = %module.config.treasury, "Protocol fee updated");
        Ok(())
    }

    pub async fn record_accrual(&self, token: &Address, amount: Amount) {
        self.inner.write().await.record_accrual(token, amount);
    }

    pub async fn accrued(&self, token: &Address) -> Amount {
        self.inner.read().await.accrued(token)
    }
}

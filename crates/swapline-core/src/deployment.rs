//! Deployment record
//!
//! One JSON file per chain (`<dir>/<chain_id>.json`), overwritten on every
//! redeploy. Tooling reads it; the engine itself never does.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::{Address, ChainId, Network};

/// Deployed adapter contracts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterAddresses {
    pub concentrated_liquidity: Address,
    pub constant_product: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContracts {
    pub adapters: AdapterAddresses,
    pub router: Address,
}

/// Fixed addresses used by a local in-memory deployment
impl Default for DeployedContracts {
    fn default() -> Self {
        Self {
            adapters: AdapterAddresses {
                concentrated_liquidity: Address::repeat_byte(0xc1),
                constant_product: Address::repeat_byte(0xc2),
            },
            router: Address::repeat_byte(0xd0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub chain_id: ChainId,
    pub network: Network,
    pub contracts: DeployedContracts,
    pub owner: Address,
    pub treasury: Address,
    pub timestamp: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Path of the record for `chain_id` under `dir`
    pub fn path_for(dir: impl AsRef<Path>, chain_id: ChainId) -> PathBuf {
        dir.as_ref().join(format!("{}.json", chain_id))
    }

    /// Write the record, replacing any previous one for the same chain.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Config(format!("cannot create {}: {}", dir.display(), e)))?;
        let path = Self::path_for(dir, self.chain_id);
        let json =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(&path, json)
            .map_err(|e| Error::Config(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    pub fn load(dir: impl AsRef<Path>, chain_id: ChainId) -> Result<Self, Error> {
        let path = Self::path_for(dir, chain_id);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| Error::Serialization(e.to_string()))
    }
}

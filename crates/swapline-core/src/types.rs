//! Core type definitions for Swapline

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::Error;

/// Raw token amount in the token's smallest unit.
pub type Amount = u128;

/// Block height
pub type BlockHeight = u64;

/// Account, contract, pool or token address (20 bytes, `0x`-prefixed lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Wrap an address string, normalising it to lowercase.
    ///
    /// No validation is performed; use [`Address::parse`] for untrusted input.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into().to_ascii_lowercase())
    }

    /// Parse and validate a `0x`-prefixed 20-byte hex address.
    pub fn parse(addr: &str) -> Result<Self, Error> {
        let body = addr
            .strip_prefix("0x")
            .ok_or_else(|| Error::Config(format!("address {} is missing 0x prefix", addr)))?;
        let bytes = hex::decode(body)
            .map_err(|e| Error::Config(format!("address {} is not hex: {}", addr, e)))?;
        if bytes.len() != 20 {
            return Err(Error::Config(format!(
                "address {} has {} bytes, expected 20",
                addr,
                bytes.len()
            )));
        }
        Ok(Self::new(addr))
    }

    /// Build an address whose 20 bytes all equal `byte`. Handy for fixtures.
    pub fn repeat_byte(byte: u8) -> Self {
        Self(format!("0x{}", hex::encode([byte; 20])))
    }

    /// The zero address
    pub fn zero() -> Self {
        Self::repeat_byte(0)
    }

    /// Sentinel address standing for the chain's native asset
    pub fn native() -> Self {
        Self::repeat_byte(0xee)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub fn is_native(&self) -> bool {
        *self == Self::native()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines (`0x1234…abcd`)
    pub fn short(&self) -> String {
        if self.0.len() <= 12 {
            return self.0.clone();
        }
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// EVM chain id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Local,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Constants
pub mod constants {
    /// Basis-point denominator (10 000 = 100%)
    pub const BPS_DENOMINATOR: u32 = 10_000;

    /// Highest accepted fee or slippage value in basis points
    pub const MAX_BPS: u32 = BPS_DENOMINATOR;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_normalises_case() {
        let addr = Address::parse("0xBB4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c").unwrap();
        assert_eq!(addr.as_str(), "0xbb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c");
    }

    #[test]
    fn test_address_parse_rejects_bad_input() {
        assert!(Address::parse("bb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzz4cdb9cbd36b01bd1cbaebf2de08d9173bc095c").is_err());
    }

    #[test]
    fn test_sentinels() {
        assert!(Address::zero().is_zero());
        assert!(Address::native().is_native());
        assert!(!Address::native().is_zero());
        assert!(Address::repeat_byte(1) < Address::repeat_byte(2));
    }

    #[test]
    fn test_network_display() {
        assert_eq!(Network::Mainnet.as_str(), "mainnet");
        assert_eq!(Network::Testnet.to_string(), "testnet");
    }
}

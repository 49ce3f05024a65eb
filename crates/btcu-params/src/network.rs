//! BTCU network definitions

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Mainnet
    Mainnet,
    /// Testnet
    Testnet,
    /// Regtest (local development)
    Regtest,
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Mainnet),
            "test" | "testnet" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            other => Err(Error::InvalidNetwork(other.to_string())),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone)]
pub struct Network {
    /// Network type
    pub network_type: NetworkType,
    /// Human-readable name
    pub name: &'static str,
    /// Base58 prefix for pay-to-key-hash addresses
    pub pubkey_address_prefix: u8,
    /// Base58 prefix for pay-to-script-hash addresses
    pub script_address_prefix: u8,
    /// Base58 prefix for cold-staking (staker) addresses
    pub staking_address_prefix: u8,
    /// Base58 prefix for leasing (leaser) addresses
    pub leasing_address_prefix: u8,
}

impl Network {
    /// Get mainnet parameters
    pub const fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            name: "mainnet",
            pubkey_address_prefix: 0,
            script_address_prefix: 5,
            staking_address_prefix: 63,
            leasing_address_prefix: 48,
        }
    }

    /// Get testnet parameters
    pub const fn testnet() -> Self {
        Self {
            network_type: NetworkType::Testnet,
            name: "testnet",
            pubkey_address_prefix: 111,
            script_address_prefix: 196,
            staking_address_prefix: 73,
            leasing_address_prefix: 85,
        }
    }

    /// Get regtest parameters
    pub const fn regtest() -> Self {
        Self {
            network_type: NetworkType::Regtest,
            name: "regtest",
            pubkey_address_prefix: 111,
            script_address_prefix: 196,
            staking_address_prefix: 73,
            leasing_address_prefix: 85,
        }
    }

    /// Get network by type
    pub const fn from_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::testnet(),
            NetworkType::Regtest => Self::regtest(),
        }
    }
}

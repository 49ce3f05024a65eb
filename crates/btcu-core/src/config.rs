//! Wallet ledger configuration

use crate::fees::{DEFAULT_MAX_TX_FEE, DEFAULT_PAY_TX_FEE_PER_KB};
use crate::{Error, Result};
use btcu_params::{Amount, ConsensusParams, NetworkType};
use serde::{Deserialize, Serialize};

/// Wallet ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Network the wallet runs on
    pub network: NetworkType,
    /// Trust our own unconfirmed change when selecting and balancing
    pub spend_zero_conf_change: bool,
    /// Confirmations required on coins we sent ourselves
    pub min_depth_mine: i32,
    /// Confirmations required on coins received from others
    pub min_depth_theirs: i32,
    /// Fee rate per kilobyte
    pub pay_tx_fee_per_kb: Amount,
    /// Absolute fee ceiling for one transaction
    pub max_tx_fee: Amount,
    /// Count watch-only outputs in coin listings
    pub include_watch_only: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: NetworkType::Mainnet,
            spend_zero_conf_change: true,
            min_depth_mine: 1,
            min_depth_theirs: 6,
            pay_tx_fee_per_kb: DEFAULT_PAY_TX_FEE_PER_KB,
            max_tx_fee: DEFAULT_MAX_TX_FEE,
            include_watch_only: false,
        }
    }
}

impl WalletConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        if self.min_depth_mine < 0 || self.min_depth_theirs < 0 {
            return Err(Error::Config("minimum depths must not be negative".to_string()));
        }
        if self.pay_tx_fee_per_kb < 0 {
            return Err(Error::Config(format!(
                "fee rate {} must not be negative",
                self.pay_tx_fee_per_kb
            )));
        }
        if self.max_tx_fee < self.pay_tx_fee_per_kb {
            return Err(Error::Config(format!(
                "max_tx_fee {} below fee rate {}",
                self.max_tx_fee, self.pay_tx_fee_per_kb
            )));
        }
        Ok(())
    }

    /// Consensus parameters for the configured network.
    pub fn consensus(&self) -> ConsensusParams {
        ConsensusParams::from_network(self.network)
    }
}

//! Consensus-derived parameters the wallet ledger depends on

use crate::network::{Network, NetworkType};

/// Signed monetary amount in the smallest unit.
pub type Amount = i64;

/// One coin in the smallest unit.
pub const COIN: Amount = 100_000_000;

/// One hundredth of a coin.
pub const CENT: Amount = 1_000_000;

/// Consensus parameters
#[derive(Debug, Clone)]
pub struct ConsensusParams {
    /// Network configuration
    pub network: Network,
    /// Blocks a coinbase/coinstake reward must wait before it is spendable
    pub coinbase_maturity: i32,
    /// Depth at which an ordinary transaction is shown as confirmed
    pub recommended_confirmations: i32,
    /// Lock times below this value are block heights, above it timestamps
    pub locktime_threshold: u32,
    /// Lock signatures needed before an unconfirmed entry is treated as locked
    pub instant_lock_signatures_required: i32,
    /// Depth credited to an instantly locked, still unconfirmed entry
    pub instant_lock_depth: i32,
    /// Seconds after receipt with no peer requests before an entry is offline
    pub offline_threshold_secs: i64,
    /// Standard mixing denominations, largest first
    pub mixing_denominations: Vec<Amount>,
    /// Collateral paid by a mixing session
    pub mixing_collateral: Amount,
    /// Value of a masternode collateral output
    pub masternode_collateral: Amount,
    /// Confirmations before a privacy-coin mint may be spent
    pub privacy_mint_confirmations: i32,
    /// Minimum depth for an output to take part in staking
    pub stake_min_depth: i32,
    /// Maximum supply
    pub max_money: Amount,
}

impl ConsensusParams {
    /// Create consensus params for mainnet
    pub fn mainnet() -> Self {
        Self {
            network: Network::mainnet(),
            coinbase_maturity: 100,
            recommended_confirmations: 6,
            locktime_threshold: 500_000_000,
            instant_lock_signatures_required: 6,
            instant_lock_depth: 5,
            offline_threshold_secs: 2 * 60,
            mixing_denominations: default_denominations(),
            mixing_collateral: 10 * COIN,
            masternode_collateral: 1_000 * COIN,
            privacy_mint_confirmations: 20,
            stake_min_depth: 600,
            max_money: 21_000_000 * COIN,
        }
    }

    /// Create consensus params for testnet
    pub fn testnet() -> Self {
        Self {
            network: Network::testnet(),
            stake_min_depth: 100,
            ..Self::mainnet()
        }
    }

    /// Create consensus params for regtest
    pub fn regtest() -> Self {
        Self {
            network: Network::regtest(),
            coinbase_maturity: 10,
            privacy_mint_confirmations: 2,
            stake_min_depth: 0,
            ..Self::mainnet()
        }
    }

    /// Get consensus params by network type
    pub fn from_network(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::testnet(),
            NetworkType::Regtest => Self::regtest(),
        }
    }

    /// Blocks remaining before a reward at `depth` matures.
    pub fn blocks_to_maturity(&self, depth: i32) -> i32 {
        ((self.coinbase_maturity + 1) - depth).max(0)
    }

    /// Whether `amount` equals one of the mixing denominations.
    pub fn is_denominated_amount(&self, amount: Amount) -> bool {
        self.mixing_denominations.contains(&amount)
    }

    /// Whether `amount` looks like a mixing collateral output.
    pub fn is_collateral_amount(&self, amount: Amount) -> bool {
        amount != 0
            && amount % self.mixing_collateral == 0
            && amount < self.mixing_collateral * 5
            && amount > self.mixing_collateral
    }

    /// Check if amount is valid (within max supply)
    pub fn is_valid_amount(&self, amount: Amount) -> bool {
        (0..=self.max_money).contains(&amount)
    }
}

fn default_denominations() -> Vec<Amount> {
    vec![
        (10_000 * COIN) + 10_000_000,
        (1_000 * COIN) + 1_000_000,
        (100 * COIN) + 100_000,
        (10 * COIN) + 10_000,
        COIN + 1_000,
        (COIN / 10) + 100,
    ]
}

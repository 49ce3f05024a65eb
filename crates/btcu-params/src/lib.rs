//! BTCU network parameters and constants
//!
//! This crate provides network-specific constants and the consensus-derived
//! values the wallet ledger needs: maturity windows, confirmation targets,
//! mixing denominations and address prefixes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consensus;
pub mod network;

pub use consensus::{Amount, ConsensusParams, CENT, COIN};
pub use network::{Network, NetworkType};

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid network specified
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Invalid block height
    #[error("Invalid block height: {0}")]
    InvalidHeight(i64),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;

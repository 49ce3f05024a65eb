//! BTCU wallet ledger core
//!
//! This crate implements the wallet ledger engine of a proof-of-stake UTXO
//! chain: entry storage, spend tracking and conflict resolution, transaction
//! classification, confirmation status, balance accounting and coin
//! selection. Chain state, keys, privacy coins and storage are reached
//! through collaborator traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod entry;
pub mod error;
pub mod fees;
pub mod ownership;
pub mod persistence;
pub mod primitives;
pub mod privacy;
pub mod records;
pub mod selection;
pub mod spends;
pub mod status;
pub mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod view;
pub mod wallet;

pub use balance::WalletBalances;
pub use chain::{BlockInfo, ChainTip, ChainView, NoRelay, RelayMonitor};
pub use classifier::Shape;
pub use config::WalletConfig;
pub use entry::{ChainPosition, LedgerEntry, MIXING_MARKER};
pub use error::{Error, ErrorCategory, Result};
pub use fees::{FeeCalculator, FeeRate, DEFAULT_MAX_TX_FEE, DEFAULT_PAY_TX_FEE_PER_KB, MIN_RELAY_FEE_PER_KB};
pub use ownership::{Ownership, OwnershipFilter, OwnershipOracle};
pub use persistence::Persistence;
pub use primitives::{
    AddressKind, BlockHash, Destination, Hash160, InputScript, OutPoint, Script, Transaction, TxId,
    TxIn, TxOut,
};
pub use privacy::{PrivacyOracle, ScriptPrivacy};
pub use records::{Category, TransactionRecord};
pub use selection::{
    CoinCandidate, CoinFilter, CoinSelector, CoinTags, CoinType, SelectionResult,
    SelectionStrategy,
};
pub use spends::SpendIndex;
pub use status::{StatusKind, TransactionStatus};
pub use store::{EntryStore, Upsert};
pub use view::{LedgerView, Trust};
pub use wallet::{BlockPosition, Collaborators, FundingPlan, Wallet};

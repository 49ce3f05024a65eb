//! Error types for BTCU Core
//!
//! Error taxonomy for ledger reconciliation, classification and coin selection.

use crate::primitives::TxId;
use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// BTCU Core errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Insufficient funds for the requested selection
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Entry matched no classifier branch
    #[error("Ambiguous classification for {0}")]
    AmbiguousClassification(TxId),

    /// Dirty cached aggregate read without recompute
    #[error("Stale cache read: {0}")]
    StaleCache(String),

    /// The local transaction graph contains a cycle
    #[error("Conflict resolution cycle through {0}")]
    ConflictResolutionCycle(TxId),

    /// Transaction is not known to the wallet
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TxId),

    /// Operation not allowed in the entry's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Ownership oracle failure
    #[error("Ownership oracle error: {0}")]
    Ownership(String),

    /// Chain view failure
    #[error("Chain view error: {0}")]
    Chain(String),

    /// Persistence failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount overflow
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Fee too high
    #[error("Fee too high: {0}")]
    FeeTooHigh(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if error is a user-facing error (vs internal error)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InsufficientFunds(_)
                | Error::InvalidAmount(_)
                | Error::FeeTooHigh(_)
                | Error::Config(_)
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::InsufficientFunds(_) => {
                "You don't have enough funds for this transaction. Please check your balance and try again.".to_string()
            }
            Error::InvalidAmount(_) => {
                "The amount is invalid. Please enter a valid amount.".to_string()
            }
            Error::FeeTooHigh(_) => {
                "The transaction fee exceeds the configured maximum. Please review.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging/metrics
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InsufficientFunds(_) | Error::InvalidAmount(_) | Error::AmountOverflow(_) => {
                ErrorCategory::Amount
            }
            Error::FeeTooHigh(_) => ErrorCategory::Fee,
            Error::AmbiguousClassification(_) => ErrorCategory::Classification,
            Error::UnknownTransaction(_) | Error::InvalidState(_) => ErrorCategory::Ledger,
            Error::Ownership(_) | Error::Chain(_) => ErrorCategory::Collaborator,
            Error::Persistence(_) => ErrorCategory::Storage,
            Error::Config(_) => ErrorCategory::Config,
            Error::StaleCache(_) | Error::ConflictResolutionCycle(_) | Error::Serialization(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Amount-related errors
    Amount,
    /// Fee-related errors
    Fee,
    /// Classifier diagnostics
    Classification,
    /// Ledger state errors
    Ledger,
    /// Oracle and chain view failures
    Collaborator,
    /// Storage-related errors
    Storage,
    /// Configuration errors
    Config,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Amount => write!(f, "Amount"),
            ErrorCategory::Fee => write!(f, "Fee"),
            ErrorCategory::Classification => write!(f, "Classification"),
            ErrorCategory::Ledger => write!(f, "Ledger"),
            ErrorCategory::Collaborator => write!(f, "Collaborator"),
            ErrorCategory::Storage => write!(f, "Storage"),
            ErrorCategory::Config => write!(f, "Config"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

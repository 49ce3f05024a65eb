//! Storage error types

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database belongs to another network
    #[error("Network mismatch: database is {stored}, wallet is {requested}")]
    NetworkMismatch {
        /// Network recorded in the database
        stored: String,
        /// Network the caller opened it for
        requested: String,
    },

    /// Stored row failed validation
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for btcu_core::Error {
    fn from(err: Error) -> Self {
        btcu_core::Error::Persistence(err.to_string())
    }
}

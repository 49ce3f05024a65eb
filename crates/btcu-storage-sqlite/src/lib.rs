//! SQLite storage for the BTCU wallet ledger
//!
//! Provides a WAL-mode database with versioned migrations and a
//! [`SqliteLedgerStore`] that plugs into [`btcu_core::Wallet`] as its
//! persistence collaborator. Entries are stored as JSON payloads keyed by
//! txid, with order position and chain position copied into indexed
//! columns.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod database;
pub mod error;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod store;

pub use database::Database;
pub use error::{Error, Result};
pub use models::{position_tag, LedgerEntryRow};
pub use repository::Repository;
pub use store::{SqliteLedgerStore, BASE_BACKOFF_MS, MAX_BACKOFF_MS, MAX_BUSY_RETRIES};

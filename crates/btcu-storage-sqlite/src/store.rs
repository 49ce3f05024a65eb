//! SQLite-backed ledger persistence
//!
//! Implements [`btcu_core::Persistence`] on top of [`Database`] and
//! [`Repository`]. Writes retry with backoff while another connection
//! holds the database busy.

use crate::models::LedgerEntryRow;
use crate::{Database, Error, Repository, Result};
use btcu_core::{LedgerEntry, Persistence, TxId};
use btcu_params::{Network, NetworkType};
use parking_lot::Mutex;
use rusqlite::ErrorCode;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Maximum retry attempts for SQLITE_BUSY
pub const MAX_BUSY_RETRIES: u32 = 5;

/// Base backoff duration in milliseconds
pub const BASE_BACKOFF_MS: u64 = 50;

/// Maximum backoff duration in milliseconds
pub const MAX_BACKOFF_MS: u64 = 1000;

const NETWORK_KEY: &str = "network";

/// Ledger entries stored as JSON rows keyed by txid.
pub struct SqliteLedgerStore {
    db: Mutex<Database>,
    network: NetworkType,
}

impl SqliteLedgerStore {
    /// Open the store at `path` for `network`.
    ///
    /// A fresh database is stamped with the network; reopening it for a
    /// different network fails with [`Error::NetworkMismatch`].
    pub fn open<P: AsRef<Path>>(path: P, network: NetworkType) -> Result<Self> {
        Self::with_database(Database::open(path)?, network)
    }

    /// In-memory store, mostly for tests.
    pub fn open_in_memory(network: NetworkType) -> Result<Self> {
        Self::with_database(Database::open_in_memory()?, network)
    }

    fn with_database(db: Database, network: NetworkType) -> Result<Self> {
        let requested = Network::from_type(network).name;
        {
            let repo = Repository::new(&db);
            match repo.get_meta(NETWORK_KEY)? {
                Some(stored) if stored != requested => {
                    return Err(Error::NetworkMismatch {
                        stored,
                        requested: requested.to_string(),
                    });
                }
                Some(_) => {}
                None => repo.set_meta(NETWORK_KEY, requested)?,
            }
        }
        Ok(Self {
            db: Mutex::new(db),
            network,
        })
    }

    /// Network this store belongs to
    pub fn network(&self) -> NetworkType {
        self.network
    }

    /// Number of stored entries
    pub fn len(&self) -> Result<usize> {
        let db = self.db.lock();
        let count = Repository::new(&db).count_entries()?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Stored copy of one entry
    pub fn get(&self, txid: &TxId) -> Result<Option<LedgerEntry>> {
        let db = self.db.lock();
        Repository::new(&db)
            .get_entry(&txid.to_string())?
            .map(LedgerEntryRow::into_entry)
            .transpose()
    }

    /// Write several entries in one transaction.
    fn save_rows(&self, entries: &[LedgerEntry]) -> Result<()> {
        let rows = entries
            .iter()
            .map(LedgerEntryRow::from_entry)
            .collect::<Result<Vec<_>>>()?;
        let mut db = self.db.lock();
        with_retry(|| {
            let tx = db.transaction()?;
            for row in &rows {
                tx.execute(
                    "INSERT INTO ledger_entries (txid, order_pos, position, block_hash, payload, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(txid) DO UPDATE SET
                       order_pos=excluded.order_pos,
                       position=excluded.position,
                       block_hash=excluded.block_hash,
                       payload=excluded.payload,
                       updated_at=excluded.updated_at",
                    rusqlite::params![
                        row.txid,
                        row.order_pos,
                        row.position,
                        row.block_hash,
                        row.payload,
                        row.updated_at
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })?;
        tracing::debug!("Saved {} ledger entries", rows.len());
        Ok(())
    }

    /// Remove every stored entry.
    pub fn clear(&self) -> Result<()> {
        let db = self.db.lock();
        with_retry(|| Repository::new(&db).clear_entries())?;
        tracing::info!("Cleared ledger store");
        Ok(())
    }

    fn load_rows(&self) -> Result<Vec<LedgerEntry>> {
        let db = self.db.lock();
        let rows = with_retry(|| Repository::new(&db).get_entries())?;
        rows.into_iter().map(LedgerEntryRow::into_entry).collect()
    }

    fn save_row(&self, entry: &LedgerEntry) -> Result<()> {
        let row = LedgerEntryRow::from_entry(entry)?;
        let db = self.db.lock();
        with_retry(|| Repository::new(&db).upsert_entry(&row))
    }

    fn erase_row(&self, txid: &TxId) -> Result<()> {
        let key = txid.to_string();
        let db = self.db.lock();
        let existed = with_retry(|| Repository::new(&db).delete_entry(&key))?;
        if !existed {
            tracing::debug!("Erase of unknown entry {} ignored", key);
        }
        Ok(())
    }
}

impl Persistence for SqliteLedgerStore {
    fn load(&self) -> btcu_core::Result<Vec<LedgerEntry>> {
        let entries = self.load_rows()?;
        tracing::debug!("Loaded {} ledger rows", entries.len());
        Ok(entries)
    }

    fn save(&self, entry: &LedgerEntry) -> btcu_core::Result<()> {
        Ok(self.save_row(entry)?)
    }

    fn save_all(&self, entries: &[LedgerEntry]) -> btcu_core::Result<()> {
        Ok(self.save_rows(entries)?)
    }

    fn erase(&self, txid: &TxId) -> btcu_core::Result<()> {
        Ok(self.erase_row(txid)?)
    }
}

/// Run `f`, retrying on SQLITE_BUSY with exponential backoff.
fn with_retry<F, T>(mut f: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempts = 0;

    loop {
        match f() {
            Ok(result) => return Ok(result),
            Err(Error::Database(ref e)) if is_busy_error(e) && attempts < MAX_BUSY_RETRIES => {
                attempts += 1;
                let backoff = calculate_backoff(attempts);
                tracing::debug!(
                    "SQLITE_BUSY (attempt {}/{}), retrying in {}ms",
                    attempts,
                    MAX_BUSY_RETRIES,
                    backoff
                );
                thread::sleep(Duration::from_millis(backoff));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Check if error is SQLITE_BUSY
fn is_busy_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked,
                ..
            },
            _
        )
    )
}

/// Exponential backoff capped at [`MAX_BACKOFF_MS`]
fn calculate_backoff(attempt: u32) -> u64 {
    let backoff = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    backoff.min(MAX_BACKOFF_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use btcu_core::{ChainPosition, Hash160, OutPoint, Script, Transaction, TxIn, TxOut};
    use tempfile::NamedTempFile;

    fn entry(b: u8, order_pos: i64) -> LedgerEntry {
        let tx = Transaction::new(
            TxId::from_bytes([b; 32]),
            vec![TxIn::new(OutPoint::new(TxId::from_bytes([0xee; 32]), u32::from(b)))],
            vec![TxOut::new(1_000 * i64::from(b), Script::PayToKeyHash(Hash160([b; 20])))],
        );
        let mut entry = LedgerEntry::new(tx, 1_700_000_000 + i64::from(b));
        entry.order_pos = order_pos;
        entry
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(calculate_backoff(1), 50);
        assert_eq!(calculate_backoff(2), 100);
        assert_eq!(calculate_backoff(3), 200);
        assert_eq!(calculate_backoff(10), MAX_BACKOFF_MS);
    }

    #[test]
    fn test_busy_error_detection() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(is_busy_error(&busy));
        assert!(!is_busy_error(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn test_save_load_erase() {
        let store = SqliteLedgerStore::open_in_memory(NetworkType::Regtest).unwrap();
        store.save(&entry(2, 1)).unwrap();
        store.save(&entry(1, 0)).unwrap();

        let loaded = store.load().unwrap();
        let order: Vec<i64> = loaded.iter().map(|e| e.order_pos).collect();
        assert_eq!(order, vec![0, 1]);

        store.erase(&TxId::from_bytes([1; 32])).unwrap();
        store.erase(&TxId::from_bytes([1; 32])).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_save_replaces_position() {
        let store = SqliteLedgerStore::open_in_memory(NetworkType::Regtest).unwrap();
        let mut e = entry(3, 0);
        store.save(&e).unwrap();
        e.position = ChainPosition::Abandoned;
        store.save(&e).unwrap();

        let stored = store.get(&e.txid()).unwrap().unwrap();
        assert!(stored.is_abandoned());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_save_all_and_clear() {
        let store = SqliteLedgerStore::open_in_memory(NetworkType::Regtest).unwrap();
        store.save_all(&[entry(1, 0), entry(2, 1), entry(3, 2)]).unwrap();
        assert_eq!(store.len().unwrap(), 3);
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_network_stamp_enforced() {
        let file = NamedTempFile::new().unwrap();
        {
            let store = SqliteLedgerStore::open(file.path(), NetworkType::Mainnet).unwrap();
            assert_eq!(store.network(), NetworkType::Mainnet);
        }
        assert!(SqliteLedgerStore::open(file.path(), NetworkType::Mainnet).is_ok());
        assert!(matches!(
            SqliteLedgerStore::open(file.path(), NetworkType::Testnet),
            Err(Error::NetworkMismatch { .. })
        ));
    }
}

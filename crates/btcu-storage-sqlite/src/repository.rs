//! Data access layer

use crate::{models::LedgerEntryRow, Database, Error, Result};
use rusqlite::{params, OptionalExtension, Row};

/// Repository for database operations
pub struct Repository<'a> {
    db: &'a Database,
}

fn entry_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntryRow> {
    Ok(LedgerEntryRow {
        txid: row.get(0)?,
        order_pos: row.get(1)?,
        position: row.get(2)?,
        block_hash: row.get(3)?,
        payload: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl<'a> Repository<'a> {
    /// Create repository
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert or replace an entry row.
    pub fn upsert_entry(&self, row: &LedgerEntryRow) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO ledger_entries (txid, order_pos, position, block_hash, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(txid) DO UPDATE SET
               order_pos=excluded.order_pos,
               position=excluded.position,
               block_hash=excluded.block_hash,
               payload=excluded.payload,
               updated_at=excluded.updated_at",
            params![
                row.txid,
                row.order_pos,
                row.position,
                row.block_hash,
                row.payload,
                row.updated_at
            ],
        )?;
        Ok(())
    }

    /// Fetch one entry row.
    pub fn get_entry(&self, txid_hex: &str) -> Result<Option<LedgerEntryRow>> {
        Ok(self
            .db
            .conn()
            .query_row(
                "SELECT txid, order_pos, position, block_hash, payload, updated_at
                 FROM ledger_entries WHERE txid = ?1",
                params![txid_hex],
                entry_row,
            )
            .optional()?)
    }

    /// All entry rows in insertion order.
    pub fn get_entries(&self) -> Result<Vec<LedgerEntryRow>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT txid, order_pos, position, block_hash, payload, updated_at
             FROM ledger_entries ORDER BY order_pos ASC, txid ASC",
        )?;
        let rows = stmt
            .query_map([], entry_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Entry rows whose position points at `block_hash_hex`.
    pub fn get_entries_by_block(&self, block_hash_hex: &str) -> Result<Vec<LedgerEntryRow>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT txid, order_pos, position, block_hash, payload, updated_at
             FROM ledger_entries WHERE block_hash = ?1 ORDER BY order_pos ASC",
        )?;
        let rows = stmt
            .query_map(params![block_hash_hex], entry_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete an entry row. Returns whether a row existed.
    pub fn delete_entry(&self, txid_hex: &str) -> Result<bool> {
        let deleted = self
            .db
            .conn()
            .execute("DELETE FROM ledger_entries WHERE txid = ?1", params![txid_hex])?;
        Ok(deleted > 0)
    }

    /// Number of stored entries
    pub fn count_entries(&self) -> Result<i64> {
        Ok(self
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?)
    }

    /// Drop every entry row.
    pub fn clear_entries(&self) -> Result<()> {
        self.db.conn().execute("DELETE FROM ledger_entries", [])?;
        Ok(())
    }

    /// Read a metadata value.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .db
            .conn()
            .query_row(
                "SELECT value FROM ledger_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Write a metadata value.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO ledger_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a metadata value that must exist.
    pub fn require_meta(&self, key: &str) -> Result<String> {
        self.get_meta(key)?
            .ok_or_else(|| Error::NotFound(format!("meta key {}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(txid: &str, order_pos: i64, block: Option<&str>) -> LedgerEntryRow {
        LedgerEntryRow {
            txid: txid.to_string(),
            order_pos,
            position: if block.is_some() { "confirmed" } else { "unconfirmed" }.to_string(),
            block_hash: block.map(str::to_string),
            payload: "{}".to_string(),
            updated_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_upsert_replaces_row() {
        let db = Database::open_in_memory().unwrap();
        let repo = Repository::new(&db);

        repo.upsert_entry(&row("aa", 0, None)).unwrap();
        repo.upsert_entry(&row("aa", 0, Some("b1"))).unwrap();

        assert_eq!(repo.count_entries().unwrap(), 1);
        let stored = repo.get_entry("aa").unwrap().unwrap();
        assert_eq!(stored.position, "confirmed");
        assert_eq!(stored.block_hash.as_deref(), Some("b1"));
    }

    #[test]
    fn test_entries_ordered_by_order_pos() {
        let db = Database::open_in_memory().unwrap();
        let repo = Repository::new(&db);

        repo.upsert_entry(&row("cc", 2, None)).unwrap();
        repo.upsert_entry(&row("aa", 0, None)).unwrap();
        repo.upsert_entry(&row("bb", 1, None)).unwrap();

        let txids: Vec<String> = repo.get_entries().unwrap().into_iter().map(|r| r.txid).collect();
        assert_eq!(txids, vec!["aa", "bb", "cc"]);
    }

    #[test]
    fn test_entries_by_block() {
        let db = Database::open_in_memory().unwrap();
        let repo = Repository::new(&db);

        repo.upsert_entry(&row("aa", 0, Some("b1"))).unwrap();
        repo.upsert_entry(&row("bb", 1, Some("b2"))).unwrap();
        repo.upsert_entry(&row("cc", 2, Some("b1"))).unwrap();

        let in_b1 = repo.get_entries_by_block("b1").unwrap();
        assert_eq!(in_b1.len(), 2);
        assert!(in_b1.iter().all(|r| r.block_hash.as_deref() == Some("b1")));
    }

    #[test]
    fn test_delete_entry() {
        let db = Database::open_in_memory().unwrap();
        let repo = Repository::new(&db);

        repo.upsert_entry(&row("aa", 0, None)).unwrap();
        assert!(repo.delete_entry("aa").unwrap());
        assert!(!repo.delete_entry("aa").unwrap());
        assert!(repo.get_entry("aa").unwrap().is_none());
    }

    #[test]
    fn test_meta_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let repo = Repository::new(&db);

        assert!(repo.get_meta("network").unwrap().is_none());
        assert!(matches!(repo.require_meta("network"), Err(Error::NotFound(_))));
        repo.set_meta("network", "regtest").unwrap();
        repo.set_meta("network", "mainnet").unwrap();
        assert_eq!(repo.require_meta("network").unwrap(), "mainnet");
    }
}

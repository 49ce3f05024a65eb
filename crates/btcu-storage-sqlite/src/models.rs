//! Database models

use crate::{Error, Result};
use btcu_core::{ChainPosition, LedgerEntry, TxId};

/// Stored form of a ledger entry.
///
/// The full entry travels as a JSON payload; `order_pos`, `position` and
/// `block_hash` are copied out so they can be indexed and inspected in SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntryRow {
    /// Transaction id (display hex)
    pub txid: String,
    /// Insertion order key
    pub order_pos: i64,
    /// Chain position tag
    pub position: String,
    /// Block the position refers to
    pub block_hash: Option<String>,
    /// Serialized entry
    pub payload: String,
    /// Last write (RFC 3339)
    pub updated_at: String,
}

/// Short tag for a chain position.
pub fn position_tag(position: &ChainPosition) -> &'static str {
    match position {
        ChainPosition::Unconfirmed => "unconfirmed",
        ChainPosition::Abandoned => "abandoned",
        ChainPosition::Confirmed { .. } => "confirmed",
        ChainPosition::Conflicted { .. } => "conflicted",
    }
}

impl LedgerEntryRow {
    /// Build a row from an entry, stamping the current time.
    pub fn from_entry(entry: &LedgerEntry) -> Result<Self> {
        Ok(Self {
            txid: entry.txid().to_string(),
            order_pos: entry.order_pos,
            position: position_tag(&entry.position).to_string(),
            block_hash: entry.position.block_hash().map(|hash| hash.to_string()),
            payload: serde_json::to_string(entry)?,
            updated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Decode the payload and check it against the indexed columns.
    pub fn into_entry(self) -> Result<LedgerEntry> {
        let entry: LedgerEntry = serde_json::from_str(&self.payload)?;
        let txid: TxId = self
            .txid
            .parse()
            .map_err(|e| Error::Storage(format!("invalid txid {}: {}", self.txid, e)))?;
        if entry.txid() != txid {
            return Err(Error::Storage(format!(
                "row {} holds payload for {}",
                self.txid,
                entry.txid()
            )));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btcu_core::{BlockHash, Hash160, OutPoint, Script, Transaction, TxIn, TxOut};

    fn entry() -> LedgerEntry {
        let tx = Transaction::new(
            TxId::from_bytes([7; 32]),
            vec![TxIn::new(OutPoint::new(TxId::from_bytes([1; 32]), 0))],
            vec![TxOut::new(5_000, Script::PayToKeyHash(Hash160([2; 20])))],
        );
        let mut entry = LedgerEntry::new(tx, 1_700_000_000);
        entry.order_pos = 3;
        entry.position = ChainPosition::Confirmed {
            block: BlockHash::from_bytes([9; 32]),
            index: 1,
        };
        entry
    }

    #[test]
    fn test_row_columns() {
        let row = LedgerEntryRow::from_entry(&entry()).unwrap();
        assert_eq!(row.txid, TxId::from_bytes([7; 32]).to_string());
        assert_eq!(row.order_pos, 3);
        assert_eq!(row.position, "confirmed");
        assert_eq!(row.block_hash, Some(BlockHash::from_bytes([9; 32]).to_string()));
    }

    #[test]
    fn test_into_entry_restores_fields() {
        let row = LedgerEntryRow::from_entry(&entry()).unwrap();
        let restored = row.into_entry().unwrap();
        assert_eq!(restored.txid(), TxId::from_bytes([7; 32]));
        assert_eq!(restored.order_pos, 3);
        assert_eq!(restored.position.index(), 1);
    }

    #[test]
    fn test_into_entry_rejects_mismatched_txid() {
        let mut row = LedgerEntryRow::from_entry(&entry()).unwrap();
        row.txid = TxId::from_bytes([8; 32]).to_string();
        assert!(matches!(row.into_entry(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_into_entry_rejects_bad_payload() {
        let mut row = LedgerEntryRow::from_entry(&entry()).unwrap();
        row.payload = "{not json".to_string();
        assert!(matches!(row.into_entry(), Err(Error::Serialization(_))));
    }
}

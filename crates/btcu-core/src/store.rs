//! Ledger entry store with insertion ordering and smart time.

use crate::entry::LedgerEntry;
use crate::primitives::{OutPoint, TxId, TxOut};
use std::collections::{BTreeMap, HashMap};

/// Clock skew tolerated when reconciling earlier entries' times.
const SMART_TIME_TOLERANCE_SECS: i64 = 300;

/// Result of [`EntryStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First observation
    Inserted,
    /// Known entry changed
    Updated,
    /// Known entry, nothing new
    Unchanged,
}

/// All entries relevant to the wallet.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: HashMap<TxId, LedgerEntry>,
    ordered: BTreeMap<i64, TxId>,
    next_order_pos: i64,
}

impl EntryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by id
    pub fn get(&self, txid: &TxId) -> Option<&LedgerEntry> {
        self.entries.get(txid)
    }

    /// Mutable entry by id
    pub fn get_mut(&mut self, txid: &TxId) -> Option<&mut LedgerEntry> {
        self.entries.get_mut(txid)
    }

    /// Entry is known
    pub fn contains(&self, txid: &TxId) -> bool {
        self.entries.contains_key(txid)
    }

    /// Output referenced by `outpoint`, if its transaction is stored.
    pub fn output(&self, outpoint: &OutPoint) -> Option<&TxOut> {
        self.entries
            .get(&outpoint.txid)
            .and_then(|entry| entry.tx.outputs.get(outpoint.index as usize))
    }

    /// Entries in insertion order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &LedgerEntry> + '_ {
        self.ordered.values().filter_map(|txid| self.entries.get(txid))
    }

    /// Entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> + '_ {
        self.entries.values()
    }

    /// Insert a new entry or merge into the known one.
    ///
    /// New entries get the next order position and a smart time computed
    /// against `block_time` (if the entry is already in a block).
    pub fn upsert(&mut self, mut entry: LedgerEntry, block_time: Option<i64>) -> Upsert {
        let txid = entry.txid();
        if let Some(existing) = self.entries.get_mut(&txid) {
            return if existing.merge(&entry) {
                Upsert::Updated
            } else {
                Upsert::Unchanged
            };
        }

        entry.order_pos = self.next_order_pos;
        self.next_order_pos += 1;
        entry.time_smart = self.smart_time(&entry, block_time);
        self.ordered.insert(entry.order_pos, txid);
        self.entries.insert(txid, entry);
        Upsert::Inserted
    }

    /// Restore an entry loaded from persistence, keeping its order position.
    pub fn restore(&mut self, entry: LedgerEntry) {
        let txid = entry.txid();
        let order_pos = if entry.order_pos < 0 {
            self.next_order_pos
        } else {
            entry.order_pos
        };
        self.next_order_pos = self.next_order_pos.max(order_pos + 1);
        let mut entry = entry;
        entry.order_pos = order_pos;
        if let Some(previous) = self.entries.insert(txid, entry) {
            self.ordered.remove(&previous.order_pos);
        }
        self.ordered.insert(order_pos, txid);
    }

    /// Remove an entry (explicit rollback only).
    pub fn erase(&mut self, txid: &TxId) -> Option<LedgerEntry> {
        let entry = self.entries.remove(txid)?;
        self.ordered.remove(&entry.order_pos);
        Some(entry)
    }

    /// Remove everything.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.ordered.clear();
        self.next_order_pos = 0;
    }

    /// Invalidate every entry's cache.
    pub fn mark_all_dirty(&self) {
        for entry in self.entries.values() {
            entry.mark_dirty();
        }
    }

    /// Reconcile receipt time with block time.
    ///
    /// Uses the newest earlier-ordered entry time that is not too far in the
    /// future, clamped by the block time.
    fn smart_time(&self, entry: &LedgerEntry, block_time: Option<i64>) -> i64 {
        let Some(block_time) = block_time else {
            return entry.time_received;
        };

        let mut latest_now = entry.time_received;
        let mut latest_entry = 0;
        let latest_tolerated = latest_now + SMART_TIME_TOLERANCE_SECS;
        for earlier in self.ordered.values().rev().filter_map(|id| self.entries.get(id)) {
            let time = earlier.tx_time();
            if time <= latest_tolerated {
                latest_entry = time;
                latest_now = latest_now.max(time);
                break;
            }
        }
        latest_entry.max(block_time.min(latest_now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ChainPosition;
    use crate::primitives::{BlockHash, Transaction};

    fn entry(id: u8, received: i64) -> LedgerEntry {
        LedgerEntry::new(
            Transaction::new(TxId::from_bytes([id; 32]), vec![], vec![]),
            received,
        )
    }

    #[test]
    fn test_order_positions_increase() {
        let mut store = EntryStore::new();
        assert_eq!(store.upsert(entry(1, 10), None), Upsert::Inserted);
        assert_eq!(store.upsert(entry(2, 20), None), Upsert::Inserted);
        assert_eq!(store.upsert(entry(1, 30), None), Upsert::Unchanged);

        let ids: Vec<_> = store.iter_ordered().map(|e| e.order_pos).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_upsert_merges_confirmation() {
        let mut store = EntryStore::new();
        store.upsert(entry(1, 10), None);
        let mut confirmed = entry(1, 10);
        confirmed.position = ChainPosition::Confirmed {
            block: BlockHash::from_bytes([5; 32]),
            index: 0,
        };
        assert_eq!(store.upsert(confirmed, Some(10)), Upsert::Updated);
        assert_eq!(
            store.get(&TxId::from_bytes([1; 32])).unwrap().position.index(),
            0
        );
    }

    #[test]
    fn test_smart_time_clamped_to_block_time() {
        let mut store = EntryStore::new();
        store.upsert(entry(1, 1_000), None);
        // Block older than receipt: smart time follows the block but not
        // earlier than the previous entry.
        store.upsert(entry(2, 2_000), Some(1_500));
        assert_eq!(store.get(&TxId::from_bytes([2; 32])).unwrap().time_smart, 1_500);

        store.upsert(entry(3, 3_000), Some(500));
        assert_eq!(store.get(&TxId::from_bytes([3; 32])).unwrap().time_smart, 1_500);
    }

    #[test]
    fn test_erase_and_restore() {
        let mut store = EntryStore::new();
        store.upsert(entry(1, 10), None);
        let removed = store.erase(&TxId::from_bytes([1; 32])).unwrap();
        assert!(store.is_empty());

        store.restore(removed);
        assert_eq!(store.len(), 1);
        assert_eq!(store.upsert(entry(2, 10), None), Upsert::Inserted);
        assert_eq!(store.get(&TxId::from_bytes([2; 32])).unwrap().order_pos, 1);
    }
}

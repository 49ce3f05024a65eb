//! Ledger entries: a transaction plus wallet-local metadata and cached amounts.

use crate::ownership::OwnershipFilter;
use crate::primitives::{BlockHash, Transaction, TxId};
use crate::{Error, Result};
use btcu_params::Amount;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Label key marking an entry created by the mixing service.
pub const MIXING_MARKER: &str = "DS";

/// Where an entry sits relative to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainPosition {
    /// Not yet in a block
    Unconfirmed,
    /// Given up by the user; inputs are spendable again
    Abandoned,
    /// Included in `block` at `index`
    Confirmed {
        /// Containing block
        block: BlockHash,
        /// Position inside the block
        index: i32,
    },
    /// Loses to a transaction confirmed in `block`
    Conflicted {
        /// Block holding the winning transaction
        block: BlockHash,
    },
}

impl ChainPosition {
    /// Originating block, if any.
    pub fn block_hash(&self) -> Option<BlockHash> {
        match self {
            ChainPosition::Confirmed { block, .. } | ChainPosition::Conflicted { block } => {
                Some(*block)
            }
            ChainPosition::Unconfirmed | ChainPosition::Abandoned => None,
        }
    }

    /// In-block index, `-1` for every non-confirmed position.
    pub fn index(&self) -> i32 {
        match self {
            ChainPosition::Confirmed { index, .. } => *index,
            _ => -1,
        }
    }
}

/// Kind of aggregate held in the per-entry cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmountKind {
    /// Sum of owned outputs
    Credit,
    /// Sum of owned inputs
    Debit,
    /// Owned outputs not yet spent
    AvailableCredit,
    /// Owned outputs of an immature reward
    ImmatureCredit,
    /// Change outputs
    Change,
    /// Unspent outputs frozen by the user
    LockedCredit,
    /// Unspent outputs not frozen by the user
    UnlockedCredit,
}

/// Cache key: aggregate kind plus the ownership filter it was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Aggregate kind
    pub kind: AmountKind,
    /// Ownership filter
    pub filter: OwnershipFilter,
}

impl CacheKey {
    /// Create key
    pub const fn new(kind: AmountKind, filter: OwnershipFilter) -> Self {
        Self { kind, filter }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    amount: Amount,
    dirty: bool,
}

/// Per-entry cache of derived amounts with one dirty flag per slot.
#[derive(Default)]
pub struct AmountCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl AmountCache {
    /// Return the cached amount, recomputing it first if missing or dirty.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<Amount>
    where
        F: FnOnce() -> Result<Amount>,
    {
        if let Some(slot) = self.slots.lock().get(&key) {
            if !slot.dirty {
                return Ok(slot.amount);
            }
        }
        // Compute without holding the mutex: `compute` may consult other entries.
        let amount = compute()?;
        self.slots.lock().insert(key, Slot { amount, dirty: false });
        Ok(amount)
    }

    /// Read a slot without recomputing.
    ///
    /// Fails with [`Error::StaleCache`] when the slot is dirty or was never
    /// filled.
    pub fn read(&self, key: CacheKey) -> Result<Amount> {
        match self.slots.lock().get(&key) {
            Some(slot) if !slot.dirty => Ok(slot.amount),
            Some(_) => {
                tracing::error!("Dirty cache slot {:?} read without recompute", key);
                Err(Error::StaleCache(format!("{:?} is dirty", key)))
            }
            None => Err(Error::StaleCache(format!("{:?} was never computed", key))),
        }
    }

    /// Slot exists and is clean.
    pub fn is_fresh(&self, key: CacheKey) -> bool {
        self.slots.lock().get(&key).is_some_and(|slot| !slot.dirty)
    }

    /// Invalidate every slot.
    pub fn mark_dirty(&self) {
        for slot in self.slots.lock().values_mut() {
            slot.dirty = true;
        }
    }
}

impl Clone for AmountCache {
    fn clone(&self) -> Self {
        Self {
            slots: Mutex::new(self.slots.lock().clone()),
        }
    }
}

impl fmt::Debug for AmountCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmountCache")
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}

/// A transaction relevant to the wallet plus local state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Raw transaction
    pub tx: Transaction,
    /// When the wallet first saw the transaction
    pub time_received: i64,
    /// Best-effort time reconciling receipt and block time
    pub time_smart: i64,
    /// Chain position
    pub position: ChainPosition,
    /// Free-form metadata
    pub labels: BTreeMap<String, String>,
    /// Account the payment was made from
    pub from_account: String,
    /// Insertion order key
    pub order_pos: i64,
    /// Created by this wallet
    pub from_me: bool,
    #[serde(skip)]
    cache: AmountCache,
}

impl LedgerEntry {
    /// New unconfirmed entry received at `time_received`.
    pub fn new(tx: Transaction, time_received: i64) -> Self {
        Self {
            tx,
            time_received,
            time_smart: 0,
            position: ChainPosition::Unconfirmed,
            labels: BTreeMap::new(),
            from_account: String::new(),
            order_pos: -1,
            from_me: false,
            cache: AmountCache::default(),
        }
    }

    /// Transaction id
    pub fn txid(&self) -> TxId {
        self.tx.txid
    }

    /// Smart time, falling back to receipt time.
    pub fn tx_time(&self) -> i64 {
        if self.time_smart != 0 {
            self.time_smart
        } else {
            self.time_received
        }
    }

    /// Label value, empty if absent.
    pub fn label(&self, key: &str) -> &str {
        self.labels.get(key).map(String::as_str).unwrap_or("")
    }

    /// Created by the mixing service.
    pub fn has_mixing_marker(&self) -> bool {
        self.label(MIXING_MARKER) == "1"
    }

    /// User abandoned the entry.
    pub fn is_abandoned(&self) -> bool {
        self.position == ChainPosition::Abandoned
    }

    /// Derived-amount cache
    pub fn cache(&self) -> &AmountCache {
        &self.cache
    }

    /// Invalidate all cached amounts.
    pub fn mark_dirty(&self) {
        self.cache.mark_dirty();
    }

    /// Fold a fresh observation of the same transaction into this entry.
    ///
    /// Returns whether anything changed.
    pub fn merge(&mut self, incoming: &LedgerEntry) -> bool {
        let mut updated = false;
        if let ChainPosition::Confirmed { .. } = incoming.position {
            if incoming.position != self.position {
                self.position = incoming.position;
                updated = true;
            }
        }
        if incoming.from_me && !self.from_me {
            self.from_me = true;
            updated = true;
        }
        for (key, value) in &incoming.labels {
            if !self.labels.contains_key(key) {
                self.labels.insert(key.clone(), value.clone());
                updated = true;
            }
        }
        if updated {
            self.mark_dirty();
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{OutPoint, TxIn};

    fn entry() -> LedgerEntry {
        let tx = Transaction::new(
            TxId::from_bytes([4; 32]),
            vec![TxIn::new(OutPoint::new(TxId::from_bytes([3; 32]), 0))],
            vec![],
        );
        LedgerEntry::new(tx, 1_000)
    }

    #[test]
    fn test_cache_recomputes_after_dirty() {
        let entry = entry();
        let key = CacheKey::new(AmountKind::Credit, OwnershipFilter::SPENDABLE);
        assert_eq!(entry.cache().get_or_compute(key, || Ok(5)).unwrap(), 5);
        assert_eq!(entry.cache().get_or_compute(key, || Ok(9)).unwrap(), 5);

        entry.mark_dirty();
        assert!(!entry.cache().is_fresh(key));
        assert_eq!(entry.cache().get_or_compute(key, || Ok(9)).unwrap(), 9);
    }

    #[test]
    fn test_stale_read_is_refused() {
        let entry = entry();
        let key = CacheKey::new(AmountKind::Debit, OwnershipFilter::ALL);
        assert!(matches!(entry.cache().read(key), Err(Error::StaleCache(_))));

        entry.cache().get_or_compute(key, || Ok(3)).unwrap();
        assert_eq!(entry.cache().read(key).unwrap(), 3);

        entry.mark_dirty();
        assert!(matches!(entry.cache().read(key), Err(Error::StaleCache(_))));
    }

    #[test]
    fn test_merge_updates_position_and_from_me() {
        let mut stored = entry();
        let mut incoming = entry();
        assert!(!stored.merge(&incoming));

        incoming.position = ChainPosition::Confirmed {
            block: BlockHash::from_bytes([1; 32]),
            index: 2,
        };
        incoming.from_me = true;
        assert!(stored.merge(&incoming));
        assert_eq!(stored.position.index(), 2);
        assert!(stored.from_me);
        assert!(!stored.merge(&incoming));
    }

    #[test]
    fn test_mixing_marker() {
        let mut entry = entry();
        assert!(!entry.has_mixing_marker());
        entry.labels.insert(MIXING_MARKER.to_string(), "1".to_string());
        assert!(entry.has_mixing_marker());
    }
}

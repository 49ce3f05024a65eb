//! Spend index: which local transactions claim which outpoints.
//!
//! The same multimap doubles as the descendant adjacency index: the
//! claimants of `(T, n)` for any `n` are exactly the children of `T`.

use crate::primitives::{OutPoint, Transaction, TxId};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Outpoint to claimant multimap.
#[derive(Debug, Clone, Default)]
pub struct SpendIndex {
    claims: BTreeMap<OutPoint, BTreeSet<TxId>>,
}

impl SpendIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every input outpoint of `tx` as claimed by it.
    ///
    /// Returns the parent transactions whose outputs were claimed.
    pub fn record_spends(&mut self, tx: &Transaction) -> BTreeSet<TxId> {
        let mut parents = BTreeSet::new();
        for outpoint in tx.spent_outpoints() {
            self.claims.entry(outpoint).or_default().insert(tx.txid);
            parents.insert(outpoint.txid);
        }
        parents
    }

    /// Drop every claim made by `tx`.
    pub fn remove_spends(&mut self, tx: &Transaction) {
        for outpoint in tx.spent_outpoints() {
            if let Some(claimants) = self.claims.get_mut(&outpoint) {
                claimants.remove(&tx.txid);
                if claimants.is_empty() {
                    self.claims.remove(&outpoint);
                }
            }
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.claims.clear();
    }

    /// Transactions claiming `outpoint`.
    pub fn claimants(&self, outpoint: &OutPoint) -> impl Iterator<Item = TxId> + '_ {
        self.claims.get(outpoint).into_iter().flatten().copied()
    }

    /// Other transactions claiming any input of `tx`.
    pub fn conflicts(&self, tx: &Transaction) -> BTreeSet<TxId> {
        tx.spent_outpoints()
            .flat_map(|outpoint| self.claimants(&outpoint).collect::<Vec<_>>())
            .filter(|claimant| *claimant != tx.txid)
            .collect()
    }

    /// Transactions spending any output of `txid`.
    pub fn children(&self, txid: &TxId) -> BTreeSet<TxId> {
        let start = OutPoint::new(*txid, 0);
        let end = OutPoint::new(*txid, u32::MAX);
        self.claims
            .range(start..=end)
            .flat_map(|(_, claimants)| claimants.iter().copied())
            .collect()
    }

    /// `root` plus every transitive descendant, in discovery order.
    ///
    /// Fails with [`Error::ConflictResolutionCycle`] if the claim graph
    /// reachable from `root` is not acyclic.
    pub fn descendants(&self, root: TxId) -> Result<Vec<TxId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: HashMap<TxId, Mark> = HashMap::new();
        let mut order = Vec::new();
        let mut stack: Vec<(TxId, Vec<TxId>)> = Vec::new();

        marks.insert(root, Mark::Open);
        order.push(root);
        stack.push((root, self.children(&root).into_iter().rev().collect()));

        while let Some((node, pending)) = stack.last_mut() {
            let Some(child) = pending.pop() else {
                marks.insert(*node, Mark::Done);
                stack.pop();
                continue;
            };
            match marks.get(&child) {
                Some(Mark::Open) => return Err(Error::ConflictResolutionCycle(child)),
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Open);
                    order.push(child);
                    let grandchildren = self.children(&child).into_iter().rev().collect();
                    stack.push((child, grandchildren));
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Hash160, Script, TxIn, TxOut};

    fn txid(b: u8) -> TxId {
        TxId::from_bytes([b; 32])
    }

    fn spending(id: u8, prevouts: &[(u8, u32)]) -> Transaction {
        Transaction::new(
            txid(id),
            prevouts
                .iter()
                .map(|(p, n)| TxIn::new(OutPoint::new(txid(*p), *n)))
                .collect(),
            vec![TxOut::new(1, Script::PayToKeyHash(Hash160([id; 20])))],
        )
    }

    #[test]
    fn test_conflicts_and_children() {
        let mut index = SpendIndex::new();
        let a = spending(2, &[(1, 0)]);
        let a2 = spending(3, &[(1, 0)]);
        let b = spending(4, &[(2, 0)]);
        index.record_spends(&a);
        index.record_spends(&a2);
        index.record_spends(&b);

        assert_eq!(index.conflicts(&a), BTreeSet::from([txid(3)]));
        assert_eq!(index.children(&txid(2)), BTreeSet::from([txid(4)]));
        assert!(index.children(&txid(4)).is_empty());

        index.remove_spends(&a2);
        assert!(index.conflicts(&a).is_empty());
    }

    #[test]
    fn test_descendants_chain() {
        let mut index = SpendIndex::new();
        index.record_spends(&spending(2, &[(1, 0)]));
        index.record_spends(&spending(3, &[(2, 0)]));
        index.record_spends(&spending(4, &[(3, 0), (2, 1)]));

        let found = index.descendants(txid(2)).unwrap();
        assert_eq!(found, vec![txid(2), txid(3), txid(4)]);
    }

    #[test]
    fn test_descendants_cycle_detected() {
        let mut index = SpendIndex::new();
        index.record_spends(&spending(2, &[(3, 0)]));
        index.record_spends(&spending(3, &[(2, 0)]));

        assert!(matches!(
            index.descendants(txid(2)),
            Err(Error::ConflictResolutionCycle(_))
        ));
    }
}

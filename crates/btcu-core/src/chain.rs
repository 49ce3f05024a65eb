//! Chain view and relay telemetry consumed by the ledger.
//!
//! The wallet never reads chain state from globals: every evaluation takes a
//! [`ChainTip`] snapshot captured before the wallet lock is taken.

use crate::primitives::{BlockHash, Transaction, TxId};
use crate::Result;

/// Block metadata as seen by the active chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Height in the active chain
    pub height: i32,
    /// Block timestamp
    pub time: i64,
}

/// Chain facts captured at one instant and threaded into evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    /// Active chain height
    pub height: i32,
    /// Number of instant locks completed so far
    pub complete_tx_locks: u64,
    /// Network-adjusted wall clock time
    pub adjusted_time: i64,
}

/// Trusted source of chain facts.
pub trait ChainView: Send + Sync {
    /// Active chain height.
    fn current_height(&self) -> Result<i32>;

    /// Block containing `hash`, if it is part of the active chain.
    fn block(&self, hash: &BlockHash) -> Result<Option<BlockInfo>>;

    /// Whether `tx` is final for a block at `height` with time `block_time`.
    fn is_final(&self, tx: &Transaction, height: i32, block_time: i64) -> Result<bool>;

    /// Whether the transaction sits in the local memory pool.
    fn in_mempool(&self, _txid: &TxId) -> Result<bool> {
        Ok(false)
    }

    /// Completed instant-lock signatures for the transaction.
    fn lock_signatures(&self, _txid: &TxId) -> Result<i32> {
        Ok(0)
    }

    /// Counter of instant locks completed by the node.
    fn complete_tx_locks(&self) -> u64 {
        0
    }

    /// Network-adjusted time.
    fn adjusted_time(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Capture a [`ChainTip`] snapshot.
    fn tip(&self) -> Result<ChainTip> {
        Ok(ChainTip {
            height: self.current_height()?,
            complete_tx_locks: self.complete_tx_locks(),
            adjusted_time: self.adjusted_time(),
        })
    }
}

/// Opaque peer request counter from the relay layer.
pub trait RelayMonitor: Send + Sync {
    /// How many times peers requested the transaction (or the block holding it).
    fn request_count(&self, txid: &TxId) -> i32;
}

/// Relay monitor for nodes that do not track requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelay;

impl RelayMonitor for NoRelay {
    fn request_count(&self, _txid: &TxId) -> i32 {
        -1
    }
}

/// Standard lock-time finality rule.
pub fn final_at(tx: &Transaction, height: i32, block_time: i64, locktime_threshold: u32) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    let limit = if tx.lock_time < locktime_threshold {
        i64::from(height)
    } else {
        block_time
    };
    if i64::from(tx.lock_time) < limit {
        return true;
    }
    tx.inputs.iter().all(|input| input.sequence == u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{OutPoint, TxIn};

    fn locked_tx(lock_time: u32, sequence: u32) -> Transaction {
        let mut input = TxIn::new(OutPoint::new(TxId::from_bytes([1; 32]), 0));
        input.sequence = sequence;
        let mut tx = Transaction::new(TxId::from_bytes([2; 32]), vec![input], vec![]);
        tx.lock_time = lock_time;
        tx
    }

    #[test]
    fn test_final_by_height() {
        let tx = locked_tx(100, 0);
        assert!(!final_at(&tx, 100, 0, 500_000_000));
        assert!(final_at(&tx, 101, 0, 500_000_000));
    }

    #[test]
    fn test_final_by_time() {
        let tx = locked_tx(600_000_000, 0);
        assert!(!final_at(&tx, 1_000_000, 599_999_999, 500_000_000));
        assert!(final_at(&tx, 1, 600_000_001, 500_000_000));
    }

    #[test]
    fn test_final_sequences() {
        let tx = locked_tx(100, u32::MAX);
        assert!(final_at(&tx, 1, 0, 500_000_000));
    }
}

//! Persistence collaborator contract.

use crate::entry::LedgerEntry;
use crate::primitives::TxId;
use crate::Result;

/// Durable storage for ledger entries.
///
/// Calls may block on disk; the wallet issues them outside its state lock.
/// Failures are reported as [`crate::Error::Persistence`] and surfaced to
/// the caller.
pub trait Persistence: Send + Sync {
    /// All stored entries, in any order.
    fn load(&self) -> Result<Vec<LedgerEntry>>;

    /// Insert or replace one entry.
    fn save(&self, entry: &LedgerEntry) -> Result<()>;

    /// Insert or replace a batch. Stores that can write atomically should
    /// override this so a failure leaves none of the batch applied.
    fn save_all(&self, entries: &[LedgerEntry]) -> Result<()> {
        for entry in entries {
            self.save(entry)?;
        }
        Ok(())
    }

    /// Remove one entry. Erasing an unknown id is not an error.
    fn erase(&self, txid: &TxId) -> Result<()>;
}

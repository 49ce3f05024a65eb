//! In-memory collaborators for tests.
//!
//! Enabled for this crate's own tests and, through the `test-helpers`
//! feature, for integration tests and downstream crates.

use crate::chain::{final_at, BlockInfo, ChainView, RelayMonitor};
use crate::entry::LedgerEntry;
use crate::ownership::{Ownership, OwnershipOracle};
use crate::persistence::Persistence;
use crate::primitives::{BlockHash, Destination, Hash160, Script, Transaction, TxId, TxOut};
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Lock-time threshold shared by every network.
const LOCKTIME_THRESHOLD: u32 = 500_000_000;

#[derive(Debug, Default)]
struct Keys {
    spendable: HashSet<Hash160>,
    watch: HashSet<Hash160>,
    address_book: HashSet<Destination>,
}

/// Key registry backed by hash sets.
///
/// Delegations resolve to `SpendableDelegated` when we hold the owner key
/// and `ColdStaker` when we hold only the staker key. Leases resolve to
/// `SpendableLeasing`, `Leased` (owner) or `Leasing` (leaser).
#[derive(Debug, Default)]
pub struct MemoryOwnership {
    keys: RwLock<Keys>,
}

impl MemoryOwnership {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a spending key.
    pub fn add_key(&self, key: Hash160) {
        self.keys.write().spendable.insert(key);
    }

    /// Import a watch-only key.
    pub fn add_watch(&self, key: Hash160) {
        self.keys.write().watch.insert(key);
    }

    /// Drop a spending key.
    pub fn remove_key(&self, key: &Hash160) {
        self.keys.write().spendable.remove(key);
    }

    /// Label a destination; labelled outputs are never change.
    pub fn add_to_address_book(&self, destination: Destination) {
        self.keys.write().address_book.insert(destination);
    }

    fn key_ownership(keys: &Keys, key: &Hash160) -> Ownership {
        if keys.spendable.contains(key) {
            Ownership::Spendable
        } else if keys.watch.contains(key) {
            Ownership::WatchOnly
        } else {
            Ownership::Unowned
        }
    }
}

impl OwnershipOracle for MemoryOwnership {
    fn classify(&self, output: &TxOut) -> Result<Ownership> {
        let keys = self.keys.read();
        let ownership = match &output.script {
            Script::PayToKeyHash(key) | Script::PayToScriptHash(key) | Script::LeasingReward(key) => {
                Self::key_ownership(&keys, key)
            }
            Script::ColdStake { staker, owner } => {
                if keys.spendable.contains(owner) {
                    Ownership::SpendableDelegated
                } else if keys.spendable.contains(staker) {
                    Ownership::ColdStaker
                } else if keys.watch.contains(owner) || keys.watch.contains(staker) {
                    Ownership::WatchOnly
                } else {
                    Ownership::Unowned
                }
            }
            Script::Leasing { leaser, owner } => {
                match (keys.spendable.contains(owner), keys.spendable.contains(leaser)) {
                    (true, true) => Ownership::SpendableLeasing,
                    (true, false) => Ownership::Leased,
                    (false, true) => Ownership::Leasing,
                    (false, false) => Ownership::Unowned,
                }
            }
            Script::Empty | Script::PrivacyMint(_) | Script::NullData(_) | Script::NonStandard(_) => {
                Ownership::Unowned
            }
        };
        Ok(ownership)
    }

    fn is_mine_destination(&self, destination: &Destination) -> Result<bool> {
        let keys = self.keys.read();
        let key = match destination {
            Destination::Key(key) | Destination::Script(key) => key,
        };
        Ok(keys.spendable.contains(key) || keys.watch.contains(key))
    }

    fn is_change(&self, output: &TxOut) -> Result<bool> {
        if self.classify(output)? != Ownership::Spendable {
            return Ok(false);
        }
        let keys = self.keys.read();
        Ok(match output.script.destination(false, false) {
            Some(destination) => !keys.address_book.contains(&destination),
            None => false,
        })
    }
}

#[derive(Debug, Default)]
struct ChainState {
    height: i32,
    time: i64,
    blocks: HashMap<BlockHash, BlockInfo>,
    mempool: HashSet<TxId>,
    lock_signatures: HashMap<TxId, i32>,
    complete_tx_locks: u64,
    failing: bool,
}

/// Scripted chain view.
#[derive(Debug, Default)]
pub struct StaticChain {
    state: RwLock<ChainState>,
}

impl StaticChain {
    /// Chain at `height` with adjusted time `time`.
    pub fn new(height: i32, time: i64) -> Self {
        Self {
            state: RwLock::new(ChainState {
                height,
                time,
                ..ChainState::default()
            }),
        }
    }

    /// Hash used for the block at `height` by [`StaticChain::connect_block`].
    pub fn block_hash(height: i32) -> BlockHash {
        let mut bytes = [0xb0; 32];
        bytes[..4].copy_from_slice(&height.to_le_bytes());
        BlockHash::from_bytes(bytes)
    }

    /// Add a block at `height` and move the tip up to it.
    pub fn connect_block(&self, height: i32, time: i64) -> BlockHash {
        let hash = Self::block_hash(height);
        let mut state = self.state.write();
        state.blocks.insert(hash, BlockInfo { height, time });
        state.height = state.height.max(height);
        hash
    }

    /// Remove a block from the active chain.
    pub fn disconnect_block(&self, hash: &BlockHash) {
        self.state.write().blocks.remove(hash);
    }

    /// Move the tip.
    pub fn set_height(&self, height: i32) {
        self.state.write().height = height;
    }

    /// Move the adjusted clock.
    pub fn set_time(&self, time: i64) {
        self.state.write().time = time;
    }

    /// Put a transaction in the memory pool.
    pub fn add_to_mempool(&self, txid: TxId) {
        self.state.write().mempool.insert(txid);
    }

    /// Evict a transaction from the memory pool.
    pub fn remove_from_mempool(&self, txid: &TxId) {
        self.state.write().mempool.remove(txid);
    }

    /// Set completed lock signatures and bump the lock counter.
    pub fn set_lock_signatures(&self, txid: TxId, signatures: i32) {
        let mut state = self.state.write();
        state.lock_signatures.insert(txid, signatures);
        state.complete_tx_locks += 1;
    }

    /// Make block lookups fail.
    pub fn set_failing(&self, failing: bool) {
        self.state.write().failing = failing;
    }
}

impl ChainView for StaticChain {
    fn current_height(&self) -> Result<i32> {
        Ok(self.state.read().height)
    }

    fn block(&self, hash: &BlockHash) -> Result<Option<BlockInfo>> {
        let state = self.state.read();
        if state.failing {
            return Err(Error::Chain(format!("block index unavailable for {}", hash)));
        }
        Ok(state.blocks.get(hash).copied())
    }

    fn is_final(&self, tx: &Transaction, height: i32, block_time: i64) -> Result<bool> {
        Ok(final_at(tx, height, block_time, LOCKTIME_THRESHOLD))
    }

    fn in_mempool(&self, txid: &TxId) -> Result<bool> {
        Ok(self.state.read().mempool.contains(txid))
    }

    fn lock_signatures(&self, txid: &TxId) -> Result<i32> {
        Ok(self.state.read().lock_signatures.get(txid).copied().unwrap_or(0))
    }

    fn complete_tx_locks(&self) -> u64 {
        self.state.read().complete_tx_locks
    }

    fn adjusted_time(&self) -> i64 {
        self.state.read().time
    }
}

/// Peer request counts; unknown transactions were never requested.
#[derive(Debug, Default)]
pub struct MemoryRelay {
    counts: RwLock<HashMap<TxId, i32>>,
}

impl MemoryRelay {
    /// No requests seen
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` requests for `txid`.
    pub fn set_requests(&self, txid: TxId, count: i32) {
        self.counts.write().insert(txid, count);
    }
}

impl RelayMonitor for MemoryRelay {
    fn request_count(&self, txid: &TxId) -> i32 {
        self.counts.read().get(txid).copied().unwrap_or(0)
    }
}

/// Entry storage in a map.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: Mutex<BTreeMap<TxId, LedgerEntry>>,
    failing: Mutex<bool>,
    saves: Mutex<usize>,
}

impl MemoryPersistence {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entry count
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Nothing stored
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Stored copy of an entry
    pub fn get(&self, txid: &TxId) -> Option<LedgerEntry> {
        self.entries.lock().get(txid).cloned()
    }

    /// Batch writes issued so far
    pub fn batch_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Make writes fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock() {
            Err(Error::Persistence("storage offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<LedgerEntry>> {
        self.check()?;
        Ok(self.entries.lock().values().cloned().collect())
    }

    fn save(&self, entry: &LedgerEntry) -> Result<()> {
        self.check()?;
        self.entries.lock().insert(entry.txid(), entry.clone());
        Ok(())
    }

    fn save_all(&self, entries: &[LedgerEntry]) -> Result<()> {
        self.check()?;
        let mut stored = self.entries.lock();
        for entry in entries {
            stored.insert(entry.txid(), entry.clone());
        }
        *self.saves.lock() += 1;
        Ok(())
    }

    fn erase(&self, txid: &TxId) -> Result<()> {
        self.check()?;
        self.entries.lock().remove(txid);
        Ok(())
    }
}

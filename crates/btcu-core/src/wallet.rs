//! Wallet ledger orchestration
//!
//! [`Wallet`] owns the entry store, spend index and locked-coin set behind a
//! single reader/writer lock. Mutations (ingestion, conflict resolution,
//! abandonment, coin locks) take the write side; every query builds a
//! [`LedgerView`] under the read side. The chain tip is captured before the
//! lock is taken and persistence writes are issued after it is released.

use crate::balance::{self, WalletBalances};
use crate::chain::{ChainTip, ChainView, RelayMonitor};
use crate::classifier;
use crate::config::WalletConfig;
use crate::entry::{ChainPosition, LedgerEntry};
use crate::fees::{FeeCalculator, FeeRate};
use crate::ownership::{OwnershipFilter, OwnershipOracle};
use crate::persistence::Persistence;
use crate::primitives::{BlockHash, OutPoint, Transaction, TxId};
use crate::privacy::PrivacyOracle;
use crate::records::TransactionRecord;
use crate::selection::{self, CoinCandidate, CoinFilter, CoinSelector, SelectionResult};
use crate::spends::SpendIndex;
use crate::status;
use crate::store::{EntryStore, Upsert};
use crate::view::LedgerView;
use crate::{Error, Result};
use btcu_params::{Amount, ConsensusParams};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Funding rounds before fee estimation is considered unstable.
const MAX_FUNDING_ROUNDS: usize = 16;

/// Outputs of a funded transaction besides change.
const PAYMENT_OUTPUTS: usize = 1;

/// Where a transaction sits in the active chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    /// Containing block
    pub block: BlockHash,
    /// Index of the transaction in the block
    pub index: i32,
    /// Block timestamp
    pub time: i64,
}

/// External collaborators of a wallet.
#[derive(Clone)]
pub struct Collaborators {
    /// Key and script registry
    pub ownership: Arc<dyn OwnershipOracle>,
    /// Chain facts
    pub chain: Arc<dyn ChainView>,
    /// Privacy-coin registry
    pub privacy: Arc<dyn PrivacyOracle>,
    /// Peer request telemetry
    pub relay: Arc<dyn RelayMonitor>,
    /// Durable storage
    pub persistence: Arc<dyn Persistence>,
}

/// Coins and fee chosen by [`Wallet::fund`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPlan {
    /// Selected inputs; `change` already accounts for `fee`
    pub selection: SelectionResult,
    /// Fee for the resulting transaction
    pub fee: Amount,
}

#[derive(Debug, Default)]
struct LedgerState {
    store: EntryStore,
    spends: SpendIndex,
    locked: BTreeSet<OutPoint>,
}

impl LedgerState {
    /// Invalidate the entries whose aggregates depend on `txid`: the parents
    /// it spends from and the children spending it.
    fn mark_neighbours_dirty(&self, txid: &TxId) {
        if let Some(entry) = self.store.get(txid) {
            for outpoint in entry.tx.spent_outpoints() {
                if let Some(parent) = self.store.get(&outpoint.txid) {
                    parent.mark_dirty();
                }
            }
        }
        for child in self.spends.children(txid) {
            if let Some(entry) = self.store.get(&child) {
                entry.mark_dirty();
            }
        }
    }

    /// Move `txids` into the conflicted state against `block`.
    fn mark_conflicted(&mut self, txids: &BTreeSet<TxId>, block: BlockHash) {
        for txid in txids {
            if let Some(entry) = self.store.get_mut(txid) {
                entry.position = ChainPosition::Conflicted { block };
                entry.mark_dirty();
            }
            self.mark_neighbours_dirty(txid);
        }
    }

    fn snapshot(&self, txids: &BTreeSet<TxId>) -> Vec<LedgerEntry> {
        txids
            .iter()
            .filter_map(|txid| self.store.get(txid).cloned())
            .collect()
    }
}

/// Wallet ledger engine
pub struct Wallet {
    config: WalletConfig,
    params: ConsensusParams,
    state: RwLock<LedgerState>,
    ownership: Arc<dyn OwnershipOracle>,
    chain: Arc<dyn ChainView>,
    privacy: Arc<dyn PrivacyOracle>,
    relay: Arc<dyn RelayMonitor>,
    persistence: Arc<dyn Persistence>,
}

impl Wallet {
    /// Create an empty wallet.
    pub fn new(config: WalletConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let params = config.consensus();
        Ok(Self {
            config,
            params,
            state: RwLock::new(LedgerState::default()),
            ownership: collaborators.ownership,
            chain: collaborators.chain,
            privacy: collaborators.privacy,
            relay: collaborators.relay,
            persistence: collaborators.persistence,
        })
    }

    /// Wallet configuration
    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Consensus parameters of the configured network
    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.state.read().store.len()
    }

    /// No entries stored
    pub fn is_empty(&self) -> bool {
        self.state.read().store.is_empty()
    }

    fn view<'a>(&'a self, state: &'a LedgerState, tip: ChainTip) -> LedgerView<'a> {
        LedgerView {
            store: &state.store,
            spends: &state.spends,
            locked: &state.locked,
            ownership: self.ownership.as_ref(),
            privacy: self.privacy.as_ref(),
            chain: self.chain.as_ref(),
            relay: self.relay.as_ref(),
            params: &self.params,
            config: &self.config,
            tip,
        }
    }

    /// Run `f` over a read-locked view at the current tip.
    pub fn with_view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&LedgerView<'_>) -> Result<T>,
    {
        let tip = self.chain.tip()?;
        let state = self.state.read();
        f(&self.view(&state, tip))
    }

    fn persist(&self, entries: Vec<LedgerEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.persistence.save_all(&entries) {
            tracing::error!("Failed to persist {} entries: {}", entries.len(), e);
            return Err(e);
        }
        tracing::debug!("Persisted {} entries", entries.len());
        Ok(())
    }

    /// Replace in-memory state with the persisted entries.
    pub fn load(&self) -> Result<usize> {
        let mut entries = self.persistence.load()?;
        entries.sort_by_key(|entry| entry.order_pos);

        let mut state = self.state.write();
        state.store.reset();
        state.spends.clear();
        let count = entries.len();
        for entry in entries {
            state.spends.record_spends(&entry.tx);
            state.store.restore(entry);
        }
        tracing::info!("Loaded {} ledger entries", count);
        Ok(count)
    }

    /// Drop all in-memory state; [`Wallet::load`] rebuilds it.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.store.reset();
        state.spends.clear();
        state.locked.clear();
        tracing::info!("Ledger state reset");
    }

    fn is_relevant(&self, state: &LedgerState, tx: &Transaction) -> Result<bool> {
        if state.store.contains(&tx.txid) {
            return Ok(true);
        }
        for output in &tx.outputs {
            if self.ownership.classify(output)?.is_owned() {
                return Ok(true);
            }
        }
        for outpoint in tx.spent_outpoints() {
            if let Some(prev) = state.store.output(&outpoint) {
                if self.ownership.classify(prev)?.is_owned() {
                    return Ok(true);
                }
            }
        }
        Ok(self.privacy.is_self_initiated_spend(tx) || self.privacy.tracks_mint(&tx.txid))
    }

    fn spends_owned_output(&self, state: &LedgerState, tx: &Transaction) -> Result<bool> {
        for outpoint in tx.spent_outpoints() {
            if let Some(prev) = state.store.output(&outpoint) {
                if self.ownership.classify(prev)?.is_owned() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Store `entry` and register its claims. Returns the txids to persist.
    fn ingest(
        &self,
        state: &mut LedgerState,
        entry: LedgerEntry,
        block_time: Option<i64>,
    ) -> Result<BTreeSet<TxId>> {
        let txid = entry.txid();
        let tx = entry.tx.clone();
        let mut changed = BTreeSet::new();

        match state.store.upsert(entry, block_time) {
            Upsert::Inserted => {
                state.spends.record_spends(&tx);
                state.mark_neighbours_dirty(&txid);
                tracing::debug!("Inserted ledger entry {}", txid);
                changed.insert(txid);
            }
            Upsert::Updated => {
                state.mark_neighbours_dirty(&txid);
                tracing::debug!("Updated ledger entry {}", txid);
                changed.insert(txid);
            }
            Upsert::Unchanged => {}
        }
        Ok(changed)
    }

    /// Observe a transaction from the pool (`block == None`) or a block.
    ///
    /// Irrelevant transactions are not stored, but a confirmed one still
    /// conflicts any local entry claiming the same outpoints. Returns whether
    /// the ledger changed.
    pub fn add_transaction(&self, tx: Transaction, block: Option<BlockPosition>) -> Result<bool> {
        let tip = self.chain.tip()?;
        let txid = tx.txid;

        let changed = {
            let mut state = self.state.write();
            let mut changed = BTreeSet::new();

            if let Some(position) = block {
                changed.extend(self.resolve_conflicts(&mut state, &tx, position.block, tip)?);
            }

            if self.is_relevant(&state, &tx)? {
                let from_me = self.spends_owned_output(&state, &tx)?;
                let mut entry = LedgerEntry::new(tx, tip.adjusted_time);
                entry.from_me = from_me;
                if let Some(position) = block {
                    entry.position = ChainPosition::Confirmed {
                        block: position.block,
                        index: position.index,
                    };
                }
                changed.extend(self.ingest(&mut state, entry, block.map(|p| p.time))?);
                changed.extend(self.conflict_late_claimant(&mut state, &txid, tip)?);
            } else {
                tracing::debug!("Ignoring irrelevant transaction {}", txid);
            }
            state.snapshot(&changed)
        };

        let updated = !changed.is_empty();
        self.persist(changed)?;
        Ok(updated)
    }

    /// Record a transaction this wallet created and broadcast.
    pub fn commit_transaction(
        &self,
        tx: Transaction,
        labels: BTreeMap<String, String>,
    ) -> Result<()> {
        let tip = self.chain.tip()?;
        let txid = tx.txid;

        let changed = {
            let mut state = self.state.write();
            let mut entry = LedgerEntry::new(tx, tip.adjusted_time);
            entry.from_me = true;
            entry.labels = labels;
            let mut changed = self.ingest(&mut state, entry, None)?;
            changed.extend(self.conflict_late_claimant(&mut state, &txid, tip)?);
            state.snapshot(&changed)
        };

        tracing::info!("Committed transaction {}", txid);
        self.persist(changed)
    }

    /// Feed every transaction of a newly connected block.
    pub fn block_connected(&self, block: BlockHash, time: i64, txs: Vec<Transaction>) -> Result<()> {
        tracing::debug!("Block {} connected with {} transactions", block, txs.len());
        for (index, tx) in txs.into_iter().enumerate() {
            let position = BlockPosition {
                block,
                index: index as i32,
                time,
            };
            self.add_transaction(tx, Some(position))?;
        }
        Ok(())
    }

    /// A block left the active chain: depths of its entries (and of entries
    /// conflicted against it) changed, so every aggregate is recomputed.
    pub fn block_disconnected(&self, block: BlockHash) {
        let state = self.state.write();
        state.store.mark_all_dirty();
        tracing::info!("Block {} disconnected, ledger caches invalidated", block);
    }

    /// Mark every other claimant of `tx`'s outpoints, and their descendants,
    /// conflicted against `block`.
    fn resolve_conflicts(
        &self,
        state: &mut LedgerState,
        tx: &Transaction,
        block: BlockHash,
        tip: ChainTip,
    ) -> Result<BTreeSet<TxId>> {
        let competitors = state.spends.conflicts(tx);
        if competitors.is_empty() {
            return Ok(BTreeSet::new());
        }

        let Some(info) = self.chain.block(&block)? else {
            tracing::warn!("Conflicts of {} skipped: block {} not in active chain", tx.txid, block);
            return Ok(BTreeSet::new());
        };
        let conflict_depth = -(tip.height - info.height + 1);
        if conflict_depth >= 0 {
            return Ok(BTreeSet::new());
        }

        let mut to_mark = BTreeSet::new();
        {
            let view = self.view(state, tip);
            for competitor in competitors {
                let descendants = state.spends.descendants(competitor)?;
                if descendants.contains(&tx.txid) {
                    tracing::error!("{} descends from its own conflict {}", tx.txid, competitor);
                    return Err(Error::ConflictResolutionCycle(tx.txid));
                }
                for txid in descendants {
                    let Some(entry) = state.store.get(&txid) else {
                        continue;
                    };
                    if conflict_depth < view.depth(entry)? {
                        to_mark.insert(txid);
                    }
                }
            }
        }

        state.mark_conflicted(&to_mark, block);

        if !to_mark.is_empty() {
            tracing::info!(
                "{} entries conflicted by {} in block {}",
                to_mark.len(),
                tx.txid,
                block
            );
        }
        Ok(to_mark)
    }

    /// An unconfirmed entry that claims an outpoint already spent by a
    /// confirmed local entry is conflicted against the deepest such block,
    /// together with its descendants.
    fn conflict_late_claimant(
        &self,
        state: &mut LedgerState,
        txid: &TxId,
        tip: ChainTip,
    ) -> Result<BTreeSet<TxId>> {
        let Some(entry) = state.store.get(txid) else {
            return Ok(BTreeSet::new());
        };
        if entry.position != ChainPosition::Unconfirmed {
            return Ok(BTreeSet::new());
        }

        let mut winner: Option<(BlockHash, i32)> = None;
        for competitor in state.spends.conflicts(&entry.tx) {
            let Some(ChainPosition::Confirmed { block, .. }) =
                state.store.get(&competitor).map(|c| c.position)
            else {
                continue;
            };
            let Some(info) = self.chain.block(&block)? else {
                continue;
            };
            let depth = tip.height - info.height + 1;
            if depth > 0 && winner.map_or(true, |(_, deepest)| depth > deepest) {
                winner = Some((block, depth));
            }
        }
        let Some((block, depth)) = winner else {
            return Ok(BTreeSet::new());
        };

        let mut to_mark = BTreeSet::new();
        {
            let view = self.view(state, tip);
            for descendant in state.spends.descendants(*txid)? {
                let Some(entry) = state.store.get(&descendant) else {
                    continue;
                };
                if -depth < view.depth(entry)? {
                    to_mark.insert(descendant);
                }
            }
        }

        state.mark_conflicted(&to_mark, block);
        tracing::info!("{} arrived after its conflict confirmed in block {}", txid, block);
        Ok(to_mark)
    }

    /// Abandon an unconfirmed transaction that is not in the memory pool,
    /// together with its unconfirmed descendants, releasing their inputs.
    pub fn abandon_transaction(&self, txid: &TxId) -> Result<()> {
        let tip = self.chain.tip()?;

        let changed = {
            let mut state = self.state.write();
            let Some(entry) = state.store.get(txid) else {
                return Err(Error::UnknownTransaction(*txid));
            };
            let mut to_abandon = BTreeSet::new();
            {
                let view = self.view(&state, tip);
                if view.depth(entry)? > 0 || self.chain.in_mempool(txid)? {
                    return Err(Error::InvalidState(format!(
                        "{} is confirmed or still in the memory pool",
                        txid
                    )));
                }
                for descendant in state.spends.descendants(*txid)? {
                    let Some(entry) = state.store.get(&descendant) else {
                        continue;
                    };
                    if view.depth(entry)? == 0 && !entry.is_abandoned() {
                        to_abandon.insert(descendant);
                    }
                }
            }

            for descendant in &to_abandon {
                if let Some(entry) = state.store.get_mut(descendant) {
                    entry.position = ChainPosition::Abandoned;
                    entry.mark_dirty();
                }
                state.mark_neighbours_dirty(descendant);
            }
            state.snapshot(&to_abandon)
        };

        tracing::info!("Abandoned {} and {} descendants", txid, changed.len().saturating_sub(1));
        self.persist(changed)
    }

    /// Remove one entry from memory and storage.
    pub fn erase(&self, txid: &TxId) -> Result<()> {
        {
            let mut state = self.state.write();
            state.mark_neighbours_dirty(txid);
            let Some(entry) = state.store.erase(txid) else {
                return Err(Error::UnknownTransaction(*txid));
            };
            state.spends.remove_spends(&entry.tx);
        }
        tracing::info!("Erased ledger entry {}", txid);
        self.persistence.erase(txid)
    }

    /// Clone of a stored entry
    pub fn entry(&self, txid: &TxId) -> Option<LedgerEntry> {
        self.state.read().store.get(txid).cloned()
    }

    /// Other local transactions claiming any outpoint `txid` spends.
    pub fn get_conflicts(&self, txid: &TxId) -> Result<BTreeSet<TxId>> {
        let state = self.state.read();
        let entry = state
            .store
            .get(txid)
            .ok_or(Error::UnknownTransaction(*txid))?;
        Ok(state.spends.conflicts(&entry.tx))
    }

    /// Whether a live local transaction spends `outpoint`.
    pub fn is_spent(&self, outpoint: &OutPoint) -> Result<bool> {
        self.with_view(|view| view.is_spent(outpoint))
    }

    fn mark_holder_dirty(state: &LedgerState, outpoint: &OutPoint) {
        if let Some(entry) = state.store.get(&outpoint.txid) {
            entry.mark_dirty();
        }
    }

    /// Freeze an outpoint so selection skips it.
    pub fn lock_coin(&self, outpoint: OutPoint) {
        let mut state = self.state.write();
        state.locked.insert(outpoint);
        Self::mark_holder_dirty(&state, &outpoint);
    }

    /// Release a frozen outpoint.
    pub fn unlock_coin(&self, outpoint: &OutPoint) {
        let mut state = self.state.write();
        state.locked.remove(outpoint);
        Self::mark_holder_dirty(&state, outpoint);
    }

    /// Release every frozen outpoint.
    pub fn unlock_all_coins(&self) {
        let mut state = self.state.write();
        let released = std::mem::take(&mut state.locked);
        for outpoint in &released {
            Self::mark_holder_dirty(&state, outpoint);
        }
    }

    /// Frozen outpoints
    pub fn list_locked_coins(&self) -> Vec<OutPoint> {
        self.state.read().locked.iter().copied().collect()
    }

    /// Invalidate every cached aggregate, e.g. after the key registry changed.
    pub fn mark_dirty(&self) {
        let state = self.state.write();
        state.store.mark_all_dirty();
        tracing::debug!("All ledger caches invalidated");
    }

    /// Records of one entry with evaluated status.
    pub fn decompose(&self, txid: &TxId) -> Result<Vec<TransactionRecord>> {
        self.with_view(|view| {
            let entry = view
                .store
                .get(txid)
                .ok_or(Error::UnknownTransaction(*txid))?;
            let mut records = classifier::decompose(view, entry)?;
            for record in records.iter_mut() {
                record.status = status::evaluate(view, entry, record.category, record.idx);
            }
            Ok(records)
        })
    }

    /// Records of every entry, sorted by status sort key.
    pub fn transaction_records(&self) -> Result<Vec<TransactionRecord>> {
        let mut records = self.with_view(|view| {
            let mut records = Vec::new();
            for entry in view.store.iter_ordered() {
                for mut record in classifier::decompose(view, entry)? {
                    record.status = status::evaluate(view, entry, record.category, record.idx);
                    records.push(record);
                }
            }
            Ok(records)
        })?;
        records.sort_by(|a, b| a.status.sort_key.cmp(&b.status.sort_key));
        Ok(records)
    }

    /// Re-evaluate the statuses that are stale for the current tip.
    ///
    /// Returns how many records were refreshed.
    pub fn refresh_records(&self, records: &mut [TransactionRecord]) -> Result<usize> {
        self.with_view(|view| {
            let mut refreshed = 0;
            for record in records.iter_mut() {
                if let Some(entry) = view.store.get(&record.txid) {
                    if status::refresh(view, entry, record) {
                        refreshed += 1;
                    }
                }
            }
            Ok(refreshed)
        })
    }

    /// Every balance category.
    pub fn balances(&self) -> Result<WalletBalances> {
        self.with_view(balance::balances)
    }

    /// Trusted, mature, unspent value passing `filter`.
    pub fn balance(&self, filter: OwnershipFilter) -> Result<Amount> {
        self.with_view(|view| balance::balance(view, filter))
    }

    /// Candidate coins under `filter`.
    pub fn available_coins(&self, filter: &CoinFilter) -> Result<Vec<CoinCandidate>> {
        self.with_view(|view| selection::available_coins(view, filter))
    }

    /// Candidates a selection may spend: locked coins never qualify, even
    /// when the listing reports them.
    fn selectable_coins(&self, filter: &CoinFilter) -> Result<Vec<CoinCandidate>> {
        self.with_view(|view| {
            let mut coins = selection::available_coins(view, filter)?;
            coins.retain(|coin| !view.is_locked(&coin.outpoint));
            Ok(coins)
        })
    }

    fn depth_tiers(&self) -> Vec<(i32, i32)> {
        let mut tiers = vec![(self.config.min_depth_mine, self.config.min_depth_theirs), (1, 1)];
        if self.config.spend_zero_conf_change {
            tiers.push((0, 1));
        }
        tiers
    }

    fn select_with_fee(
        &self,
        candidates: &[CoinCandidate],
        target: Amount,
        fee: Amount,
        use_mixing_priority: bool,
    ) -> Result<SelectionResult> {
        let selector = CoinSelector::for_mixing(use_mixing_priority);
        let mut last = None;
        for (conf_mine, conf_theirs) in self.depth_tiers() {
            let tier: Vec<CoinCandidate> = candidates
                .iter()
                .filter(|c| c.meets_depth(conf_mine, conf_theirs))
                .cloned()
                .collect();
            match selector.select_coins(tier, target, fee) {
                Ok(result) => return Ok(result),
                Err(Error::InsufficientFunds(msg)) => {
                    tracing::debug!("Depth tier ({}, {}) insufficient", conf_mine, conf_theirs);
                    last = Some(msg);
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::InsufficientFunds(
            last.unwrap_or_else(|| format!("Required {}", target)),
        ))
    }

    /// Pick coins under `filter` covering `target`.
    pub fn select(
        &self,
        target: Amount,
        filter: &CoinFilter,
        use_mixing_priority: bool,
    ) -> Result<SelectionResult> {
        let candidates = self.selectable_coins(filter)?;
        self.select_with_fee(&candidates, target, 0, use_mixing_priority)
    }

    /// Pick coins covering `target` plus the fee of the resulting transaction.
    pub fn fund(
        &self,
        target: Amount,
        filter: &CoinFilter,
        use_mixing_priority: bool,
    ) -> Result<FundingPlan> {
        let candidates = self.selectable_coins(filter)?;
        let calculator = FeeCalculator::new(
            FeeRate::per_kb(self.config.pay_tx_fee_per_kb),
            self.config.max_tx_fee,
        );

        let mut fee = 0;
        for _ in 0..MAX_FUNDING_ROUNDS {
            let selection = self.select_with_fee(&candidates, target, fee, use_mixing_priority)?;
            let outputs = PAYMENT_OUTPUTS + usize::from(selection.change > 0);
            let needed = calculator.calculate_fee(selection.coins.len(), outputs)?;
            if fee >= needed {
                tracing::info!(
                    "Funded {} with {} inputs, fee={}",
                    target,
                    selection.coins.len(),
                    fee
                );
                return Ok(FundingPlan { selection, fee });
            }
            fee = needed;
        }
        Err(Error::InvalidState(format!(
            "fee for {} did not settle after {} rounds",
            target, MAX_FUNDING_ROUNDS
        )))
    }
}

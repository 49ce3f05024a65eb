//! Read-only view over wallet state used by every evaluator.
//!
//! A [`LedgerView`] bundles the entry store, spend index, collaborators and a
//! [`ChainTip`] snapshot. Classifier, status evaluator, accountant and coin
//! listing are plain functions of a view, so they can run concurrently under
//! the wallet's read lock.

use crate::chain::{ChainTip, ChainView, RelayMonitor};
use crate::config::WalletConfig;
use crate::entry::{AmountKind, CacheKey, ChainPosition, LedgerEntry};
use crate::ownership::{Ownership, OwnershipFilter, OwnershipOracle};
use crate::primitives::{OutPoint, TxIn, TxOut};
use crate::privacy::PrivacyOracle;
use crate::spends::SpendIndex;
use crate::store::EntryStore;
use crate::{Error, Result};
use btcu_params::{Amount, ConsensusParams};
use std::collections::BTreeSet;

/// Depth, conflict and trust of an entry at one chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trust {
    /// Confirmations; negative when conflicted against a block
    pub depth: i32,
    /// Conflicted or abandoned
    pub conflicted: bool,
    /// Final at the next height
    pub is_final: bool,
    /// Value can be relied upon
    pub trusted: bool,
}

/// Borrowed wallet state plus collaborators.
#[derive(Clone, Copy)]
pub struct LedgerView<'a> {
    /// Entries
    pub store: &'a EntryStore,
    /// Outpoint claims
    pub spends: &'a SpendIndex,
    /// User-frozen outpoints
    pub locked: &'a BTreeSet<OutPoint>,
    /// Ownership oracle
    pub ownership: &'a dyn OwnershipOracle,
    /// Privacy-coin oracle
    pub privacy: &'a dyn PrivacyOracle,
    /// Chain facts
    pub chain: &'a dyn ChainView,
    /// Peer request counter
    pub relay: &'a dyn RelayMonitor,
    /// Consensus constants
    pub params: &'a ConsensusParams,
    /// Wallet configuration
    pub config: &'a WalletConfig,
    /// Chain snapshot all evaluation is relative to
    pub tip: ChainTip,
}

fn add(total: Amount, value: Amount, what: &str) -> Result<Amount> {
    total
        .checked_add(value)
        .ok_or_else(|| Error::AmountOverflow(format!("{} overflows", what)))
}

impl<'a> LedgerView<'a> {
    fn checked_value(&self, value: Amount) -> Result<Amount> {
        if self.params.is_valid_amount(value) {
            Ok(value)
        } else {
            Err(Error::InvalidAmount(format!("value {} out of range", value)))
        }
    }

    /// Ownership of an output.
    pub fn output_ownership(&self, output: &TxOut) -> Result<Ownership> {
        self.ownership.classify(output)
    }

    /// Ownership of an input, via the output it spends.
    pub fn input_ownership(&self, input: &TxIn) -> Result<Ownership> {
        match self.store.output(&input.prevout) {
            Some(prev) if !input.prevout.is_null() => self.ownership.classify(prev),
            _ => Ok(Ownership::Unowned),
        }
    }

    /// Output value if its ownership passes `filter`.
    pub fn output_credit(&self, output: &TxOut, filter: OwnershipFilter) -> Result<Amount> {
        if self.output_ownership(output)?.matches(filter) {
            self.checked_value(output.value)
        } else {
            Ok(0)
        }
    }

    /// Spent value if the input's ownership passes `filter`.
    pub fn input_debit(&self, input: &TxIn, filter: OwnershipFilter) -> Result<Amount> {
        match self.store.output(&input.prevout) {
            Some(prev) if !input.prevout.is_null() => {
                if self.ownership.classify(prev)?.matches(filter) {
                    self.checked_value(prev.value)
                } else {
                    Ok(0)
                }
            }
            _ => Ok(0),
        }
    }

    /// Input redeems a mixing-denominated output.
    pub fn is_denominated_input(&self, input: &TxIn) -> bool {
        self.store
            .output(&input.prevout)
            .is_some_and(|prev| self.params.is_denominated_amount(prev.value))
    }

    /// Spent value of the entry's inputs passing `filter` (cached).
    pub fn debit(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<Amount> {
        if entry.tx.inputs.is_empty() {
            return Ok(0);
        }
        entry
            .cache()
            .get_or_compute(CacheKey::new(AmountKind::Debit, filter), || {
                entry.tx.inputs.iter().try_fold(0, |total, input| {
                    add(total, self.input_debit(input, filter)?, "debit")
                })
            })
    }

    /// Value of the entry's outputs passing `filter`, ignoring maturity (cached).
    pub fn raw_credit(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<Amount> {
        entry
            .cache()
            .get_or_compute(CacheKey::new(AmountKind::Credit, filter), || {
                entry.tx.outputs.iter().try_fold(0, |total, output| {
                    add(total, self.output_credit(output, filter)?, "credit")
                })
            })
    }

    /// Credit, zero for a block subsidy that has not matured.
    pub fn credit(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<Amount> {
        if entry.tx.is_coinbase() && self.blocks_to_maturity(entry)? > 0 {
            return Ok(0);
        }
        self.raw_credit(entry, filter)
    }

    /// Value returned to us as change (cached).
    pub fn change(&self, entry: &LedgerEntry) -> Result<Amount> {
        entry
            .cache()
            .get_or_compute(CacheKey::new(AmountKind::Change, OwnershipFilter::ALL), || {
                entry.tx.outputs.iter().try_fold(0, |total, output| {
                    let value = if self.ownership.is_change(output)? {
                        self.checked_value(output.value)?
                    } else {
                        0
                    };
                    add(total, value, "change")
                })
            })
    }

    /// Any input passing `filter` belongs to us.
    pub fn is_from_me(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<bool> {
        Ok(self.debit(entry, filter)? > 0)
    }

    /// Confirmation depth at the view's tip.
    ///
    /// Positive: confirmations. Zero: pending or the block left the active
    /// chain. Negative: conflicted against a block `-depth` deep.
    pub fn depth(&self, entry: &LedgerEntry) -> Result<i32> {
        let depth = match entry.position {
            ChainPosition::Confirmed { block, .. } => match self.chain.block(&block)? {
                Some(info) => self.tip.height - info.height + 1,
                None => 0,
            },
            ChainPosition::Conflicted { block } => match self.chain.block(&block)? {
                Some(info) => -(self.tip.height - info.height + 1),
                None => 0,
            },
            ChainPosition::Unconfirmed | ChainPosition::Abandoned => 0,
        };

        if (0..self.params.recommended_confirmations).contains(&depth)
            && entry.position != ChainPosition::Abandoned
        {
            let signatures = self.chain.lock_signatures(&entry.txid())?;
            if signatures >= self.params.instant_lock_signatures_required {
                return Ok(self.params.instant_lock_depth + depth);
            }
        }
        Ok(depth)
    }

    /// Blocks until a reward entry matures; zero for ordinary entries.
    pub fn blocks_to_maturity(&self, entry: &LedgerEntry) -> Result<i32> {
        if !(entry.tx.is_coinbase() || entry.tx.is_coinstake()) {
            return Ok(0);
        }
        Ok(self.params.blocks_to_maturity(self.depth(entry)?))
    }

    /// Depth, conflict state, finality and trust in one pass.
    pub fn trust(&self, entry: &LedgerEntry) -> Result<Trust> {
        let depth = self.depth(entry)?;
        let conflicted = depth < 0
            || matches!(
                entry.position,
                ChainPosition::Conflicted { .. } | ChainPosition::Abandoned
            );
        let is_final = self
            .chain
            .is_final(&entry.tx, self.tip.height + 1, self.tip.adjusted_time)?;

        let trusted = if !is_final || conflicted {
            false
        } else if depth >= 1 {
            true
        } else if !self.config.spend_zero_conf_change
            || !self.chain.in_mempool(&entry.txid())?
            || !self.is_from_me(entry, OwnershipFilter::ALL)?
        {
            false
        } else {
            self.parents_spendable(entry)?
        };

        Ok(Trust {
            depth,
            conflicted,
            is_final,
            trusted,
        })
    }

    fn parents_spendable(&self, entry: &LedgerEntry) -> Result<bool> {
        for input in &entry.tx.inputs {
            let Some(prev) = self.store.output(&input.prevout) else {
                return Ok(false);
            };
            if self.ownership.classify(prev)? != Ownership::Spendable {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// An unabandoned, non-conflicted local transaction claims `outpoint`.
    pub fn is_spent(&self, outpoint: &OutPoint) -> Result<bool> {
        for claimant in self.spends.claimants(outpoint) {
            let Some(spender) = self.store.get(&claimant) else {
                continue;
            };
            let depth = self.depth(spender)?;
            if depth > 0 || (depth == 0 && !spender.is_abandoned()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Outpoint frozen by the user.
    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.locked.contains(outpoint)
    }

    fn unspent_credit<P>(
        &self,
        entry: &LedgerEntry,
        kind: AmountKind,
        filter: OwnershipFilter,
        keep: P,
    ) -> Result<Amount>
    where
        P: Fn(&OutPoint) -> bool,
    {
        entry
            .cache()
            .get_or_compute(CacheKey::new(kind, filter), || {
                let mut total = 0;
                for (index, output) in entry.tx.outputs.iter().enumerate() {
                    let outpoint = OutPoint::new(entry.txid(), index as u32);
                    if !keep(&outpoint) || self.is_spent(&outpoint)? {
                        continue;
                    }
                    total = add(total, self.output_credit(output, filter)?, "available credit")?;
                }
                Ok(total)
            })
    }

    /// Unspent owned value, zero while a reward is immature.
    pub fn available_credit(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<Amount> {
        if self.blocks_to_maturity(entry)? > 0 {
            return Ok(0);
        }
        self.unspent_credit(entry, AmountKind::AvailableCredit, filter, |_| true)
    }

    /// Owned value of a reward still inside its maturity window.
    pub fn immature_credit(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<Amount> {
        if self.blocks_to_maturity(entry)? == 0 || self.depth(entry)? <= 0 {
            return Ok(0);
        }
        entry
            .cache()
            .get_or_compute(CacheKey::new(AmountKind::ImmatureCredit, filter), || {
                self.raw_credit(entry, filter)
            })
    }

    /// Unspent owned value frozen by the user.
    pub fn locked_credit(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<Amount> {
        if self.blocks_to_maturity(entry)? > 0 {
            return Ok(0);
        }
        self.unspent_credit(entry, AmountKind::LockedCredit, filter, |o| self.is_locked(o))
    }

    /// Unspent owned value not frozen by the user.
    pub fn unlocked_credit(&self, entry: &LedgerEntry, filter: OwnershipFilter) -> Result<Amount> {
        if self.blocks_to_maturity(entry)? > 0 {
            return Ok(0);
        }
        self.unspent_credit(entry, AmountKind::UnlockedCredit, filter, |o| !self.is_locked(o))
    }

    /// Value of our unspent privacy mints created by the entry.
    pub fn privacy_minted(&self, entry: &LedgerEntry) -> Result<Amount> {
        let mut total = 0;
        for index in self.privacy.minted_outputs(&entry.tx) {
            let outpoint = OutPoint::new(entry.txid(), index);
            if !self.privacy.is_own_unspent_mint(&outpoint) {
                continue;
            }
            if let Some(output) = entry.tx.outputs.get(index as usize) {
                total = add(total, self.checked_value(output.value)?, "privacy balance")?;
            }
        }
        Ok(total)
    }
}

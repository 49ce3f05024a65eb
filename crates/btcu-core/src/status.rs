//! Confirmation, maturity and conflict state of records.

use crate::chain::ChainTip;
use crate::entry::LedgerEntry;
use crate::records::{Category, TransactionRecord};
use crate::view::LedgerView;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusKind {
    /// Time lock (height) not yet reached
    OpenUntilBlock,
    /// Time lock (timestamp) not yet reached
    OpenUntilDate,
    /// Reward inside its maturity window
    Immature,
    /// Immature reward no peer ever asked for
    MaturesWarning,
    /// Reward whose block lost
    NotAccepted,
    /// Enough confirmations
    Confirmed,
    /// Loses to a confirmed transaction or was abandoned
    Conflicted,
    /// Not relayed and getting old
    Offline,
    /// Pending
    #[default]
    Unconfirmed,
    /// In a block, below the recommended depth
    Confirming,
}

/// Status snapshot attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionStatus {
    /// Ordering key: height, coinbase flag, receipt time, sub-index
    pub sort_key: String,
    /// State
    pub status: StatusKind,
    /// Depth at evaluation
    pub depth: i32,
    /// Blocks until a reward matures
    pub matures_in: i32,
    /// Blocks (or the timestamp) the time lock still holds for
    pub open_for: i64,
    /// Trusted and mature
    pub counts_for_balance: bool,
    /// Chain height at evaluation
    pub cur_num_blocks: i32,
    /// Instant-lock counter at evaluation
    pub cur_num_ix_locks: u64,
}

impl TransactionStatus {
    /// Status was computed against an older tip.
    pub fn needs_refresh(&self, tip: &ChainTip) -> bool {
        self.cur_num_blocks != tip.height || self.cur_num_ix_locks != tip.complete_tx_locks
    }

    /// Human-readable state.
    pub fn label(&self) -> &'static str {
        match self.status {
            StatusKind::MaturesWarning => "Abandoned (not mature because no nodes have confirmed)",
            StatusKind::Confirmed => "Confirmed",
            StatusKind::OpenUntilDate => "OpenUntilDate",
            StatusKind::OpenUntilBlock => "OpenUntilBlock",
            StatusKind::Unconfirmed => "Unconfirmed",
            StatusKind::Confirming => "Confirming",
            StatusKind::Conflicted => "Conflicted",
            StatusKind::Immature => "Immature",
            StatusKind::NotAccepted => "Not Accepted",
            StatusKind::Offline => "Offline",
        }
    }
}

/// Evaluate the status of a record of `category` at sub-index `idx`.
///
/// Never fails: if the chain view errors the record degrades to
/// `Unconfirmed`, not counted for balance, and stays due for refresh.
pub fn evaluate(
    view: &LedgerView<'_>,
    entry: &LedgerEntry,
    category: Category,
    idx: usize,
) -> TransactionStatus {
    match try_evaluate(view, entry, category, idx) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!("Status of {} degraded: {}", entry.txid(), e);
            TransactionStatus {
                sort_key: format!(
                    "{:010}-{:01}-{:010}-{:03}",
                    i32::MAX,
                    u8::from(entry.tx.is_coinbase()),
                    entry.time_received,
                    idx
                ),
                cur_num_blocks: -1,
                ..Default::default()
            }
        }
    }
}

fn try_evaluate(
    view: &LedgerView<'_>,
    entry: &LedgerEntry,
    category: Category,
    idx: usize,
) -> Result<TransactionStatus> {
    let params = view.params;
    let tip = view.tip;

    let height = match entry.position.block_hash() {
        Some(hash) => view.chain.block(&hash)?.map(|b| b.height),
        None => None,
    };
    let sort_key = format!(
        "{:010}-{:01}-{:010}-{:03}",
        height.unwrap_or(i32::MAX),
        u8::from(entry.tx.is_coinbase()),
        entry.time_received,
        idx
    );

    let trust = view.trust(entry)?;
    let offline = tip.adjusted_time - entry.time_received > params.offline_threshold_secs
        && view.relay.request_count(&entry.txid()) == 0;
    let blocks_to_maturity = if entry.tx.is_coinbase() || entry.tx.is_coinstake() {
        params.blocks_to_maturity(trust.depth)
    } else {
        0
    };

    let mut status = TransactionStatus {
        sort_key,
        status: StatusKind::Unconfirmed,
        depth: trust.depth,
        matures_in: 0,
        open_for: 0,
        counts_for_balance: trust.trusted && blocks_to_maturity == 0,
        cur_num_blocks: tip.height,
        cur_num_ix_locks: tip.complete_tx_locks,
    };

    if !trust.is_final {
        let lock_time = entry.tx.lock_time;
        if lock_time < params.locktime_threshold {
            status.status = StatusKind::OpenUntilBlock;
            status.open_for = i64::from(lock_time) - i64::from(tip.height);
        } else {
            status.status = StatusKind::OpenUntilDate;
            status.open_for = i64::from(lock_time);
        }
    } else if category.is_reward() {
        if blocks_to_maturity > 0 {
            status.matures_in = blocks_to_maturity;
            status.status = if status.depth >= 0 && !trust.conflicted {
                if offline {
                    StatusKind::MaturesWarning
                } else {
                    StatusKind::Immature
                }
            } else {
                StatusKind::NotAccepted
            };
        } else {
            status.status = StatusKind::Confirmed;
        }
    } else if status.depth < 0 || trust.conflicted {
        status.status = StatusKind::Conflicted;
    } else if offline {
        status.status = StatusKind::Offline;
    } else if status.depth == 0 {
        status.status = StatusKind::Unconfirmed;
    } else if status.depth < params.recommended_confirmations {
        status.status = StatusKind::Confirming;
    } else {
        status.status = StatusKind::Confirmed;
    }

    Ok(status)
}

/// Re-evaluate `record` only if its status is stale for the view's tip.
///
/// Returns whether the status was recomputed.
pub fn refresh(view: &LedgerView<'_>, entry: &LedgerEntry, record: &mut TransactionRecord) -> bool {
    if !record.status.needs_refresh(&view.tip) && !record.status.sort_key.is_empty() {
        return false;
    }
    record.status = evaluate(view, entry, record.category, record.idx);
    true
}

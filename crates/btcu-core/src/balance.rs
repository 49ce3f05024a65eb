//! Balance accounting over all ledger entries.

use crate::entry::LedgerEntry;
use crate::ownership::OwnershipFilter;
use crate::view::{LedgerView, Trust};
use crate::{Error, Result};
use btcu_params::Amount;
use serde::{Deserialize, Serialize};

/// Snapshot of every balance category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalances {
    /// Trusted, mature, spendable
    pub spendable: Amount,
    /// Pending spendable value not yet trusted
    pub unconfirmed: Amount,
    /// Rewards still inside their maturity window
    pub immature: Amount,
    /// Trusted watch-only value
    pub watch_only: Amount,
    /// Pending watch-only value
    pub watch_only_unconfirmed: Amount,
    /// Immature watch-only rewards
    pub watch_only_immature: Amount,
    /// Delegations we hold the staking key for
    pub cold_staking: Amount,
    /// Immature rewards on delegations we stake for
    pub cold_staking_immature: Amount,
    /// Delegations we hold the spending key for
    pub delegated: Amount,
    /// Immature rewards on delegations we own
    pub delegated_immature: Amount,
    /// Leases we hold as leaser
    pub leasing: Amount,
    /// Immature rewards on leases we hold as leaser
    pub leasing_immature: Amount,
    /// Leases we own
    pub leased: Amount,
    /// Immature rewards on leases we own
    pub leased_immature: Amount,
    /// Spendable coins frozen by the user
    pub locked: Amount,
    /// Spendable coins not frozen by the user
    pub unlocked: Amount,
    /// Privacy coins past the mint confirmation window
    pub privacy_mature: Amount,
    /// Privacy coins inside the mint confirmation window
    pub privacy_immature: Amount,
    /// Privacy coins minted but unconfirmed
    pub privacy_unconfirmed: Amount,
}

impl WalletBalances {
    /// Value usable for staking: spendable plus delegations and leases we stake.
    pub fn staking(&self) -> Amount {
        self.spendable + self.cold_staking + self.leasing
    }
}

fn accumulate(total: &mut Amount, value: Amount, filter: OwnershipFilter) -> Result<()> {
    *total = total
        .checked_add(value)
        .ok_or_else(|| Error::AmountOverflow(format!("{:?} balance overflows", filter)))?;
    Ok(())
}

/// Add one entry's contribution to `balances`.
fn add_entry(
    view: &LedgerView<'_>,
    entry: &LedgerEntry,
    balances: &mut WalletBalances,
) -> Result<()> {
    let Trust {
        depth,
        trusted,
        is_final,
        conflicted,
    } = view.trust(entry)?;

    if trusted {
        let available = [
            (&mut balances.spendable, OwnershipFilter::SPENDABLE),
            (&mut balances.watch_only, OwnershipFilter::WATCH_ONLY),
            (&mut balances.cold_staking, OwnershipFilter::COLD),
            (&mut balances.delegated, OwnershipFilter::SPENDABLE_DELEGATED),
            (&mut balances.leasing, OwnershipFilter::LEASING),
            (&mut balances.leased, OwnershipFilter::LEASED),
        ];
        for (total, filter) in available {
            accumulate(total, view.available_credit(entry, filter)?, filter)?;
        }
        let spendable = OwnershipFilter::SPENDABLE;
        accumulate(&mut balances.locked, view.locked_credit(entry, spendable)?, spendable)?;
        accumulate(&mut balances.unlocked, view.unlocked_credit(entry, spendable)?, spendable)?;
    } else if !is_final || (depth == 0 && !conflicted) {
        let pending = [
            (&mut balances.unconfirmed, OwnershipFilter::SPENDABLE),
            (&mut balances.watch_only_unconfirmed, OwnershipFilter::WATCH_ONLY),
        ];
        for (total, filter) in pending {
            accumulate(total, view.available_credit(entry, filter)?, filter)?;
        }
    }

    let immature = [
        (&mut balances.immature, OwnershipFilter::SPENDABLE),
        (&mut balances.watch_only_immature, OwnershipFilter::WATCH_ONLY),
        (&mut balances.cold_staking_immature, OwnershipFilter::COLD),
        (&mut balances.delegated_immature, OwnershipFilter::SPENDABLE_DELEGATED),
        (&mut balances.leasing_immature, OwnershipFilter::LEASING),
        (&mut balances.leased_immature, OwnershipFilter::LEASED),
    ];
    for (total, filter) in immature {
        accumulate(total, view.immature_credit(entry, filter)?, filter)?;
    }

    if !conflicted {
        let minted = view.privacy_minted(entry)?;
        if minted > 0 {
            let target = if depth >= view.params.privacy_mint_confirmations {
                &mut balances.privacy_mature
            } else if depth > 0 {
                &mut balances.privacy_immature
            } else {
                &mut balances.privacy_unconfirmed
            };
            accumulate(target, minted, OwnershipFilter::ALL)?;
        }
    }
    Ok(())
}

/// Compute every balance category.
pub fn balances(view: &LedgerView<'_>) -> Result<WalletBalances> {
    let mut balances = WalletBalances::default();
    for entry in view.store.iter_ordered() {
        add_entry(view, entry, &mut balances)?;
    }
    tracing::debug!(
        "Balances: spendable={}, unconfirmed={}, immature={}",
        balances.spendable,
        balances.unconfirmed,
        balances.immature
    );
    Ok(balances)
}

/// Trusted, mature, unspent value passing `filter`.
pub fn balance(view: &LedgerView<'_>, filter: OwnershipFilter) -> Result<Amount> {
    let mut total = 0;
    for entry in view.store.iter_ordered() {
        if view.trust(entry)?.trusted {
            accumulate(&mut total, view.available_credit(entry, filter)?, filter)?;
        }
    }
    Ok(total)
}

//! Transaction decomposition.
//!
//! An entry is matched against a fixed, priority-ordered list of shapes and
//! the first match decides how it is broken into records. Everything here is
//! a pure function of the entry and the view.

use crate::entry::LedgerEntry;
use crate::ownership::{Ownership, OwnershipFilter};
use crate::primitives::{AddressKind, Script, TxOut};
use crate::records::{Category, TransactionRecord};
use crate::view::LedgerView;
use crate::{Error, Result};
use btcu_params::Amount;

/// Placeholder when a distinguished script carries no address.
pub const NO_ADDRESS: &str = "No available address";

/// Top-level shape of an entry, in matching priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Proof-of-stake reward
    StakeReward,
    /// Redeems privacy coins
    PrivacySpend,
    /// Creates a cold-stake delegation
    DelegationContract,
    /// Spends a cold-stake delegation
    DelegationUnlock,
    /// Creates a leasing contract
    LeasingContract,
    /// Spends a leasing contract
    LeasingUnlock,
    /// Pays a leasing reward
    LeasingReward,
    /// Net credit or block subsidy
    Credit,
    /// Everything else
    Debit,
}

/// Totals shared by every branch.
struct Context<'v, 'a> {
    view: &'v LedgerView<'a>,
    entry: &'v LedgerEntry,
    credit: Amount,
    debit: Amount,
}

impl Context<'_, '_> {
    fn net(&self) -> Amount {
        self.credit - self.debit
    }

    fn record(&self, category: Category) -> TransactionRecord {
        TransactionRecord::new(
            self.entry.txid(),
            self.entry.tx_time(),
            self.entry.tx.size,
            category,
        )
    }

    /// Record carrying the entry's full credit and debit.
    fn totals_record(&self, category: Category) -> TransactionRecord {
        let mut record = self.record(category);
        record.credit = self.credit;
        record.debit = -self.debit;
        record
    }

    fn address(&self, script: &Script) -> Option<String> {
        script
            .destination(false, false)
            .map(|dest| dest.encode(&self.view.params.network, AddressKind::Payment))
    }

    fn address_or_none(&self, script: &Script) -> String {
        self.address(script).unwrap_or_else(|| NO_ADDRESS.to_string())
    }

    /// Output spent by the first input whose origin matches `pred`.
    fn distinguished_input<P>(&self, pred: P) -> Option<&TxOut>
    where
        P: Fn(&Script) -> bool,
    {
        self.entry.tx.inputs.iter().find_map(|input| {
            self.view
                .store
                .output(&input.prevout)
                .filter(|prev| pred(&prev.script))
        })
    }
}

/// Determine which branch applies to `entry`.
pub fn shape(view: &LedgerView<'_>, entry: &LedgerEntry) -> Shape {
    let tx = &entry.tx;
    let spends = |pred: fn(&Script) -> bool| {
        tx.inputs.iter().any(|input| {
            view.store
                .output(&input.prevout)
                .is_some_and(|prev| pred(&prev.script))
        })
    };

    if tx.is_coinstake() {
        Shape::StakeReward
    } else if view.privacy.has_spend_inputs(tx) {
        Shape::PrivacySpend
    } else if tx.has_cold_stake_outputs() {
        Shape::DelegationContract
    } else if spends(Script::is_cold_stake) {
        Shape::DelegationUnlock
    } else if tx.has_leasing_outputs() {
        Shape::LeasingContract
    } else if spends(Script::is_leasing) {
        Shape::LeasingUnlock
    } else if tx.is_leasing_reward() {
        Shape::LeasingReward
    } else {
        Shape::Credit
    }
}

/// Decompose `entry` into records.
///
/// Deterministic: an unchanged entry and oracle state always produce the
/// same records. Entries no branch can attribute come back as a single
/// [`Category::Unattributed`] record carrying the net amount.
pub fn decompose(view: &LedgerView<'_>, entry: &LedgerEntry) -> Result<Vec<TransactionRecord>> {
    let ctx = Context {
        view,
        entry,
        credit: view.credit(entry, OwnershipFilter::ALL)?,
        debit: view.debit(entry, OwnershipFilter::ALL)?,
    };

    let mut shape = shape(view, entry);
    if shape == Shape::Credit && !(ctx.net() > 0 || entry.tx.is_coinbase()) {
        shape = Shape::Debit;
    }

    let outcome = match shape {
        Shape::StakeReward => stake_reward(&ctx).map(|r| vec![r]),
        Shape::PrivacySpend => privacy_spend(&ctx),
        Shape::DelegationContract => {
            cold_stake_or_contract(&ctx, ctx.totals_record(Category::DelegationReceived), true)
                .map(|r| vec![r])
        }
        Shape::DelegationUnlock => delegation_unlock(&ctx).map(|r| vec![r]),
        Shape::LeasingContract => leasing_contract(&ctx).map(|r| vec![r]),
        Shape::LeasingUnlock => leasing_unlock(&ctx).map(|r| vec![r]),
        Shape::LeasingReward => leasing_reward(&ctx).map(|r| vec![r]),
        Shape::Credit => credit(&ctx),
        Shape::Debit => debit(&ctx),
    };

    match outcome {
        Err(Error::AmbiguousClassification(txid)) => {
            tracing::warn!("No classifier branch attributes {} ({:?})", txid, shape);
            Ok(vec![unattributed(&ctx, false)])
        }
        other => other,
    }
}

fn overflow(what: &str) -> Error {
    Error::AmountOverflow(format!("{} overflows", what))
}

fn ambiguous(ctx: &Context<'_, '_>) -> Error {
    Error::AmbiguousClassification(ctx.entry.txid())
}

fn unattributed(ctx: &Context<'_, '_>, involves_watch: bool) -> TransactionRecord {
    let mut record = ctx.record(Category::Unattributed);
    let net = ctx.net();
    if net >= 0 {
        record.credit = net;
    } else {
        record.debit = net;
    }
    record.involves_watch_address = involves_watch;
    record
}

fn stake_reward(ctx: &Context<'_, '_>) -> Result<TransactionRecord> {
    let view = ctx.view;
    let tx = &ctx.entry.tx;
    let privacy_spend = view.privacy.has_spend_inputs(tx);
    let reward = &tx.outputs[1];

    if !privacy_spend && reward.script.destination(false, false).is_none() {
        return Err(ambiguous(ctx));
    }

    if privacy_spend
        && (view.privacy.is_self_initiated_spend(tx) || view.privacy.tracks_mint(&tx.txid))
    {
        let mut record = ctx.record(Category::PrivacyStakeReward);
        record.address = ctx.entry.label("zerocoinmint").to_string();
        record.credit = tx
            .outputs
            .iter()
            .filter(|o| o.script.is_privacy_mint())
            .try_fold(0 as Amount, |total, o| {
                total.checked_add(o.value).ok_or_else(|| overflow("minted total"))
            })?;
        record.debit = -view.privacy.spent_value(tx)?;
        return Ok(record);
    }

    let mine = view.output_ownership(reward)?;
    if mine.is_owned() {
        if tx.has_cold_stake_outputs() {
            return cold_stake_or_contract(ctx, ctx.totals_record(Category::StakeHot), false);
        }
        let mut record = ctx.record(Category::StakeReward);
        record.involves_watch_address = mine.is_watch_only();
        record.address = ctx.address_or_none(&reward.script);
        record.credit = ctx.net();
        return Ok(record);
    }

    // Operator reward sits in the last output.
    let operator = &tx.outputs[tx.outputs.len() - 1];
    if let Some(dest) = operator.script.destination(false, false) {
        if view.ownership.is_mine_destination(&dest)? {
            let mine = view.output_ownership(operator)?;
            let mut record = ctx.record(Category::OperatorReward);
            record.involves_watch_address = mine.is_watch_only();
            record.address = ctx.address_or_none(&operator.script);
            record.credit = operator.value;
            return Ok(record);
        }
    }

    Err(ambiguous(ctx))
}

fn privacy_spend(ctx: &Context<'_, '_>) -> Result<Vec<TransactionRecord>> {
    let view = ctx.view;
    let entry = ctx.entry;
    let tx = &entry.tx;
    let from_me = view.privacy.is_self_initiated_spend(tx);
    let fee = view
        .privacy
        .spent_value(tx)?
        .checked_sub(tx.value_out()?)
        .ok_or_else(|| overflow("spend fee"))?;
    let mut fee_assigned = false;
    let mut parts: Vec<TransactionRecord> = Vec::new();

    for output in &tx.outputs {
        let mut record = if output.script.is_privacy_mint() {
            // Re-minted change only exists for our own spends.
            if !from_me {
                continue;
            }
            let mut record = ctx.record(Category::SpendChange);
            record.involves_watch_address = view.output_ownership(output)?.is_watch_only();
            record.address = entry.label("zerocoinmint").to_string();
            record
        } else {
            let mine = view.output_ownership(output)?;
            if mine.is_owned() {
                let mut record = if from_me {
                    ctx.record(Category::SpendToSelf)
                } else {
                    let mut record = ctx.record(Category::ReceivedFromSpend);
                    record.credit = output.value;
                    record
                };
                record.involves_watch_address = mine.is_watch_only();
                record.address = ctx
                    .address(&output.script)
                    .unwrap_or_else(|| entry.label("recvzerocoinspend").to_string());
                record
            } else {
                if !from_me {
                    continue;
                }
                let mut record = ctx.record(Category::SpendToOther);
                record.debit = -output.value;
                record.address = ctx
                    .address(&output.script)
                    .unwrap_or_else(|| entry.label("zerocoinspend").to_string());
                record
            }
        };

        if from_me && !fee_assigned {
            record.debit = record.debit.checked_sub(fee).ok_or_else(|| overflow("spend fee"))?;
            fee_assigned = true;
        }
        record.idx = parts.len();
        parts.push(record);
    }

    Ok(parts)
}

fn cold_stake_or_contract(
    ctx: &Context<'_, '_>,
    mut record: TransactionRecord,
    is_contract: bool,
) -> Result<TransactionRecord> {
    let view = ctx.view;
    let p2cs = ctx
        .entry
        .tx
        .outputs
        .iter()
        .find(|o| o.script.is_cold_stake())
        .ok_or_else(|| ambiguous(ctx))?;

    let spendable = view
        .output_ownership(p2cs)?
        .matches(OwnershipFilter::SPENDABLE_DELEGATED);
    let from_me = view.is_from_me(ctx.entry, OwnershipFilter::ALL)?;

    record.involves_watch_address = false;
    record.category = if is_contract {
        if spendable && from_me {
            Category::DelegationSentOwner
        } else if from_me {
            Category::DelegationSentTransferring
        } else {
            Category::DelegationReceived
        }
    } else if spendable {
        record.credit = view.credit(ctx.entry, OwnershipFilter::SPENDABLE_DELEGATED)?;
        record.debit = -view.debit(ctx.entry, OwnershipFilter::SPENDABLE_DELEGATED)?;
        Category::StakeDelegated
    } else {
        Category::StakeHot
    };
    record.address = ctx.address_or_none(&p2cs.script);
    Ok(record)
}

fn delegation_unlock(ctx: &Context<'_, '_>) -> Result<TransactionRecord> {
    let view = ctx.view;
    let entry = ctx.entry;
    let prev = ctx
        .distinguished_input(Script::is_cold_stake)
        .ok_or_else(|| ambiguous(ctx))?;

    let spendable = view
        .output_ownership(prev)?
        .matches(OwnershipFilter::SPENDABLE_ALL);

    let mut record = if spendable {
        let mut record = ctx.record(Category::UnlockByOwner);
        record.debit = -view.debit(entry, OwnershipFilter::SPENDABLE_DELEGATED)?;
        record.credit = view.credit(entry, OwnershipFilter::ALL)?;
        record
    } else {
        let mut record = ctx.record(Category::UnlockByStaker);
        record.debit = -view.debit(entry, OwnershipFilter::COLD)?;
        record.credit = -view.credit(entry, OwnershipFilter::COLD)?;
        record
    };
    record.address = ctx.address_or_none(&prev.script);
    Ok(record)
}

fn leasing_contract(ctx: &Context<'_, '_>) -> Result<TransactionRecord> {
    let view = ctx.view;
    let leased = view.credit(ctx.entry, OwnershipFilter::LEASED)?;

    for output in ctx.entry.tx.outputs.iter().filter(|o| o.script.is_leasing()) {
        let mut record = ctx.totals_record(Category::LeaseSent);
        match view.output_ownership(output)? {
            Ownership::SpendableLeasing => {
                record.category = Category::LeaseSentToSelf;
                record.credit -= leased;
            }
            Ownership::Leased => {
                record.category = Category::LeaseSent;
                record.debit -= leased;
            }
            Ownership::Leasing => {
                record.category = Category::LeaseReceived;
                record.debit = -record.debit + leased;
            }
            _ => continue,
        }
        record.address = ctx.address_or_none(&output.script);
        return Ok(record);
    }
    Err(ambiguous(ctx))
}

fn leasing_unlock(ctx: &Context<'_, '_>) -> Result<TransactionRecord> {
    let view = ctx.view;
    for input in &ctx.entry.tx.inputs {
        let Some(prev) = view.store.output(&input.prevout) else {
            continue;
        };
        if !prev.script.is_leasing() {
            continue;
        }
        let category = match view.output_ownership(prev)? {
            Ownership::SpendableLeasing => Category::LeaseUnlockOwn,
            Ownership::Leased => Category::LeaseUnlock,
            Ownership::Leasing => Category::LeaseReturn,
            _ => continue,
        };
        let mut record = ctx.totals_record(category);
        record.address = ctx.address_or_none(&prev.script);
        return Ok(record);
    }
    Err(ambiguous(ctx))
}

fn leasing_reward(ctx: &Context<'_, '_>) -> Result<TransactionRecord> {
    for output in &ctx.entry.tx.outputs {
        if output.script.is_leasing_reward()
            && ctx.view.output_ownership(output)? == Ownership::Spendable
        {
            let mut record = ctx.totals_record(Category::LeasingReward);
            record.address = ctx.address_or_none(&output.script);
            return Ok(record);
        }
    }
    Err(ambiguous(ctx))
}

fn credit(ctx: &Context<'_, '_>) -> Result<Vec<TransactionRecord>> {
    let view = ctx.view;
    let entry = ctx.entry;
    let mut parts: Vec<TransactionRecord> = Vec::new();

    for output in &entry.tx.outputs {
        let mine = view.output_ownership(output)?;
        if !mine.is_owned() {
            continue;
        }
        let mut record = ctx.record(Category::ReceivedFromOther);
        record.idx = parts.len();
        record.credit = output.value;
        record.involves_watch_address = mine.is_watch_only();

        match output.script.destination(false, false) {
            Some(dest) if view.ownership.is_mine_destination(&dest)? => {
                record.category = Category::ReceivedWithAddress;
                record.address = ctx.address_or_none(&output.script);
            }
            _ => {
                record.address = entry.label("from").to_string();
            }
        }
        if entry.tx.is_coinbase() {
            record.category = Category::Generated;
        }
        parts.push(record);
    }

    Ok(parts)
}

/// Label a self-payment from the mixing amounts it moves. Later outputs
/// override earlier ones.
fn self_payment_category(ctx: &Context<'_, '_>) -> Result<Category> {
    let params = ctx.view.params;
    let tx = &ctx.entry.tx;
    let fee = ctx.debit.checked_sub(tx.value_out()?);
    let mut category = Category::PaymentToSelf;
    for output in &tx.outputs {
        if params.is_collateral_amount(output.value) {
            category = Category::MixMakeCollaterals;
        }
        if params.is_denominated_amount(output.value) {
            category = Category::MixCreateDenominations;
        }
        if fee == Some(params.mixing_collateral) {
            category = Category::MixCollateralPayment;
        }
    }
    Ok(category)
}

fn debit(ctx: &Context<'_, '_>) -> Result<Vec<TransactionRecord>> {
    let view = ctx.view;
    let entry = ctx.entry;
    let tx = &entry.tx;

    let mut involves_watch = false;
    let mut all_from_me = true;
    let mut from_me_denominated = true;
    let mut from_me_count = 0usize;
    for input in &tx.inputs {
        let mine = view.input_ownership(input)?;
        if mine.is_owned() {
            from_me_denominated &= view.is_denominated_input(input);
            from_me_count += 1;
        } else {
            all_from_me = false;
        }
        involves_watch |= mine.is_watch_only();
    }

    let mut all_to_me = true;
    let mut to_me_denominated = true;
    let mut to_me_count = 0usize;
    for output in &tx.outputs {
        let mine = view.output_ownership(output)?;
        if mine.is_owned() {
            to_me_denominated &= view.params.is_denominated_amount(output.value);
            to_me_count += 1;
        } else {
            all_to_me = false;
        }
        involves_watch |= mine.is_watch_only();
    }

    if from_me_denominated && to_me_denominated && from_me_count * to_me_count != 0 {
        let mut record = ctx.totals_record(Category::MixDenominate);
        record.involves_watch_address = false;
        return Ok(vec![record]);
    }

    if all_from_me && all_to_me {
        let first = tx.outputs.first();
        let mut record = ctx.record(Category::PaymentToSelf);
        if entry.has_mixing_marker() {
            record.category = Category::Mixed;
            record.address = first
                .and_then(|o| ctx.address(&o.script))
                .unwrap_or_else(|| entry.label("to").to_string());
        } else {
            record.category = self_payment_category(ctx)?;
            record.address = first
                .and_then(|o| ctx.address(&o.script))
                .unwrap_or_default();
        }

        let change = view.change(entry)?;
        record.debit = -(ctx.debit - change);
        record.credit = ctx.credit - change;
        record.involves_watch_address = involves_watch;
        return Ok(vec![record]);
    }

    let has_mints = view.privacy.has_mint_outputs(tx);
    if all_from_me || has_mints {
        let mut fee = ctx
            .debit
            .checked_sub(tx.value_out()?)
            .ok_or_else(|| overflow("fee"))?;
        let mut parts: Vec<TransactionRecord> = Vec::new();

        for output in &tx.outputs {
            let mut record = ctx.record(Category::SentToOther);
            record.idx = parts.len();
            record.involves_watch_address = involves_watch;

            if output.script.is_privacy_mint() {
                record.category = Category::Mint;
                record.address = entry.label("zerocoinmint").to_string();
                record.credit += output.value;
            } else if view.output_ownership(output)?.is_owned() {
                // Change back to ourselves.
                continue;
            } else if output.script.destination(false, false).is_some() {
                // Unknown change of a mint built by a wallet restored without its keys.
                if has_mints {
                    continue;
                }
                record.category = Category::SentToAddress;
                record.address = ctx.address_or_none(&output.script);
            } else {
                record.address = entry.label("to").to_string();
            }

            if entry.has_mixing_marker() {
                record.category = Category::Mixed;
            }

            let mut value = output.value;
            if fee > 0 {
                value = value.checked_add(fee).ok_or_else(|| overflow("debit"))?;
                fee = 0;
            }
            record.debit = -value;
            parts.push(record);
        }
        return Ok(parts);
    }

    Ok(vec![unattributed(ctx, involves_watch)])
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Hash160, OutPoint, Transaction, TxId, TxIn};
    use crate::privacy::ScriptPrivacy;
    use crate::testing::{MemoryOwnership, MemoryPersistence, MemoryRelay, StaticChain};
    use crate::wallet::{Collaborators, Wallet};
    use crate::WalletConfig;
    use btcu_params::{NetworkType, COIN};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const MINE: Hash160 = Hash160([1; 20]);
    const THEIRS: Hash160 = Hash160([9; 20]);
    const NOW: i64 = 1_700_000_000;

    struct Harness {
        wallet: Wallet,
        chain: Arc<StaticChain>,
        privacy: Arc<ScriptPrivacy>,
    }

    fn harness() -> Harness {
        let ownership = Arc::new(MemoryOwnership::new());
        ownership.add_key(MINE);
        let chain = Arc::new(StaticChain::new(99, NOW));
        let privacy = Arc::new(ScriptPrivacy::new());
        let config = WalletConfig {
            network: NetworkType::Regtest,
            ..WalletConfig::default()
        };
        let wallet = Wallet::new(
            config,
            Collaborators {
                ownership,
                chain: chain.clone(),
                privacy: privacy.clone(),
                relay: Arc::new(MemoryRelay::new()),
                persistence: Arc::new(MemoryPersistence::new()),
            },
        )
        .unwrap();
        Harness {
            wallet,
            chain,
            privacy,
        }
    }

    fn txid(b: u8) -> TxId {
        TxId::from_bytes([b; 32])
    }

    fn pay(key: Hash160, value: Amount) -> TxOut {
        TxOut::new(value, Script::PayToKeyHash(key))
    }

    fn out(value: Amount, script: Script) -> TxOut {
        TxOut::new(value, script)
    }

    /// Standard input from an outside funder the wallet never saw.
    fn foreign(n: u32) -> TxIn {
        TxIn::new(OutPoint::new(txid(250), n))
    }

    fn from(id: u8) -> TxIn {
        TxIn::new(OutPoint::new(txid(id), 0))
    }

    fn tx(id: u8, inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Transaction {
        Transaction::new(txid(id), inputs, outputs)
    }

    impl Harness {
        fn confirm(&self, height: i32, txs: Vec<Transaction>) {
            let block = self.chain.connect_block(height, NOW);
            self.wallet.block_connected(block, NOW, txs).unwrap();
        }

        /// Confirmed output at `(id, 0)` paying `script` from an outside funder.
        fn receive(&self, id: u8, value: Amount, script: Script) {
            self.confirm(100, vec![tx(id, vec![foreign(id as u32)], vec![out(value, script)])]);
        }

        fn commit(&self, tx: Transaction) {
            self.wallet.commit_transaction(tx, BTreeMap::new()).unwrap();
        }

        fn records(&self, id: u8) -> Vec<TransactionRecord> {
            self.wallet.decompose(&txid(id)).unwrap()
        }

        fn only(&self, id: u8) -> TransactionRecord {
            let mut records = self.records(id);
            assert_eq!(records.len(), 1, "{:?}", records);
            records.remove(0)
        }
    }

    fn cold(staker: Hash160, owner: Hash160) -> Script {
        Script::ColdStake { staker, owner }
    }

    fn lease(leaser: Hash160, owner: Hash160) -> Script {
        Script::Leasing { leaser, owner }
    }

    // ------------------------------------------------------------------
    // Leasing
    // ------------------------------------------------------------------

    #[test]
    fn test_lease_contract_categories() {
        let h = harness();
        h.receive(1, 100 * COIN, Script::PayToKeyHash(MINE));
        h.receive(2, 100 * COIN, Script::PayToKeyHash(MINE));

        h.commit(tx(3, vec![from(1)], vec![out(99 * COIN, lease(THEIRS, MINE))]));
        h.commit(tx(4, vec![from(2)], vec![out(99 * COIN, lease(MINE, MINE))]));
        h.confirm(101, vec![tx(5, vec![foreign(5)], vec![out(40 * COIN, lease(MINE, THEIRS))])]);

        let sent = h.only(3);
        assert_eq!(sent.category, Category::LeaseSent);
        assert!(sent.is_any_leasing_type());
        assert!(!sent.address.is_empty());
        assert_eq!(h.only(4).category, Category::LeaseSentToSelf);
        assert_eq!(h.only(5).category, Category::LeaseReceived);
    }

    #[test]
    fn test_lease_unlock_categories() {
        let h = harness();
        h.receive(1, 50 * COIN, lease(THEIRS, MINE));
        h.receive(2, 50 * COIN, lease(MINE, MINE));
        h.receive(3, 50 * COIN, lease(MINE, THEIRS));

        h.commit(tx(4, vec![from(1)], vec![pay(MINE, 49 * COIN)]));
        h.commit(tx(5, vec![from(2)], vec![pay(MINE, 49 * COIN)]));
        // The owner takes the coins back from us as leaser.
        h.wallet
            .add_transaction(tx(6, vec![from(3)], vec![pay(THEIRS, 49 * COIN)]), None)
            .unwrap();

        assert_eq!(shape_of(&h, 4), Shape::LeasingUnlock);
        assert_eq!(h.only(4).category, Category::LeaseUnlock);
        assert_eq!(h.only(5).category, Category::LeaseUnlockOwn);
        assert_eq!(h.only(6).category, Category::LeaseReturn);
    }

    #[test]
    fn test_leasing_reward() {
        let h = harness();
        h.confirm(
            100,
            vec![tx(1, vec![foreign(1)], vec![out(3 * COIN, Script::LeasingReward(MINE))])],
        );

        assert_eq!(shape_of(&h, 1), Shape::LeasingReward);
        let record = h.only(1);
        assert_eq!(record.category, Category::LeasingReward);
        assert_eq!(record.credit, 3 * COIN);
    }

    // ------------------------------------------------------------------
    // Delegations
    // ------------------------------------------------------------------

    #[test]
    fn test_delegation_unlock_by_owner_and_staker() {
        let h = harness();
        h.receive(1, 50 * COIN, cold(THEIRS, MINE));
        h.receive(2, 50 * COIN, cold(MINE, THEIRS));

        h.commit(tx(3, vec![from(1)], vec![pay(MINE, 49 * COIN)]));
        h.wallet
            .add_transaction(tx(4, vec![from(2)], vec![pay(THEIRS, 49 * COIN)]), None)
            .unwrap();

        let owner = h.only(3);
        assert_eq!(owner.category, Category::UnlockByOwner);
        assert_eq!(owner.debit, -50 * COIN);
        assert_eq!(owner.credit, 49 * COIN);
        assert_eq!(h.only(4).category, Category::UnlockByStaker);
    }

    #[test]
    fn test_stake_on_delegations() {
        let h = harness();
        h.receive(1, 50 * COIN, cold(THEIRS, MINE));
        h.receive(2, 50 * COIN, cold(MINE, THEIRS));

        h.confirm(
            101,
            vec![
                tx(3, vec![from(1)], vec![TxOut::empty(), out(52 * COIN, cold(THEIRS, MINE))]),
                tx(4, vec![from(2)], vec![TxOut::empty(), out(52 * COIN, cold(MINE, THEIRS))]),
            ],
        );

        let delegated = h.only(3);
        assert_eq!(delegated.category, Category::StakeDelegated);
        assert_eq!(delegated.net(), 2 * COIN);
        assert_eq!(h.only(4).category, Category::StakeHot);
    }

    // ------------------------------------------------------------------
    // Rewards
    // ------------------------------------------------------------------

    #[test]
    fn test_operator_reward_from_last_output() {
        let h = harness();
        h.confirm(
            100,
            vec![tx(
                1,
                vec![foreign(1)],
                vec![TxOut::empty(), pay(THEIRS, 102 * COIN), pay(MINE, 5 * COIN)],
            )],
        );

        let record = h.only(1);
        assert_eq!(record.category, Category::OperatorReward);
        assert_eq!(record.credit, 5 * COIN);
    }

    #[test]
    fn test_privacy_stake_reward() {
        let h = harness();
        h.privacy.add_serial(vec![4; 32]);
        h.confirm(
            100,
            vec![tx(
                1,
                vec![TxIn::privacy_spend(vec![4; 32], 10 * COIN)],
                vec![TxOut::empty(), out(11 * COIN, Script::PrivacyMint(vec![1]))],
            )],
        );

        let record = h.only(1);
        assert_eq!(record.category, Category::PrivacyStakeReward);
        assert_eq!(record.credit, 11 * COIN);
        assert_eq!(record.debit, -10 * COIN);
    }

    #[test]
    fn test_generated_block_subsidy() {
        let h = harness();
        h.confirm(
            100,
            vec![tx(1, vec![TxIn::new(OutPoint::null())], vec![pay(MINE, 50 * COIN)])],
        );

        let record = h.only(1);
        assert_eq!(record.category, Category::Generated);
        assert_eq!(record.credit, 50 * COIN);
    }

    // ------------------------------------------------------------------
    // Privacy coins
    // ------------------------------------------------------------------

    #[test]
    fn test_received_from_foreign_privacy_spend() {
        let h = harness();
        h.confirm(
            100,
            vec![tx(1, vec![TxIn::privacy_spend(vec![3], 10 * COIN)], vec![pay(MINE, 9 * COIN)])],
        );

        let record = h.only(1);
        assert_eq!(record.category, Category::ReceivedFromSpend);
        assert_eq!(record.credit, 9 * COIN);
        assert_eq!(record.debit, 0);
    }

    #[test]
    fn test_mint_kept_beside_change() {
        let h = harness();
        h.receive(1, 7 * COIN, Script::PayToKeyHash(MINE));
        h.commit(tx(
            2,
            vec![from(1)],
            vec![
                out(3 * COIN, Script::PrivacyMint(vec![9])),
                pay(MINE, 4 * COIN - 1_000),
            ],
        ));

        let record = h.only(2);
        assert_eq!(record.category, Category::Mint);
        assert_eq!(record.credit, 3 * COIN);
        assert_eq!(record.debit, -(3 * COIN + 1_000));
    }

    // ------------------------------------------------------------------
    // Fallbacks and arithmetic
    // ------------------------------------------------------------------

    #[test]
    fn test_unattributed_stake_without_reward_address() {
        let h = harness();
        h.receive(1, 100 * COIN, Script::PayToKeyHash(MINE));
        h.confirm(
            101,
            vec![tx(
                2,
                vec![from(1)],
                vec![TxOut::empty(), out(101 * COIN, Script::NonStandard(vec![0xac]))],
            )],
        );

        let record = h.only(2);
        assert_eq!(record.category, Category::Unattributed);
        assert_eq!(record.debit, -100 * COIN);
        assert_eq!(record.credit, 0);
    }

    #[test]
    fn test_unattributed_partial_debit() {
        let h = harness();
        h.receive(1, 7 * COIN, Script::PayToKeyHash(MINE));
        h.wallet
            .add_transaction(
                tx(2, vec![from(1), foreign(9)], vec![pay(THEIRS, 12 * COIN)]),
                None,
            )
            .unwrap();

        let record = h.only(2);
        assert_eq!(record.category, Category::Unattributed);
        assert_eq!(record.debit, -7 * COIN);
    }

    #[test]
    fn test_output_total_overflow_is_error() {
        let h = harness();
        h.receive(1, COIN, Script::PayToKeyHash(MINE));
        h.commit(tx(
            2,
            vec![from(1)],
            vec![pay(THEIRS, i64::MAX), pay(THEIRS, i64::MAX)],
        ));

        assert!(matches!(
            h.wallet.decompose(&txid(2)),
            Err(Error::AmountOverflow(_))
        ));
    }

    fn shape_of(h: &Harness, id: u8) -> Shape {
        h.wallet
            .with_view(|view| {
                let entry = view
                    .store
                    .get(&txid(id))
                    .ok_or(Error::UnknownTransaction(txid(id)))?;
                Ok(shape(view, entry))
            })
            .unwrap()
    }
}

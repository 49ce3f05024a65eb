//! Privacy-coin oracle.
//!
//! Proof construction and verification live elsewhere; the ledger only asks
//! which inputs/outputs are mints or spends and whether they are ours.

use crate::primitives::{InputScript, OutPoint, Transaction, TxId};
use crate::{Error, Result};
use btcu_params::Amount;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};

/// Answers privacy-coin questions about a transaction.
pub trait PrivacyOracle: Send + Sync {
    /// Transaction creates privacy-coin mints.
    fn has_mint_outputs(&self, tx: &Transaction) -> bool;

    /// Transaction redeems privacy coins.
    fn has_spend_inputs(&self, tx: &Transaction) -> bool;

    /// The privacy spend was made by this wallet.
    fn is_self_initiated_spend(&self, tx: &Transaction) -> bool;

    /// Indices of mint outputs.
    fn minted_outputs(&self, tx: &Transaction) -> BTreeSet<u32>;

    /// Total value redeemed by the spend inputs.
    fn spent_value(&self, tx: &Transaction) -> Result<Amount>;

    /// The wallet tracks a mint created by `txid`.
    fn tracks_mint(&self, _txid: &TxId) -> bool {
        false
    }

    /// Mint output owned by the wallet and not yet redeemed.
    fn is_own_unspent_mint(&self, _outpoint: &OutPoint) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct Registry {
    serials: HashSet<Vec<u8>>,
    mints: HashSet<OutPoint>,
    redeemed: HashSet<OutPoint>,
}

/// Privacy oracle over typed scripts and a registry of our serials and mints.
#[derive(Debug, Default)]
pub struct ScriptPrivacy {
    registry: RwLock<Registry>,
}

impl ScriptPrivacy {
    /// Empty registry: nothing is ours.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a coin serial generated by this wallet.
    pub fn add_serial(&self, serial: Vec<u8>) {
        self.registry.write().serials.insert(serial);
    }

    /// Record a mint output owned by this wallet.
    pub fn add_mint(&self, outpoint: OutPoint) {
        self.registry.write().mints.insert(outpoint);
    }

    /// Record that an owned mint was redeemed.
    pub fn mark_redeemed(&self, outpoint: OutPoint) {
        self.registry.write().redeemed.insert(outpoint);
    }
}

impl PrivacyOracle for ScriptPrivacy {
    fn has_mint_outputs(&self, tx: &Transaction) -> bool {
        tx.outputs.iter().any(|o| o.script.is_privacy_mint())
    }

    fn has_spend_inputs(&self, tx: &Transaction) -> bool {
        tx.inputs.iter().any(|i| i.is_privacy_spend())
    }

    fn is_self_initiated_spend(&self, tx: &Transaction) -> bool {
        let registry = self.registry.read();
        tx.inputs.iter().any(|input| match &input.script {
            InputScript::PrivacySpend { serial, .. } => registry.serials.contains(serial),
            InputScript::Standard(_) => false,
        })
    }

    fn minted_outputs(&self, tx: &Transaction) -> BTreeSet<u32> {
        tx.outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.script.is_privacy_mint())
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn spent_value(&self, tx: &Transaction) -> Result<Amount> {
        tx.inputs.iter().try_fold(0 as Amount, |total, input| {
            let value = match &input.script {
                InputScript::PrivacySpend { denomination, .. } => *denomination,
                InputScript::Standard(_) => 0,
            };
            total
                .checked_add(value)
                .ok_or_else(|| Error::AmountOverflow("redeemed total overflows".to_string()))
        })
    }

    fn tracks_mint(&self, txid: &TxId) -> bool {
        self.registry.read().mints.iter().any(|m| &m.txid == txid)
    }

    fn is_own_unspent_mint(&self, outpoint: &OutPoint) -> bool {
        let registry = self.registry.read();
        registry.mints.contains(outpoint) && !registry.redeemed.contains(outpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Script, TxIn, TxOut};
    use btcu_params::COIN;

    fn spend_tx(serial: u8) -> Transaction {
        Transaction::new(
            TxId::from_bytes([9; 32]),
            vec![TxIn::privacy_spend(vec![serial], 10 * COIN)],
            vec![
                TxOut::new(COIN, Script::PrivacyMint(vec![1])),
                TxOut::new(8 * COIN, Script::NullData(vec![])),
            ],
        )
    }

    #[test]
    fn test_script_shapes() {
        let oracle = ScriptPrivacy::new();
        let tx = spend_tx(1);
        assert!(oracle.has_spend_inputs(&tx));
        assert!(oracle.has_mint_outputs(&tx));
        assert_eq!(oracle.minted_outputs(&tx), BTreeSet::from([0]));
        assert_eq!(oracle.spent_value(&tx).unwrap(), 10 * COIN);
    }

    #[test]
    fn test_spent_value_overflow_is_error() {
        let oracle = ScriptPrivacy::new();
        let tx = Transaction::new(
            TxId::from_bytes([9; 32]),
            vec![
                TxIn::privacy_spend(vec![1], i64::MAX),
                TxIn::privacy_spend(vec![2], i64::MAX),
            ],
            vec![],
        );
        assert!(matches!(oracle.spent_value(&tx), Err(Error::AmountOverflow(_))));
    }

    #[test]
    fn test_self_initiated_by_serial() {
        let oracle = ScriptPrivacy::new();
        let tx = spend_tx(7);
        assert!(!oracle.is_self_initiated_spend(&tx));
        oracle.add_serial(vec![7]);
        assert!(oracle.is_self_initiated_spend(&tx));
    }

    #[test]
    fn test_redeemed_mint_not_unspent() {
        let oracle = ScriptPrivacy::new();
        let mint = OutPoint::new(TxId::from_bytes([3; 32]), 0);
        oracle.add_mint(mint);
        assert!(oracle.tracks_mint(&mint.txid));
        assert!(oracle.is_own_unspent_mint(&mint));
        oracle.mark_redeemed(mint);
        assert!(!oracle.is_own_unspent_mint(&mint));
    }
}

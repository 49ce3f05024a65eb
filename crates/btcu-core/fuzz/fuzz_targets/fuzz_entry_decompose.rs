//! Fuzz test for classification
//!
//! Feeds decoded transactions into a wallet and decomposes them; the
//! classifier must return records or an error, never panic.

#![no_main]

use btcu_core::testing::{MemoryOwnership, MemoryPersistence, MemoryRelay, StaticChain};
use btcu_core::{Collaborators, Hash160, ScriptPrivacy, Transaction, Wallet, WalletConfig};
use btcu_params::NetworkType;
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(txs) = serde_json::from_slice::<Vec<Transaction>>(data) else {
        return;
    };

    let ownership = Arc::new(MemoryOwnership::new());
    ownership.add_key(Hash160([1; 20]));
    ownership.add_watch(Hash160([2; 20]));
    let config = WalletConfig {
        network: NetworkType::Regtest,
        ..WalletConfig::default()
    };
    let Ok(wallet) = Wallet::new(
        config,
        Collaborators {
            ownership,
            chain: Arc::new(StaticChain::new(100, 1_700_000_000)),
            privacy: Arc::new(ScriptPrivacy::new()),
            relay: Arc::new(MemoryRelay::new()),
            persistence: Arc::new(MemoryPersistence::new()),
        },
    ) else {
        return;
    };

    for tx in txs {
        let txid = tx.txid;
        if wallet.commit_transaction(tx, BTreeMap::new()).is_ok() {
            let _ = wallet.decompose(&txid);
        }
    }
    let _ = wallet.balances();
    let _ = wallet.transaction_records();
});

//! Fuzz test for transaction id parsing
//!
//! Ensures hex parsing rejects malformed ids and round-trips valid ones

#![no_main]

use btcu_core::TxId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(txid) = s.parse::<TxId>() {
            assert_eq!(txid.to_string(), s.to_ascii_lowercase());
        }
    }
});

//! Fuzz test for wallet configuration parsing
//!
//! Ensures arbitrary JSON never panics the loader or validator

#![no_main]

use btcu_core::WalletConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = WalletConfig::from_json(s) {
            let _ = config.validate();
        }
    }
});

//! Fuzz test for coin selection
//!
//! Any successful selection must cover the target plus fee

#![no_main]

use btcu_core::{
    CoinCandidate, CoinSelector, CoinTags, OutPoint, Ownership, SelectionStrategy, TxId,
};
use btcu_params::COIN;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 9 {
        return;
    }
    let target = i64::from(u32::from_le_bytes([data[0], data[1], data[2], data[3]]));
    let fee = i64::from(u16::from_le_bytes([data[4], data[5]]));
    let strategy = match data[6] % 4 {
        0 => SelectionStrategy::MixingPriority,
        1 => SelectionStrategy::LargestFirst,
        2 => SelectionStrategy::SmallestFirst,
        _ => SelectionStrategy::OldestFirst,
    };

    let candidates: Vec<CoinCandidate> = data[7..]
        .chunks(3)
        .enumerate()
        .map(|(i, chunk)| {
            let scale = i64::from(chunk[0]);
            let depth = i32::from(*chunk.get(1).unwrap_or(&0));
            CoinCandidate {
                outpoint: OutPoint::new(TxId::from_bytes([i as u8; 32]), i as u32),
                value: scale * COIN / 10,
                depth,
                from_me: chunk.get(2).map_or(false, |b| b & 1 == 1),
                spendable: true,
                ownership: Ownership::Spendable,
                tags: CoinTags::default(),
            }
        })
        .collect();

    if let Ok(result) = CoinSelector::new(strategy).select_coins(candidates, target, fee) {
        assert!(result.total_value >= target + fee);
    }
});

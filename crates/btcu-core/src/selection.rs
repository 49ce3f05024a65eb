//! Coin selection for transaction building
//!
//! Lists spendable coins from the ledger and picks an input set for a target
//! value: exact matches first, then a greedy pass in ranking order.

use crate::ownership::{Ownership, OwnershipFilter};
use crate::primitives::{OutPoint, TxId};
use crate::view::LedgerView;
use crate::{Error, Result};
use btcu_params::{Amount, ConsensusParams, COIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Priority of mixing-denominated coins, above any coin value
const DENOMINATED_PRIORITY: i64 = i64::MAX;
/// Priority of sub-unit coins, below denominated and above any coin value
const SUB_UNIT_PRIORITY: i64 = i64::MAX - 1;

/// Which amounts a listing may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoinType {
    /// Every amount
    #[default]
    All,
    /// Mixing denominations only
    OnlyDenominated,
    /// Everything except masternode collateral on a masternode
    NotCollateralIfMasternode,
    /// Non-denominated, and no masternode collateral on a masternode
    NonDenominatedNotCollateral,
    /// Masternode collateral amounts only
    OnlyCollateral,
    /// Coins deep enough to stake
    Stakeable,
}

/// Restrictions applied when listing candidate coins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinFilter {
    /// Amount restriction
    pub coin_type: CoinType,
    /// Only coins from trusted entries
    pub only_confirmed: bool,
    /// List zero-value outputs
    pub include_zero_value: bool,
    /// List watch-only outputs (never spendable)
    pub include_watch_only: bool,
    /// List delegations we stake for
    pub include_cold_staking: bool,
    /// List delegations we own
    pub include_delegated: bool,
    /// List leases we hold as leaser
    pub include_leasing: bool,
    /// List leases we own
    pub include_leased: bool,
    /// List leasing reward outputs
    pub include_leasing_rewards: bool,
    /// Wallet runs a masternode (affects collateral modes)
    pub is_masternode: bool,
    /// Require instant-lock-safe depth
    pub use_instant_lock: bool,
    /// Restrict to these outpoints when set
    pub selected: Option<BTreeSet<OutPoint>>,
}

impl Default for CoinFilter {
    fn default() -> Self {
        Self {
            coin_type: CoinType::All,
            only_confirmed: true,
            include_zero_value: false,
            include_watch_only: false,
            include_cold_staking: false,
            include_delegated: true,
            include_leasing: false,
            include_leased: false,
            include_leasing_rewards: true,
            is_masternode: false,
            use_instant_lock: false,
            selected: None,
        }
    }
}

impl CoinFilter {
    /// Mixing-denominated coins only.
    pub fn denominated() -> Self {
        Self {
            coin_type: CoinType::OnlyDenominated,
            ..Self::default()
        }
    }
}

/// Category tags carried by a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinTags {
    /// Mixing denomination
    pub denominated: bool,
    /// Mixing collateral
    pub collateral: bool,
    /// Cold-stake delegation output
    pub cold_stake: bool,
    /// Leasing contract output
    pub leasing: bool,
    /// Leasing reward output
    pub leasing_reward: bool,
}

/// A spendable output offered to the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinCandidate {
    /// Output location
    pub outpoint: OutPoint,
    /// Output value
    pub value: Amount,
    /// Confirmations of the owning entry
    pub depth: i32,
    /// Owning entry spends our coins
    pub from_me: bool,
    /// We hold the keys to spend it
    pub spendable: bool,
    /// Ownership class
    pub ownership: Ownership,
    /// Category tags
    pub tags: CoinTags,
}

impl CoinCandidate {
    /// Owning entry
    pub fn txid(&self) -> TxId {
        self.outpoint.txid
    }

    /// Ranking metric, higher first: denominated coins, then sub-unit
    /// coins, then the rest by value.
    pub fn priority(&self) -> i64 {
        if self.tags.denominated {
            DENOMINATED_PRIORITY
        } else if self.value < COIN {
            SUB_UNIT_PRIORITY
        } else {
            self.value
        }
    }

    /// Deep enough for the `(mine, theirs)` confirmation tier.
    pub fn meets_depth(&self, conf_mine: i32, conf_theirs: i32) -> bool {
        self.depth >= if self.from_me { conf_mine } else { conf_theirs }
    }
}

/// Coin selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Denominated coins, then sub-unit coins, then largest first
    MixingPriority,
    /// Select largest coins first (minimize inputs)
    #[default]
    LargestFirst,
    /// Select smallest coins first (consolidate dust)
    SmallestFirst,
    /// Select deepest coins first (clear out old UTXOs)
    OldestFirst,
}

/// Coin selection result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Selected coins
    pub coins: Vec<CoinCandidate>,
    /// Total value of selected coins
    pub total_value: Amount,
    /// Change amount (if any)
    pub change: Amount,
}

/// Coin selector
#[derive(Debug, Clone)]
pub struct CoinSelector {
    strategy: SelectionStrategy,
}

impl CoinSelector {
    /// Create selector with strategy
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self { strategy }
    }

    /// Selector for `select(target, filter, use_mixing_priority)` calls.
    pub fn for_mixing(use_mixing_priority: bool) -> Self {
        Self::new(if use_mixing_priority {
            SelectionStrategy::MixingPriority
        } else {
            SelectionStrategy::LargestFirst
        })
    }

    /// Select coins to cover target amount plus fee.
    ///
    /// Non-spendable candidates are ignored. A single coin or the set of all
    /// smaller coins matching the requirement exactly wins over the greedy pass.
    pub fn select_coins(
        &self,
        candidates: Vec<CoinCandidate>,
        target_amount: Amount,
        fee: Amount,
    ) -> Result<SelectionResult> {
        if target_amount < 0 || fee < 0 {
            return Err(Error::InvalidAmount(format!(
                "target {} and fee {} must not be negative",
                target_amount, fee
            )));
        }
        let required = target_amount
            .checked_add(fee)
            .ok_or_else(|| Error::AmountOverflow("target plus fee".to_string()))?;

        tracing::debug!(
            "Selecting coins: target={}, fee={}, required={}",
            target_amount,
            fee,
            required
        );

        let mut coins: Vec<CoinCandidate> = candidates
            .into_iter()
            .filter(|c| c.spendable && c.value >= 0)
            .collect();
        self.sort_coins(&mut coins);

        let selected = match Self::exact_match(&coins, required) {
            Some(exact) => exact,
            None => Self::greedy(coins, required)?,
        };

        let total = Self::total_available(&selected)?;
        if total < required {
            return Err(Error::InsufficientFunds(format!(
                "Required {}, have {}",
                required, total
            )));
        }

        let change = total - required;

        tracing::info!(
            "Selected {} coins, total={}, change={}",
            selected.len(),
            total,
            change
        );

        Ok(SelectionResult {
            coins: selected,
            total_value: total,
            change,
        })
    }

    fn exact_match(coins: &[CoinCandidate], required: Amount) -> Option<Vec<CoinCandidate>> {
        if let Some(coin) = coins.iter().find(|c| c.value == required) {
            return Some(vec![coin.clone()]);
        }
        let lower: Vec<CoinCandidate> = coins.iter().filter(|c| c.value < required).cloned().collect();
        match Self::total_available(&lower) {
            Ok(total) if total == required && !lower.is_empty() => Some(lower),
            _ => None,
        }
    }

    fn greedy(coins: Vec<CoinCandidate>, required: Amount) -> Result<Vec<CoinCandidate>> {
        let mut selected = Vec::new();
        let mut total: Amount = 0;
        for coin in coins {
            if total >= required {
                break;
            }
            total = total
                .checked_add(coin.value)
                .ok_or_else(|| Error::AmountOverflow("selected value".to_string()))?;
            selected.push(coin);
        }
        if total < required {
            return Err(Error::InsufficientFunds(format!(
                "Required {}, have {}",
                required, total
            )));
        }
        Ok(selected)
    }

    fn sort_coins(&self, coins: &mut [CoinCandidate]) {
        match self.strategy {
            SelectionStrategy::MixingPriority => {
                coins.sort_by(|a, b| {
                    b.priority()
                        .cmp(&a.priority())
                        .then(b.value.cmp(&a.value))
                        .then(a.outpoint.cmp(&b.outpoint))
                });
            }
            SelectionStrategy::LargestFirst => {
                coins.sort_by(|a, b| b.value.cmp(&a.value).then(a.outpoint.cmp(&b.outpoint)));
            }
            SelectionStrategy::SmallestFirst => {
                coins.sort_by(|a, b| a.value.cmp(&b.value).then(a.outpoint.cmp(&b.outpoint)));
            }
            SelectionStrategy::OldestFirst => {
                coins.sort_by(|a, b| b.depth.cmp(&a.depth).then(a.outpoint.cmp(&b.outpoint)));
            }
        }
    }

    /// Check if coins are sufficient without selecting
    pub fn check_sufficient(candidates: &[CoinCandidate], required_amount: Amount) -> bool {
        let spendable: Vec<CoinCandidate> =
            candidates.iter().filter(|c| c.spendable).cloned().collect();
        Self::total_available(&spendable).is_ok_and(|total| total >= required_amount)
    }

    /// Get total value
    pub fn total_available(coins: &[CoinCandidate]) -> Result<Amount> {
        coins.iter().try_fold(0 as Amount, |total, coin| {
            total
                .checked_add(coin.value)
                .ok_or_else(|| Error::AmountOverflow("coin total".to_string()))
        })
    }
}

impl Default for CoinSelector {
    fn default() -> Self {
        Self::new(SelectionStrategy::LargestFirst)
    }
}

fn passes_coin_type(params: &ConsensusParams, filter: &CoinFilter, value: Amount) -> bool {
    let is_collateral = value == params.masternode_collateral;
    match filter.coin_type {
        CoinType::All | CoinType::Stakeable => true,
        CoinType::OnlyDenominated => params.is_denominated_amount(value),
        CoinType::NotCollateralIfMasternode => !(filter.is_masternode && is_collateral),
        CoinType::NonDenominatedNotCollateral => {
            !params.is_denominated_amount(value)
                && !params.is_collateral_amount(value)
                && !(filter.is_masternode && is_collateral)
        }
        CoinType::OnlyCollateral => is_collateral,
    }
}

/// List candidate coins from the ledger under `filter`.
pub fn available_coins(view: &LedgerView<'_>, filter: &CoinFilter) -> Result<Vec<CoinCandidate>> {
    let params = view.params;
    let mut coins = Vec::new();

    for entry in view.store.iter_ordered() {
        let trust = view.trust(entry)?;
        if !trust.is_final || trust.conflicted {
            continue;
        }
        if filter.only_confirmed && !trust.trusted {
            continue;
        }
        if view.blocks_to_maturity(entry)? > 0 {
            continue;
        }
        if trust.depth < 0 {
            continue;
        }
        if filter.use_instant_lock && trust.depth < params.recommended_confirmations {
            continue;
        }
        if filter.coin_type == CoinType::Stakeable && trust.depth < params.stake_min_depth {
            continue;
        }
        let from_me = entry.from_me || view.is_from_me(entry, OwnershipFilter::ALL)?;

        for (index, output) in entry.tx.outputs.iter().enumerate() {
            let outpoint = OutPoint::new(entry.txid(), index as u32);
            if !passes_coin_type(params, filter, output.value) {
                continue;
            }
            let ownership = view.output_ownership(output)?;
            let allowed = match ownership {
                Ownership::Unowned => false,
                Ownership::WatchOnly => filter.include_watch_only,
                Ownership::Spendable => {
                    !output.script.is_leasing_reward() || filter.include_leasing_rewards
                }
                Ownership::ColdStaker => filter.include_cold_staking,
                Ownership::SpendableDelegated => filter.include_delegated,
                Ownership::Leasing => filter.include_leasing,
                Ownership::Leased => filter.include_leased,
                Ownership::SpendableLeasing => filter.include_leasing || filter.include_leased,
            };
            if !allowed {
                continue;
            }
            if view.is_locked(&outpoint) && filter.coin_type != CoinType::OnlyCollateral {
                continue;
            }
            if output.value <= 0 && !filter.include_zero_value {
                continue;
            }
            if let Some(selected) = &filter.selected {
                if !selected.contains(&outpoint) {
                    continue;
                }
            }
            if view.is_spent(&outpoint)? {
                continue;
            }

            let spendable = match ownership {
                Ownership::Spendable => true,
                Ownership::SpendableDelegated => filter.include_delegated,
                Ownership::SpendableLeasing | Ownership::Leased => filter.include_leased,
                _ => false,
            };
            coins.push(CoinCandidate {
                outpoint,
                value: output.value,
                depth: trust.depth,
                from_me,
                spendable,
                ownership,
                tags: CoinTags {
                    denominated: params.is_denominated_amount(output.value),
                    collateral: params.is_collateral_amount(output.value),
                    cold_stake: output.script.is_cold_stake(),
                    leasing: output.script.is_leasing(),
                    leasing_reward: output.script.is_leasing_reward(),
                },
            });
        }
    }

    tracing::debug!("{} candidate coins available", coins.len());
    Ok(coins)
}

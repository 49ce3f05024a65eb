//! Transaction records: the display/accounting units produced by the classifier.

use crate::primitives::TxId;
use crate::status::TransactionStatus;
use btcu_params::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Economic category of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Net movement that cannot be broken down by payee
    Unattributed,
    /// Block subsidy
    Generated,
    /// Stake reward to an owned output
    StakeReward,
    /// Stake reward paid in privacy coins
    PrivacyStakeReward,
    /// Masternode (operator) reward
    OperatorReward,
    /// Payment to a recognized address
    SentToAddress,
    /// Payment to a non-address destination
    SentToOther,
    /// Receipt on an owned, recognized address
    ReceivedWithAddress,
    /// Receipt on a non-address or unrecognized destination
    ReceivedFromOther,
    /// Every input and output is ours
    PaymentToSelf,
    /// Privacy-coin mint
    Mint,
    /// Privacy spend paying someone else
    SpendToOther,
    /// Privacy spend by someone else paying us
    ReceivedFromSpend,
    /// Privacy spend re-minting its change
    SpendChange,
    /// Privacy spend paying ourselves
    SpendToSelf,
    /// Internal denomination round of the mixing service
    MixDenominate,
    /// Mixing collateral fee
    MixCollateralPayment,
    /// Creation of mixing collateral outputs
    MixMakeCollaterals,
    /// Creation of mixing denominations
    MixCreateDenominations,
    /// Payment funded by mixed coins
    Mixed,
    /// Stake produced by a delegation we own
    StakeDelegated,
    /// Stake produced on behalf of a delegator
    StakeHot,
    /// Delegation we stake for
    DelegationReceived,
    /// Delegation we made, keeping spending rights
    DelegationSentOwner,
    /// Delegation we made, transferring spending rights
    DelegationSentTransferring,
    /// Delegation unlocked by its owner
    UnlockByOwner,
    /// Delegation unlock seen by the staker
    UnlockByStaker,
    /// Lease of our coins to another leaser
    LeaseSent,
    /// Lease where we are both owner and leaser
    LeaseSentToSelf,
    /// Lease we receive as leaser
    LeaseReceived,
    /// Lease we owned, unlocked
    LeaseUnlock,
    /// Self-lease unlocked
    LeaseUnlockOwn,
    /// Lease we held as leaser, returned to its owner
    LeaseReturn,
    /// Reward paid to a leaser
    LeasingReward,
}

impl Category {
    /// Reward that must mature before it counts.
    pub fn is_reward(&self) -> bool {
        matches!(
            self,
            Category::Generated
                | Category::StakeReward
                | Category::PrivacyStakeReward
                | Category::OperatorReward
                | Category::StakeDelegated
                | Category::StakeHot
        )
    }

    /// Coinbase or coinstake reward to self.
    pub fn is_coin_stake(&self) -> bool {
        matches!(
            self,
            Category::StakeReward | Category::Generated | Category::PrivacyStakeReward
        )
    }

    /// Any cold-staking category.
    pub fn is_any_cold_staking_type(&self) -> bool {
        matches!(
            self,
            Category::DelegationReceived
                | Category::DelegationSentTransferring
                | Category::DelegationSentOwner
                | Category::StakeDelegated
                | Category::StakeHot
                | Category::UnlockByOwner
                | Category::UnlockByStaker
        )
    }

    /// Any leasing category.
    pub fn is_any_leasing_type(&self) -> bool {
        matches!(
            self,
            Category::LeaseReceived
                | Category::LeaseSent
                | Category::LeaseSentToSelf
                | Category::LeasingReward
                | Category::LeaseUnlock
                | Category::LeaseUnlockOwn
                | Category::LeaseReturn
        )
    }

    /// Any privacy-coin category.
    pub fn is_privacy_type(&self) -> bool {
        matches!(
            self,
            Category::PrivacyStakeReward
                | Category::Mint
                | Category::SpendToOther
                | Category::ReceivedFromSpend
                | Category::SpendChange
                | Category::SpendToSelf
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Unattributed => "Other",
            Category::Generated => "Generated",
            Category::StakeReward => "Stake",
            Category::PrivacyStakeReward => "Privacy stake",
            Category::OperatorReward => "Masternode reward",
            Category::SentToAddress => "Sent to",
            Category::SentToOther => "Sent to other",
            Category::ReceivedWithAddress => "Received with",
            Category::ReceivedFromOther => "Received from",
            Category::PaymentToSelf => "Payment to yourself",
            Category::Mint => "Privacy mint",
            Category::SpendToOther => "Privacy spend",
            Category::ReceivedFromSpend => "Received from privacy spend",
            Category::SpendChange => "Privacy spend change",
            Category::SpendToSelf => "Privacy spend to self",
            Category::MixDenominate => "Mixing denominate",
            Category::MixCollateralPayment => "Mixing collateral payment",
            Category::MixMakeCollaterals => "Mixing make collateral inputs",
            Category::MixCreateDenominations => "Mixing create denominations",
            Category::Mixed => "Mixed",
            Category::StakeDelegated => "Stake delegated",
            Category::StakeHot => "Stake on behalf of",
            Category::DelegationReceived => "Delegation received",
            Category::DelegationSentOwner => "Delegation sent",
            Category::DelegationSentTransferring => "Delegation sent (ownership transferred)",
            Category::UnlockByOwner => "Delegation unlocked",
            Category::UnlockByStaker => "Delegation unlocked by owner",
            Category::LeaseSent => "Leasing sent",
            Category::LeaseSentToSelf => "Leasing to yourself",
            Category::LeaseReceived => "Leasing received",
            Category::LeaseUnlock => "Leasing unlocked",
            Category::LeaseUnlockOwn => "Own leasing unlocked",
            Category::LeaseReturn => "Leasing returned",
            Category::LeasingReward => "Leasing reward",
        };
        f.write_str(name)
    }
}

/// One semantic line of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Parent entry
    pub txid: TxId,
    /// Entry time
    pub time: i64,
    /// Serialized size of the parent transaction
    pub size: usize,
    /// Position in the parent's decomposition
    pub idx: usize,
    /// Category
    pub category: Category,
    /// Counterparty address or label
    pub address: String,
    /// Amount received
    pub credit: Amount,
    /// Amount sent, stored negative
    pub debit: Amount,
    /// A watch-only input or output is involved
    pub involves_watch_address: bool,
    /// Status snapshot
    pub status: TransactionStatus,
}

impl TransactionRecord {
    /// Empty record for `txid`.
    pub fn new(txid: TxId, time: i64, size: usize, category: Category) -> Self {
        Self {
            txid,
            time,
            size,
            idx: 0,
            category,
            address: String::new(),
            credit: 0,
            debit: 0,
            involves_watch_address: false,
            status: TransactionStatus::default(),
        }
    }

    /// Credit plus (negative) debit.
    pub fn net(&self) -> Amount {
        self.credit + self.debit
    }

    /// Coinbase or coinstake reward to self.
    pub fn is_coin_stake(&self) -> bool {
        self.category.is_coin_stake()
    }

    /// Any cold-staking category.
    pub fn is_any_cold_staking_type(&self) -> bool {
        self.category.is_any_cold_staking_type()
    }

    /// Any leasing category.
    pub fn is_any_leasing_type(&self) -> bool {
        self.category.is_any_leasing_type()
    }

    /// Any privacy-coin category.
    pub fn is_privacy_type(&self) -> bool {
        self.category.is_privacy_type()
    }

    /// Human-readable status.
    pub fn status_label(&self) -> &'static str {
        self.status.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_families() {
        assert!(Category::StakeHot.is_reward());
        assert!(Category::StakeHot.is_any_cold_staking_type());
        assert!(!Category::StakeHot.is_coin_stake());
        assert!(Category::LeaseReturn.is_any_leasing_type());
        assert!(Category::Mint.is_privacy_type());
        assert!(!Category::SentToAddress.is_reward());
    }

    #[test]
    fn test_net() {
        let mut record = TransactionRecord::new(TxId::default(), 0, 0, Category::PaymentToSelf);
        record.credit = 30;
        record.debit = -35;
        assert_eq!(record.net(), -5);
        assert_eq!(record.status_label(), "Unconfirmed");
    }
}

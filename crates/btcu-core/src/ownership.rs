//! Ownership lattice and the oracle that answers "is this mine?"

use crate::primitives::{Destination, TxOut};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// How the wallet relates to a single output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// Not ours
    Unowned,
    /// Watched without keys
    WatchOnly,
    /// Spendable with our keys
    Spendable,
    /// Delegation where we only hold the staking key
    ColdStaker,
    /// Delegation where we hold the spending key
    SpendableDelegated,
    /// Leasing contract where we are the leaser
    Leasing,
    /// Leasing contract where we own the leased coins
    Leased,
    /// Leasing contract where we hold both sides
    SpendableLeasing,
}

impl Ownership {
    /// Bit used by [`OwnershipFilter`] matching.
    pub const fn bit(self) -> u8 {
        match self {
            Ownership::Unowned => 0,
            Ownership::WatchOnly => 1,
            Ownership::Spendable => 1 << 1,
            Ownership::ColdStaker => 1 << 2,
            Ownership::SpendableDelegated => 1 << 3,
            Ownership::Leasing => 1 << 4,
            Ownership::Leased => 1 << 5,
            Ownership::SpendableLeasing => 1 << 6,
        }
    }

    /// Anything but [`Ownership::Unowned`]
    pub fn is_owned(self) -> bool {
        self != Ownership::Unowned
    }

    /// Watched without keys
    pub fn is_watch_only(self) -> bool {
        self == Ownership::WatchOnly
    }

    /// Does this ownership pass `filter`
    pub fn matches(self, filter: OwnershipFilter) -> bool {
        self.bit() & filter.0 != 0
    }
}

/// Bit-set of ownership kinds an aggregate counts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnershipFilter(u8);

impl OwnershipFilter {
    /// Matches nothing
    pub const NONE: Self = Self(0);
    /// Watch-only outputs
    pub const WATCH_ONLY: Self = Self(Ownership::WatchOnly.bit());
    /// Plain spendable outputs
    pub const SPENDABLE: Self = Self(Ownership::Spendable.bit());
    /// Delegations we stake for
    pub const COLD: Self = Self(Ownership::ColdStaker.bit());
    /// Delegations we own
    pub const SPENDABLE_DELEGATED: Self = Self(Ownership::SpendableDelegated.bit());
    /// Leases we receive (including self-leases)
    pub const LEASING: Self = Self(Ownership::Leasing.bit() | Ownership::SpendableLeasing.bit());
    /// Leases we own (including self-leases)
    pub const LEASED: Self = Self(Ownership::Leased.bit() | Ownership::SpendableLeasing.bit());
    /// Self-leases only
    pub const SPENDABLE_LEASING: Self = Self(Ownership::SpendableLeasing.bit());
    /// Everything we can spend
    pub const SPENDABLE_ALL: Self = Self(
        Ownership::Spendable.bit()
            | Ownership::SpendableDelegated.bit()
            | Ownership::SpendableLeasing.bit(),
    );
    /// Any kind of ownership
    pub const ALL: Self = Self(0x7f);

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Filter contains every bit of `other`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OwnershipFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for OwnershipFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnershipFilter({:#09b})", self.0)
    }
}

/// Ownership oracle backed by the wallet's key and script registry.
///
/// Answers must be a pure function of the registry state; when the registry
/// changes the wallet must be told so cached aggregates are invalidated.
pub trait OwnershipOracle: Send + Sync {
    /// Classify an output.
    fn classify(&self, output: &TxOut) -> Result<Ownership>;

    /// Whether a bare destination belongs to the wallet.
    fn is_mine_destination(&self, destination: &Destination) -> Result<bool>;

    /// Whether an owned output is change (ours, not a labeled receive address).
    fn is_change(&self, output: &TxOut) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        assert!(Ownership::Spendable.matches(OwnershipFilter::SPENDABLE));
        assert!(Ownership::Spendable.matches(OwnershipFilter::ALL));
        assert!(!Ownership::WatchOnly.matches(OwnershipFilter::SPENDABLE_ALL));
        assert!(!Ownership::Unowned.matches(OwnershipFilter::ALL));
        assert!(Ownership::SpendableLeasing.matches(OwnershipFilter::LEASED));
        assert!(Ownership::SpendableLeasing.matches(OwnershipFilter::LEASING));
        assert!(!Ownership::Leasing.matches(OwnershipFilter::LEASED));
    }

    #[test]
    fn test_filter_union() {
        let filter = OwnershipFilter::SPENDABLE | OwnershipFilter::WATCH_ONLY;
        assert!(filter.contains(OwnershipFilter::SPENDABLE));
        assert!(!filter.contains(OwnershipFilter::COLD));
        assert!(OwnershipFilter::ALL.contains(OwnershipFilter::SPENDABLE_ALL));
    }
}

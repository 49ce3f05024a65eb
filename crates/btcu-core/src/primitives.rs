//! Ledger primitives: identifiers, scripts, inputs, outputs and transactions.
//!
//! Scripts arrive already typed from the chain layer; this crate never parses
//! or evaluates raw script bytes.

use crate::{Error, Result};
use btcu_params::{Amount, Network};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! hash_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Wrap raw bytes (internal byte order).
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Raw bytes (internal byte order).
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// All-zero hash.
            pub fn is_null(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut reversed = self.0;
                reversed.reverse();
                f.write_str(&hex::encode(reversed))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes)?;
                bytes.reverse();
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_newtype!(TxId, "Transaction identifier.");
hash_newtype!(BlockHash, "Block identifier.");

/// Reference to one output of a prior transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction holding the output
    pub txid: TxId,
    /// Output index
    pub index: u32,
}

impl OutPoint {
    /// Create outpoint
    pub const fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }

    /// The null outpoint used by coinbase inputs.
    pub const fn null() -> Self {
        Self {
            txid: TxId::from_bytes([0u8; 32]),
            index: u32::MAX,
        }
    }

    /// Is this the coinbase null outpoint
    pub fn is_null(&self) -> bool {
        self.txid.is_null() && self.index == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// 160-bit key or script hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash160(pub [u8; 20]);

/// Typed output script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Script {
    /// No script (coinstake marker output)
    Empty,
    /// Pay to public key hash
    PayToKeyHash(Hash160),
    /// Pay to script hash
    PayToScriptHash(Hash160),
    /// Cold-stake delegation: staker may stake, owner may spend
    ColdStake {
        /// Staking key
        staker: Hash160,
        /// Spending key
        owner: Hash160,
    },
    /// Leasing contract: leaser gets staking weight, owner keeps the coins
    Leasing {
        /// Leaser key
        leaser: Hash160,
        /// Owner key
        owner: Hash160,
    },
    /// Reward paid to a leaser
    LeasingReward(Hash160),
    /// Privacy-coin mint commitment
    PrivacyMint(Vec<u8>),
    /// Data carrier
    NullData(Vec<u8>),
    /// Anything else
    NonStandard(Vec<u8>),
}

impl Script {
    /// Cold-stake delegation script
    pub fn is_cold_stake(&self) -> bool {
        matches!(self, Script::ColdStake { .. })
    }

    /// Leasing contract script
    pub fn is_leasing(&self) -> bool {
        matches!(self, Script::Leasing { .. })
    }

    /// Leasing reward script
    pub fn is_leasing_reward(&self) -> bool {
        matches!(self, Script::LeasingReward(_))
    }

    /// Privacy-coin mint script
    pub fn is_privacy_mint(&self) -> bool {
        matches!(self, Script::PrivacyMint(_))
    }

    /// Extract the destination a script pays to.
    ///
    /// For delegation and leasing scripts `cold_stake` / `lease` select the
    /// staker/leaser key; otherwise the owner key is returned.
    pub fn destination(&self, cold_stake: bool, lease: bool) -> Option<Destination> {
        match self {
            Script::PayToKeyHash(id) | Script::LeasingReward(id) => Some(Destination::Key(*id)),
            Script::PayToScriptHash(id) => Some(Destination::Script(*id)),
            Script::ColdStake { staker, owner } => {
                Some(Destination::Key(if cold_stake { *staker } else { *owner }))
            }
            Script::Leasing { leaser, owner } => {
                Some(Destination::Key(if lease { *leaser } else { *owner }))
            }
            Script::Empty | Script::PrivacyMint(_) | Script::NullData(_) | Script::NonStandard(_) => {
                None
            }
        }
    }
}

/// Address payload extracted from a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Destination {
    /// Key hash
    Key(Hash160),
    /// Script hash
    Script(Hash160),
}

/// Which base58 prefix to render a destination with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Ordinary payment address
    Payment,
    /// Cold-staking address
    Staking,
    /// Leasing address
    Leasing,
}

impl Destination {
    /// Base58check encoding for `network`.
    pub fn encode(&self, network: &Network, kind: AddressKind) -> String {
        let (prefix, hash) = match (self, kind) {
            (Destination::Script(id), _) => (network.script_address_prefix, id),
            (Destination::Key(id), AddressKind::Payment) => (network.pubkey_address_prefix, id),
            (Destination::Key(id), AddressKind::Staking) => (network.staking_address_prefix, id),
            (Destination::Key(id), AddressKind::Leasing) => (network.leasing_address_prefix, id),
        };
        let mut payload = Vec::with_capacity(21);
        payload.push(prefix);
        payload.extend_from_slice(&hash.0);
        bs58::encode(payload).with_check().into_string()
    }
}

/// Input unlocking data, as far as the ledger cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputScript {
    /// Ordinary signature script
    Standard(Vec<u8>),
    /// Privacy-coin spend redeeming `denomination`
    PrivacySpend {
        /// Coin serial revealed by the spend
        serial: Vec<u8>,
        /// Redeemed value
        denomination: Amount,
    },
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxIn {
    /// Spent output
    pub prevout: OutPoint,
    /// Unlocking data
    pub script: InputScript,
    /// Sequence number
    pub sequence: u32,
}

impl TxIn {
    /// Standard input spending `prevout`
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script: InputScript::Standard(Vec::new()),
            sequence: u32::MAX,
        }
    }

    /// Privacy-coin spend input
    pub fn privacy_spend(serial: Vec<u8>, denomination: Amount) -> Self {
        Self {
            prevout: OutPoint::null(),
            script: InputScript::PrivacySpend { serial, denomination },
            sequence: u32::MAX,
        }
    }

    /// Does this input redeem a privacy coin
    pub fn is_privacy_spend(&self) -> bool {
        matches!(self.script, InputScript::PrivacySpend { .. })
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOut {
    /// Value
    pub value: Amount,
    /// Locking script
    pub script: Script,
}

impl TxOut {
    /// Create output
    pub fn new(value: Amount, script: Script) -> Self {
        Self { value, script }
    }

    /// Zero-value empty output (coinstake marker)
    pub fn empty() -> Self {
        Self {
            value: 0,
            script: Script::Empty,
        }
    }

    /// Is this the empty marker output
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script == Script::Empty
    }
}

/// Ledger transaction as delivered by the chain layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Identifier
    pub txid: TxId,
    /// Version
    pub version: i32,
    /// Inputs
    pub inputs: Vec<TxIn>,
    /// Outputs
    pub outputs: Vec<TxOut>,
    /// Lock time (height below threshold, timestamp above)
    pub lock_time: u32,
    /// Serialized size in bytes
    pub size: usize,
}

impl Transaction {
    /// Create a version-1 transaction with no lock time
    pub fn new(txid: TxId, inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        let size = 10 + inputs.len() * 148 + outputs.len() * 34;
        Self {
            txid,
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
            size,
        }
    }

    /// Block subsidy transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null() && !self.inputs[0].is_privacy_spend()
    }

    /// Proof-of-stake reward transaction
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && (!self.inputs[0].prevout.is_null() || self.inputs[0].is_privacy_spend())
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    /// Leasing reward payout
    pub fn is_leasing_reward(&self) -> bool {
        !self.is_coinstake() && self.outputs.iter().any(|o| o.script.is_leasing_reward())
    }

    /// Any cold-stake delegation output
    pub fn has_cold_stake_outputs(&self) -> bool {
        self.outputs.iter().any(|o| o.script.is_cold_stake())
    }

    /// Any leasing contract output
    pub fn has_leasing_outputs(&self) -> bool {
        self.outputs.iter().any(|o| o.script.is_leasing())
    }

    /// Sum of output values
    pub fn value_out(&self) -> Result<Amount> {
        self.outputs.iter().try_fold(0 as Amount, |total, o| {
            total
                .checked_add(o.value)
                .ok_or_else(|| Error::AmountOverflow("output total overflows".to_string()))
        })
    }

    /// Outpoints spent by standard inputs
    pub fn spent_outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs
            .iter()
            .filter(|i| !i.prevout.is_null())
            .map(|i| i.prevout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(b: u8) -> TxId {
        TxId::from_bytes([b; 32])
    }

    #[test]
    fn test_txid_hex_roundtrip() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let id = TxId::from_bytes(bytes);
        let text = id.to_string();
        assert!(text.ends_with("ab"));
        assert_eq!(text.parse::<TxId>().unwrap(), id);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(serde_json::from_str::<TxId>(&json).unwrap(), id);
    }

    #[test]
    fn test_coinbase_and_coinstake_shapes() {
        let coinbase = Transaction::new(
            txid(1),
            vec![TxIn::new(OutPoint::null())],
            vec![TxOut::new(50, Script::PayToKeyHash(Hash160([1; 20])))],
        );
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.is_coinstake());

        let coinstake = Transaction::new(
            txid(2),
            vec![TxIn::new(OutPoint::new(txid(1), 0))],
            vec![TxOut::empty(), TxOut::new(60, Script::PayToKeyHash(Hash160([1; 20])))],
        );
        assert!(coinstake.is_coinstake());
        assert!(!coinstake.is_coinbase());
        assert_eq!(coinstake.spent_outpoints().count(), 1);
    }

    #[test]
    fn test_value_out_overflow_is_error() {
        let tx = Transaction::new(
            txid(3),
            vec![TxIn::new(OutPoint::new(txid(1), 0))],
            vec![
                TxOut::new(i64::MAX, Script::PayToKeyHash(Hash160([1; 20]))),
                TxOut::new(i64::MAX, Script::PayToKeyHash(Hash160([1; 20]))),
            ],
        );
        assert!(matches!(tx.value_out(), Err(Error::AmountOverflow(_))));
    }

    #[test]
    fn test_destination_flags() {
        let staker = Hash160([1; 20]);
        let owner = Hash160([2; 20]);
        let script = Script::ColdStake { staker, owner };
        assert_eq!(script.destination(true, false), Some(Destination::Key(staker)));
        assert_eq!(script.destination(false, false), Some(Destination::Key(owner)));
        assert_eq!(Script::NullData(vec![]).destination(false, false), None);
    }

    #[test]
    fn test_address_prefixes_differ() {
        let network = Network::mainnet();
        let dest = Destination::Key(Hash160([7; 20]));
        let payment = dest.encode(&network, AddressKind::Payment);
        let staking = dest.encode(&network, AddressKind::Staking);
        assert_ne!(payment, staking);
        assert!(payment.starts_with('1'));
    }
}

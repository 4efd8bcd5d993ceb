//! Era-independent view of the parts of a block the watcher reads.
//!
//! The codec crate fills these from raw pallas blocks, tests build them by
//! hand.

use crate::{
    asset::{unit, AssetBundle},
    credential::Credential,
    hash::{DatumHash, PolicyId, TxHash},
    point::ChainPoint,
    types::OutputReference,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub point: ChainPoint,
    pub number: u64,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub hash: TxHash,
    /// Spent inputs, lexicographically sorted as the ledger indexes them
    pub inputs: Vec<OutputReference>,
    pub outputs: Vec<TxOutput>,
    /// Datum witnesses by hash
    pub datums: BTreeMap<DatumHash, Vec<u8>>,
    pub redeemers: Vec<Redeemer>,
    /// Verification keys of the vkey witnesses
    pub signatories: Vec<Vec<u8>>,
}

impl Transaction {
    /// Raw datum of an output, inline or resolved through the witness set
    pub fn datum_of<'a>(&'a self, output: &'a TxOutput) -> Option<&'a [u8]> {
        match output.datum.as_ref()? {
            Datum::Inline(bytes) => Some(bytes),
            Datum::Hash(hash) => self.datums.get(hash).map(Vec::as_slice),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Payment part of the address, absent for Byron and reward addresses
    pub payment: Option<Credential>,
    pub value: Value,
    pub datum: Option<Datum>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Hash(DatumHash),
    Inline(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemerTag {
    Spend,
    Mint,
    Cert,
    Reward,
    Vote,
    Propose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    /// CBOR encoded Plutus data
    pub data: Vec<u8>,
}

/// Multi-asset output value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub lovelace: u64,
    pub assets: BTreeMap<PolicyId, BTreeMap<Vec<u8>, u64>>,
}

impl Value {
    pub fn new(lovelace: u64) -> Self {
        Self {
            lovelace,
            assets: BTreeMap::new(),
        }
    }

    pub fn with_asset(mut self, policy: PolicyId, name: &[u8], quantity: u64) -> Self {
        self.assets.entry(policy).or_default().insert(name.to_vec(), quantity);
        self
    }

    pub fn has_policy(&self, policy: &PolicyId) -> bool {
        self.assets.get(policy).is_some_and(|names| !names.is_empty())
    }

    /// Non-lovelace assets as a bundle, keeping those `keep` accepts
    pub fn bundle_where(&self, keep: impl Fn(&PolicyId, &[u8]) -> bool) -> AssetBundle {
        self.assets
            .iter()
            .flat_map(|(policy, names)| {
                names.iter().map(move |(name, quantity)| (policy, name, *quantity))
            })
            .filter(|(policy, name, _)| keep(policy, name))
            .map(|(policy, name, quantity)| (unit(policy, name), quantity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;

    #[test]
    fn should_resolve_inline_and_witnessed_datums() {
        let witnessed: DatumHash = Hash::new([0xd1; 32]);
        let mut tx = Transaction::default();
        tx.datums.insert(witnessed, vec![0xd8, 0x79, 0x80]);

        let inline = TxOutput {
            payment: None,
            value: Value::default(),
            datum: Some(Datum::Inline(vec![0x01])),
        };
        let by_hash = TxOutput {
            datum: Some(Datum::Hash(witnessed)),
            ..inline.clone()
        };
        let missing = TxOutput {
            datum: Some(Datum::Hash(Hash::new([0xd2; 32]))),
            ..inline.clone()
        };

        assert_eq!(tx.datum_of(&inline), Some([0x01].as_slice()));
        assert_eq!(tx.datum_of(&by_hash), Some([0xd8, 0x79, 0x80].as_slice()));
        assert_eq!(tx.datum_of(&missing), None);
    }
}

//! Hand-built transactions against a test deployment of the contract

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nebula_codec::{
    encode_datum, BidOption, BiddingDetails, ListingDetails, PaymentDatum, PlutusAddress,
    PlutusValue, TradeAction, TradeDatum, TraitConstraint,
};
use nebula_common::{
    asset::{cip67_label, unit},
    credential::vkey_hash,
    Block, ChainPoint, Credential, Datum, EventHandler, Hash, MarketplaceEvent, OutputReference,
    PolicyId, Redeemer, RedeemerTag, ScriptHash, Slot, Transaction, TxOutput, Unit, Value,
};

use crate::configuration::MarketplaceConfig;

pub const SCRIPT: ScriptHash = Hash::new([0x5c; 28]);
pub const BID_POLICY: PolicyId = Hash::new([0xb1; 28]);
pub const PROJECT: PolicyId = Hash::new([0xaa; 28]);
pub const OTHER_PROJECT: PolicyId = Hash::new([0xab; 28]);
pub const FOREIGN: PolicyId = Hash::new([0xee; 28]);

pub fn config() -> MarketplaceConfig {
    MarketplaceConfig {
        script_hash: SCRIPT,
        bid_policy_id: BID_POLICY,
        projects: vec![PROJECT, OTHER_PROJECT],
        start_point: None,
    }
}

pub fn point(byte: u8, slot: Slot) -> ChainPoint {
    ChainPoint::new(Hash::new([byte; 32]), slot)
}

pub fn nft(policy: &PolicyId, name: &str) -> Unit {
    unit(policy, name.as_bytes())
}

pub fn script_owner_marker() -> Vec<u8> {
    [cip67_label(2).as_slice(), b"ScriptOwner"].concat()
}

pub fn address(byte: u8) -> PlutusAddress {
    PlutusAddress {
        payment: Credential::VerificationKey(Hash::new([byte; 28])),
        stake: None,
    }
}

pub fn owner(byte: u8) -> String {
    address(byte).payment.to_bech32().unwrap()
}

/// Owner string derived from a signing key as the single-signer rule does
pub fn signer(vkey: &[u8]) -> String {
    Credential::VerificationKey(vkey_hash(vkey)).to_bech32().unwrap()
}

pub fn listing_datum(owner: u8, lovelace: u64, private_buyer: Option<u8>) -> Vec<u8> {
    encode_datum(&TradeDatum::Listing(ListingDetails {
        owner: address(owner),
        requested_lovelace: lovelace,
        private_listing: private_buyer.map(address),
    }))
    .unwrap()
}

pub fn specific_bid_datum(owner: u8, requested: &[(PolicyId, &str)]) -> Vec<u8> {
    let mut value = BTreeMap::<Vec<u8>, BTreeMap<Vec<u8>, i128>>::new();
    value.entry(Vec::new()).or_default().insert(Vec::new(), 20_000_000);
    for (policy, name) in requested {
        value.entry(policy.to_vec()).or_default().insert(name.as_bytes().to_vec(), 1);
    }
    encode_datum(&TradeDatum::Bid(BiddingDetails {
        owner: address(owner),
        requested_option: BidOption::SpecificValue(PlutusValue(value)),
    }))
    .unwrap()
}

pub fn open_bid_datum(owner: u8, policy: PolicyId, types: &[&str], traits: &[(&str, bool)]) -> Vec<u8> {
    encode_datum(&TradeDatum::Bid(BiddingDetails {
        owner: address(owner),
        requested_option: BidOption::SpecificPolicyWithConstraints {
            policy_id: policy,
            types: types.iter().map(|t| t.as_bytes().to_vec()).collect(),
            traits: traits
                .iter()
                .map(|(name, excluded)| match excluded {
                    false => TraitConstraint::Included(name.as_bytes().to_vec()),
                    true => TraitConstraint::Excluded(name.as_bytes().to_vec()),
                })
                .collect(),
        },
    }))
    .unwrap()
}

pub fn payment_datum(out_ref: OutputReference) -> Vec<u8> {
    encode_datum(&PaymentDatum { out_ref }).unwrap()
}

pub fn script_output(value: Value, datum: Vec<u8>) -> TxOutput {
    TxOutput {
        payment: Some(Credential::Script(SCRIPT)),
        value,
        datum: Some(Datum::Inline(datum)),
    }
}

pub fn wallet_output(value: Value, datum: Option<Vec<u8>>) -> TxOutput {
    TxOutput {
        payment: Some(Credential::VerificationKey(Hash::new([0x77; 28]))),
        value,
        datum: datum.map(Datum::Inline),
    }
}

pub fn spend(index: u32, action: TradeAction) -> Redeemer {
    Redeemer {
        tag: RedeemerTag::Spend,
        index,
        data: encode_datum(&action).unwrap(),
    }
}

pub struct TxBuilder {
    tx: Transaction,
}

impl TxBuilder {
    pub fn new(byte: u8) -> Self {
        Self {
            tx: Transaction {
                hash: Hash::new([byte; 32]),
                ..Default::default()
            },
        }
    }

    pub fn input(mut self, out_ref: OutputReference) -> Self {
        self.tx.inputs.push(out_ref);
        self.tx.inputs.sort();
        self
    }

    pub fn output(mut self, output: TxOutput) -> Self {
        self.tx.outputs.push(output);
        self
    }

    pub fn redeemer(mut self, redeemer: Redeemer) -> Self {
        self.tx.redeemers.push(redeemer);
        self
    }

    pub fn signed_by(mut self, vkey: &[u8]) -> Self {
        self.tx.signatories.push(vkey.to_vec());
        self
    }

    pub fn witness(mut self, hash: Hash<32>, datum: Vec<u8>) -> Self {
        self.tx.datums.insert(hash, datum);
        self
    }

    pub fn build(self) -> Transaction {
        self.tx
    }
}

pub fn block(byte: u8, slot: Slot, number: u64, transactions: Vec<Transaction>) -> Block {
    Block {
        point: point(byte, slot),
        number,
        transactions,
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    pub batches: Mutex<Vec<Vec<MarketplaceEvent>>>,
    pub changes: Mutex<usize>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delivered(&self) -> Vec<MarketplaceEvent> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle_events(&self, events: &[MarketplaceEvent]) -> anyhow::Result<()> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }

    async fn on_change(&self) {
        *self.changes.lock().unwrap() += 1;
    }
}

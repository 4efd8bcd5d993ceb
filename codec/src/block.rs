//! Maps raw pallas blocks into the watcher's chain view

use anyhow::Result;
use blake2::{digest::consts::U32, Blake2b, Digest};
use nebula_common::{
    Block, BlockHash, ChainPoint, Credential, Datum, DatumHash, Hash, OutputReference, Redeemer,
    RedeemerTag, Transaction, TxHash, TxOutput, Value,
};
use pallas::ledger::addresses::{Address as PallasAddress, ShelleyPaymentPart};
use pallas_primitives::conway;
use pallas_traverse::{MultiEraBlock, MultiEraOutput, MultiEraPolicyAssets, MultiEraTx};
use std::collections::BTreeMap;
use tracing::warn;

fn blake2b_256(bytes: &[u8]) -> Hash<32> {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(bytes);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Hash::new(digest)
}

/// Decodes a block body and keeps the transactions that passed phase-2
/// validation
pub fn map_block(raw: &[u8]) -> Result<Block> {
    let block = MultiEraBlock::decode(raw)?;
    let point = ChainPoint::new(BlockHash::from(*block.hash()), block.slot());
    let transactions = block
        .txs()
        .iter()
        .filter(|tx| tx.is_valid())
        .map(map_transaction)
        .collect();

    Ok(Block {
        point,
        number: block.number(),
        transactions,
    })
}

pub fn map_transaction(tx: &MultiEraTx) -> Transaction {
    let hash = TxHash::from(*tx.hash());

    let inputs = tx
        .inputs_sorted_set()
        .iter()
        .map(|input| {
            let oref = input.output_ref();
            OutputReference::new(TxHash::from(**oref.hash()), oref.index() as u32)
        })
        .collect();

    let outputs = tx.outputs().iter().map(map_output).collect();

    let datums = tx
        .plutus_data()
        .iter()
        .map(|datum| {
            let raw = datum.raw_cbor();
            (blake2b_256(raw), raw.to_vec())
        })
        .collect::<BTreeMap<DatumHash, Vec<u8>>>();

    let redeemers = tx
        .redeemers()
        .iter()
        .filter_map(|redeemer| {
            match pallas::codec::minicbor::to_vec(redeemer.data()) {
                Ok(data) => Some(Redeemer {
                    tag: map_redeemer_tag(&redeemer.tag()),
                    index: redeemer.index(),
                    data,
                }),
                Err(e) => {
                    warn!("Redeemer {} of tx {hash} has been ignored: {e}", redeemer.index());
                    None
                }
            }
        })
        .collect();

    let signatories = tx.vkey_witnesses().iter().map(|witness| witness.vkey.to_vec()).collect();

    Transaction {
        hash,
        inputs,
        outputs,
        datums,
        redeemers,
        signatories,
    }
}

fn map_redeemer_tag(tag: &conway::RedeemerTag) -> RedeemerTag {
    match tag {
        conway::RedeemerTag::Spend => RedeemerTag::Spend,
        conway::RedeemerTag::Mint => RedeemerTag::Mint,
        conway::RedeemerTag::Cert => RedeemerTag::Cert,
        conway::RedeemerTag::Reward => RedeemerTag::Reward,
        conway::RedeemerTag::Vote => RedeemerTag::Vote,
        conway::RedeemerTag::Propose => RedeemerTag::Propose,
    }
}

fn map_output(output: &MultiEraOutput) -> TxOutput {
    let payment = match output.address() {
        Ok(PallasAddress::Shelley(shelley)) => match shelley.payment() {
            ShelleyPaymentPart::Key(hash) => Some(Credential::VerificationKey(Hash::new(**hash))),
            ShelleyPaymentPart::Script(hash) => Some(Credential::Script(Hash::new(**hash))),
        },
        _ => None,
    };

    let datum = match output.datum() {
        Some(conway::MintedDatumOption::Hash(hash)) => Some(Datum::Hash(Hash::new(*hash))),
        Some(conway::MintedDatumOption::Data(data)) => {
            Some(Datum::Inline(data.raw_cbor().to_vec()))
        }
        None => None,
    };

    TxOutput {
        payment,
        value: map_value(output),
        datum,
    }
}

fn map_value(output: &MultiEraOutput) -> Value {
    let pallas_value = output.value();
    let mut value = Value::new(pallas_value.coin());

    for policy_group in pallas_value.assets() {
        let (policy, assets): (&pallas_primitives::Hash<28>, Vec<(Vec<u8>, u64)>) =
            match policy_group {
                MultiEraPolicyAssets::AlonzoCompatibleOutput(policy, kvps) => (
                    policy,
                    kvps.iter().map(|(name, amt)| (name.to_vec(), *amt)).collect(),
                ),
                MultiEraPolicyAssets::ConwayOutput(policy, kvps) => (
                    policy,
                    kvps.iter().map(|(name, amt)| (name.to_vec(), u64::from(*amt))).collect(),
                ),
                _ => continue,
            };
        let policy_id = Hash::new(**policy);
        for (name, quantity) in assets {
            value = value.with_asset(policy_id, &name, quantity);
        }
    }

    value
}

//! Typed view of the marketplace contract's datums and redeemers, read from
//! and written to pallas' Plutus data model

use nebula_common::{Credential, Hash, OutputReference, PolicyId, TxHash};
use pallas::codec::minicbor;
use pallas_primitives::{BigInt, BoundedBytes, Constr, Int, MaybeIndefArray, PlutusData};
use std::collections::BTreeMap;
use std::convert::Infallible;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed cbor: {0}")]
    Cbor(#[from] minicbor::decode::Error),

    #[error("expected {expected}")]
    Shape { expected: &'static str },

    #[error("unknown constructor {tag} for {ty}")]
    Constructor { ty: &'static str, tag: u64 },

    #[error("{ty} expects {expected} fields, found {found}")]
    Arity {
        ty: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{what} must be {expected} bytes, found {found}")]
    Length {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("integer {0} out of range")]
    OutOfRange(i128),

    #[error("pointer stake credentials are not supported")]
    UnsupportedPointer,
}

pub type EncodeError = minicbor::encode::Error<Infallible>;

pub trait FromPlutusData: Sized {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError>;
}

pub trait ToPlutusData {
    fn to_plutus_data(&self) -> PlutusData;
}

/// Decodes raw datum or redeemer bytes into a marketplace value
pub fn decode_datum<T: FromPlutusData>(bytes: &[u8]) -> Result<T, DecodeError> {
    let data: PlutusData = minicbor::decode(bytes)?;
    T::from_plutus_data(&data)
}

pub fn encode_datum<T: ToPlutusData>(value: &T) -> Result<Vec<u8>, EncodeError> {
    minicbor::to_vec(value.to_plutus_data())
}

/// Non-empty field lists are indefinite, as the Plutus serialiser writes them
fn array<A>(items: Vec<A>) -> MaybeIndefArray<A> {
    if items.is_empty() {
        MaybeIndefArray::Def(items)
    } else {
        MaybeIndefArray::Indef(items)
    }
}

fn constr_data(index: u64, fields: Vec<PlutusData>) -> PlutusData {
    let (tag, any_constructor) = match index {
        0..=6 => (121 + index, None),
        7..=127 => (1280 + index - 7, None),
        _ => (102, Some(index)),
    };
    PlutusData::Constr(Constr {
        tag,
        any_constructor,
        fields: array(fields),
    })
}

fn bytes_data(bytes: Vec<u8>) -> PlutusData {
    PlutusData::BoundedBytes(BoundedBytes::from(bytes))
}

fn list_data(items: Vec<PlutusData>) -> PlutusData {
    PlutusData::Array(array(items))
}

fn map_data(entries: Vec<(PlutusData, PlutusData)>) -> PlutusData {
    PlutusData::Map(entries.into())
}

fn int_data(value: i128) -> PlutusData {
    let big = match Int::try_from(value) {
        Ok(int) => BigInt::Int(int),
        Err(_) if value >= 0 => BigInt::BigUInt(magnitude(value as u128)),
        Err(_) => BigInt::BigNInt(magnitude((-1 - value) as u128)),
    };
    PlutusData::BigInt(big)
}

fn magnitude(value: u128) -> BoundedBytes {
    let bytes = value.to_be_bytes();
    let leading = bytes.iter().take_while(|b| **b == 0).count();
    BoundedBytes::from(bytes[leading..].to_vec())
}

fn constr<'a>(
    data: &'a PlutusData,
    ty: &'static str,
) -> Result<(u64, &'a [PlutusData]), DecodeError> {
    let PlutusData::Constr(c) = data else {
        return Err(DecodeError::Shape { expected: ty });
    };
    let index = match (c.tag, c.any_constructor) {
        (121..=127, _) => c.tag - 121,
        (1280..=1400, _) => c.tag - 1280 + 7,
        (102, Some(index)) => index,
        (tag, _) => return Err(DecodeError::Constructor { ty, tag }),
    };
    Ok((index, c.fields.as_slice()))
}

fn fields<'a, const N: usize>(
    fields: &'a [PlutusData],
    ty: &'static str,
) -> Result<&'a [PlutusData; N], DecodeError> {
    fields.try_into().map_err(|_| DecodeError::Arity {
        ty,
        expected: N,
        found: fields.len(),
    })
}

fn bytes<'a>(data: &'a PlutusData, what: &'static str) -> Result<&'a [u8], DecodeError> {
    match data {
        PlutusData::BoundedBytes(bytes) => Ok(bytes.as_slice()),
        _ => Err(DecodeError::Shape { expected: what }),
    }
}

fn hash<const N: usize>(data: &PlutusData, what: &'static str) -> Result<Hash<N>, DecodeError> {
    let raw = bytes(data, what)?;
    Hash::try_from(raw).map_err(|_| DecodeError::Length {
        what,
        expected: N,
        found: raw.len(),
    })
}

/// Big-endian bignum magnitude that fits 127 bits
fn bignum(bytes: &[u8]) -> Option<i128> {
    if bytes.len() > 16 {
        return None;
    }
    let value = bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
    i128::try_from(value).ok()
}

fn integer(data: &PlutusData, what: &'static str) -> Result<i128, DecodeError> {
    let value = match data {
        PlutusData::BigInt(BigInt::Int(int)) => Some(i128::from(*int)),
        PlutusData::BigInt(BigInt::BigUInt(bytes)) => bignum(bytes),
        PlutusData::BigInt(BigInt::BigNInt(bytes)) => bignum(bytes).map(|n| -1 - n),
        _ => None,
    };
    value.ok_or(DecodeError::Shape { expected: what })
}

fn natural<T: TryFrom<i128>>(data: &PlutusData, what: &'static str) -> Result<T, DecodeError> {
    let value = integer(data, what)?;
    T::try_from(value).map_err(|_| DecodeError::OutOfRange(value))
}

fn list<'a>(data: &'a PlutusData, what: &'static str) -> Result<&'a [PlutusData], DecodeError> {
    match data {
        PlutusData::Array(items) => Ok(items.as_slice()),
        _ => Err(DecodeError::Shape { expected: what }),
    }
}

/// `Some(x)` is constructor 0 with one field, `None` is constructor 1
fn nullable<T>(
    data: &PlutusData,
    decode: impl FnOnce(&PlutusData) -> Result<T, DecodeError>,
) -> Result<Option<T>, DecodeError> {
    match constr(data, "nullable")? {
        (0, inner) => Ok(Some(decode(&fields::<1>(inner, "nullable")?[0])?)),
        (1, []) => Ok(None),
        (1, inner) => Err(DecodeError::Arity {
            ty: "nullable",
            expected: 0,
            found: inner.len(),
        }),
        (tag, _) => Err(DecodeError::Constructor {
            ty: "nullable",
            tag,
        }),
    }
}

fn to_nullable<T: ToPlutusData>(value: Option<&T>) -> PlutusData {
    match value {
        Some(inner) => constr_data(0, vec![inner.to_plutus_data()]),
        None => constr_data(1, vec![]),
    }
}

impl FromPlutusData for Credential {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        match constr(data, "credential")? {
            (0, inner) => Ok(Credential::VerificationKey(hash(
                &fields::<1>(inner, "credential")?[0],
                "key hash",
            )?)),
            (1, inner) => Ok(Credential::Script(hash(
                &fields::<1>(inner, "credential")?[0],
                "script hash",
            )?)),
            (tag, _) => Err(DecodeError::Constructor {
                ty: "credential",
                tag,
            }),
        }
    }
}

impl ToPlutusData for Credential {
    fn to_plutus_data(&self) -> PlutusData {
        let tag = match self {
            Credential::VerificationKey(_) => 0,
            Credential::Script(_) => 1,
        };
        constr_data(tag, vec![bytes_data(self.hash().to_vec())])
    }
}

/// On-chain address: payment credential plus an optional inline stake
/// credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlutusAddress {
    pub payment: Credential,
    pub stake: Option<Credential>,
}

fn stake_credential(data: &PlutusData) -> Result<Credential, DecodeError> {
    match constr(data, "stake credential")? {
        (0, inner) => Credential::from_plutus_data(&fields::<1>(inner, "stake credential")?[0]),
        (1, _) => Err(DecodeError::UnsupportedPointer),
        (tag, _) => Err(DecodeError::Constructor {
            ty: "stake credential",
            tag,
        }),
    }
}

struct InlineStake<'a>(&'a Credential);

impl ToPlutusData for InlineStake<'_> {
    fn to_plutus_data(&self) -> PlutusData {
        constr_data(0, vec![self.0.to_plutus_data()])
    }
}

impl FromPlutusData for PlutusAddress {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        match constr(data, "address")? {
            (0, inner) => {
                let [payment, stake] = fields::<2>(inner, "address")?;
                Ok(PlutusAddress {
                    payment: Credential::from_plutus_data(payment)?,
                    stake: nullable(stake, stake_credential)?,
                })
            }
            (tag, _) => Err(DecodeError::Constructor { ty: "address", tag }),
        }
    }
}

impl ToPlutusData for PlutusAddress {
    fn to_plutus_data(&self) -> PlutusData {
        let stake = self.stake.as_ref().map(InlineStake);
        constr_data(
            0,
            vec![self.payment.to_plutus_data(), to_nullable(stake.as_ref())],
        )
    }
}

/// `policy -> asset name -> quantity`; the empty policy stands for lovelace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlutusValue(pub BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, i128>>);

impl FromPlutusData for PlutusValue {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let PlutusData::Map(policies) = data else {
            return Err(DecodeError::Shape { expected: "value" });
        };
        let mut value = BTreeMap::new();
        for (policy, names) in policies.iter() {
            let policy = bytes(policy, "policy id")?;
            if !policy.is_empty() && policy.len() != 28 {
                return Err(DecodeError::Length {
                    what: "policy id",
                    expected: 28,
                    found: policy.len(),
                });
            }
            let PlutusData::Map(names) = names else {
                return Err(DecodeError::Shape {
                    expected: "asset map",
                });
            };
            let mut assets = BTreeMap::new();
            for (name, quantity) in names.iter() {
                assets.insert(
                    bytes(name, "asset name")?.to_vec(),
                    integer(quantity, "quantity")?,
                );
            }
            value.insert(policy.to_vec(), assets);
        }
        Ok(PlutusValue(value))
    }
}

impl ToPlutusData for PlutusValue {
    fn to_plutus_data(&self) -> PlutusData {
        map_data(
            self.0
                .iter()
                .map(|(policy, names)| {
                    let names = names
                        .iter()
                        .map(|(name, quantity)| {
                            (bytes_data(name.clone()), int_data(*quantity))
                        })
                        .collect();
                    (bytes_data(policy.clone()), map_data(names))
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitConstraint {
    Included(Vec<u8>),
    Excluded(Vec<u8>),
}

impl FromPlutusData for TraitConstraint {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        match constr(data, "trait constraint")? {
            (0, inner) => Ok(TraitConstraint::Included(
                bytes(&fields::<1>(inner, "trait constraint")?[0], "trait")?.to_vec(),
            )),
            (1, inner) => Ok(TraitConstraint::Excluded(
                bytes(&fields::<1>(inner, "trait constraint")?[0], "trait")?.to_vec(),
            )),
            (tag, _) => Err(DecodeError::Constructor {
                ty: "trait constraint",
                tag,
            }),
        }
    }
}

impl ToPlutusData for TraitConstraint {
    fn to_plutus_data(&self) -> PlutusData {
        match self {
            TraitConstraint::Included(name) => {
                constr_data(0, vec![bytes_data(name.clone())])
            }
            TraitConstraint::Excluded(name) => {
                constr_data(1, vec![bytes_data(name.clone())])
            }
        }
    }
}

/// What a bid asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidOption {
    SpecificValue(PlutusValue),
    SpecificPolicyWithConstraints {
        policy_id: PolicyId,
        types: Vec<Vec<u8>>,
        traits: Vec<TraitConstraint>,
    },
}

impl FromPlutusData for BidOption {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        match constr(data, "bid option")? {
            (0, inner) => Ok(BidOption::SpecificValue(PlutusValue::from_plutus_data(
                &fields::<1>(inner, "bid option")?[0],
            )?)),
            (1, inner) => {
                let [policy_id, types, traits] = fields::<3>(inner, "bid option")?;
                Ok(BidOption::SpecificPolicyWithConstraints {
                    policy_id: hash(policy_id, "policy id")?,
                    types: list(types, "types")?
                        .iter()
                        .map(|t| bytes(t, "type").map(<[u8]>::to_vec))
                        .collect::<Result<_, _>>()?,
                    traits: list(traits, "traits")?
                        .iter()
                        .map(TraitConstraint::from_plutus_data)
                        .collect::<Result<_, _>>()?,
                })
            }
            (tag, _) => Err(DecodeError::Constructor {
                ty: "bid option",
                tag,
            }),
        }
    }
}

impl ToPlutusData for BidOption {
    fn to_plutus_data(&self) -> PlutusData {
        match self {
            BidOption::SpecificValue(value) => constr_data(0, vec![value.to_plutus_data()]),
            BidOption::SpecificPolicyWithConstraints {
                policy_id,
                types,
                traits,
            } => constr_data(
                1,
                vec![
                    bytes_data(policy_id.to_vec()),
                    list_data(types.iter().cloned().map(bytes_data).collect()),
                    list_data(traits.iter().map(ToPlutusData::to_plutus_data).collect()),
                ],
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingDetails {
    pub owner: PlutusAddress,
    pub requested_lovelace: u64,
    pub private_listing: Option<PlutusAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiddingDetails {
    pub owner: PlutusAddress,
    pub requested_option: BidOption,
}

/// Datum locked at the marketplace script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeDatum {
    Listing(ListingDetails),
    Bid(BiddingDetails),
}

impl FromPlutusData for TradeDatum {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let (tag, inner) = constr(data, "trade datum")?;
        let [details] = fields::<1>(inner, "trade datum")?;
        match tag {
            0 => match constr(details, "listing details")? {
                (0, inner) => {
                    let [owner, lovelace, private_listing] =
                        fields::<3>(inner, "listing details")?;
                    Ok(TradeDatum::Listing(ListingDetails {
                        owner: PlutusAddress::from_plutus_data(owner)?,
                        requested_lovelace: natural(lovelace, "requested lovelace")?,
                        private_listing: nullable(
                            private_listing,
                            PlutusAddress::from_plutus_data,
                        )?,
                    }))
                }
                (tag, _) => Err(DecodeError::Constructor {
                    ty: "listing details",
                    tag,
                }),
            },
            1 => match constr(details, "bidding details")? {
                (0, inner) => {
                    let [owner, option] = fields::<2>(inner, "bidding details")?;
                    Ok(TradeDatum::Bid(BiddingDetails {
                        owner: PlutusAddress::from_plutus_data(owner)?,
                        requested_option: BidOption::from_plutus_data(option)?,
                    }))
                }
                (tag, _) => Err(DecodeError::Constructor {
                    ty: "bidding details",
                    tag,
                }),
            },
            tag => Err(DecodeError::Constructor {
                ty: "trade datum",
                tag,
            }),
        }
    }
}

impl ToPlutusData for TradeDatum {
    fn to_plutus_data(&self) -> PlutusData {
        match self {
            TradeDatum::Listing(details) => constr_data(
                0,
                vec![constr_data(
                    0,
                    vec![
                        details.owner.to_plutus_data(),
                        int_data(details.requested_lovelace.into()),
                        to_nullable(details.private_listing.as_ref()),
                    ],
                )],
            ),
            TradeDatum::Bid(details) => constr_data(
                1,
                vec![constr_data(
                    0,
                    vec![
                        details.owner.to_plutus_data(),
                        details.requested_option.to_plutus_data(),
                    ],
                )],
            ),
        }
    }
}

/// Redeemer of a spend from the marketplace script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Sell,
    Buy,
    Cancel,
}

impl FromPlutusData for TradeAction {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        let (tag, inner) = constr(data, "trade action")?;
        fields::<0>(inner, "trade action")?;
        match tag {
            0 => Ok(TradeAction::Sell),
            1 => Ok(TradeAction::Buy),
            2 => Ok(TradeAction::Cancel),
            tag => Err(DecodeError::Constructor {
                ty: "trade action",
                tag,
            }),
        }
    }
}

impl ToPlutusData for TradeAction {
    fn to_plutus_data(&self) -> PlutusData {
        let index = match self {
            TradeAction::Sell => 0,
            TradeAction::Buy => 1,
            TradeAction::Cancel => 2,
        };
        constr_data(index, vec![])
    }
}

impl FromPlutusData for OutputReference {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        match constr(data, "output reference")? {
            (0, inner) => {
                let [transaction_id, index] = fields::<2>(inner, "output reference")?;
                let transaction_hash: TxHash = match constr(transaction_id, "transaction id")? {
                    (0, inner) => hash(&fields::<1>(inner, "transaction id")?[0], "tx hash")?,
                    (tag, _) => {
                        return Err(DecodeError::Constructor {
                            ty: "transaction id",
                            tag,
                        })
                    }
                };
                Ok(OutputReference::new(
                    transaction_hash,
                    natural(index, "output index")?,
                ))
            }
            (tag, _) => Err(DecodeError::Constructor {
                ty: "output reference",
                tag,
            }),
        }
    }
}

impl ToPlutusData for OutputReference {
    fn to_plutus_data(&self) -> PlutusData {
        constr_data(
            0,
            vec![
                constr_data(0, vec![bytes_data(self.transaction_hash.to_vec())]),
                int_data(self.output_index.into()),
            ],
        )
    }
}

/// Datum on a payment output, tying it to the listing or bid it settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentDatum {
    pub out_ref: OutputReference,
}

impl FromPlutusData for PaymentDatum {
    fn from_plutus_data(data: &PlutusData) -> Result<Self, DecodeError> {
        match constr(data, "payment datum")? {
            (0, inner) => Ok(PaymentDatum {
                out_ref: OutputReference::from_plutus_data(&fields::<1>(inner, "payment datum")?[0])?,
            }),
            (tag, _) => Err(DecodeError::Constructor {
                ty: "payment datum",
                tag,
            }),
        }
    }
}

impl ToPlutusData for PaymentDatum {
    fn to_plutus_data(&self) -> PlutusData {
        constr_data(0, vec![self.out_ref.to_plutus_data()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(byte: u8) -> PlutusAddress {
        PlutusAddress {
            payment: Credential::VerificationKey(Hash::new([byte; 28])),
            stake: Some(Credential::VerificationKey(Hash::new([byte + 1; 28]))),
        }
    }

    #[test]
    fn should_round_trip_listing_datum() {
        let datum = TradeDatum::Listing(ListingDetails {
            owner: owner(1),
            requested_lovelace: 800_000_000,
            private_listing: Some(PlutusAddress {
                payment: Credential::Script(Hash::new([7; 28])),
                stake: None,
            }),
        });
        let decoded: TradeDatum = decode_datum(&encode_datum(&datum).unwrap()).unwrap();
        assert_eq!(decoded, datum);
    }

    #[test]
    fn should_round_trip_open_bid_datum() {
        let datum = TradeDatum::Bid(BiddingDetails {
            owner: owner(3),
            requested_option: BidOption::SpecificPolicyWithConstraints {
                policy_id: Hash::new([0xaa; 28]),
                types: vec![b"Cat".to_vec()],
                traits: vec![
                    TraitConstraint::Included(b"Axe".to_vec()),
                    TraitConstraint::Excluded(b"Hat".to_vec()),
                ],
            },
        });
        let decoded: TradeDatum = decode_datum(&encode_datum(&datum).unwrap()).unwrap();
        assert_eq!(decoded, datum);
    }

    #[test]
    fn should_round_trip_specific_bid_value() {
        let mut value = PlutusValue::default();
        value.0.entry(vec![0xaa; 28]).or_default().insert(b"Bud0".to_vec(), 1);
        value.0.entry(vec![]).or_default().insert(vec![], 5_000_000);
        let datum = TradeDatum::Bid(BiddingDetails {
            owner: owner(5),
            requested_option: BidOption::SpecificValue(value),
        });
        let decoded: TradeDatum = decode_datum(&encode_datum(&datum).unwrap()).unwrap();
        assert_eq!(decoded, datum);
    }

    #[test]
    fn should_decode_trade_actions() {
        for action in [TradeAction::Sell, TradeAction::Buy, TradeAction::Cancel] {
            assert_eq!(decode_datum::<TradeAction>(&encode_datum(&action).unwrap()).unwrap(), action);
        }
        let unknown = encode_datum(&StubData(constr_data(3, vec![]))).unwrap();
        assert!(matches!(
            decode_datum::<TradeAction>(&unknown),
            Err(DecodeError::Constructor { tag: 3, .. })
        ));
    }

    #[test]
    fn should_reject_pointer_stake_credential() {
        let pointer = constr_data(
            0,
            vec![
                Credential::VerificationKey(Hash::new([1; 28])).to_plutus_data(),
                constr_data(
                    0,
                    vec![constr_data(
                        1,
                        vec![
                            int_data(1),
                            int_data(2),
                            int_data(3),
                        ],
                    )],
                ),
            ],
        );
        assert!(matches!(
            PlutusAddress::from_plutus_data(&pointer),
            Err(DecodeError::UnsupportedPointer)
        ));
    }

    #[test]
    fn should_reject_wrong_arity() {
        let listing = constr_data(
            0,
            vec![constr_data(0, vec![owner(1).to_plutus_data()])],
        );
        assert!(matches!(
            TradeDatum::from_plutus_data(&listing),
            Err(DecodeError::Arity { expected: 3, found: 1, .. })
        ));
    }

    #[test]
    fn should_compare_payment_datum_structurally() {
        let out_ref = OutputReference::new(Hash::new([4; 32]), 1);
        let datum = PaymentDatum { out_ref };
        let decoded: PaymentDatum = decode_datum(&encode_datum(&datum).unwrap()).unwrap();
        assert_eq!(decoded.out_ref, out_ref);
    }

    #[test]
    fn should_match_ledger_bytes_for_actions() {
        assert_eq!(hex::encode(encode_datum(&TradeAction::Sell).unwrap()), "d87980");
        let cancel = hex::decode("d87b80").unwrap();
        assert_eq!(decode_datum::<TradeAction>(&cancel).unwrap(), TradeAction::Cancel);
    }

    #[test]
    fn should_map_constructor_indexes_to_tags() {
        for (index, tag) in [(0, 121), (6, 127), (7, 1280), (127, 1400), (128, 102)] {
            let data = constr_data(index, vec![]);
            let PlutusData::Constr(c) = &data else {
                panic!("expected a constructor");
            };
            assert_eq!(c.tag, tag);
            assert_eq!(constr(&data, "test").unwrap().0, index);
        }
    }

    #[test]
    fn should_round_trip_integers_beyond_64_bits() {
        for value in [0, -1, i128::from(u64::MAX), i128::from(u64::MAX) * 4, -(1i128 << 100)] {
            let raw = minicbor::to_vec(int_data(value)).unwrap();
            let data: PlutusData = minicbor::decode(&raw).unwrap();
            assert_eq!(integer(&data, "test").unwrap(), value);
        }
    }

    struct StubData(PlutusData);

    impl ToPlutusData for StubData {
        fn to_plutus_data(&self) -> PlutusData {
            self.0.clone()
        }
    }
}

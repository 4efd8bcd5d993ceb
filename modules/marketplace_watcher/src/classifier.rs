//! Turns transactions touching the marketplace script into projection records

use nebula_codec::{
    decode_datum, BidOption, DecodeError, PaymentDatum, PlutusAddress, PlutusValue, TradeAction,
    TradeDatum, TraitConstraint,
};
use nebula_common::{
    asset::is_script_owner_marker, credential::single_signer, AssetBundle, Bid, BidConstraints,
    BidKind, Cancellation, CancellationKind, ChainPoint, Listing, ListingKind,
    MarketplaceRecord, OutputReference, PolicyId, Redeemer, RedeemerTag, Sale, SaleKind, Spend,
    TraitRule, Transaction, TxOutput,
};
use nebula_module_projection_store::{MarketplaceDb, Store, StoreError};
use thiserror::Error;
use tracing::trace;

use crate::configuration::MarketplaceConfig;

/// Output or redeemer that passed the marketplace filters but could not be
/// interpreted
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("datum of {0} is not in the witness set")]
    MissingDatum(OutputReference),

    #[error("cannot decode datum of {out_ref}: {source}")]
    Datum {
        out_ref: OutputReference,
        source: DecodeError,
    },

    #[error("datum of {out_ref} is not a {expected}")]
    UnexpectedVariant {
        out_ref: OutputReference,
        expected: &'static str,
    },

    #[error("redeemer {0} does not point at an input")]
    UnresolvedInput(u32),

    #[error("cannot render owner: {0}")]
    Owner(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Lookup of listings and bids that are still open
pub trait OpenOrders {
    fn open_listing(&self, out_ref: &OutputReference) -> Result<Option<Listing>, StoreError>;
    fn open_bid(&self, out_ref: &OutputReference) -> Result<Option<Bid>, StoreError>;
}

impl<S: Store> OpenOrders for MarketplaceDb<S> {
    fn open_listing(&self, out_ref: &OutputReference) -> Result<Option<Listing>, StoreError> {
        self.get_listing(out_ref)
    }

    fn open_bid(&self, out_ref: &OutputReference) -> Result<Option<Bid>, StoreError> {
        self.get_bid(out_ref)
    }
}

pub struct Classifier {
    config: MarketplaceConfig,
}

impl Classifier {
    pub fn new(config: MarketplaceConfig) -> Self {
        Self { config }
    }

    fn at_script(&self, output: &TxOutput) -> bool {
        output.payment.as_ref().is_some_and(|c| *c.hash() == self.config.script_hash)
    }

    fn watched(&self, bundle: &AssetBundle) -> bool {
        bundle.all_under(&self.config.projects)
    }

    /// New listing or bid created by output `index` of `tx`
    pub fn classify_output(
        &self,
        tx: &Transaction,
        index: usize,
        point: &ChainPoint,
    ) -> Result<Option<MarketplaceRecord>, ClassifyError> {
        let Some(output) = tx.outputs.get(index) else {
            return Ok(None);
        };
        if output.datum.is_none() || !self.at_script(output) {
            return Ok(None);
        }
        let out_ref = OutputReference::new(tx.hash, index as u32);

        if output.value.has_policy(&self.config.bid_policy_id) {
            let TradeDatum::Bid(details) = trade_datum(tx, output, out_ref)? else {
                return Err(ClassifyError::UnexpectedVariant {
                    out_ref,
                    expected: "bid",
                });
            };
            return self.classify_bid(output, out_ref, point, details);
        }

        if self.config.projects.iter().any(|p| output.value.has_policy(p)) {
            let TradeDatum::Listing(details) = trade_datum(tx, output, out_ref)? else {
                return Err(ClassifyError::UnexpectedVariant {
                    out_ref,
                    expected: "listing",
                });
            };

            let assets = output.value.bundle_where(|_, name| !is_script_owner_marker(name));
            if !self.watched(&assets) {
                trace!(%out_ref, "Listing holds foreign assets");
                return Ok(None);
            }
            let kind = if assets.len() > 1 {
                ListingKind::Bundle
            } else {
                ListingKind::Single
            };
            let private_buyer = details.private_listing.as_ref().map(owner_of).transpose()?;

            return Ok(Some(MarketplaceRecord::NewListing(Listing {
                out_ref,
                point: *point,
                kind,
                assets,
                owner: owner_of(&details.owner)?,
                price_lovelace: details.requested_lovelace,
                private_buyer,
                spent_point: None,
            })));
        }

        Ok(None)
    }

    fn classify_bid(
        &self,
        output: &TxOutput,
        out_ref: OutputReference,
        point: &ChainPoint,
        details: nebula_codec::BiddingDetails,
    ) -> Result<Option<MarketplaceRecord>, ClassifyError> {
        let bid_policy = self.config.bid_policy_id;
        let offered = output.value.bundle_where(|policy, _| *policy != bid_policy);
        if !self.watched(&offered) {
            trace!(%out_ref, "Bid offers foreign assets");
            return Ok(None);
        }
        let offered_assets = (!offered.is_empty()).then_some(offered);

        let mut bid = Bid {
            out_ref,
            point: *point,
            kind: BidKind::Single,
            requested_assets: None,
            requested_policy_id: None,
            constraints: None,
            owner: owner_of(&details.owner)?,
            price_lovelace: output.value.lovelace,
            offered_assets,
            spent_point: None,
        };

        match details.requested_option {
            BidOption::SpecificValue(value) => {
                let requested = requested_assets(&value)
                    .map_err(|source| ClassifyError::Datum { out_ref, source })?;
                if !self.watched(&requested) {
                    trace!(%out_ref, "Bid requests foreign assets");
                    return Ok(None);
                }
                bid.kind = if bid.offered_assets.is_some() {
                    BidKind::Swap
                } else if requested.len() > 1 {
                    BidKind::Bundle
                } else {
                    BidKind::Single
                };
                bid.requested_assets = Some(requested);
            }
            BidOption::SpecificPolicyWithConstraints {
                policy_id,
                types,
                traits,
            } => {
                if !self.config.projects.contains(&policy_id) {
                    trace!(%out_ref, "Open bid on a foreign collection");
                    return Ok(None);
                }
                bid.kind = BidKind::Open;
                bid.requested_policy_id = Some(policy_id);
                bid.constraints = Some(constraints(&types, &traits));
            }
        }

        Ok(Some(MarketplaceRecord::NewBid(bid)))
    }

    /// Sale or cancellation performed by a spend redeemer of `tx`
    pub fn classify_redeemer(
        &self,
        tx: &Transaction,
        redeemer: &Redeemer,
        point: &ChainPoint,
        orders: &impl OpenOrders,
    ) -> Result<Option<MarketplaceRecord>, ClassifyError> {
        if redeemer.tag != RedeemerTag::Spend {
            return Ok(None);
        }
        let out_ref = *tx
            .inputs
            .get(redeemer.index as usize)
            .ok_or(ClassifyError::UnresolvedInput(redeemer.index))?;

        // Other validators and reference script spends share the redeemer set
        let Ok(action) = decode_datum::<TradeAction>(&redeemer.data) else {
            return Ok(None);
        };

        let record = match action {
            TradeAction::Sell => orders.open_bid(&out_ref)?.map(|bid| sell(tx, point, out_ref, bid)),
            TradeAction::Buy => orders.open_listing(&out_ref)?.map(|listing| buy(tx, point, listing)),
            TradeAction::Cancel => match orders.open_listing(&out_ref)? {
                Some(listing) => Some(cancel_listing(tx, point, listing)),
                None => orders.open_bid(&out_ref)?.map(|bid| cancel_bid(tx, point, bid)),
            },
        };
        Ok(record)
    }
}

fn trade_datum(
    tx: &Transaction,
    output: &TxOutput,
    out_ref: OutputReference,
) -> Result<TradeDatum, ClassifyError> {
    let raw = tx.datum_of(output).ok_or(ClassifyError::MissingDatum(out_ref))?;
    decode_datum(raw).map_err(|source| ClassifyError::Datum { out_ref, source })
}

fn owner_of(address: &PlutusAddress) -> Result<String, ClassifyError> {
    address.payment.to_bech32().map_err(|e| ClassifyError::Owner(e.to_string()))
}

/// Non-lovelace part of a requested value
fn requested_assets(value: &PlutusValue) -> Result<AssetBundle, DecodeError> {
    let mut bundle = AssetBundle::new();
    for (policy, names) in value.0.iter().filter(|(policy, _)| !policy.is_empty()) {
        for (name, quantity) in names {
            let quantity = u64::try_from(*quantity).map_err(|_| DecodeError::OutOfRange(*quantity))?;
            bundle.insert(format!("{}{}", hex::encode(policy), hex::encode(name)), quantity);
        }
    }
    Ok(bundle)
}

fn constraints(types: &[Vec<u8>], traits: &[TraitConstraint]) -> BidConstraints {
    BidConstraints {
        included_types: types.iter().map(|t| String::from_utf8_lossy(t).into_owned()).collect(),
        trait_rules: traits
            .iter()
            .map(|t| match t {
                TraitConstraint::Included(name) => TraitRule {
                    trait_name: String::from_utf8_lossy(name).into_owned(),
                    excluded: false,
                },
                TraitConstraint::Excluded(name) => TraitRule {
                    trait_name: String::from_utf8_lossy(name).into_owned(),
                    excluded: true,
                },
            })
            .collect(),
    }
}

/// Output carrying the payment datum that settles `out_ref`
fn pays_for(tx: &Transaction, output: &TxOutput, out_ref: &OutputReference) -> bool {
    tx.datum_of(output)
        .and_then(|raw| decode_datum::<PaymentDatum>(raw).ok())
        .is_some_and(|datum| datum.out_ref == *out_ref)
}

/// Assets of `policy` delivered to the bidder of an open bid
fn delivered_assets(tx: &Transaction, out_ref: &OutputReference, policy: &PolicyId) -> AssetBundle {
    let mut delivered = AssetBundle::new();
    for output in tx.outputs.iter().filter(|o| o.value.has_policy(policy)) {
        if pays_for(tx, output, out_ref) {
            delivered.merge(&output.value.bundle_where(|p, _| p == policy));
        }
    }
    delivered
}

fn sell(tx: &Transaction, point: &ChainPoint, out_ref: OutputReference, bid: Bid) -> MarketplaceRecord {
    let kind = match bid.kind {
        BidKind::Single | BidKind::Open => SaleKind::SellSingle,
        BidKind::Bundle => SaleKind::SellBundle,
        BidKind::Swap => SaleKind::SellSwap,
    };
    let mut assets = bid.requested_assets.clone().unwrap_or_default();
    if let Some(policy) = &bid.requested_policy_id {
        assets.merge(&delivered_assets(tx, &out_ref, policy));
    }

    MarketplaceRecord::Sale {
        sale: Sale {
            id: 0,
            tx_hash: tx.hash,
            point: *point,
            kind,
            assets,
            price_lovelace: bid.price_lovelace,
            buyer: Some(bid.owner),
            seller: single_signer(&tx.signatories),
            offered_assets: bid.offered_assets,
        },
        spends: Spend::Bid(out_ref),
    }
}

fn buy(tx: &Transaction, point: &ChainPoint, listing: Listing) -> MarketplaceRecord {
    let kind = match listing.kind {
        ListingKind::Single => SaleKind::BuySingle,
        ListingKind::Bundle => SaleKind::BuyBundle,
    };
    MarketplaceRecord::Sale {
        sale: Sale {
            id: 0,
            tx_hash: tx.hash,
            point: *point,
            kind,
            assets: listing.assets,
            price_lovelace: listing.price_lovelace,
            buyer: single_signer(&tx.signatories),
            seller: Some(listing.owner),
            offered_assets: None,
        },
        spends: Spend::Listing(listing.out_ref),
    }
}

fn cancel_listing(tx: &Transaction, point: &ChainPoint, listing: Listing) -> MarketplaceRecord {
    let kind = match listing.kind {
        ListingKind::Single => CancellationKind::CancelListingSingle,
        ListingKind::Bundle => CancellationKind::CancelListingBundle,
    };
    MarketplaceRecord::Cancellation {
        cancellation: Cancellation {
            id: 0,
            tx_hash: tx.hash,
            point: *point,
            kind,
            assets: Some(listing.assets),
            policy_id: None,
            constraints: None,
            owner: listing.owner,
            price_lovelace: listing.price_lovelace,
            offered_assets: None,
        },
        spends: Spend::Listing(listing.out_ref),
    }
}

fn cancel_bid(tx: &Transaction, point: &ChainPoint, bid: Bid) -> MarketplaceRecord {
    let kind = match bid.kind {
        BidKind::Single => CancellationKind::CancelBidSingle,
        BidKind::Bundle => CancellationKind::CancelBidBundle,
        BidKind::Open => CancellationKind::CancelBidOpen,
        BidKind::Swap => CancellationKind::CancelBidSwap,
    };
    MarketplaceRecord::Cancellation {
        cancellation: Cancellation {
            id: 0,
            tx_hash: tx.hash,
            point: *point,
            kind,
            assets: bid.requested_assets,
            policy_id: bid.requested_policy_id,
            constraints: bid.constraints,
            owner: bid.owner,
            price_lovelace: bid.price_lovelace,
            offered_assets: bid.offered_assets,
        },
        spends: Spend::Bid(bid.out_ref),
    }
}

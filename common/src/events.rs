//! Marketplace events, the records that produce them and the handler seam
//! that receives them once confirmed.

use crate::{
    asset::AssetBundle,
    hash::{PolicyId, TxHash},
    point::{ChainPoint, Slot},
    types::{
        Bid, BidConstraints, BidKind, Cancellation, CancellationKind, CheckpointKind, Listing,
        ListingKind, OutputReference, Sale, SaleKind,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[cbor(index_only)]
pub enum EventKind {
    #[n(0)]
    ListingSingle,
    #[n(1)]
    ListingBundle,
    #[n(2)]
    BidSingle,
    #[n(3)]
    BidBundle,
    #[n(4)]
    BidOpen,
    #[n(5)]
    BidSwap,
    #[n(6)]
    BuySingle,
    #[n(7)]
    BuyBundle,
    #[n(8)]
    SellSingle,
    #[n(9)]
    SellBundle,
    #[n(10)]
    SellSwap,
    #[n(11)]
    CancelListingSingle,
    #[n(12)]
    CancelListingBundle,
    #[n(13)]
    CancelBidSingle,
    #[n(14)]
    CancelBidBundle,
    #[n(15)]
    CancelBidOpen,
    #[n(16)]
    CancelBidSwap,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<ListingKind> for EventKind {
    fn from(kind: ListingKind) -> Self {
        match kind {
            ListingKind::Single => EventKind::ListingSingle,
            ListingKind::Bundle => EventKind::ListingBundle,
        }
    }
}

impl From<BidKind> for EventKind {
    fn from(kind: BidKind) -> Self {
        match kind {
            BidKind::Single => EventKind::BidSingle,
            BidKind::Bundle => EventKind::BidBundle,
            BidKind::Open => EventKind::BidOpen,
            BidKind::Swap => EventKind::BidSwap,
        }
    }
}

impl From<SaleKind> for EventKind {
    fn from(kind: SaleKind) -> Self {
        match kind {
            SaleKind::BuySingle => EventKind::BuySingle,
            SaleKind::BuyBundle => EventKind::BuyBundle,
            SaleKind::SellSingle => EventKind::SellSingle,
            SaleKind::SellBundle => EventKind::SellBundle,
            SaleKind::SellSwap => EventKind::SellSwap,
        }
    }
}

impl From<CancellationKind> for EventKind {
    fn from(kind: CancellationKind) -> Self {
        match kind {
            CancellationKind::CancelListingSingle => EventKind::CancelListingSingle,
            CancellationKind::CancelListingBundle => EventKind::CancelListingBundle,
            CancellationKind::CancelBidSingle => EventKind::CancelBidSingle,
            CancellationKind::CancelBidBundle => EventKind::CancelBidBundle,
            CancellationKind::CancelBidOpen => EventKind::CancelBidOpen,
            CancellationKind::CancelBidSwap => EventKind::CancelBidSwap,
        }
    }
}

/// A confirmed event as handed to the [`EventHandler`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
}

/// Outbox row waiting for enough confirmations
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct PendingEvent {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub point: ChainPoint,
    #[n(2)]
    pub kind: EventKind,
    /// JSON text of the payload
    #[n(3)]
    pub payload: String,
}

impl PendingEvent {
    /// A payload that no longer parses is passed on as a plain string
    pub fn to_event(&self) -> MarketplaceEvent {
        let data = serde_json::from_str(&self.payload)
            .unwrap_or_else(|_| serde_json::Value::String(self.payload.clone()));
        MarketplaceEvent {
            kind: self.kind,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingEventData<'a> {
    tx_hash: TxHash,
    slot: Slot,
    assets: &'a AssetBundle,
    owner: &'a str,
    lovelace: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_listing: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BidEventData<'a> {
    tx_hash: TxHash,
    slot: Slot,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<&'a AssetBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_id: Option<PolicyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<&'a BidConstraints>,
    owner: &'a str,
    lovelace: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    offered_assets: Option<&'a AssetBundle>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaleEventData<'a> {
    tx_hash: TxHash,
    slot: Slot,
    assets: &'a AssetBundle,
    lovelace: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    offered_assets: Option<&'a AssetBundle>,
    seller: Option<&'a str>,
    buyer: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancellationEventData<'a> {
    tx_hash: TxHash,
    slot: Slot,
    owner: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets: Option<&'a AssetBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_id: Option<PolicyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<&'a BidConstraints>,
    lovelace: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    offered_assets: Option<&'a AssetBundle>,
}

/// Row consumed by a sale or cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spend {
    Listing(OutputReference),
    Bid(OutputReference),
}

/// One accepted fact, written atomically with its event and a checkpoint
/// advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceRecord {
    NewListing(Listing),
    NewBid(Bid),
    Sale { sale: Sale, spends: Spend },
    Cancellation { cancellation: Cancellation, spends: Spend },
}

impl MarketplaceRecord {
    pub fn point(&self) -> &ChainPoint {
        match self {
            MarketplaceRecord::NewListing(listing) => &listing.point,
            MarketplaceRecord::NewBid(bid) => &bid.point,
            MarketplaceRecord::Sale { sale, .. } => &sale.point,
            MarketplaceRecord::Cancellation { cancellation, .. } => &cancellation.point,
        }
    }

    pub fn event_kind(&self) -> EventKind {
        match self {
            MarketplaceRecord::NewListing(listing) => listing.kind.into(),
            MarketplaceRecord::NewBid(bid) => bid.kind.into(),
            MarketplaceRecord::Sale { sale, .. } => sale.kind.into(),
            MarketplaceRecord::Cancellation { cancellation, .. } => cancellation.kind.into(),
        }
    }

    pub fn checkpoint_kind(&self) -> CheckpointKind {
        match self {
            MarketplaceRecord::NewListing(_) => CheckpointKind::Listing,
            MarketplaceRecord::NewBid(_) => CheckpointKind::Bid,
            MarketplaceRecord::Sale { .. } => CheckpointKind::Sale,
            MarketplaceRecord::Cancellation { .. } => CheckpointKind::Cancel,
        }
    }

    /// JSON payload delivered with the event
    pub fn event_payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            MarketplaceRecord::NewListing(listing) => serde_json::to_value(ListingEventData {
                tx_hash: listing.out_ref.transaction_hash,
                slot: listing.point.slot,
                assets: &listing.assets,
                owner: &listing.owner,
                lovelace: listing.price_lovelace,
                private_listing: listing.private_buyer.as_deref(),
            }),
            MarketplaceRecord::NewBid(bid) => serde_json::to_value(BidEventData {
                tx_hash: bid.out_ref.transaction_hash,
                slot: bid.point.slot,
                assets: bid.requested_assets.as_ref(),
                policy_id: bid.requested_policy_id,
                constraints: bid.constraints.as_ref(),
                owner: &bid.owner,
                lovelace: bid.price_lovelace,
                offered_assets: bid.offered_assets.as_ref(),
            }),
            MarketplaceRecord::Sale { sale, .. } => serde_json::to_value(SaleEventData {
                tx_hash: sale.tx_hash,
                slot: sale.point.slot,
                assets: &sale.assets,
                lovelace: sale.price_lovelace,
                offered_assets: sale.offered_assets.as_ref(),
                seller: sale.seller.as_deref(),
                buyer: sale.buyer.as_deref(),
            }),
            MarketplaceRecord::Cancellation { cancellation, .. } => {
                serde_json::to_value(CancellationEventData {
                    tx_hash: cancellation.tx_hash,
                    slot: cancellation.point.slot,
                    owner: &cancellation.owner,
                    assets: cancellation.assets.as_ref(),
                    policy_id: cancellation.policy_id,
                    constraints: cancellation.constraints.as_ref(),
                    lovelace: cancellation.price_lovelace,
                    offered_assets: cancellation.offered_assets.as_ref(),
                })
            }
        }
    }
}

/// Receives confirmed events. Returning an error leaves the batch queued
/// for the next attempt.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_events(&self, events: &[MarketplaceEvent]) -> anyhow::Result<()>;

    /// Called after a block or rollback changed the projection
    async fn on_change(&self) {}
}

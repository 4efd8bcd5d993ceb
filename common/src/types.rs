//! Marketplace entities kept by the projection store

use crate::{
    asset::AssetBundle,
    hash::{PolicyId, TxHash},
    point::{ChainPoint, Point},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a spendable output. Primary key of listings and bids.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct OutputReference {
    /// Transaction that created the output
    #[n(0)]
    pub transaction_hash: TxHash,

    /// Position in that transaction's output list
    #[n(1)]
    pub output_index: u32,
}

impl OutputReference {
    pub const KEY_LEN: usize = 36;

    pub fn new(transaction_hash: TxHash, output_index: u32) -> Self {
        Self {
            transaction_hash,
            output_index,
        }
    }

    /// Storage key: hash bytes followed by the big-endian index, so keys of
    /// one transaction sort together in output order
    pub fn to_key(&self) -> [u8; Self::KEY_LEN] {
        let mut key = [0u8; Self::KEY_LEN];
        key[..32].copy_from_slice(self.transaction_hash.as_ref());
        key[32..].copy_from_slice(&self.output_index.to_be_bytes());
        key
    }

    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() != Self::KEY_LEN {
            return None;
        }
        let hash = TxHash::try_from(&key[..32]).ok()?;
        let index = u32::from_be_bytes(key[32..].try_into().ok()?);
        Some(Self::new(hash, index))
    }
}

impl fmt::Display for OutputReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction_hash, self.output_index)
    }
}

/// Listing shape
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[cbor(index_only)]
pub enum ListingKind {
    /// One NFT
    #[n(0)]
    Single,

    /// Several NFTs sold together
    #[n(1)]
    Bundle,
}

/// Bid shape
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[cbor(index_only)]
pub enum BidKind {
    /// One specific NFT
    #[n(0)]
    Single,

    /// Several specific NFTs
    #[n(1)]
    Bundle,

    /// Any NFT of a collection matching type and trait constraints
    #[n(2)]
    Open,

    /// Specific NFTs in exchange for offered assets
    #[n(3)]
    Swap,
}

/// One trait requirement of an open bid
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
pub struct TraitRule {
    #[serde(rename = "trait")]
    #[n(0)]
    pub trait_name: String,

    /// The NFT must not carry the trait
    #[n(1)]
    pub excluded: bool,
}

/// Type and trait filters of an open bid
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct BidConstraints {
    #[n(0)]
    pub included_types: Vec<String>,

    #[n(1)]
    pub trait_rules: Vec<TraitRule>,
}

/// An NFT or bundle offered at the marketplace script
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[n(0)]
    pub out_ref: OutputReference,

    /// Block that created the listing
    #[n(1)]
    pub point: ChainPoint,

    #[n(2)]
    pub kind: ListingKind,

    /// Listed NFTs, without the script-owner marker
    #[n(3)]
    pub assets: AssetBundle,

    /// Bech32 payment credential of the seller
    #[n(4)]
    pub owner: String,

    #[n(5)]
    pub price_lovelace: u64,

    /// Bech32 payment credential of the only allowed buyer
    #[n(6)]
    pub private_buyer: Option<String>,

    /// Block whose transaction consumed the listing
    #[n(7)]
    pub spent_point: Option<ChainPoint>,
}

impl Listing {
    pub fn is_spent(&self) -> bool {
        self.spent_point.is_some()
    }
}

/// An offer locked at the marketplace script together with a bid token
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    #[n(0)]
    pub out_ref: OutputReference,

    /// Block that created the bid
    #[n(1)]
    pub point: ChainPoint,

    #[n(2)]
    pub kind: BidKind,

    /// Requested NFTs, absent for open bids
    #[n(3)]
    pub requested_assets: Option<AssetBundle>,

    /// Requested collection, open bids only
    #[n(4)]
    pub requested_policy_id: Option<PolicyId>,

    /// Open bids only
    #[n(5)]
    pub constraints: Option<BidConstraints>,

    /// Bech32 payment credential of the bidder
    #[n(6)]
    pub owner: String,

    /// Lovelace locked in the bid output
    #[n(7)]
    pub price_lovelace: u64,

    /// Assets offered on top of or instead of lovelace
    #[n(8)]
    pub offered_assets: Option<AssetBundle>,

    /// Block whose transaction consumed the bid
    #[n(9)]
    pub spent_point: Option<ChainPoint>,
}

impl Bid {
    pub fn is_spent(&self) -> bool {
        self.spent_point.is_some()
    }
}

/// How a sale happened
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[cbor(index_only)]
pub enum SaleKind {
    #[n(0)]
    BuySingle,
    #[n(1)]
    BuyBundle,
    #[n(2)]
    SellSingle,
    #[n(3)]
    SellBundle,
    #[n(4)]
    SellSwap,
}

/// A filled listing or accepted bid
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    /// Assigned by the store on insert
    #[n(0)]
    pub id: u64,

    #[n(1)]
    pub tx_hash: TxHash,

    #[n(2)]
    pub point: ChainPoint,

    #[n(3)]
    pub kind: SaleKind,

    #[n(4)]
    pub assets: AssetBundle,

    #[n(5)]
    pub price_lovelace: u64,

    /// Unknown unless the single-signer rule applies
    #[n(6)]
    pub buyer: Option<String>,

    /// Unknown unless the single-signer rule applies
    #[n(7)]
    pub seller: Option<String>,

    #[n(8)]
    pub offered_assets: Option<AssetBundle>,
}

/// What got cancelled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[cbor(index_only)]
pub enum CancellationKind {
    #[n(0)]
    CancelListingSingle,
    #[n(1)]
    CancelListingBundle,
    #[n(2)]
    CancelBidSingle,
    #[n(3)]
    CancelBidBundle,
    #[n(4)]
    CancelBidOpen,
    #[n(5)]
    CancelBidSwap,
}

/// A withdrawn listing or bid
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    /// Assigned by the store on insert
    #[n(0)]
    pub id: u64,

    #[n(1)]
    pub tx_hash: TxHash,

    #[n(2)]
    pub point: ChainPoint,

    #[n(3)]
    pub kind: CancellationKind,

    /// Absent for open bids
    #[n(4)]
    pub assets: Option<AssetBundle>,

    /// Open bids only
    #[n(5)]
    pub policy_id: Option<PolicyId>,

    /// Open bids only
    #[n(6)]
    pub constraints: Option<BidConstraints>,

    /// Original owner of the listing or bid
    #[n(7)]
    pub owner: String,

    #[n(8)]
    pub price_lovelace: u64,

    #[n(9)]
    pub offered_assets: Option<AssetBundle>,
}

/// Durable chain position of the projection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Latest position whose effects are applied. Absent means follow from
    /// the current tip.
    pub sync_point: Option<Point>,

    /// Spent rows below this position may be compacted. Absent until the
    /// first cleanup establishes it.
    pub cleanup_point: Option<Point>,
}

/// Why the checkpoint moved. Logged, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    Sale,
    Cancel,
    Bid,
    Listing,
    Rollback,
    Sync,
    Cleanup,
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

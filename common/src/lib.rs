//! Types shared by the Nebula marketplace watcher crates

pub mod asset;
pub mod chain;
pub mod credential;
pub mod events;
pub mod hash;
pub mod point;
pub mod types;

pub use asset::{AssetBundle, Unit, LOVELACE};
pub use chain::{Block, Datum, Redeemer, RedeemerTag, Transaction, TxOutput, Value};
pub use credential::Credential;
pub use events::{
    EventHandler, EventKind, MarketplaceEvent, MarketplaceRecord, PendingEvent, Spend,
};
pub use hash::{BlockHash, DatumHash, Hash, KeyHash, PolicyId, ScriptHash, TxHash};
pub use point::{ChainPoint, Point, Slot};
pub use types::*;

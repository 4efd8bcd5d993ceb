use std::path::Path;

use config::Config;
use fjall::{Database, Keyspace, KeyspaceCreateOptions, OwnedWriteBatch};
use nebula_common::{
    Bid, Cancellation, Checkpoint, ChainPoint, Listing, OutputReference, PendingEvent, Point,
    Sale, Slot, TxHash,
};
use tracing::{info, warn};

use super::{Mutation, Sequence, Store, WriteBatch};
use crate::StoreError;

const DEFAULT_DATABASE_PATH: &str = "nebula-db";
const LISTINGS_KEYSPACE: &str = "listings";
const BIDS_KEYSPACE: &str = "bids";
const SALES_KEYSPACE: &str = "sales";
const CANCELLATIONS_KEYSPACE: &str = "cancellations";
const EVENTS_KEYSPACE: &str = "events";
const CHECKPOINT_KEYSPACE: &str = "checkpoint";

const SYNC_POINT_KEY: &[u8] = b"sync";
const CLEANUP_POINT_KEY: &[u8] = b"cleanup";

pub struct FjallStore {
    database: Database,
    listings: Keyspace,
    bids: Keyspace,
    sales: Keyspace,
    cancellations: Keyspace,
    events: Keyspace,
    checkpoint: Keyspace,
}

impl FjallStore {
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let path = config
            .get_string("database-path")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
        Self::open(path)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening marketplace projection at {}", path.display());
        let database = Database::builder(path).open()?;
        let keyspace =
            |name: &str| database.keyspace(name, KeyspaceCreateOptions::default);

        Ok(Self {
            listings: keyspace(LISTINGS_KEYSPACE)?,
            bids: keyspace(BIDS_KEYSPACE)?,
            sales: keyspace(SALES_KEYSPACE)?,
            cancellations: keyspace(CANCELLATIONS_KEYSPACE)?,
            events: keyspace(EVENTS_KEYSPACE)?,
            checkpoint: keyspace(CHECKPOINT_KEYSPACE)?,
            database,
        })
    }

    fn keyspace(&self, sequence: Sequence) -> &Keyspace {
        match sequence {
            Sequence::Sales => &self.sales,
            Sequence::Cancellations => &self.cancellations,
            Sequence::Events => &self.events,
        }
    }

    fn apply(&self, batch: &mut OwnedWriteBatch, mutation: Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::PutListing(listing) => {
                batch.insert(&self.listings, listing.out_ref.to_key().to_vec(), encode(&listing)?);
            }
            Mutation::DeleteListing(out_ref) => {
                batch.remove(&self.listings, out_ref.to_key().to_vec());
            }
            Mutation::PutBid(bid) => {
                batch.insert(&self.bids, bid.out_ref.to_key().to_vec(), encode(&bid)?);
            }
            Mutation::DeleteBid(out_ref) => {
                batch.remove(&self.bids, out_ref.to_key().to_vec());
            }
            Mutation::InsertSale(sale) => {
                batch.insert(&self.sales, row_key(sale.id, &sale.tx_hash), encode(&sale)?);
            }
            Mutation::DeleteSale(id, tx_hash) => {
                batch.remove(&self.sales, row_key(id, &tx_hash));
            }
            Mutation::InsertCancellation(cancellation) => {
                batch.insert(
                    &self.cancellations,
                    row_key(cancellation.id, &cancellation.tx_hash),
                    encode(&cancellation)?,
                );
            }
            Mutation::DeleteCancellation(id, tx_hash) => {
                batch.remove(&self.cancellations, row_key(id, &tx_hash));
            }
            Mutation::InsertEvent(event) => {
                batch.insert(&self.events, event.id.to_be_bytes().to_vec(), encode(&event)?);
            }
            Mutation::DeleteEvent(id) => {
                batch.remove(&self.events, id.to_be_bytes().to_vec());
            }
            Mutation::SetSyncPoint(point) => {
                batch.insert(&self.checkpoint, SYNC_POINT_KEY.to_vec(), encode(&point)?);
            }
            Mutation::SetCleanupPoint(point) => {
                batch.insert(&self.checkpoint, CLEANUP_POINT_KEY.to_vec(), encode(&point)?);
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn overwrite_listing_raw(
        &self,
        out_ref: &OutputReference,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        self.listings.insert(out_ref.to_key().to_vec(), bytes.to_vec())?;
        Ok(())
    }

    fn point(&self, key: &[u8]) -> Result<Option<Point>, StoreError> {
        let Some(bytes) = self.checkpoint.get(key)? else {
            return Ok(None);
        };
        decode(CHECKPOINT_KEYSPACE, &bytes).map(Some)
    }
}

/// Append-only key: id first for chain order, then the tx hash
fn row_key(id: u64, tx_hash: &TxHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(&id.to_be_bytes());
    key.extend_from_slice(tx_hash.as_ref());
    key
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode<T>(table: &'static str, bytes: &[u8]) -> Result<T, StoreError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| StoreError::Corrupt {
        table,
        reason: e.to_string(),
    })
}

/// Decodes every row, skipping the ones that no longer parse
fn scan<T>(table: &'static str, keyspace: &Keyspace) -> Result<Vec<T>, StoreError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut values = Vec::new();
    for row in keyspace.iter() {
        let (key, value) = row.into_inner()?;
        match decode(table, &value) {
            Ok(value) => values.push(value),
            Err(e) => warn!("Skipping row {} of {table}: {e}", hex::encode(&key)),
        }
    }
    Ok(values)
}

/// Walks an append-only table backwards while rows are at or after `slot`
fn scan_tail<T>(
    table: &'static str,
    keyspace: &Keyspace,
    slot: Slot,
    point_of: impl Fn(&T) -> &ChainPoint,
) -> Result<Vec<T>, StoreError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut values = Vec::new();
    for row in keyspace.iter().rev() {
        let (key, value) = row.into_inner()?;
        let value: T = match decode(table, &value) {
            Ok(value) => value,
            Err(e) => {
                warn!("Skipping row {} of {table}: {e}", hex::encode(&key));
                continue;
            }
        };
        if point_of(&value).slot < slot {
            break;
        }
        values.push(value);
    }
    Ok(values)
}

impl Store for FjallStore {
    fn get_listing(&self, out_ref: &OutputReference) -> Result<Option<Listing>, StoreError> {
        let Some(bytes) = self.listings.get(out_ref.to_key())? else {
            return Ok(None);
        };
        decode(LISTINGS_KEYSPACE, &bytes).map(Some)
    }

    fn get_bid(&self, out_ref: &OutputReference) -> Result<Option<Bid>, StoreError> {
        let Some(bytes) = self.bids.get(out_ref.to_key())? else {
            return Ok(None);
        };
        decode(BIDS_KEYSPACE, &bytes).map(Some)
    }

    fn listings(&self) -> Result<Vec<Listing>, StoreError> {
        scan(LISTINGS_KEYSPACE, &self.listings)
    }

    fn bids(&self) -> Result<Vec<Bid>, StoreError> {
        scan(BIDS_KEYSPACE, &self.bids)
    }

    fn sales(&self) -> Result<Vec<Sale>, StoreError> {
        scan(SALES_KEYSPACE, &self.sales)
    }

    fn cancellations(&self) -> Result<Vec<Cancellation>, StoreError> {
        scan(CANCELLATIONS_KEYSPACE, &self.cancellations)
    }

    fn events(&self) -> Result<Vec<PendingEvent>, StoreError> {
        scan(EVENTS_KEYSPACE, &self.events)
    }

    fn sales_since(&self, slot: Slot) -> Result<Vec<Sale>, StoreError> {
        scan_tail(SALES_KEYSPACE, &self.sales, slot, |s: &Sale| &s.point)
    }

    fn cancellations_since(&self, slot: Slot) -> Result<Vec<Cancellation>, StoreError> {
        scan_tail(
            CANCELLATIONS_KEYSPACE,
            &self.cancellations,
            slot,
            |c: &Cancellation| &c.point,
        )
    }

    fn events_since(&self, slot: Slot) -> Result<Vec<PendingEvent>, StoreError> {
        scan_tail(EVENTS_KEYSPACE, &self.events, slot, |e: &PendingEvent| {
            &e.point
        })
    }

    fn checkpoint(&self) -> Result<Checkpoint, StoreError> {
        Ok(Checkpoint {
            sync_point: self.point(SYNC_POINT_KEY)?,
            cleanup_point: self.point(CLEANUP_POINT_KEY)?,
        })
    }

    fn last_id(&self, sequence: Sequence) -> Result<Option<u64>, StoreError> {
        let Some(row) = self.keyspace(sequence).last_key_value() else {
            return Ok(None);
        };
        let key = row.key()?;
        let id = key
            .get(..8)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u64::from_be_bytes);
        Ok(id)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut fjall_batch = self.database.batch();
        for mutation in batch {
            self.apply(&mut fjall_batch, mutation)?;
        }
        fjall_batch.commit()?;
        Ok(())
    }
}

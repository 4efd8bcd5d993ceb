//! Groups projection writes so they reach the store as one batch

use std::collections::BTreeMap;

use nebula_common::{
    Bid, Cancellation, ChainPoint, CheckpointKind, EventKind, Listing, OutputReference,
    PendingEvent, Point, Sale,
};
use tracing::info;

use crate::stores::{Mutation, Store, WriteBatch};
use crate::{MarketplaceDb, NextIds, StoreError};

/// Pending writes against a [`MarketplaceDb`]. Nothing is visible until
/// [`DbTransaction::commit`] and dropping the transaction discards it.
pub struct DbTransaction<'a, S: Store> {
    db: &'a mut MarketplaceDb<S>,
    batch: WriteBatch,
    next_ids: NextIds,
    listings: BTreeMap<OutputReference, Listing>,
    bids: BTreeMap<OutputReference, Bid>,
    checkpoints: Vec<(CheckpointKind, Point)>,
}

impl<'a, S: Store> DbTransaction<'a, S> {
    pub(crate) fn new(db: &'a mut MarketplaceDb<S>) -> Self {
        let next_ids = db.next_ids;
        Self {
            db,
            batch: WriteBatch::new(),
            next_ids,
            listings: BTreeMap::new(),
            bids: BTreeMap::new(),
            checkpoints: Vec::new(),
        }
    }

    pub fn add_listing(&mut self, listing: Listing) -> Result<(), StoreError> {
        let out_ref = listing.out_ref;
        if self.listings.contains_key(&out_ref) || self.db.store.get_listing(&out_ref)?.is_some()
        {
            return Err(StoreError::DuplicateKey {
                table: "listings",
                key: out_ref.to_string(),
            });
        }
        self.batch.push(Mutation::PutListing(listing.clone()));
        self.listings.insert(out_ref, listing);
        Ok(())
    }

    pub fn add_bid(&mut self, bid: Bid) -> Result<(), StoreError> {
        let out_ref = bid.out_ref;
        if self.bids.contains_key(&out_ref) || self.db.store.get_bid(&out_ref)?.is_some() {
            return Err(StoreError::DuplicateKey {
                table: "bids",
                key: out_ref.to_string(),
            });
        }
        self.batch.push(Mutation::PutBid(bid.clone()));
        self.bids.insert(out_ref, bid);
        Ok(())
    }

    /// Stores the sale under the next sales id and returns that id
    pub fn add_sale(&mut self, mut sale: Sale) -> u64 {
        sale.id = self.next_ids.sales;
        self.next_ids.sales += 1;
        let id = sale.id;
        self.batch.push(Mutation::InsertSale(sale));
        id
    }

    pub fn add_cancellation(&mut self, mut cancellation: Cancellation) -> u64 {
        cancellation.id = self.next_ids.cancellations;
        self.next_ids.cancellations += 1;
        let id = cancellation.id;
        self.batch.push(Mutation::InsertCancellation(cancellation));
        id
    }

    /// Marks the listing spent at `point`. Returns false when there is no such
    /// listing or it was already spent.
    pub fn spend_listing(
        &mut self,
        out_ref: &OutputReference,
        point: &ChainPoint,
    ) -> Result<bool, StoreError> {
        let listing = match self.listings.get(out_ref) {
            Some(listing) => Some(listing.clone()),
            None => self.db.store.get_listing(out_ref)?,
        };
        let Some(mut listing) = listing.filter(|l| !l.is_spent()) else {
            return Ok(false);
        };
        listing.spent_point = Some(*point);
        self.batch.push(Mutation::PutListing(listing.clone()));
        self.listings.insert(*out_ref, listing);
        Ok(true)
    }

    pub fn spend_bid(
        &mut self,
        out_ref: &OutputReference,
        point: &ChainPoint,
    ) -> Result<bool, StoreError> {
        let bid = match self.bids.get(out_ref) {
            Some(bid) => Some(bid.clone()),
            None => self.db.store.get_bid(out_ref)?,
        };
        let Some(mut bid) = bid.filter(|b| !b.is_spent()) else {
            return Ok(false);
        };
        bid.spent_point = Some(*point);
        self.batch.push(Mutation::PutBid(bid.clone()));
        self.bids.insert(*out_ref, bid);
        Ok(true)
    }

    /// Queues an event for delivery once `point` is deep enough
    pub fn register_event(
        &mut self,
        point: &ChainPoint,
        kind: EventKind,
        payload: &serde_json::Value,
    ) -> u64 {
        let id = self.next_ids.events;
        self.next_ids.events += 1;
        self.batch.push(Mutation::InsertEvent(PendingEvent {
            id,
            point: *point,
            kind,
            payload: payload.to_string(),
        }));
        id
    }

    pub fn update_checkpoint(&mut self, kind: CheckpointKind, point: Point) {
        self.batch.push(Mutation::SetSyncPoint(point));
        self.checkpoints.push((kind, point));
    }

    pub(crate) fn set_cleanup_point(&mut self, point: Point) {
        self.batch.push(Mutation::SetCleanupPoint(point));
        self.checkpoints.push((CheckpointKind::Cleanup, point));
    }

    pub(crate) fn push(&mut self, mutation: Mutation) {
        self.batch.push(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn commit(self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.db.store.commit(self.batch)?;
        self.db.next_ids = self.next_ids;
        self.db.changes += 1;

        for (kind, point) in self.checkpoints {
            match point.as_chain_point() {
                Some(p) => info!(%kind, hash = %p.hash, slot = p.slot, "Checkpoint"),
                None => info!(%kind, "Checkpoint at origin"),
            }
        }
        Ok(())
    }
}

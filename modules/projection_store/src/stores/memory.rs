use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use nebula_common::{
    Bid, Cancellation, Checkpoint, Listing, OutputReference, PendingEvent, Sale, Slot, TxHash,
};

use super::{Mutation, Sequence, Store, WriteBatch};
use crate::StoreError;

#[derive(Default)]
struct Tables {
    listings: BTreeMap<OutputReference, Listing>,
    bids: BTreeMap<OutputReference, Bid>,
    sales: BTreeMap<(u64, TxHash), Sale>,
    cancellations: BTreeMap<(u64, TxHash), Cancellation>,
    events: BTreeMap<u64, PendingEvent>,
    checkpoint: Checkpoint,
}

impl Tables {
    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::PutListing(listing) => {
                self.listings.insert(listing.out_ref, listing);
            }
            Mutation::DeleteListing(out_ref) => {
                self.listings.remove(&out_ref);
            }
            Mutation::PutBid(bid) => {
                self.bids.insert(bid.out_ref, bid);
            }
            Mutation::DeleteBid(out_ref) => {
                self.bids.remove(&out_ref);
            }
            Mutation::InsertSale(sale) => {
                self.sales.insert((sale.id, sale.tx_hash), sale);
            }
            Mutation::DeleteSale(id, tx_hash) => {
                self.sales.remove(&(id, tx_hash));
            }
            Mutation::InsertCancellation(cancellation) => {
                self.cancellations.insert((cancellation.id, cancellation.tx_hash), cancellation);
            }
            Mutation::DeleteCancellation(id, tx_hash) => {
                self.cancellations.remove(&(id, tx_hash));
            }
            Mutation::InsertEvent(event) => {
                self.events.insert(event.id, event);
            }
            Mutation::DeleteEvent(id) => {
                self.events.remove(&id);
            }
            Mutation::SetSyncPoint(point) => self.checkpoint.sync_point = Some(point),
            Mutation::SetCleanupPoint(point) => self.checkpoint.cleanup_point = Some(point),
        }
    }
}

/// Volatile store for tests and dry runs
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for InMemoryStore {
    fn get_listing(&self, out_ref: &OutputReference) -> Result<Option<Listing>, StoreError> {
        Ok(self.lock().listings.get(out_ref).cloned())
    }

    fn get_bid(&self, out_ref: &OutputReference) -> Result<Option<Bid>, StoreError> {
        Ok(self.lock().bids.get(out_ref).cloned())
    }

    fn listings(&self) -> Result<Vec<Listing>, StoreError> {
        Ok(self.lock().listings.values().cloned().collect())
    }

    fn bids(&self) -> Result<Vec<Bid>, StoreError> {
        Ok(self.lock().bids.values().cloned().collect())
    }

    fn sales(&self) -> Result<Vec<Sale>, StoreError> {
        Ok(self.lock().sales.values().cloned().collect())
    }

    fn cancellations(&self) -> Result<Vec<Cancellation>, StoreError> {
        Ok(self.lock().cancellations.values().cloned().collect())
    }

    fn events(&self) -> Result<Vec<PendingEvent>, StoreError> {
        Ok(self.lock().events.values().cloned().collect())
    }

    fn sales_since(&self, slot: Slot) -> Result<Vec<Sale>, StoreError> {
        let tables = self.lock();
        Ok(tables.sales.values().rev().take_while(|s| s.point.slot >= slot).cloned().collect())
    }

    fn cancellations_since(&self, slot: Slot) -> Result<Vec<Cancellation>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .cancellations
            .values()
            .rev()
            .take_while(|c| c.point.slot >= slot)
            .cloned()
            .collect())
    }

    fn events_since(&self, slot: Slot) -> Result<Vec<PendingEvent>, StoreError> {
        let tables = self.lock();
        Ok(tables.events.values().rev().take_while(|e| e.point.slot >= slot).cloned().collect())
    }

    fn checkpoint(&self) -> Result<Checkpoint, StoreError> {
        Ok(self.lock().checkpoint)
    }

    fn last_id(&self, sequence: Sequence) -> Result<Option<u64>, StoreError> {
        let tables = self.lock();
        let id = match sequence {
            Sequence::Sales => tables.sales.keys().next_back().map(|(id, _)| *id),
            Sequence::Cancellations => tables.cancellations.keys().next_back().map(|(id, _)| *id),
            Sequence::Events => tables.events.keys().next_back().copied(),
        };
        Ok(id)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.lock();
        for mutation in batch {
            tables.apply(mutation);
        }
        Ok(())
    }
}

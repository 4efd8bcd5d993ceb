use crate::StoreError;
use nebula_common::{
    Bid, Cancellation, Checkpoint, Listing, OutputReference, PendingEvent, Point, Sale, Slot,
    TxHash,
};

pub mod fjall;
pub mod memory;

/// Append-only tables with store-assigned ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Sales,
    Cancellations,
    Events,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    PutListing(Listing),
    DeleteListing(OutputReference),
    PutBid(Bid),
    DeleteBid(OutputReference),
    InsertSale(Sale),
    DeleteSale(u64, TxHash),
    InsertCancellation(Cancellation),
    DeleteCancellation(u64, TxHash),
    InsertEvent(PendingEvent),
    DeleteEvent(u64),
    SetSyncPoint(Point),
    SetCleanupPoint(Point),
}

/// Mutations applied together or not at all
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }
}

impl IntoIterator for WriteBatch {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

/// Storage backend of the projection. Reads see every committed batch and
/// nothing of a batch that failed.
pub trait Store: Send + Sync {
    fn get_listing(&self, out_ref: &OutputReference) -> Result<Option<Listing>, StoreError>;
    fn get_bid(&self, out_ref: &OutputReference) -> Result<Option<Bid>, StoreError>;

    fn listings(&self) -> Result<Vec<Listing>, StoreError>;
    fn bids(&self) -> Result<Vec<Bid>, StoreError>;

    /// Chain order
    fn sales(&self) -> Result<Vec<Sale>, StoreError>;
    fn cancellations(&self) -> Result<Vec<Cancellation>, StoreError>;
    fn events(&self) -> Result<Vec<PendingEvent>, StoreError>;

    /// Tail of an append-only table back to `slot`, newest first
    fn sales_since(&self, slot: Slot) -> Result<Vec<Sale>, StoreError>;
    fn cancellations_since(&self, slot: Slot) -> Result<Vec<Cancellation>, StoreError>;
    fn events_since(&self, slot: Slot) -> Result<Vec<PendingEvent>, StoreError>;

    fn checkpoint(&self) -> Result<Checkpoint, StoreError>;

    /// Highest id in use, if the table has rows
    fn last_id(&self, sequence: Sequence) -> Result<Option<u64>, StoreError>;

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

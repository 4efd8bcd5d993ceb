//! Nebula projection store: the durable marketplace view, its rollback and
//! compaction rules and the outbox of events waiting for confirmations.

mod queries;
pub mod stores;
mod transaction;

use nebula_common::{
    Bid, ChainPoint, Checkpoint, CheckpointKind, EventHandler, Listing, MarketplaceEvent,
    MarketplaceRecord, OutputReference, Point, Spend,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use queries::{ActivityEntry, SalesSummary, ACTIVITY_LIMIT};
pub use stores::{fjall::FjallStore, memory::InMemoryStore, Mutation, Sequence, Store, WriteBatch};
pub use transaction::DbTransaction;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key {key} in {table}")]
    DuplicateKey { table: &'static str, key: String },

    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("storage backend failure: {0}")]
    Backend(#[from] fjall::Error),

    #[error("cannot encode row: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NextIds {
    pub sales: u64,
    pub cancellations: u64,
    pub events: u64,
}

/// Marketplace operations over a [`Store`]
pub struct MarketplaceDb<S: Store> {
    store: S,
    next_ids: NextIds,
    changes: u64,
    seen_changes: u64,
}

impl<S: Store> MarketplaceDb<S> {
    /// Opens the projection. `start_point` only seeds a store that has never
    /// recorded a sync point.
    pub fn open(store: S, start_point: Option<ChainPoint>) -> Result<Self, StoreError> {
        let next_id = |sequence| -> Result<u64, StoreError> {
            Ok(store.last_id(sequence)?.map_or(0, |id| id + 1))
        };
        let next_ids = NextIds {
            sales: next_id(Sequence::Sales)?,
            cancellations: next_id(Sequence::Cancellations)?,
            events: next_id(Sequence::Events)?,
        };

        let mut db = Self {
            store,
            next_ids,
            changes: 0,
            seen_changes: 0,
        };

        let checkpoint = db.store.checkpoint()?;
        match (checkpoint.sync_point, start_point) {
            (None, Some(start)) => {
                info!(hash = %start.hash, slot = start.slot, "Initializing checkpoint from start point");
                let mut tx = db.begin();
                tx.update_checkpoint(CheckpointKind::Sync, start.into());
                tx.set_cleanup_point(start.into());
                tx.commit()?;
            }
            (Some(point), _) => info!(%point, "Resuming from checkpoint"),
            (None, None) => info!("No checkpoint, following from the current tip"),
        }
        db.seen_changes = db.changes;

        Ok(db)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn begin(&mut self) -> DbTransaction<'_, S> {
        DbTransaction::new(self)
    }

    pub fn checkpoint(&self) -> Result<Checkpoint, StoreError> {
        self.store.checkpoint()
    }

    /// Unspent listing at `out_ref`. A row that no longer decodes counts as
    /// absent.
    pub fn get_listing(&self, out_ref: &OutputReference) -> Result<Option<Listing>, StoreError> {
        match self.store.get_listing(out_ref) {
            Ok(listing) => Ok(listing.filter(|l| !l.is_spent())),
            Err(StoreError::Corrupt { table, reason }) => {
                warn!("Ignoring listing {out_ref}, corrupt row in {table}: {reason}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_bid(&self, out_ref: &OutputReference) -> Result<Option<Bid>, StoreError> {
        match self.store.get_bid(out_ref) {
            Ok(bid) => Ok(bid.filter(|b| !b.is_spent())),
            Err(StoreError::Corrupt { table, reason }) => {
                warn!("Ignoring bid {out_ref}, corrupt row in {table}: {reason}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrites the sync point. `kind` is only logged.
    pub fn update_checkpoint(&mut self, kind: CheckpointKind, point: Point) -> Result<(), StoreError> {
        let mut tx = self.begin();
        tx.update_checkpoint(kind, point);
        tx.commit()
    }

    /// Writes one classified record together with its event and a
    /// checkpoint advance to the record's block.
    pub fn record(&mut self, record: MarketplaceRecord) -> Result<(), StoreError> {
        let point = *record.point();
        let event_kind = record.event_kind();
        let checkpoint_kind = record.checkpoint_kind();
        let payload = record.event_payload().map_err(|e| StoreError::Encode(e.to_string()))?;

        let mut tx = self.begin();
        match record {
            MarketplaceRecord::NewListing(listing) => tx.add_listing(listing)?,
            MarketplaceRecord::NewBid(bid) => tx.add_bid(bid)?,
            MarketplaceRecord::Sale { sale, spends } => {
                spend(&mut tx, spends, &point)?;
                tx.add_sale(sale);
            }
            MarketplaceRecord::Cancellation {
                cancellation,
                spends,
            } => {
                spend(&mut tx, spends, &point)?;
                tx.add_cancellation(cancellation);
            }
        }
        tx.register_event(&point, event_kind, &payload);
        tx.update_checkpoint(checkpoint_kind, point.into());
        tx.commit()
    }

    /// Reverts every effect of blocks after `target` and moves the sync point
    /// there, all in one batch.
    pub fn rollback_database(&mut self, target: &Point) -> Result<(), StoreError> {
        let from_slot = target.slot_or_default();
        let listings = self.store.listings()?;
        let bids = self.store.bids()?;
        let sales = self.store.sales_since(from_slot)?;
        let cancellations = self.store.cancellations_since(from_slot)?;
        let events = self.store.events_since(from_slot)?;
        let cleanup_point = self.store.checkpoint()?.cleanup_point;

        let mut tx = self.begin();
        let mut reverted = 0usize;

        for mut listing in listings {
            if listing.point.is_discarded_by(target) {
                tx.push(Mutation::DeleteListing(listing.out_ref));
                reverted += 1;
            } else if listing.spent_point.is_some_and(|p| p.is_discarded_by(target)) {
                listing.spent_point = None;
                tx.push(Mutation::PutListing(listing));
                reverted += 1;
            }
        }
        for mut bid in bids {
            if bid.point.is_discarded_by(target) {
                tx.push(Mutation::DeleteBid(bid.out_ref));
                reverted += 1;
            } else if bid.spent_point.is_some_and(|p| p.is_discarded_by(target)) {
                bid.spent_point = None;
                tx.push(Mutation::PutBid(bid));
                reverted += 1;
            }
        }
        for sale in sales.into_iter().filter(|s| s.point.is_discarded_by(target)) {
            tx.push(Mutation::DeleteSale(sale.id, sale.tx_hash));
            reverted += 1;
        }
        for cancellation in cancellations.into_iter().filter(|c| c.point.is_discarded_by(target)) {
            tx.push(Mutation::DeleteCancellation(cancellation.id, cancellation.tx_hash));
            reverted += 1;
        }
        for event in events.into_iter().filter(|e| e.point.is_discarded_by(target)) {
            tx.push(Mutation::DeleteEvent(event.id));
            reverted += 1;
        }

        debug!(%target, reverted, "Rolling back projection");
        tx.update_checkpoint(CheckpointKind::Rollback, *target);
        // the cleanup point never runs ahead of the sync point
        if cleanup_point.is_some_and(|p| p.slot_or_default() > from_slot) {
            tx.set_cleanup_point(*target);
        }
        tx.commit()
    }

    /// Drops spent rows that no rollback can reach any more. Returns true when
    /// the cleanup point moved.
    pub fn cleanup_database(&mut self, margin_slots: u64) -> Result<bool, StoreError> {
        let checkpoint = self.store.checkpoint()?;
        let Some(sync_point) = checkpoint.sync_point else {
            debug!("No sync point yet, skipping cleanup");
            return Ok(false);
        };

        let Some(cleanup_point) = checkpoint.cleanup_point else {
            let mut tx = self.begin();
            tx.set_cleanup_point(sync_point);
            tx.commit()?;
            return Ok(true);
        };

        let cleanup_slot = cleanup_point.slot_or_default();
        if sync_point.slot_or_default().saturating_sub(cleanup_slot) < margin_slots {
            return Ok(false);
        }

        let compactable = |point: &ChainPoint, spent: Option<ChainPoint>| {
            point.slot < cleanup_slot && spent.is_some_and(|s| s.slot < cleanup_slot)
        };
        let listings = self.store.listings()?;
        let bids = self.store.bids()?;

        let mut tx = self.begin();
        let mut removed = 0usize;
        for listing in listings.iter().filter(|l| compactable(&l.point, l.spent_point)) {
            tx.push(Mutation::DeleteListing(listing.out_ref));
            removed += 1;
        }
        for bid in bids.iter().filter(|b| compactable(&b.point, b.spent_point)) {
            tx.push(Mutation::DeleteBid(bid.out_ref));
            removed += 1;
        }
        debug!(removed, below_slot = cleanup_slot, "Compacting spent rows");
        tx.set_cleanup_point(sync_point);
        tx.commit()?;
        Ok(true)
    }

    /// Delivers the events that are `confirmations` blocks deep at `point`
    /// and forgets them once the handler accepted them. Returns how many
    /// were delivered.
    pub async fn trigger_events(
        &mut self,
        point: &ChainPoint,
        confirmations: u64,
        slots_per_block: u64,
        handler: &dyn EventHandler,
    ) -> Result<usize, StoreError> {
        let Some(safe_slot) = point.slot.checked_sub(confirmations * slots_per_block) else {
            return Ok(0);
        };

        let pending: Vec<_> =
            self.store.events()?.into_iter().filter(|e| e.point.slot <= safe_slot).collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let events: Vec<MarketplaceEvent> = pending.iter().map(|e| e.to_event()).collect();
        if let Err(e) = handler.handle_events(&events).await {
            warn!("Event handler failed, {} events stay queued: {e:#}", events.len());
            return Ok(0);
        }

        let mut tx = self.begin();
        for event in &pending {
            tx.push(Mutation::DeleteEvent(event.id));
        }
        tx.commit()?;
        Ok(pending.len())
    }

    /// True when something was committed since the previous call
    pub fn has_changed(&mut self) -> bool {
        let changed = self.changes != self.seen_changes;
        self.seen_changes = self.changes;
        changed
    }
}

fn spend<S: Store>(
    tx: &mut DbTransaction<'_, S>,
    spends: Spend,
    point: &ChainPoint,
) -> Result<(), StoreError> {
    let spent = match spends {
        Spend::Listing(out_ref) => tx.spend_listing(&out_ref, point)?,
        Spend::Bid(out_ref) => tx.spend_bid(&out_ref, point)?,
    };
    if !spent {
        debug!(?spends, "Spent row was not open");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nebula_common::{
        AssetBundle, BidKind, Cancellation, CancellationKind, EventKind, Hash, ListingKind, Sale,
        SaleKind, Slot,
    };
    use std::sync::Mutex;

    const POLICY: [u8; 28] = [0xaa; 28];

    fn point(byte: u8, slot: Slot) -> ChainPoint {
        ChainPoint::new(Hash::new([byte; 32]), slot)
    }

    fn out_ref(byte: u8, index: u32) -> OutputReference {
        OutputReference::new(Hash::new([byte; 32]), index)
    }

    fn assets(name: &str) -> AssetBundle {
        [(nebula_common::asset::unit(&Hash::new(POLICY), name.as_bytes()), 1)]
            .into_iter()
            .collect()
    }

    fn listing(out: OutputReference, at: ChainPoint) -> Listing {
        Listing {
            out_ref: out,
            point: at,
            kind: ListingKind::Single,
            assets: assets("Bud0"),
            owner: "addr_vkh1seller".into(),
            price_lovelace: 50_000_000,
            private_buyer: None,
            spent_point: None,
        }
    }

    fn bid(out: OutputReference, at: ChainPoint) -> Bid {
        Bid {
            out_ref: out,
            point: at,
            kind: BidKind::Single,
            requested_assets: Some(assets("Bud1")),
            requested_policy_id: None,
            constraints: None,
            owner: "addr_vkh1bidder".into(),
            price_lovelace: 20_000_000,
            offered_assets: None,
            spent_point: None,
        }
    }

    fn sale_of(listing: &Listing, tx: u8, at: ChainPoint) -> MarketplaceRecord {
        MarketplaceRecord::Sale {
            sale: Sale {
                id: 0,
                tx_hash: Hash::new([tx; 32]),
                point: at,
                kind: SaleKind::BuySingle,
                assets: listing.assets.clone(),
                price_lovelace: listing.price_lovelace,
                buyer: Some("addr_vkh1buyer".into()),
                seller: Some(listing.owner.clone()),
                offered_assets: None,
            },
            spends: Spend::Listing(listing.out_ref),
        }
    }

    fn cancel_of(bid: &Bid, tx: u8, at: ChainPoint) -> MarketplaceRecord {
        MarketplaceRecord::Cancellation {
            cancellation: Cancellation {
                id: 0,
                tx_hash: Hash::new([tx; 32]),
                point: at,
                kind: CancellationKind::CancelBidSingle,
                assets: bid.requested_assets.clone(),
                policy_id: None,
                constraints: None,
                owner: bid.owner.clone(),
                price_lovelace: bid.price_lovelace,
                offered_assets: None,
            },
            spends: Spend::Bid(bid.out_ref),
        }
    }

    fn open_db() -> MarketplaceDb<InMemoryStore> {
        MarketplaceDb::open(InMemoryStore::new(), None).unwrap()
    }

    #[derive(Default)]
    struct RecordingHandler {
        batches: Mutex<Vec<Vec<MarketplaceEvent>>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_events(&self, events: &[MarketplaceEvent]) -> anyhow::Result<()> {
            self.batches.lock().unwrap().push(events.to_vec());
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle_events(&self, _events: &[MarketplaceEvent]) -> anyhow::Result<()> {
            anyhow::bail!("webhook unreachable")
        }
    }

    #[test]
    fn should_record_listing_with_event_and_checkpoint() {
        let mut db = open_db();
        let at = point(1, 100);
        db.record(MarketplaceRecord::NewListing(listing(out_ref(1, 0), at))).unwrap();

        assert!(db.get_listing(&out_ref(1, 0)).unwrap().is_some());
        let events = db.store().events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ListingSingle);
        assert_eq!(db.checkpoint().unwrap().sync_point, Some(Point::Specific(at)));
        assert!(db.has_changed());
        assert!(!db.has_changed());
    }

    #[test]
    fn should_reject_duplicate_listing() {
        let mut db = open_db();
        let record = MarketplaceRecord::NewListing(listing(out_ref(1, 0), point(1, 100)));
        db.record(record.clone()).unwrap();

        let result = db.record(record);
        assert!(matches!(result, Err(StoreError::DuplicateKey { table: "listings", .. })));
        assert_eq!(db.store().events().unwrap().len(), 1);
    }

    #[test]
    fn should_mark_listing_spent_on_sale() {
        let mut db = open_db();
        let l = listing(out_ref(1, 0), point(1, 100));
        db.record(MarketplaceRecord::NewListing(l.clone())).unwrap();
        db.record(sale_of(&l, 2, point(2, 120))).unwrap();

        assert_eq!(db.get_listing(&l.out_ref).unwrap(), None);
        let stored = db.store().get_listing(&l.out_ref).unwrap().unwrap();
        assert_eq!(stored.spent_point, Some(point(2, 120)));
        let sales = db.sales().unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].id, 0);
    }

    #[test]
    fn should_spend_idempotently() {
        let mut db = open_db();
        let b = bid(out_ref(1, 0), point(1, 100));
        db.record(MarketplaceRecord::NewBid(b.clone())).unwrap();

        let mut tx = db.begin();
        assert!(tx.spend_bid(&b.out_ref, &point(2, 110)).unwrap());
        assert!(!tx.spend_bid(&b.out_ref, &point(2, 110)).unwrap());
        tx.commit().unwrap();

        let mut tx = db.begin();
        assert!(!tx.spend_bid(&b.out_ref, &point(3, 120)).unwrap());
        assert!(tx.is_empty());
    }

    #[test]
    fn should_undo_block_on_rollback() {
        let mut db = open_db();
        let before = point(1, 100);
        let l = listing(out_ref(1, 0), before);
        let b = bid(out_ref(1, 1), before);
        db.record(MarketplaceRecord::NewListing(l.clone())).unwrap();
        db.record(MarketplaceRecord::NewBid(b.clone())).unwrap();
        let listings_before = db.store().listings().unwrap();
        let bids_before = db.store().bids().unwrap();

        let orphan = point(9, 140);
        db.record(sale_of(&l, 2, orphan)).unwrap();
        db.record(cancel_of(&b, 3, orphan)).unwrap();
        db.record(MarketplaceRecord::NewListing(listing(out_ref(3, 0), orphan))).unwrap();

        db.rollback_database(&Point::Specific(before)).unwrap();

        assert_eq!(db.store().listings().unwrap(), listings_before);
        assert_eq!(db.store().bids().unwrap(), bids_before);
        assert!(db.sales().unwrap().is_empty());
        assert!(db.cancellations().unwrap().is_empty());
        assert!(db.store().events().unwrap().iter().all(|e| e.point == before));
        assert_eq!(db.checkpoint().unwrap().sync_point, Some(Point::Specific(before)));
    }

    #[test]
    fn should_keep_rows_of_rollback_target_block() {
        let mut db = open_db();
        let target = point(1, 100);
        db.record(MarketplaceRecord::NewListing(listing(out_ref(1, 0), target))).unwrap();

        db.rollback_database(&Point::Specific(target)).unwrap();

        assert_eq!(db.store().listings().unwrap().len(), 1);
        assert_eq!(db.store().events().unwrap().len(), 1);
    }

    #[test]
    fn should_clear_everything_on_rollback_to_origin() {
        let mut db = open_db();
        db.record(MarketplaceRecord::NewListing(listing(out_ref(1, 0), point(1, 100)))).unwrap();

        db.rollback_database(&Point::Origin).unwrap();

        assert!(db.store().listings().unwrap().is_empty());
        assert!(db.store().events().unwrap().is_empty());
        assert_eq!(db.checkpoint().unwrap().sync_point, Some(Point::Origin));
    }

    #[test]
    fn should_seed_checkpoint_from_start_point_once() {
        let store = InMemoryStore::new();
        let start = point(1, 100);
        let db = MarketplaceDb::open(store, Some(start)).unwrap();
        let checkpoint = db.checkpoint().unwrap();
        assert_eq!(checkpoint.sync_point, Some(Point::Specific(start)));
        assert_eq!(checkpoint.cleanup_point, Some(Point::Specific(start)));

        let mut db = db;
        db.update_checkpoint(CheckpointKind::Sync, point(2, 500).into()).unwrap();
        let db = MarketplaceDb::open(db.store, Some(start)).unwrap();
        assert_eq!(db.checkpoint().unwrap().sync_point, Some(Point::Specific(point(2, 500))));
    }

    #[test]
    fn should_only_establish_cleanup_point_on_first_cleanup() {
        let mut db = open_db();
        assert!(!db.cleanup_database(1800).unwrap());

        let l = listing(out_ref(1, 0), point(1, 100));
        db.record(MarketplaceRecord::NewListing(l.clone())).unwrap();
        db.record(sale_of(&l, 2, point(2, 120))).unwrap();

        assert!(db.cleanup_database(1800).unwrap());
        assert_eq!(db.checkpoint().unwrap().cleanup_point, Some(Point::Specific(point(2, 120))));
        assert_eq!(db.store().listings().unwrap().len(), 1);
    }

    #[test]
    fn should_compact_spent_rows_behind_cleanup_point() {
        let mut db = MarketplaceDb::open(InMemoryStore::new(), Some(point(0, 0))).unwrap();
        let old = listing(out_ref(1, 0), point(1, 100));
        let recent = listing(out_ref(2, 0), point(1, 100));
        let open = listing(out_ref(3, 0), point(1, 100));
        for l in [&old, &recent, &open] {
            db.record(MarketplaceRecord::NewListing(l.clone())).unwrap();
        }
        db.record(sale_of(&old, 2, point(2, 200))).unwrap();

        // within the margin: nothing happens
        assert!(!db.cleanup_database(1800).unwrap());

        db.update_checkpoint(CheckpointKind::Sync, point(4, 2000).into()).unwrap();
        assert!(db.cleanup_database(1800).unwrap());
        // spent at 200, which is not below the previous cleanup slot 0
        assert_eq!(db.store().listings().unwrap().len(), 3);

        db.record(sale_of(&recent, 5, point(5, 2100))).unwrap();
        db.update_checkpoint(CheckpointKind::Sync, point(6, 4000).into()).unwrap();
        assert!(db.cleanup_database(1800).unwrap());

        let remaining: Vec<_> =
            db.store().listings().unwrap().into_iter().map(|l| l.out_ref).collect();
        assert_eq!(remaining, vec![recent.out_ref, open.out_ref]);
        assert_eq!(db.checkpoint().unwrap().cleanup_point, Some(Point::Specific(point(6, 4000))));
    }

    #[test]
    fn should_pull_cleanup_point_back_on_rollback() {
        let mut db = open_db();
        db.update_checkpoint(CheckpointKind::Sync, point(1, 1000).into()).unwrap();
        assert!(db.cleanup_database(1800).unwrap());
        assert_eq!(db.checkpoint().unwrap().cleanup_point, Some(Point::Specific(point(1, 1000))));

        let target = Point::Specific(point(2, 980));
        db.rollback_database(&target).unwrap();

        let checkpoint = db.checkpoint().unwrap();
        assert_eq!(checkpoint.sync_point, Some(target));
        assert_eq!(checkpoint.cleanup_point, Some(target));
    }

    #[test]
    fn should_keep_cleanup_point_behind_rollback_target() {
        let mut db = MarketplaceDb::open(InMemoryStore::new(), Some(point(0, 500))).unwrap();
        db.update_checkpoint(CheckpointKind::Sync, point(1, 1000).into()).unwrap();

        db.rollback_database(&Point::Specific(point(2, 980))).unwrap();

        assert_eq!(db.checkpoint().unwrap().cleanup_point, Some(Point::Specific(point(0, 500))));
    }

    #[tokio::test]
    async fn should_deliver_events_after_confirmations() {
        let mut db = open_db();
        let handler = RecordingHandler::default();
        db.record(MarketplaceRecord::NewListing(listing(out_ref(1, 0), point(1, 100)))).unwrap();

        assert_eq!(db.trigger_events(&point(2, 199), 5, 20, &handler).await.unwrap(), 0);
        assert!(handler.batches.lock().unwrap().is_empty());

        assert_eq!(db.trigger_events(&point(3, 200), 5, 20, &handler).await.unwrap(), 1);
        let batches = handler.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].kind, EventKind::ListingSingle);
        assert_eq!(batches[0][0].data["lovelace"], 50_000_000);
        assert!(db.store().events().unwrap().is_empty());

        assert_eq!(db.trigger_events(&point(4, 300), 5, 20, &handler).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_not_deliver_before_chain_is_deep_enough() {
        let mut db = open_db();
        let handler = RecordingHandler::default();
        db.record(MarketplaceRecord::NewListing(listing(out_ref(1, 0), point(1, 0)))).unwrap();

        assert_eq!(db.trigger_events(&point(2, 50), 5, 20, &handler).await.unwrap(), 0);
        assert_eq!(db.store().events().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_keep_events_when_handler_fails() {
        let mut db = open_db();
        db.record(MarketplaceRecord::NewListing(listing(out_ref(1, 0), point(1, 100)))).unwrap();

        let delivered = db.trigger_events(&point(2, 1000), 5, 20, &FailingHandler).await.unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(db.store().events().unwrap().len(), 1);
    }

    #[test]
    fn should_continue_ids_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = MarketplaceDb::open(FjallStore::open(dir.path()).unwrap(), None).unwrap();
            let l = listing(out_ref(1, 0), point(1, 100));
            db.record(MarketplaceRecord::NewListing(l.clone())).unwrap();
            db.record(sale_of(&l, 2, point(2, 120))).unwrap();
        }
        let mut db = MarketplaceDb::open(FjallStore::open(dir.path()).unwrap(), None).unwrap();
        let l = listing(out_ref(3, 0), point(3, 130));
        db.record(MarketplaceRecord::NewListing(l.clone())).unwrap();
        db.record(sale_of(&l, 4, point(4, 140))).unwrap();

        let ids: Vec<_> = db.sales().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1]);
        let event_ids: Vec<_> = db.store().events().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(event_ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn should_treat_corrupt_listing_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::PutListing(listing(out_ref(1, 0), point(1, 100))));
        store.commit(batch).unwrap();
        store.overwrite_listing_raw(&out_ref(1, 0), &[0x9f, 0x01]).unwrap();
        let db = MarketplaceDb::open(store, None).unwrap();

        assert!(db.store().get_listing(&out_ref(1, 0)).is_err());
        assert_eq!(db.get_listing(&out_ref(1, 0)).unwrap(), None);
    }
}

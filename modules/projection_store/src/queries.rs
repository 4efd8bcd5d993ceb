//! Read-only views served to API consumers

use nebula_common::{Bid, Cancellation, Listing, PolicyId, Sale, Slot};
use serde::Serialize;

use crate::{MarketplaceDb, Store, StoreError};

/// Entries returned by [`MarketplaceDb::activity`]
pub const ACTIVITY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub count: u64,
    pub total_lovelace: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "activity", rename_all = "camelCase")]
pub enum ActivityEntry {
    Listing(Listing),
    Bid(Bid),
    Sale(Sale),
    Cancellation(Cancellation),
}

impl ActivityEntry {
    pub fn slot(&self) -> Slot {
        match self {
            ActivityEntry::Listing(listing) => listing.point.slot,
            ActivityEntry::Bid(bid) => bid.point.slot,
            ActivityEntry::Sale(sale) => sale.point.slot,
            ActivityEntry::Cancellation(cancellation) => cancellation.point.slot,
        }
    }
}

impl<S: Store> MarketplaceDb<S> {
    /// Unspent listings holding an asset of `policy_id`
    pub fn open_listings(&self, policy_id: &PolicyId) -> Result<Vec<Listing>, StoreError> {
        Ok(self
            .store
            .listings()?
            .into_iter()
            .filter(|l| !l.is_spent() && l.assets.contains_policy(policy_id))
            .collect())
    }

    /// Unspent bids on assets of `policy_id`, open collection bids included
    pub fn open_bids(&self, policy_id: &PolicyId) -> Result<Vec<Bid>, StoreError> {
        Ok(self
            .store
            .bids()?
            .into_iter()
            .filter(|b| !b.is_spent())
            .filter(|b| {
                b.requested_policy_id.as_ref() == Some(policy_id)
                    || b.requested_assets.as_ref().is_some_and(|a| a.contains_policy(policy_id))
            })
            .collect())
    }

    pub fn sales(&self) -> Result<Vec<Sale>, StoreError> {
        self.store.sales()
    }

    pub fn cancellations(&self) -> Result<Vec<Cancellation>, StoreError> {
        self.store.cancellations()
    }

    pub fn sales_summary(&self) -> Result<SalesSummary, StoreError> {
        Ok(self.store.sales()?.iter().fold(SalesSummary::default(), |acc, sale| SalesSummary {
            count: acc.count + 1,
            total_lovelace: acc.total_lovelace.saturating_add(sale.price_lovelace),
        }))
    }

    /// Latest marketplace activity, newest slot first
    pub fn activity(&self) -> Result<Vec<ActivityEntry>, StoreError> {
        let mut entries: Vec<ActivityEntry> = self
            .store
            .listings()?
            .into_iter()
            .map(ActivityEntry::Listing)
            .chain(self.store.bids()?.into_iter().map(ActivityEntry::Bid))
            .chain(self.store.sales()?.into_iter().map(ActivityEntry::Sale))
            .chain(self.store.cancellations()?.into_iter().map(ActivityEntry::Cancellation))
            .collect();
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.slot()));
        entries.truncate(ACTIVITY_LIMIT);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use nebula_common::{
        asset::unit, BidConstraints, BidKind, ChainPoint, Hash, ListingKind,
        MarketplaceRecord, OutputReference, SaleKind, Spend,
    };

    fn policy(byte: u8) -> PolicyId {
        Hash::new([byte; 28])
    }

    fn point(slot: Slot) -> ChainPoint {
        ChainPoint::new(Hash::new([slot as u8; 32]), slot)
    }

    fn listing(tx: u8, policy_byte: u8, slot: Slot) -> Listing {
        Listing {
            out_ref: OutputReference::new(Hash::new([tx; 32]), 0),
            point: point(slot),
            kind: ListingKind::Single,
            assets: [(unit(&policy(policy_byte), b"Bud"), 1)].into_iter().collect(),
            owner: "addr_vkh1seller".into(),
            price_lovelace: 40_000_000,
            private_buyer: None,
            spent_point: None,
        }
    }

    fn open_bid(tx: u8, policy_byte: u8, slot: Slot) -> Bid {
        Bid {
            out_ref: OutputReference::new(Hash::new([tx; 32]), 1),
            point: point(slot),
            kind: BidKind::Open,
            requested_assets: None,
            requested_policy_id: Some(policy(policy_byte)),
            constraints: Some(BidConstraints::default()),
            owner: "addr_vkh1bidder".into(),
            price_lovelace: 30_000_000,
            offered_assets: None,
            spent_point: None,
        }
    }

    fn buy(listing: &Listing, tx: u8, slot: Slot) -> MarketplaceRecord {
        MarketplaceRecord::Sale {
            sale: Sale {
                id: 0,
                tx_hash: Hash::new([tx; 32]),
                point: point(slot),
                kind: SaleKind::BuySingle,
                assets: listing.assets.clone(),
                price_lovelace: listing.price_lovelace,
                buyer: None,
                seller: Some(listing.owner.clone()),
                offered_assets: None,
            },
            spends: Spend::Listing(listing.out_ref),
        }
    }

    fn populated() -> MarketplaceDb<InMemoryStore> {
        let mut db = MarketplaceDb::open(InMemoryStore::new(), None).unwrap();
        let sold = listing(1, 0xaa, 10);
        db.record(MarketplaceRecord::NewListing(sold.clone())).unwrap();
        db.record(MarketplaceRecord::NewListing(listing(2, 0xaa, 20))).unwrap();
        db.record(MarketplaceRecord::NewListing(listing(3, 0xbb, 30))).unwrap();
        db.record(MarketplaceRecord::NewBid(open_bid(4, 0xaa, 40))).unwrap();
        db.record(buy(&sold, 5, 50)).unwrap();
        db
    }

    #[test]
    fn should_list_open_orders_by_collection() {
        let db = populated();

        let listings = db.open_listings(&policy(0xaa)).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].point.slot, 20);

        assert_eq!(db.open_bids(&policy(0xaa)).unwrap().len(), 1);
        assert!(db.open_bids(&policy(0xbb)).unwrap().is_empty());
    }

    #[test]
    fn should_summarize_sales() {
        let db = populated();
        let summary = db.sales_summary().unwrap();
        assert_eq!(summary, SalesSummary { count: 1, total_lovelace: 40_000_000 });
        assert_eq!(
            serde_json::to_value(summary).unwrap(),
            serde_json::json!({"count": 1, "totalLovelace": 40_000_000})
        );
    }

    #[test]
    fn should_order_activity_newest_first() {
        let db = populated();
        let slots: Vec<_> = db.activity().unwrap().iter().map(ActivityEntry::slot).collect();
        assert_eq!(slots, vec![50, 40, 30, 20, 10]);
    }

    #[test]
    fn should_cap_activity() {
        let mut db = MarketplaceDb::open(InMemoryStore::new(), None).unwrap();
        for i in 0..120u32 {
            let mut l = listing(0, 0xaa, i as Slot);
            l.out_ref = OutputReference::new(Hash::new([7; 32]), i);
            db.record(MarketplaceRecord::NewListing(l)).unwrap();
        }
        let activity = db.activity().unwrap();
        assert_eq!(activity.len(), ACTIVITY_LIMIT);
        assert_eq!(activity[0].slot(), 119);
    }

    #[test]
    fn should_tag_activity_entries() {
        let entry = ActivityEntry::Listing(listing(1, 0xaa, 10));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["activity"], "listing");
        assert_eq!(json["priceLovelace"], 40_000_000);
    }
}

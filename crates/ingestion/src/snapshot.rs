//! Sparse order-book snapshots.
//!
//! Collapses raw listings into the last observed (price, quantity) per
//! advertiser and timestamp. An advertiser absent at a timestamp has no entry.

use p2p_core::{Listing, SnapshotPoint, TimestampMs};
use std::collections::BTreeMap;

/// Sparse mapping from (advertiser, timestamp) to the last observed snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBook {
    /// Per-advertiser observations, keyed by timestamp.
    advertisers: BTreeMap<String, BTreeMap<TimestampMs, SnapshotPoint>>,
    /// Number of raw listings folded in.
    raw_count: usize,
}

impl SnapshotBook {
    /// Create an empty snapshot book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot book from listings in input order.
    pub fn from_listings(listings: &[Listing]) -> Self {
        let mut book = Self::new();
        book.add_listings(listings);
        book
    }

    /// Add a listing. A later row for the same (advertiser, timestamp) replaces the earlier one.
    pub fn add_listing(&mut self, listing: &Listing) {
        let point = SnapshotPoint {
            price: listing.price,
            tradable_quantity: listing.tradable_quantity,
        };

        match self.advertisers.get_mut(&listing.advertiser_id) {
            Some(observations) => {
                observations.insert(listing.timestamp, point);
            }
            None => {
                let mut observations = BTreeMap::new();
                observations.insert(listing.timestamp, point);
                self.advertisers
                    .insert(listing.advertiser_id.clone(), observations);
            }
        }
        self.raw_count += 1;
    }

    /// Add multiple listings.
    pub fn add_listings(&mut self, listings: &[Listing]) {
        for listing in listings {
            self.add_listing(listing);
        }
    }

    /// Snapshot of one advertiser at one timestamp.
    pub fn get(&self, advertiser_id: &str, ts: TimestampMs) -> Option<&SnapshotPoint> {
        self.advertisers.get(advertiser_id)?.get(&ts)
    }

    /// Advertisers in lexical order.
    pub fn advertisers(&self) -> impl Iterator<Item = &str> {
        self.advertisers.keys().map(String::as_str)
    }

    /// Chronological observations of one advertiser.
    pub fn observations(
        &self,
        advertiser_id: &str,
    ) -> impl Iterator<Item = (TimestampMs, &SnapshotPoint)> {
        self.advertisers
            .get(advertiser_id)
            .into_iter()
            .flat_map(|obs| obs.iter().map(|(&ts, point)| (ts, point)))
    }

    /// Number of (advertiser, timestamp) entries.
    pub fn len(&self) -> usize {
        self.advertisers.values().map(BTreeMap::len).sum()
    }

    /// Whether the book holds no entries.
    pub fn is_empty(&self) -> bool {
        self.advertisers.is_empty()
    }

    /// Number of raw listings folded in, duplicates included.
    pub fn raw_count(&self) -> usize {
        self.raw_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rows_keep_last() {
        let book = SnapshotBook::from_listings(&[
            Listing::new("a", 1_000, 10.0, 100.0),
            Listing::new("a", 1_000, 10.5, 80.0),
        ]);

        assert_eq!(book.len(), 1);
        assert_eq!(book.raw_count(), 2);
        let point = book.get("a", 1_000).unwrap();
        assert_eq!(point.price, 10.5);
        assert_eq!(point.tradable_quantity, 80.0);
    }

    #[test]
    fn test_sparse_absent_advertiser() {
        let book = SnapshotBook::from_listings(&[
            Listing::new("a", 1_000, 10.0, 100.0),
            Listing::new("b", 2_000, 11.0, 50.0),
        ]);

        assert!(book.get("a", 2_000).is_none());
        assert!(book.get("b", 1_000).is_none());
        assert_eq!(book.advertisers().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_observations_are_chronological() {
        let book = SnapshotBook::from_listings(&[
            Listing::new("a", 3_000, 10.0, 40.0),
            Listing::new("a", 1_000, 10.0, 100.0),
            Listing::new("a", 2_000, 10.0, 100.0),
        ]);

        let ts: Vec<TimestampMs> = book.observations("a").map(|(ts, _)| ts).collect();
        assert_eq!(ts, vec![1_000, 2_000, 3_000]);
        assert_eq!(book.observations("missing").count(), 0);
    }
}

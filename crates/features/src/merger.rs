//! Alignment of trade-implied and listing-implied series.

use crate::order_book::BookSeries;
use crate::snapshot_diff::TradeSeries;
use p2p_core::{AggregatedPoint, TimestampMs};
use std::collections::BTreeSet;

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Timestamps in the union of both series.
    pub candidates: usize,
    /// Complete rows emitted.
    pub emitted: usize,
    /// Rows dropped for a missing statistic.
    pub dropped: usize,
}

/// Joins both series on exact timestamp and keeps only complete rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesMerger;

impl SeriesMerger {
    /// Merge trade and book statistics.
    pub fn merge(trades: &TradeSeries, book: &BookSeries) -> (Vec<AggregatedPoint>, MergeStats) {
        let timestamps: BTreeSet<TimestampMs> =
            trades.timestamps().chain(book.timestamps()).collect();

        let mut points = Vec::with_capacity(timestamps.len());
        for &ts in &timestamps {
            if let Some(point) = Self::complete_point(ts, trades, book) {
                points.push(point);
            }
        }

        let stats = MergeStats {
            candidates: timestamps.len(),
            emitted: points.len(),
            dropped: timestamps.len() - points.len(),
        };
        (points, stats)
    }

    fn complete_point(
        ts: TimestampMs,
        trades: &TradeSeries,
        book: &BookSeries,
    ) -> Option<AggregatedPoint> {
        let trade = trades.get(ts)?;
        let listing = book.get(ts)?;

        Some(AggregatedPoint {
            timestamp: ts,
            vwap_sale: trade.vwap?,
            vwap_advs: listing.vwap?,
            demand: trade.demand,
            supply: listing.supply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order_book::OrderBookAggregator;
    use crate::snapshot_diff::SnapshotDiffAggregator;
    use p2p_core::Listing;
    use p2p_ingestion::SnapshotBook;

    fn merge(listings: &[Listing]) -> (Vec<AggregatedPoint>, MergeStats) {
        let trades = SnapshotDiffAggregator::default().aggregate(&SnapshotBook::from_listings(listings));
        let book = OrderBookAggregator::new().aggregate(listings);
        SeriesMerger::merge(&trades, &book)
    }

    #[test]
    fn test_fill_sequence_emits_only_filled_row() {
        let (points, stats) = merge(&[
            Listing::new("x", 1_000, 10.0, 100.0),
            Listing::new("x", 2_000, 10.0, 100.0),
            Listing::new("x", 3_000, 10.0, 40.0),
        ]);

        assert_eq!(points.len(), 1);
        let point = points[0];
        assert_eq!(point.timestamp, 3_000);
        assert_eq!(point.demand, 60.0);
        assert_eq!(point.vwap_sale, 10.0);
        assert_eq!(point.vwap_advs, 10.0);
        assert_eq!(point.supply, 40.0);
        assert_eq!(stats, MergeStats { candidates: 3, emitted: 1, dropped: 2 });
    }

    #[test]
    fn test_zero_supply_drops_row() {
        // a fill to zero leaves nothing posted
        let (points, stats) = merge(&[
            Listing::new("x", 1_000, 10.0, 100.0),
            Listing::new("x", 2_000, 10.0, 0.0),
        ]);

        assert!(points.is_empty());
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_every_emitted_row_is_complete() {
        let listings: Vec<Listing> = (0..20i64)
            .flat_map(|i| {
                let ts = i * 60_000;
                vec![
                    Listing::new("a", ts, 6.90 + 0.01 * (i % 3) as f64, 1000.0 - 30.0 * i as f64),
                    Listing::new("b", ts, 6.95, if i % 2 == 0 { 500.0 } else { 480.0 }),
                ]
            })
            .collect();
        let (points, _) = merge(&listings);

        assert!(!points.is_empty());
        for point in &points {
            assert!(point.vwap_sale.is_finite());
            assert!(point.vwap_advs.is_finite());
            assert!(point.demand > 0.0);
            assert!(point.supply > 0.0);
        }
        assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_merge_is_deterministic() {
        let listings = vec![
            Listing::new("b", 2_000, 12.0, 10.0),
            Listing::new("a", 1_000, 10.0, 100.0),
            Listing::new("b", 1_000, 12.0, 50.0),
            Listing::new("a", 2_000, 10.0, 70.0),
        ];
        assert_eq!(merge(&listings), merge(&listings));
    }
}

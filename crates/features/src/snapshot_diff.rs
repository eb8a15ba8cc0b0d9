//! Trade inference from snapshot diffs.
//!
//! A decrease in an advertiser's posted quantity between two of its own
//! consecutive observations is read as a fill of that size at the later
//! price. Increases contribute zero weight. An advertiser's first observation
//! (or the first one after a reset gap) contributes nothing.

use p2p_core::config::SnapshotDiffConfig;
use p2p_core::{InferredTrade, Size, TimestampMs};
use p2p_ingestion::SnapshotBook;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trade-implied statistics at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    /// Sum of inferred weights.
    pub demand: Size,
    /// Weighted average price, undefined when demand is zero.
    pub vwap: Option<f64>,
    /// Advertisers with a defined weight.
    pub contributors: u32,
    /// Advertisers with a positive weight.
    pub fills: u32,
}

/// Accumulator for inferred trades at one timestamp.
#[derive(Debug, Clone, Default)]
struct TradeAccumulator {
    weight_sum: f64,
    weighted_price_sum: f64,
    contributors: u32,
    fills: u32,
    last_fill_price: f64,
}

impl TradeAccumulator {
    fn add(&mut self, trade: &InferredTrade) {
        self.contributors += 1;
        self.weight_sum += trade.weight;
        if trade.weight > 0.0 {
            self.weighted_price_sum += trade.weight * trade.price;
            self.fills += 1;
            self.last_fill_price = trade.price;
        }
    }

    fn vwap(&self) -> Option<f64> {
        if self.weight_sum <= 0.0 {
            return None;
        }
        if self.fills == 1 {
            // w * p / w is not always exactly p in floating point
            return Some(self.last_fill_price);
        }
        Some(self.weighted_price_sum / self.weight_sum)
    }

    fn to_stats(&self) -> TradeStats {
        TradeStats {
            demand: self.weight_sum,
            vwap: self.vwap(),
            contributors: self.contributors,
            fills: self.fills,
        }
    }
}

/// Trade-implied series for one trade side, keyed by timestamp.
#[derive(Debug, Clone, Default)]
pub struct TradeSeries {
    points: BTreeMap<TimestampMs, TradeStats>,
}

impl TradeSeries {
    /// Statistics at a timestamp.
    pub fn get(&self, ts: TimestampMs) -> Option<&TradeStats> {
        self.points.get(&ts)
    }

    /// Iterate in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (TimestampMs, &TradeStats)> {
        self.points.iter().map(|(&ts, stats)| (ts, stats))
    }

    /// Timestamps with at least one defined weight.
    pub fn timestamps(&self) -> impl Iterator<Item = TimestampMs> + '_ {
        self.points.keys().copied()
    }

    /// Number of timestamps.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Derives trade-implied VWAP and demand from a snapshot book.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiffAggregator {
    /// Baseline reset threshold in ms.
    max_gap_ms: Option<i64>,
}

impl SnapshotDiffAggregator {
    /// Create a new aggregator.
    pub fn new(config: &SnapshotDiffConfig) -> Self {
        Self {
            max_gap_ms: config.max_gap_secs.map(|secs| secs.saturating_mul(1_000)),
        }
    }

    /// Inferred trades of one advertiser, in chronological order.
    pub fn advertiser_trades(&self, book: &SnapshotBook, advertiser_id: &str) -> Vec<InferredTrade> {
        let mut trades = Vec::new();
        let mut prev: Option<(TimestampMs, Size)> = None;

        for (ts, point) in book.observations(advertiser_id) {
            let qty = point.tradable_quantity;
            if !qty.is_finite() {
                continue;
            }
            if let Some((prev_ts, prev_qty)) = prev {
                let within_gap = self.max_gap_ms.map_or(true, |gap| ts - prev_ts <= gap);
                if within_gap {
                    trades.push(InferredTrade {
                        timestamp: ts,
                        weight: (prev_qty - qty).max(0.0),
                        price: point.price,
                    });
                }
            }
            prev = Some((ts, qty));
        }

        trades
    }

    /// Aggregate every advertiser's inferred trades per timestamp.
    pub fn aggregate(&self, book: &SnapshotBook) -> TradeSeries {
        let mut accumulators: BTreeMap<TimestampMs, TradeAccumulator> = BTreeMap::new();

        for advertiser_id in book.advertisers() {
            for trade in self.advertiser_trades(book, advertiser_id) {
                accumulators.entry(trade.timestamp).or_default().add(&trade);
            }
        }

        TradeSeries {
            points: accumulators
                .into_iter()
                .map(|(ts, acc)| (ts, acc.to_stats()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use p2p_core::Listing;

    fn book(listings: &[(&str, i64, f64, f64)]) -> SnapshotBook {
        let listings: Vec<Listing> = listings
            .iter()
            .map(|&(id, ts, price, qty)| Listing::new(id, ts, price, qty))
            .collect();
        SnapshotBook::from_listings(&listings)
    }

    #[test]
    fn test_fill_sequence() {
        // quantities [100, 100, 40] at constant price 10
        let book = book(&[
            ("x", 1_000, 10.0, 100.0),
            ("x", 2_000, 10.0, 100.0),
            ("x", 3_000, 10.0, 40.0),
        ]);
        let series = SnapshotDiffAggregator::default().aggregate(&book);

        assert!(series.get(1_000).is_none());

        let t1 = series.get(2_000).unwrap();
        assert_eq!(t1.demand, 0.0);
        assert!(t1.vwap.is_none());

        let t2 = series.get(3_000).unwrap();
        assert_eq!(t2.demand, 60.0);
        assert_eq!(t2.vwap, Some(10.0));
    }

    #[test]
    fn test_increase_contributes_zero() {
        let book = book(&[("x", 1_000, 10.0, 40.0), ("x", 2_000, 10.0, 100.0)]);
        let trades = SnapshotDiffAggregator::default().advertiser_trades(&book, "x");

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].weight, 0.0);
    }

    #[test]
    fn test_single_fill_vwap_is_exact_price() {
        let price = 6.97123456789;
        let book = book(&[
            ("a", 1_000, price, 0.3),
            ("a", 2_000, price, 0.1),
            ("b", 1_000, 7.5, 10.0),
            ("b", 2_000, 7.5, 10.0),
        ]);
        let stats = *SnapshotDiffAggregator::default()
            .aggregate(&book)
            .get(2_000)
            .unwrap();

        assert_eq!(stats.fills, 1);
        assert_eq!(stats.contributors, 2);
        assert_eq!(stats.vwap, Some(price));
    }

    #[test]
    fn test_weighted_across_advertisers() {
        let book = book(&[
            ("a", 1_000, 10.0, 100.0),
            ("a", 2_000, 10.0, 70.0),
            ("b", 1_000, 12.0, 50.0),
            ("b", 2_000, 12.0, 40.0),
        ]);
        let stats = *SnapshotDiffAggregator::default()
            .aggregate(&book)
            .get(2_000)
            .unwrap();

        // (30 * 10 + 10 * 12) / 40
        assert_relative_eq!(stats.demand, 40.0);
        assert_relative_eq!(stats.vwap.unwrap(), 10.5, epsilon = 1e-12);
    }

    #[test]
    fn test_diff_against_own_prior_observation() {
        // "a" is absent at 2_000; its delta at 3_000 is against 1_000
        let book = book(&[
            ("a", 1_000, 10.0, 100.0),
            ("b", 1_000, 11.0, 10.0),
            ("b", 2_000, 11.0, 10.0),
            ("a", 3_000, 10.0, 75.0),
        ]);
        let series = SnapshotDiffAggregator::default().aggregate(&book);

        let t2 = series.get(2_000).unwrap();
        assert_eq!(t2.contributors, 1);
        assert_eq!(t2.demand, 0.0);

        let t3 = series.get(3_000).unwrap();
        assert_eq!(t3.contributors, 1);
        assert_eq!(t3.demand, 25.0);
        assert_eq!(t3.vwap, Some(10.0));
    }

    #[test]
    fn test_gap_resets_baseline() {
        let book = book(&[
            ("a", 0, 10.0, 100.0),
            ("a", 60_000, 10.0, 90.0),
            ("a", 7_260_000, 10.0, 20.0),
        ]);
        let aggregator = SnapshotDiffAggregator::new(&SnapshotDiffConfig {
            max_gap_secs: Some(3_600),
        });
        let trades = aggregator.advertiser_trades(&book, "a");

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].timestamp, 60_000);
        assert_eq!(trades[0].weight, 10.0);

        let last_ever = SnapshotDiffAggregator::default().advertiser_trades(&book, "a");
        assert_eq!(last_ever.len(), 2);
        assert_eq!(last_ever[1].weight, 70.0);
    }

    #[test]
    fn test_demand_is_sum_of_clipped_deltas() {
        let book = book(&[
            ("a", 1_000, 10.0, 100.0),
            ("b", 1_000, 10.0, 5.0),
            ("c", 1_000, 10.0, 50.0),
            ("a", 2_000, 10.0, 60.0),
            ("b", 2_000, 10.0, 25.0),
            ("c", 2_000, 10.0, 49.5),
        ]);
        let stats = *SnapshotDiffAggregator::default()
            .aggregate(&book)
            .get(2_000)
            .unwrap();

        assert!(stats.demand >= 0.0);
        assert_relative_eq!(stats.demand, 40.5);
        assert_eq!(stats.fills, 2);
    }
}

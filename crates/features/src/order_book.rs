//! Listing-implied statistics.
//!
//! Groups raw listings by exact timestamp and computes the quantity-weighted
//! average posted price and the total posted quantity.

use ordered_float::OrderedFloat;
use p2p_core::{Listing, Price, Size, TimestampMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Listing-implied statistics at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookStats {
    /// Total posted quantity.
    pub supply: Size,
    /// Quantity-weighted average price, undefined when supply is zero.
    pub vwap: Option<f64>,
    /// Number of listings at the timestamp.
    pub listing_count: u32,
    /// Lowest posted price.
    pub min_price: Price,
    /// Highest posted price.
    pub max_price: Price,
}

/// Accumulator for listings at one timestamp.
#[derive(Debug, Clone)]
struct BookAccumulator {
    quantity_sum: f64,
    weighted_price_sum: f64,
    listing_count: u32,
    min_price: Price,
    max_price: Price,
}

impl BookAccumulator {
    fn new() -> Self {
        Self {
            quantity_sum: 0.0,
            weighted_price_sum: 0.0,
            listing_count: 0,
            min_price: OrderedFloat(f64::INFINITY),
            max_price: OrderedFloat(f64::NEG_INFINITY),
        }
    }

    fn add(&mut self, price: f64, quantity: Size) {
        self.quantity_sum += quantity;
        self.weighted_price_sum += price * quantity;
        self.listing_count += 1;
        self.min_price = self.min_price.min(OrderedFloat(price));
        self.max_price = self.max_price.max(OrderedFloat(price));
    }

    fn vwap(&self) -> Option<f64> {
        if self.quantity_sum != 0.0 {
            Some(self.weighted_price_sum / self.quantity_sum)
        } else {
            None
        }
    }

    fn to_stats(&self) -> BookStats {
        BookStats {
            supply: self.quantity_sum,
            vwap: self.vwap(),
            listing_count: self.listing_count,
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

/// Listing-implied series for one trade side, keyed by timestamp.
#[derive(Debug, Clone, Default)]
pub struct BookSeries {
    points: BTreeMap<TimestampMs, BookStats>,
}

impl BookSeries {
    /// Statistics at a timestamp.
    pub fn get(&self, ts: TimestampMs) -> Option<&BookStats> {
        self.points.get(&ts)
    }

    /// Iterate in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (TimestampMs, &BookStats)> {
        self.points.iter().map(|(&ts, stats)| (ts, stats))
    }

    /// Timestamps with at least one listing.
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

/// Derives listing-implied VWAP and supply from raw listings.
#[derive(Debug, Clone, Default)]
pub struct OrderBookAggregator;

impl OrderBookAggregator {
    /// Create a new aggregator.
    pub fn new() -> Self {
        Self
    }

    /// Aggregate raw listings by exact timestamp.
    ///
    /// Duplicate rows for one advertiser are all counted.
    pub fn aggregate(&self, listings: &[Listing]) -> BookSeries {
        let mut accumulators: BTreeMap<TimestampMs, BookAccumulator> = BTreeMap::new();

        for listing in listings {
            accumulators
                .entry(listing.timestamp)
                .or_insert_with(BookAccumulator::new)
                .add(listing.price, listing.tradable_quantity);
        }

        BookSeries {
            points: accumulators
                .into_iter()
                .map(|(ts, acc)| (ts, acc.to_stats()))
                .collect(),
        }
    }
}

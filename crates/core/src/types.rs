//! Core data types for the p2p-series system.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Price type with ordering support.
pub type Price = OrderedFloat<f64>;

/// Size/quantity type.
pub type Size = f64;

/// Output format for aggregated series timestamps.
pub const ISO_UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Convert a millisecond timestamp to a UTC datetime.
#[inline]
pub fn ts_to_datetime(ts_ms: TimestampMs) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts_ms)
}

/// Format a millisecond timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_iso_utc(ts_ms: TimestampMs) -> Option<String> {
    ts_to_datetime(ts_ms).map(|dt| dt.format(ISO_UTC_FORMAT).to_string())
}

/// Round to `dp` decimal places, ties to even.
#[inline]
pub fn round_dp(value: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    (value * scale).round_ties_even() / scale
}

/// Trade side of a posted listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    /// Advertiser buys the asset.
    Buy,
    /// Advertiser sells the asset.
    Sell,
}

impl TradeSide {
    /// Wire representation used by the listing dataset.
    pub fn as_str(self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            other => Err(Error::parse(format!("unknown trade side '{other}'"))),
        }
    }
}

/// A posted offer in the P2P order book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Advertiser identifier.
    pub advertiser_id: String,
    /// Observation timestamp in milliseconds.
    pub timestamp: TimestampMs,
    /// Posted price.
    pub price: f64,
    /// Remaining tradable quantity.
    pub tradable_quantity: Size,
}

impl Listing {
    /// Create a new listing.
    pub fn new(
        advertiser_id: impl Into<String>,
        timestamp: TimestampMs,
        price: f64,
        tradable_quantity: Size,
    ) -> Self {
        Self {
            advertiser_id: advertiser_id.into(),
            timestamp,
            price,
            tradable_quantity,
        }
    }
}

/// Last observed (price, quantity) of one advertiser at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPoint {
    /// Posted price.
    pub price: f64,
    /// Remaining tradable quantity.
    pub tradable_quantity: Size,
}

/// Trade inferred from a decrease in an advertiser's posted quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferredTrade {
    /// Timestamp of the later observation.
    pub timestamp: TimestampMs,
    /// Clipped quantity decrease, never negative.
    pub weight: Size,
    /// Price at the later observation.
    pub price: f64,
}

/// One fully defined row of the primary series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    /// Timestamp in milliseconds.
    pub timestamp: TimestampMs,
    /// Trade-implied VWAP.
    pub vwap_sale: f64,
    /// Listing-implied VWAP.
    pub vwap_advs: f64,
    /// Inferred traded quantity.
    pub demand: Size,
    /// Posted quantity.
    pub supply: Size,
}

/// One official reference rate sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceObservation {
    /// Wall-clock timestamp without timezone.
    pub timestamp: NaiveDateTime,
    /// Official rate.
    pub value: f64,
}

/// One exchange-derived rate sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeObservation {
    /// Timezone-aware timestamp.
    pub timestamp: DateTime<FixedOffset>,
    /// Exchange-derived rate (the `vwap` column of the source).
    pub value: f64,
}

/// Exchange rate minus the reference rate in effect at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualPoint {
    /// Exchange observation timestamp, offset preserved.
    pub timestamp: DateTime<FixedOffset>,
    /// Residual rounded to 2 decimal places.
    pub value: f64,
}

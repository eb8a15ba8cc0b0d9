//! Series computation for the p2p-series system.
//!
//! This crate handles:
//! - Trade-implied VWAP and demand from snapshot diffs
//! - Listing-implied VWAP and supply from posted offers
//! - Exact-timestamp alignment with a completeness filter
//! - Backward asof residuals against a reference series

pub mod snapshot_diff;
pub mod order_book;
pub mod merger;
pub mod asof;
pub mod engine;

pub use snapshot_diff::{SnapshotDiffAggregator, TradeSeries, TradeStats};
pub use order_book::{BookSeries, BookStats, OrderBookAggregator};
pub use merger::{MergeStats, SeriesMerger};
pub use asof::{AsofResidualCalculator, ResidualStats};
pub use engine::{ResidualSeries, SeriesEngine, SideSeries};

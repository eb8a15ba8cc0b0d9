//! Series computation engine.
//!
//! Combines the aggregators, the merger and the residual calculator into the
//! two pipelines of a run: the per-side primary series and the per-kind
//! residual series.

use crate::{
    asof::{AsofResidualCalculator, ResidualStats},
    merger::{MergeStats, SeriesMerger},
    order_book::OrderBookAggregator,
    snapshot_diff::SnapshotDiffAggregator,
};
use p2p_core::{
    AggregatedPoint, Config, ExchangeObservation, Listing, ReferenceObservation, ResidualPoint,
};
use p2p_ingestion::SnapshotBook;
use tracing::{debug, info};

/// Primary series of one trade side.
#[derive(Debug, Clone)]
pub struct SideSeries {
    /// Complete rows in timestamp order.
    pub points: Vec<AggregatedPoint>,
    /// Merge counts.
    pub stats: MergeStats,
}

/// Residual series of one statistic kind.
#[derive(Debug, Clone)]
pub struct ResidualSeries {
    /// Residual rows in join-key order.
    pub points: Vec<ResidualPoint>,
    /// Join counts.
    pub stats: ResidualStats,
}

/// Series computation engine.
pub struct SeriesEngine {
    /// Trade-implied statistics.
    snapshot_diff: SnapshotDiffAggregator,
    /// Listing-implied statistics.
    order_book: OrderBookAggregator,
    /// Residual calculator.
    asof: AsofResidualCalculator,
}

impl SeriesEngine {
    /// Create a new engine from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            snapshot_diff: SnapshotDiffAggregator::new(&config.snapshot_diff),
            order_book: OrderBookAggregator::new(),
            asof: AsofResidualCalculator::new(&config.asof),
        }
    }

    /// Compute the primary series from one side's listings.
    pub fn aggregate_side(&self, listings: &[Listing]) -> SideSeries {
        let book = SnapshotBook::from_listings(listings);
        let trades = self.snapshot_diff.aggregate(&book);
        let listed = self.order_book.aggregate(listings);

        for (ts, stats) in listed.iter() {
            debug!(
                ts,
                listings = stats.listing_count,
                min_price = stats.min_price.0,
                max_price = stats.max_price.0,
                supply = stats.supply,
                "book snapshot"
            );
        }

        let (points, stats) = SeriesMerger::merge(&trades, &listed);
        info!(
            listings = listings.len(),
            snapshots = book.len(),
            advertisers = book.advertisers().count(),
            emitted = stats.emitted,
            dropped = stats.dropped,
            "primary series aggregated"
        );

        SideSeries { points, stats }
    }

    /// Compute the residual of an exchange series against a reference series.
    pub fn residual(
        &self,
        reference: &[ReferenceObservation],
        exchange: &[ExchangeObservation],
    ) -> ResidualSeries {
        let (points, stats) = self.asof.compute(reference, exchange);
        info!(
            reference = reference.len(),
            exchange = stats.exchange_rows,
            emitted = stats.emitted,
            unmatched = stats.unmatched,
            undefined = stats.undefined,
            "residual series computed"
        );

        ResidualSeries { points, stats }
    }
}

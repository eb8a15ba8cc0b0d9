//! Data ingestion for the p2p-series system.
//!
//! This crate handles:
//! - Fetching remote or local sources
//! - Reading the order-book listing dataset (parquet via DuckDB)
//! - Parsing reference and exchange rate CSVs
//! - Collapsing listings into a sparse per-advertiser snapshot book

pub mod fetch;
pub mod listings;
pub mod rates;
pub mod snapshot;

pub use fetch::Fetcher;
pub use listings::{ListingSource, ListingTable};
pub use rates::RateSource;
pub use snapshot::SnapshotBook;

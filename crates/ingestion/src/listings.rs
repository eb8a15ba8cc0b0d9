//! Order-book listing dataset.
//!
//! The dataset is a parquet file with one row per observed listing. It is read
//! once per run through an in-memory DuckDB connection and then filtered per
//! asset and trade side.

use crate::fetch::Fetcher;
use p2p_core::config::ListingConfig;
use p2p_core::{Error, Listing, Result, TimestampMs, TradeSide};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One dataset row with the columns used for filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    /// Asset code (e.g., "USDT").
    pub asset: String,
    /// Trade side.
    pub side: TradeSide,
    /// The listing itself.
    pub listing: Listing,
}

/// The full listing dataset held in memory, in source order.
#[derive(Debug, Clone, Default)]
pub struct ListingTable {
    rows: Vec<ListingRow>,
}

impl ListingTable {
    /// Wrap already materialized rows.
    pub fn from_rows(rows: Vec<ListingRow>) -> Self {
        Self { rows }
    }

    /// Listings for one asset and side, in source order.
    pub fn select(&self, asset: &str, side: TradeSide) -> Vec<Listing> {
        self.rows
            .iter()
            .filter(|row| row.side == side && row.asset == asset)
            .map(|row| row.listing.clone())
            .collect()
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parquet-backed listing source.
pub struct ListingSource {
    location: String,
    cache_dir: PathBuf,
}

impl ListingSource {
    /// Create a new listing source.
    pub fn new(location: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Create a listing source from configuration.
    pub fn from_config(config: &ListingConfig) -> Self {
        Self::new(config.location.clone(), config.cache_dir.clone())
    }

    /// Fetch and read the whole dataset.
    pub fn fetch(&self, fetcher: &Fetcher) -> Result<ListingTable> {
        let path = fetcher.fetch_to_file(&self.location, &self.cache_dir)?;
        let table = read_parquet(&path)?;
        info!(source = %self.location, rows = table.len(), "listings loaded");
        Ok(table)
    }
}

/// Read a listing parquet file.
///
/// Rows with a null key column are skipped. Rows with an unknown trade side
/// are skipped with a warning.
pub fn read_parquet(path: &Path) -> Result<ListingTable> {
    let unavailable = |e: duckdb::Error| Error::source_unavailable(format!("{}: {e}", path.display()));

    let conn = duckdb::Connection::open_in_memory().map_err(unavailable)?;
    let sql = format!(
        r#"
        SELECT
            CAST(advertiser_userno AS VARCHAR),
            CAST(tradetype AS VARCHAR),
            CAST(asset AS VARCHAR),
            epoch_ms(CAST("timestamp" AS TIMESTAMP)),
            CAST(price AS DOUBLE),
            CAST(tradablequantity AS DOUBLE)
        FROM read_parquet('{}')
        WHERE advertiser_userno IS NOT NULL
          AND tradetype IS NOT NULL
          AND asset IS NOT NULL
          AND "timestamp" IS NOT NULL
          AND price IS NOT NULL
          AND tradablequantity IS NOT NULL
        "#,
        sql_quote(&path.to_string_lossy())
    );

    let mut stmt = conn.prepare(&sql).map_err(unavailable)?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, TimestampMs>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })
        .map_err(unavailable)?;

    let mut rows = Vec::new();
    let mut unknown_side = 0usize;
    for item in raw {
        let (advertiser_id, side, asset, timestamp, price, tradable_quantity) =
            item.map_err(unavailable)?;
        let Ok(side) = side.parse::<TradeSide>() else {
            unknown_side += 1;
            continue;
        };
        rows.push(ListingRow {
            asset,
            side,
            listing: Listing {
                advertiser_id,
                timestamp,
                price,
                tradable_quantity,
            },
        });
    }

    if unknown_side > 0 {
        warn!(skipped = unknown_side, "rows with unknown trade side");
    }

    Ok(ListingTable::from_rows(rows))
}

/// Escape a string for use inside a single-quoted SQL literal.
fn sql_quote(value: &str) -> String {
    value.replace('\'', "''")
}

//! Reference and exchange rate CSV sources.
//!
//! Reference CSVs carry `timestamp,value` with naive wall-clock timestamps.
//! Exchange CSVs carry a timezone-aware `timestamp` and the rate in `vwap`.
//! Other columns are ignored. An empty value parses as NaN so that it never
//! produces a residual.

use crate::fetch::Fetcher;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use p2p_core::config::RatesConfig;
use p2p_core::{Error, ExchangeObservation, ReferenceObservation, Result};
use tracing::info;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const AWARE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Fetches reference and exchange series per statistic kind.
pub struct RateSource<'a> {
    fetcher: &'a Fetcher,
    config: &'a RatesConfig,
}

impl<'a> RateSource<'a> {
    /// Create a new rate source.
    pub fn new(fetcher: &'a Fetcher, config: &'a RatesConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetch the official reference series for `kind`.
    pub fn reference(&self, kind: &str) -> Result<Vec<ReferenceObservation>> {
        let location = self.config.reference_location(kind);
        let text = self.fetcher.fetch_text(&location)?;
        let series = parse_reference_csv(&text)
            .map_err(|e| Error::parse(format!("{location}: {e}")))?;
        info!(kind, rows = series.len(), "reference series loaded");
        Ok(series)
    }

    /// Fetch the exchange-derived series for `kind`.
    pub fn exchange(&self, kind: &str) -> Result<Vec<ExchangeObservation>> {
        let location = self.config.exchange_location(kind);
        let text = self.fetcher.fetch_text(&location)?;
        let series = parse_exchange_csv(&text)
            .map_err(|e| Error::parse(format!("{location}: {e}")))?;
        info!(kind, rows = series.len(), "exchange series loaded");
        Ok(series)
    }
}

/// Parse a reference CSV (`timestamp`, `value`).
pub fn parse_reference_csv(text: &str) -> Result<Vec<ReferenceObservation>> {
    parse_columns(text, "timestamp", "value", |ts, value| {
        Ok(ReferenceObservation {
            timestamp: parse_naive_timestamp(ts)?,
            value,
        })
    })
}

/// Parse an exchange CSV (`timestamp`, `vwap`).
pub fn parse_exchange_csv(text: &str) -> Result<Vec<ExchangeObservation>> {
    parse_columns(text, "timestamp", "vwap", |ts, value| {
        Ok(ExchangeObservation {
            timestamp: parse_aware_timestamp(ts)?,
            value,
        })
    })
}

fn parse_columns<T, F>(text: &str, ts_column: &str, value_column: &str, build: F) -> Result<Vec<T>>
where
    F: Fn(&str, f64) -> Result<T>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::parse(format!("header: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::parse(format!("missing column '{name}'")))
    };
    let ts_idx = column(ts_column)?;
    let value_idx = column(value_column)?;

    let mut out = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::parse(format!("row {}: {e}", line + 1)))?;
        let ts = record.get(ts_idx).unwrap_or_default();
        let value = parse_value(record.get(value_idx).unwrap_or_default())
            .map_err(|e| Error::parse(format!("row {}: {e}", line + 1)))?;
        let item = build(ts, value).map_err(|e| Error::parse(format!("row {}: {e}", line + 1)))?;
        out.push(item);
    }
    Ok(out)
}

fn parse_value(raw: &str) -> Result<f64> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|e| Error::parse(format!("value '{raw}': {e}")))
}

/// Parse a naive wall-clock timestamp.
///
/// An explicit offset, if present, is dropped and the local time kept.
pub fn parse_naive_timestamp(raw: &str) -> Result<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }
    parse_offset_timestamp(raw)
        .map(|ts| ts.naive_local())
        .ok_or_else(|| Error::parse(format!("timestamp '{raw}'")))
}

/// Parse a timezone-aware timestamp. A timestamp without offset is taken as UTC.
pub fn parse_aware_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    if let Some(ts) = parse_offset_timestamp(raw) {
        return Ok(ts);
    }
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&ts).fixed_offset());
        }
    }
    Err(Error::parse(format!("timestamp '{raw}'")))
}

fn parse_offset_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    AWARE_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
}

//! Output table rows.
//!
//! Each row type knows its CSV rendering and serializes to the JSON record
//! sent to the persistence sink.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use p2p_core::{
    format_iso_utc, AggregatedPoint, Error, ReferenceObservation, ResidualPoint, Result,
    TimestampMs,
};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Reference timestamp format in CSV output.
pub const REFERENCE_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Residual timestamp format in CSV output.
pub const RESIDUAL_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// A row of an output table.
pub trait TableRow: Serialize {
    /// CSV header.
    const HEADER: &'static [&'static str];

    /// CSV fields, in header order.
    fn csv_fields(&self) -> Vec<String>;
}

/// Primary series row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecord {
    /// `YYYY-MM-DDTHH:MM:SSZ`.
    pub timestamp: String,
    pub vwap_sale: f64,
    pub vwap_advs: f64,
    pub demand: f64,
    pub supply: f64,
}

impl TryFrom<&AggregatedPoint> for AggregatedRecord {
    type Error = Error;

    fn try_from(point: &AggregatedPoint) -> Result<Self> {
        Ok(Self {
            timestamp: iso_timestamp(point.timestamp)?,
            vwap_sale: point.vwap_sale,
            vwap_advs: point.vwap_advs,
            demand: point.demand,
            supply: point.supply,
        })
    }
}

impl TableRow for AggregatedRecord {
    const HEADER: &'static [&'static str] =
        &["timestamp", "vwap_sale", "vwap_advs", "demand", "supply"];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            format_float(self.vwap_sale),
            format_float(self.vwap_advs),
            format_float(self.demand),
            format_float(self.supply),
        ]
    }
}

/// Reference series row, passed through as read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceRecord {
    pub timestamp: NaiveDateTime,
    /// `None` when the source value was empty.
    pub value: Option<f64>,
}

impl From<&ReferenceObservation> for ReferenceRecord {
    fn from(obs: &ReferenceObservation) -> Self {
        Self {
            timestamp: obs.timestamp,
            value: obs.value.is_finite().then_some(obs.value),
        }
    }
}

impl TableRow for ReferenceRecord {
    const HEADER: &'static [&'static str] = &["timestamp", "value"];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.timestamp.format(REFERENCE_TS_FORMAT).to_string(),
            self.value.map(format_float).unwrap_or_default(),
        ]
    }
}

/// Residual series row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
}

impl From<&ResidualPoint> for ResidualRecord {
    fn from(point: &ResidualPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            value: point.value,
        }
    }
}

impl TableRow for ResidualRecord {
    const HEADER: &'static [&'static str] = &["timestamp", "value"];

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.timestamp.format(RESIDUAL_TS_FORMAT).to_string(),
            format!("{:.2}", self.value),
        ]
    }
}

/// A named table ready for CSV output and sink upsert.
#[derive(Debug, Clone)]
pub struct OutputTable {
    /// Table name, also the CSV file stem.
    pub name: String,
    /// CSV header.
    pub header: &'static [&'static str],
    /// CSV rows.
    pub rows: Vec<Vec<String>>,
    /// Row-oriented sink records.
    pub records: Vec<serde_json::Value>,
}

impl OutputTable {
    /// Render rows into a table.
    pub fn from_rows<R: TableRow>(name: impl Into<String>, rows: &[R]) -> Result<Self> {
        let records = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.into(),
            header: R::HEADER,
            rows: rows.iter().map(R::csv_fields).collect(),
            records,
        })
    }

    /// Primary series table.
    pub fn aggregated(name: impl Into<String>, points: &[AggregatedPoint]) -> Result<Self> {
        let rows = points
            .iter()
            .map(AggregatedRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        let name = name.into();

        let collisions = colliding_keys(&rows);
        if !collisions.is_empty() {
            warn!(
                table = %name,
                count = collisions.len(),
                first = %collisions[0],
                "distinct timestamps share a second-resolution key; sink upsert will conflict"
            );
        }
        Self::from_rows(name, &rows)
    }

    /// Reference series table.
    pub fn reference(name: impl Into<String>, observations: &[ReferenceObservation]) -> Result<Self> {
        let rows: Vec<ReferenceRecord> = observations.iter().map(ReferenceRecord::from).collect();
        Self::from_rows(name, &rows)
    }

    /// Residual series table.
    pub fn residual(name: impl Into<String>, points: &[ResidualPoint]) -> Result<Self> {
        let rows: Vec<ResidualRecord> = points.iter().map(ResidualRecord::from).collect();
        Self::from_rows(name, &rows)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn iso_timestamp(ts: TimestampMs) -> Result<String> {
    format_iso_utc(ts).ok_or_else(|| Error::data(format!("timestamp {ts} out of range")))
}

/// Keys rendered more than once, in first-seen order.
fn colliding_keys(rows: &[AggregatedRecord]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    rows.iter()
        .map(|row| row.timestamp.as_str())
        .filter(|key| !seen.insert(*key) && reported.insert(*key))
        .collect()
}

/// Shortest round-trip representation, with a trailing `.0` for integers.
fn format_float(value: f64) -> String {
    let s = value.to_string();
    if value.is_finite() && !s.contains(['.', 'e', 'E']) {
        format!("{s}.0")
    } else {
        s
    }
}

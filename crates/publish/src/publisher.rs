//! Table publication.
//!
//! Every table is written to CSV, then upserted to the sink when one is
//! configured. A CSV failure aborts; a sink failure is logged and recorded
//! for that table only, and publication continues with the next table.

use crate::csv_writer::CsvWriter;
use crate::records::OutputTable;
use crate::sink::{self, TableSink};
use p2p_core::config::SinkConfig;
use p2p_core::Result;
use std::path::PathBuf;
use tracing::{info, warn};

/// A sink failure for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    /// Table name.
    pub table: String,
    /// Error message.
    pub error: String,
}

/// Outcome of a publication run.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    /// CSV files written.
    pub written: Vec<PathBuf>,
    /// Tables upserted with their record counts.
    pub upserted: Vec<(String, usize)>,
    /// Tables whose upsert failed.
    pub failures: Vec<TableFailure>,
}

impl PublishReport {
    /// Whether every upsert succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sink side of a publisher.
enum SinkState {
    /// CSV only.
    Disabled,
    /// Backend open.
    Ready(Box<dyn TableSink>),
    /// Backend could not be opened; every table is reported as failed.
    Unavailable(String),
}

/// Writes tables to CSV and, optionally, to a persistence sink.
pub struct Publisher {
    csv: CsvWriter,
    sink: SinkState,
    conflict_column: String,
}

impl Publisher {
    /// Create a publisher. `sink` is `None` unless uploading.
    pub fn new(
        csv: CsvWriter,
        sink: Option<Box<dyn TableSink>>,
        conflict_column: impl Into<String>,
    ) -> Self {
        Self {
            csv,
            sink: sink.map_or(SinkState::Disabled, SinkState::Ready),
            conflict_column: conflict_column.into(),
        }
    }

    /// Create a publisher uploading to the sink described by `config`.
    ///
    /// Incomplete sink configuration is an error. A backend that fails to
    /// open only fails the upserts; CSV output proceeds.
    pub fn connect(csv: CsvWriter, config: &SinkConfig) -> Result<Self> {
        config.validate()?;
        let sink = match sink::open(config) {
            Ok(sink) => SinkState::Ready(sink),
            Err(e) => {
                warn!(kind = ?config.kind, error = %e, "sink unavailable, writing CSV only");
                SinkState::Unavailable(e.to_string())
            }
        };
        Ok(Self {
            csv,
            sink,
            conflict_column: config.conflict_column.clone(),
        })
    }

    /// Publish one table into `report`.
    pub fn publish(&mut self, table: &OutputTable, report: &mut PublishReport) -> Result<()> {
        report.written.push(self.csv.write(table)?);

        let sink = match &mut self.sink {
            SinkState::Disabled => return Ok(()),
            SinkState::Unavailable(reason) => {
                report.failures.push(TableFailure {
                    table: table.name.clone(),
                    error: reason.clone(),
                });
                return Ok(());
            }
            SinkState::Ready(sink) => sink,
        };
        match sink.upsert(&table.name, &table.records, &self.conflict_column) {
            Ok(count) => {
                info!(table = %table.name, sink = sink.name(), records = count, "upserted");
                report.upserted.push((table.name.clone(), count));
            }
            Err(e) => {
                warn!(table = %table.name, sink = sink.name(), error = %e, "upsert failed");
                report.failures.push(TableFailure {
                    table: table.name.clone(),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Publish tables in order.
    pub fn publish_all(&mut self, tables: &[OutputTable]) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        for table in tables {
            self.publish(table, &mut report)?;
        }
        Ok(report)
    }
}

//! Output publication for the p2p-series system.
//!
//! This crate provides:
//! - Output row types and their CSV rendering
//! - One CSV file per table
//! - Upsert sinks (PostgREST, SQLite)
//! - Per-table failure isolation for sink writes

pub mod records;
pub mod csv_writer;
pub mod sink;
pub mod publisher;

pub use records::OutputTable;
pub use csv_writer::CsvWriter;
pub use sink::{PostgrestSink, SqliteSink, TableSink};
pub use publisher::{PublishReport, Publisher, TableFailure};

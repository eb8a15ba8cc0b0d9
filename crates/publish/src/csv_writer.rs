//! CSV output, one file per table.

use crate::records::OutputTable;
use p2p_core::Result;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Writes output tables as `<dir>/<name>.csv`.
pub struct CsvWriter {
    dir: PathBuf,
}

impl CsvWriter {
    /// Create a new writer.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a table is written to.
    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }

    /// Write a table, replacing any existing file.
    pub fn write(&self, table: &OutputTable) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&table.name);

        let mut writer = csv::Writer::from_path(&path).map_err(std::io::Error::from)?;
        writer.write_record(table.header).map_err(std::io::Error::from)?;
        for row in &table.rows {
            writer.write_record(row).map_err(std::io::Error::from)?;
        }
        writer.flush()?;

        info!(table = %table.name, rows = table.len(), path = %path.display(), "csv written");
        Ok(path)
    }
}

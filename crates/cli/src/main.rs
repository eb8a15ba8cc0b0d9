//! `p2p-series`: builds the P2P USDT/BOB series and the reference residuals.
//!
//! CSV files are always written. With `--upload`, every table is also
//! upserted to the configured sink; a failed upsert is reported and the run
//! continues.

mod pipeline;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use p2p_core::Config;
use p2p_publish::{CsvWriter, Publisher};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "p2p-series",
    version,
    about = "Build P2P USDT/BOB price and volume series and their residual against the official rate."
)]
struct Cli {
    /// Upsert the tables to the persistence sink (CSV only by default).
    #[arg(long)]
    upload: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing("info");

    let config = Config::from_env().context("loading configuration")?;
    let csv = CsvWriter::new(&config.output.dir);
    let mut publisher = if cli.upload {
        Publisher::connect(csv, &config.sink).context("configuring persistence sink")?
    } else {
        Publisher::new(csv, None, config.sink.conflict_column.clone())
    };
    let report = pipeline::run(&config, &mut publisher).context("pipeline run failed")?;

    for failure in &report.failures {
        warn!(table = %failure.table, error = %failure.error, "table not uploaded");
    }
    info!(
        csv = report.written.len(),
        uploaded = report.upserted.len(),
        failed = report.failures.len(),
        "done"
    );

    Ok(())
}

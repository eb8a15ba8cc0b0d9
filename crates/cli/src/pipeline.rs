//! One pipeline run: fetch every source, compute every table, publish.

use p2p_core::{Config, ExchangeObservation, ReferenceObservation, Result};
use p2p_features::SeriesEngine;
use p2p_ingestion::{Fetcher, ListingSource, ListingTable, RateSource};
use p2p_publish::{OutputTable, PublishReport, Publisher};
use tracing::info;

/// Reference and exchange series of one statistic kind.
pub struct RateInputs {
    pub kind: String,
    pub reference: Vec<ReferenceObservation>,
    pub exchange: Vec<ExchangeObservation>,
}

/// Everything a run computes on, fully materialized.
pub struct Inputs {
    pub listings: ListingTable,
    pub rates: Vec<RateInputs>,
}

/// Fetch all sources. Any failure aborts before output is produced.
pub fn fetch_inputs(config: &Config) -> Result<Inputs> {
    let fetcher = Fetcher::new()?;
    let listings = ListingSource::from_config(&config.listings).fetch(&fetcher)?;

    let source = RateSource::new(&fetcher, &config.rates);
    let rates = config
        .rates
        .kinds
        .iter()
        .map(|kind| {
            Ok(RateInputs {
                kind: kind.clone(),
                reference: source.reference(kind)?,
                exchange: source.exchange(kind)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Inputs { listings, rates })
}

/// Compute every output table, primary series first.
pub fn build_tables(config: &Config, inputs: &Inputs) -> Result<Vec<OutputTable>> {
    let engine = SeriesEngine::new(config);
    let mut tables = Vec::new();

    for side_table in &config.listings.tables {
        let listings = inputs
            .listings
            .select(&config.listings.asset, side_table.side);
        info!(side = %side_table.side, table = %side_table.table, "aggregating");
        let series = engine.aggregate_side(&listings);
        tables.push(OutputTable::aggregated(&side_table.table, &series.points)?);
    }

    for rates in &inputs.rates {
        info!(kind = %rates.kind, "computing residual");
        let residual = engine.residual(&rates.reference, &rates.exchange);
        tables.push(OutputTable::reference(
            config.rates.reference_table(&rates.kind),
            &rates.reference,
        )?);
        tables.push(OutputTable::residual(
            config.rates.residual_table(&rates.kind),
            &residual.points,
        )?);
    }

    Ok(tables)
}

/// Run the whole pipeline.
pub fn run(config: &Config, publisher: &mut Publisher) -> Result<PublishReport> {
    let inputs = fetch_inputs(config)?;
    let tables = build_tables(config, &inputs)?;
    publisher.publish_all(&tables)
}

//! Configuration structures for the p2p-series system.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::TradeSide;

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listing dataset configuration.
    pub listings: ListingConfig,
    /// Reference/exchange rate sources.
    pub rates: RatesConfig,
    /// Snapshot diff configuration.
    pub snapshot_diff: SnapshotDiffConfig,
    /// Asof join configuration.
    pub asof: AsofConfig,
    /// CSV output configuration.
    pub output: OutputConfig,
    /// Persistence sink configuration.
    pub sink: SinkConfig,
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults overridden by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(location) = lookup("P2P_LISTINGS") {
            config.listings.location = location;
        }
        if let Some(asset) = lookup("P2P_ASSET") {
            config.listings.asset = asset;
        }
        if let Some(dir) = lookup("P2P_CACHE_DIR") {
            config.listings.cache_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("P2P_RATES_BASE_URL") {
            config.rates.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = lookup("P2P_OUTPUT_DIR") {
            config.output.dir = PathBuf::from(dir);
        }
        if let Some(gap) = lookup("P2P_MAX_GAP_SECS") {
            let secs = gap
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::config(format!("P2P_MAX_GAP_SECS '{gap}': {e}")))?;
            if secs <= 0 {
                return Err(Error::config("P2P_MAX_GAP_SECS must be positive"));
            }
            config.snapshot_diff.max_gap_secs = Some(secs);
        }
        if let Some(basis) = lookup("P2P_EXCHANGE_BASIS") {
            config.asof.exchange_basis = match basis.trim().to_ascii_lowercase().as_str() {
                "local" => ExchangeBasis::Local,
                "utc" => ExchangeBasis::Utc,
                other => return Err(Error::config(format!("unknown exchange basis '{other}'"))),
            };
        }
        if let Some(kind) = lookup("P2P_SINK_KIND") {
            config.sink.kind = match kind.trim().to_ascii_lowercase().as_str() {
                "postgrest" => SinkKind::Postgrest,
                "sqlite" => SinkKind::Sqlite,
                other => return Err(Error::config(format!("unknown sink kind '{other}'"))),
            };
        }
        config.sink.url = lookup("SUPABASE_URL").or(config.sink.url);
        config.sink.key = lookup("SUPABASE_SERVICE_ROLE_KEY").or(config.sink.key);

        Ok(config)
    }
}

/// Output table for one trade side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideTable {
    /// Listing side.
    pub side: TradeSide,
    /// Output table name.
    pub table: String,
}

/// Listing dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Parquet path or http(s) URL.
    pub location: String,
    /// Asset to keep (e.g., "USDT").
    pub asset: String,
    /// Download directory for remote datasets.
    pub cache_dir: PathBuf,
    /// Side to table mapping. Advertisers buying USDT are the market's dollar sellers.
    pub tables: Vec<SideTable>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            location: "advice.parquet".to_string(),
            asset: "USDT".to_string(),
            cache_dir: std::env::temp_dir().join("p2p-series"),
            tables: vec![
                SideTable {
                    side: TradeSide::Buy,
                    table: "dolar_sell".to_string(),
                },
                SideTable {
                    side: TradeSide::Sell,
                    table: "dolar_buy".to_string(),
                },
            ],
        }
    }
}

/// Reference and exchange rate source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Base URL (or directory) holding `{kind}.csv` and `{kind}_oficial.csv`.
    pub base_url: String,
    /// Statistic kinds to process.
    pub kinds: Vec<String>,
    /// Output table prefix for the reference series.
    pub reference_prefix: String,
    /// Output table prefix for the residual series.
    pub residual_prefix: String,
}

impl RatesConfig {
    /// Location of the reference CSV for `kind`.
    pub fn reference_location(&self, kind: &str) -> String {
        format!("{}/{kind}_oficial.csv", self.base_url)
    }

    /// Location of the exchange-derived CSV for `kind`.
    pub fn exchange_location(&self, kind: &str) -> String {
        format!("{}/{kind}.csv", self.base_url)
    }

    /// Output table name of the reference series for `kind`.
    pub fn reference_table(&self, kind: &str) -> String {
        format!("{}{kind}", self.reference_prefix)
    }

    /// Output table name of the residual series for `kind`.
    pub fn residual_table(&self, kind: &str) -> String {
        format!("{}{kind}", self.residual_prefix)
    }
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://raw.githubusercontent.com/mauforonda/dolares/refs/heads/main"
                .to_string(),
            kinds: vec!["sell".to_string(), "buy".to_string()],
            reference_prefix: "dolar_referencial_".to_string(),
            residual_prefix: "dolar_diferencia_referencial_binance_".to_string(),
        }
    }
}

/// Snapshot diff configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDiffConfig {
    /// Maximum gap between an advertiser's observations before its
    /// quantity baseline resets. `None` keeps the last-ever observation.
    pub max_gap_secs: Option<i64>,
}

/// How timezone-aware exchange timestamps become wall-clock instants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeBasis {
    /// Drop the offset and keep the local wall-clock time.
    #[default]
    Local,
    /// Convert to UTC before dropping the offset.
    Utc,
}

/// Asof join configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsofConfig {
    /// Exchange timestamp normalization.
    pub exchange_basis: ExchangeBasis,
}

/// CSV output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one CSV per table.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

/// Persistence sink backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Supabase / PostgREST HTTP upsert.
    #[default]
    Postgrest,
    /// Local SQLite database file (`url` is the path).
    Sqlite,
}

/// Persistence sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Backend.
    pub kind: SinkKind,
    /// Service URL, or database path for SQLite.
    pub url: Option<String>,
    /// Service role key. Not needed for SQLite.
    #[serde(skip_serializing)]
    pub key: Option<String>,
    /// Conflict target for upserts.
    pub conflict_column: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            url: None,
            key: None,
            conflict_column: "timestamp".to_string(),
        }
    }
}

impl SinkConfig {
    /// Check that everything the selected backend needs is present.
    pub fn validate(&self) -> Result<()> {
        let url = self.url.as_deref().unwrap_or_default();
        if url.trim().is_empty() {
            return Err(Error::config("sink URL is not set (SUPABASE_URL)"));
        }
        if self.kind == SinkKind::Postgrest
            && self.key.as_deref().unwrap_or_default().trim().is_empty()
        {
            return Err(Error::config(
                "sink key is not set (SUPABASE_SERVICE_ROLE_KEY)",
            ));
        }
        if self.conflict_column.trim().is_empty() {
            return Err(Error::config("sink conflict column is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listings.asset, "USDT");
        assert_eq!(config.listings.tables.len(), 2);
        assert_eq!(config.listings.tables[0].side, TradeSide::Buy);
        assert_eq!(config.listings.tables[0].table, "dolar_sell");
        assert_eq!(config.rates.kinds, vec!["sell", "buy"]);
        assert!(config.snapshot_diff.max_gap_secs.is_none());
        assert_eq!(config.asof.exchange_basis, ExchangeBasis::Local);
        assert_eq!(config.sink.conflict_column, "timestamp");
    }

    #[test]
    fn test_rates_locations() {
        let rates = RatesConfig::default();
        assert!(rates.reference_location("sell").ends_with("/sell_oficial.csv"));
        assert!(rates.exchange_location("buy").ends_with("/buy.csv"));
        assert_eq!(rates.reference_table("buy"), "dolar_referencial_buy");
        assert_eq!(
            rates.residual_table("sell"),
            "dolar_diferencia_referencial_binance_sell"
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("P2P_LISTINGS", "/data/advice.parquet"),
            ("P2P_RATES_BASE_URL", "http://localhost:8000/"),
            ("P2P_MAX_GAP_SECS", "3600"),
            ("P2P_EXCHANGE_BASIS", "UTC"),
            ("P2P_SINK_KIND", "sqlite"),
            ("SUPABASE_URL", "out.db"),
        ]))
        .unwrap();

        assert_eq!(config.listings.location, "/data/advice.parquet");
        assert_eq!(config.rates.base_url, "http://localhost:8000");
        assert_eq!(config.snapshot_diff.max_gap_secs, Some(3600));
        assert_eq!(config.asof.exchange_basis, ExchangeBasis::Utc);
        assert_eq!(config.sink.kind, SinkKind::Sqlite);
        assert!(config.sink.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_rejects_bad_gap() {
        assert!(Config::from_lookup(lookup_from(&[("P2P_MAX_GAP_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("P2P_MAX_GAP_SECS", "0")])).is_err());
    }

    #[test]
    fn test_postgrest_sink_requires_key() {
        let mut sink = SinkConfig {
            url: Some("https://example.supabase.co".to_string()),
            ..SinkConfig::default()
        };
        assert!(matches!(sink.validate(), Err(Error::Config(_))));

        sink.key = Some("secret".to_string());
        assert!(sink.validate().is_ok());
    }
}

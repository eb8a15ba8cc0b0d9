//! Upsert-capable persistence sinks.
//!
//! Records are JSON objects with one key per column. The conflict column
//! identifies a row; an existing row with the same key is overwritten.

use p2p_core::config::{SinkConfig, SinkKind};
use p2p_core::{Error, Result};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A table store accepting row-oriented upserts.
pub trait TableSink {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Insert or update `records` in `table`, keyed by `on_conflict`.
    ///
    /// Returns the number of records written.
    fn upsert(&mut self, table: &str, records: &[Value], on_conflict: &str) -> Result<usize>;
}

/// Open the backend selected by `config`.
///
/// Does not validate credentials; see [`SinkConfig::validate`].
pub fn open(config: &SinkConfig) -> Result<Box<dyn TableSink>> {
    let url = config.url.as_deref().unwrap_or_default();

    match config.kind {
        SinkKind::Postgrest => {
            let key = config.key.as_deref().unwrap_or_default();
            Ok(Box::new(PostgrestSink::new(url, key)?))
        }
        SinkKind::Sqlite => Ok(Box::new(SqliteSink::open(url)?)),
    }
}

/// Supabase / PostgREST sink.
pub struct PostgrestSink {
    client: reqwest::blocking::Client,
    base_url: String,
    key: String,
}

impl PostgrestSink {
    /// Create a new PostgREST sink.
    pub fn new(base_url: &str, key: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    /// Endpoint for an upsert into `table`.
    pub fn endpoint(&self, table: &str, on_conflict: &str) -> String {
        format!("{}/rest/v1/{table}?on_conflict={on_conflict}", self.base_url)
    }
}

impl TableSink for PostgrestSink {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    fn upsert(&mut self, table: &str, records: &[Value], on_conflict: &str) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let url = self.endpoint(table, on_conflict);
        debug!(%url, records = records.len(), "upserting");
        self.client
            .post(&url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| Error::sink(format!("{table}: {e}")))?;

        Ok(records.len())
    }
}

/// SQLite sink. Tables are created on first use.
pub struct SqliteSink {
    conn: rusqlite::Connection,
}

impl SqliteSink {
    /// Open (or create) a database file.
    pub fn open(path: &str) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| Error::database(format!("{path}: {e}")))?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Underlying connection.
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl TableSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert(&mut self, table: &str, records: &[Value], on_conflict: &str) -> Result<usize> {
        let Some(first) = records.first().and_then(Value::as_object) else {
            return Ok(0);
        };
        let columns: Vec<&String> = first.keys().collect();
        if !first.contains_key(on_conflict) {
            return Err(Error::sink(format!("{table}: records lack conflict column '{on_conflict}'")));
        }

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            columns
                .iter()
                .map(|col| {
                    let affinity = sql_affinity(&first[col.as_str()]);
                    if col.as_str() == on_conflict {
                        format!("{} {affinity} PRIMARY KEY", quote_ident(col))
                    } else {
                        format!("{} {affinity}", quote_ident(col))
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        );

        let updates: Vec<String> = columns
            .iter()
            .filter(|col| col.as_str() != on_conflict)
            .map(|col| format!("{0} = excluded.{0}", quote_ident(col)))
            .collect();
        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {action}",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            vec!["?"; columns.len()].join(", "),
            quote_ident(on_conflict),
        );

        let sink_err = |e: rusqlite::Error| Error::sink(format!("{table}: {e}"));
        let tx = self.conn.transaction().map_err(sink_err)?;
        tx.execute(&create, []).map_err(sink_err)?;
        {
            let mut stmt = tx.prepare(&insert).map_err(sink_err)?;
            for record in records {
                let object = record
                    .as_object()
                    .ok_or_else(|| Error::sink(format!("{table}: record is not an object")))?;
                let values = columns
                    .iter()
                    .map(|col| to_sql_value(object.get(col.as_str()).unwrap_or(&Value::Null)));
                stmt.execute(rusqlite::params_from_iter(values))
                    .map_err(sink_err)?;
            }
        }
        tx.commit().map_err(sink_err)?;

        Ok(records.len())
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn sql_affinity(value: &Value) -> &'static str {
    match value {
        Value::Number(_) | Value::Bool(_) => "REAL",
        Value::String(_) => "TEXT",
        _ => "BLOB",
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(sink: &SqliteSink, table: &str) -> Vec<(String, f64)> {
        let mut stmt = sink
            .connection()
            .prepare(&format!("SELECT timestamp, value FROM {table} ORDER BY timestamp"))
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_sqlite_upsert_overwrites_on_conflict() {
        let mut sink = SqliteSink::open_in_memory().unwrap();

        let first = [
            json!({"timestamp": "2024-05-01T09:00:00Z", "value": 0.05}),
            json!({"timestamp": "2024-05-01T09:05:00Z", "value": 0.07}),
        ];
        assert_eq!(sink.upsert("diff", &first, "timestamp").unwrap(), 2);

        let second = [
            json!({"timestamp": "2024-05-01T09:05:00Z", "value": 0.09}),
            json!({"timestamp": "2024-05-01T09:10:00Z", "value": 0.11}),
        ];
        sink.upsert("diff", &second, "timestamp").unwrap();

        assert_eq!(
            rows(&sink, "diff"),
            vec![
                ("2024-05-01T09:00:00Z".to_string(), 0.05),
                ("2024-05-01T09:05:00Z".to_string(), 0.09),
                ("2024-05-01T09:10:00Z".to_string(), 0.11),
            ]
        );
    }

    #[test]
    fn test_sqlite_missing_conflict_column() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        let err = sink
            .upsert("diff", &[json!({"ts": "x", "value": 1.0})], "timestamp")
            .unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
    }

    #[test]
    fn test_sqlite_empty_records() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        assert_eq!(sink.upsert("diff", &[], "timestamp").unwrap(), 0);
    }

    #[test]
    fn test_postgrest_endpoint() {
        let sink = PostgrestSink::new("https://abc.supabase.co/", "key").unwrap();
        assert_eq!(
            sink.endpoint("dolar_buy", "timestamp"),
            "https://abc.supabase.co/rest/v1/dolar_buy?on_conflict=timestamp"
        );
    }

    #[test]
    fn test_open_selects_backend() {
        let sqlite = SinkConfig {
            kind: SinkKind::Sqlite,
            url: Some(":memory:".to_string()),
            ..SinkConfig::default()
        };
        assert_eq!(open(&sqlite).unwrap().name(), "sqlite");

        let missing_dir = SinkConfig {
            url: Some("/nonexistent-p2p-series-dir/sink.db".to_string()),
            ..sqlite
        };
        assert!(matches!(open(&missing_dir), Err(Error::Database(_))));
    }
}

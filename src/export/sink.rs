//! Optional relational sink
//!
//! Writing the enriched table to a database is a best-effort side channel:
//! `persist_best_effort` turns every sink failure into a logged
//! `SinkOutcome::Failed` so the run and its file exports are unaffected.

use crate::config::ExportConfig;
use crate::error::{PipelineError, SinkError};
use polars::prelude::DataFrame;

/// A store that can replace a named table with the enriched rows
pub trait TableSink {
    fn name(&self) -> &str;

    /// `false` means nothing is configured and the write is skipped
    fn enabled(&self) -> bool {
        true
    }

    /// Replace `table` with the rows of `df`, returning rows written
    fn replace_table(&self, table: &str, df: &DataFrame) -> Result<usize, SinkError>;
}

/// No store configured
pub struct NoopSink;

impl TableSink for NoopSink {
    fn name(&self) -> &str {
        "none"
    }

    fn enabled(&self) -> bool {
        false
    }

    fn replace_table(&self, _table: &str, _df: &DataFrame) -> Result<usize, SinkError> {
        Ok(0)
    }
}

/// Sink whose every write fails with a fixed reason
///
/// Stands in for a configured store this build cannot reach, and for an
/// unreachable store in tests.
pub struct FailingSink {
    reason: String,
}

impl FailingSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl TableSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn replace_table(&self, _table: &str, _df: &DataFrame) -> Result<usize, SinkError> {
        Err(SinkError::Unavailable(self.reason.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkOutcome {
    Skipped,
    Written { sink: String, table: String, rows: usize },
    Failed { sink: String, table: String, reason: String },
}

impl SinkOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SinkOutcome::Failed { .. })
    }
}

/// Attempt the write; never propagates an error
pub fn persist_best_effort(sink: &dyn TableSink, table: &str, df: &DataFrame) -> SinkOutcome {
    if !sink.enabled() {
        return SinkOutcome::Skipped;
    }

    match sink.replace_table(table, df) {
        Ok(rows) => {
            tracing::info!("Table '{}' written to {} ({} rows)", table, sink.name(), rows);
            SinkOutcome::Written {
                sink: sink.name().to_string(),
                table: table.to_string(),
                rows,
            }
        }
        Err(e) => {
            tracing::warn!("Writing table '{}' to {} failed: {}", table, sink.name(), e);
            SinkOutcome::Failed {
                sink: sink.name().to_string(),
                table: table.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// ASCII letters, digits and underscores, not starting with a digit
pub fn validate_table_name(name: &str) -> Result<(), PipelineError> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidTableName(name.to_string()))
    }
}

/// Sink selected by configuration
pub fn sink_from_config(config: &ExportConfig) -> Box<dyn TableSink> {
    match &config.db_path {
        None => Box::new(NoopSink),
        #[cfg(feature = "persistence")]
        Some(path) => Box::new(duckdb_sink::DuckDbSink::new(path.clone())),
        #[cfg(not(feature = "persistence"))]
        Some(path) => Box::new(FailingSink::new(format!(
            "database {:?} requested but built without the 'persistence' feature",
            path
        ))),
    }
}

#[cfg(feature = "persistence")]
pub mod duckdb_sink {
    //! DuckDB file database sink

    use super::TableSink;
    use crate::error::SinkError;
    use crate::export::tabular::records_from_dataframe;
    use duckdb::{params, Connection};
    use polars::prelude::DataFrame;
    use std::path::PathBuf;

    const TABLE_SCHEMA: &str = "species VARCHAR, genus VARCHAR, address VARCHAR, \
        latitude DOUBLE, longitude DOUBLE, species_count BIGINT, rarity_norm DOUBLE, \
        size_raw DOUBLE, size_norm DOUBLE, nn_dist_m DOUBLE, isolation_norm DOUBLE, \
        conservation_score DOUBLE, cluster BIGINT";

    pub struct DuckDbSink {
        path: PathBuf,
    }

    impl DuckDbSink {
        pub fn new(path: PathBuf) -> Self {
            Self { path }
        }
    }

    impl TableSink for DuckDbSink {
        fn name(&self) -> &str {
            "duckdb"
        }

        fn replace_table(&self, table: &str, df: &DataFrame) -> Result<usize, SinkError> {
            super::validate_table_name(table).map_err(|e| SinkError::Write {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
            let write_err = |e: &dyn std::fmt::Display| SinkError::Write {
                table: table.to_string(),
                reason: e.to_string(),
            };

            let records = records_from_dataframe(df).map_err(|e| write_err(&e))?;

            let conn = Connection::open(&self.path)
                .map_err(|e| SinkError::Unavailable(format!("{:?}: {}", self.path, e)))?;

            conn.execute_batch(&format!("CREATE OR REPLACE TABLE \"{}\" ({})", table, TABLE_SCHEMA))
                .map_err(|e| write_err(&e))?;

            let mut appender = conn.appender(table).map_err(|e| write_err(&e))?;
            for r in &records {
                appender
                    .append_row(params![
                        r.species,
                        r.genus,
                        r.address,
                        r.latitude,
                        r.longitude,
                        r.species_count as i64,
                        r.rarity_norm,
                        r.size_raw,
                        r.size_norm,
                        r.nn_dist_m,
                        r.isolation_norm,
                        r.conservation_score,
                        r.cluster,
                    ])
                    .map_err(|e| write_err(&e))?;
            }
            appender.flush().map_err(|e| write_err(&e))?;

            Ok(records.len())
        }
    }

}

//! Typed failures for the enrichment pipeline
//!
//! Stage errors are fatal to a run. Sink errors never leave the exporter:
//! they are caught and reported as a `SinkOutcome`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("batch is empty: no record had a resolvable position")]
    EmptyBatch,

    #[error("isolation needs at least {required} records, batch has {actual}")]
    InsufficientRecords { required: usize, actual: usize },

    #[error("record {index}: invalid coordinate (lon={lon}, lat={lat})")]
    InvalidCoordinate { index: usize, lon: f64, lat: f64 },

    #[error("column '{column}' contains a non-finite value at row {index}")]
    NonFinite { column: String, index: usize },

    #[error("invalid score weights: {0}")]
    InvalidWeights(String),

    #[error("missing expected column '{0}'")]
    MissingColumn(String),

    #[error("invalid table name '{0}'")]
    InvalidTableName(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write to table '{table}' failed: {reason}")]
    Write { table: String, reason: String },
}

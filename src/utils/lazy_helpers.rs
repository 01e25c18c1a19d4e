//! LazyFrame materialization helpers with column validation
//!
//! Enriched tables are read back from CSV written by other runs (or other
//! tools); these helpers turn a missing column into a clear error instead of
//! a confusing downstream failure.

use polars::prelude::*;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use std::collections::HashSet;

/// Materialize LazyFrame with exactly the given columns, in order
///
/// # Errors
/// Returns error if materialization fails or a requested column is absent.
pub fn materialize_with_columns(
    lazy: &LazyFrame,
    columns: &[&str],
    context: &str,
) -> Result<DataFrame> {
    let schema = lazy
        .clone()
        .collect_schema()
        .with_context(|| format!("{}: Failed to resolve schema", context))?;

    for &expected in columns {
        if !schema.contains(expected) {
            let available: Vec<String> = schema.iter_names().map(|s| s.to_string()).collect();
            return Err(PipelineError::MissingColumn(expected.to_string()))
                .with_context(|| format!("{}: Available columns: {:?}", context, available));
        }
    }

    let col_exprs: Vec<Expr> = columns.iter()
        .map(|&name| col(name))
        .collect();

    lazy
        .clone()
        .select(&col_exprs)
        .collect()
        .with_context(|| format!("{}: Failed to materialize columns {:?}", context, columns))
}

/// Keep rows whose string column value is in `keep`
///
/// An empty `keep` set keeps every row.
pub fn filter_by_values(
    df: &DataFrame,
    keep: &[String],
    col_name: &str,
    context: &str,
) -> Result<DataFrame> {
    if keep.is_empty() {
        return Ok(df.clone());
    }

    let values = df.column(col_name)
        .with_context(|| format!("{}: Missing {} column", context, col_name))?
        .str()
        .with_context(|| format!("{}: Column '{}' is not string type", context, col_name))?;

    let keep_set: HashSet<&str> = keep.iter().map(|s| s.as_str()).collect();
    let mask: BooleanChunked = values
        .into_iter()
        .map(|opt| opt.map_or(false, |s| keep_set.contains(s)))
        .collect();

    df.filter(&mask)
        .with_context(|| format!("{}: Failed to filter on column '{}'", context, col_name))
}

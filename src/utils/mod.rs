//! Utility modules shared across pipeline stages
//!
//! - Normalization: min-max scaling with a degenerate-column policy
//! - Aggregation: whole-batch map/reduce group counts and accumulators
//! - LazyFrame helpers: safe materialization with column validation

pub mod normalization;
pub mod aggregation;
pub mod lazy_helpers;

pub use normalization::{min_max_normalize, normalize_column, DegeneratePolicy, MinMax};
pub use aggregation::{accumulate_by, count_by, top_n_by_count, GroupAccumulator};
pub use lazy_helpers::{materialize_with_columns, filter_by_values};

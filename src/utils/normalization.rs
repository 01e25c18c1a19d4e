//! Normalization Utilities
//!
//! Min-max scaling of a whole batch column to [0, 1]:
//! `norm = (x - min) / (max - min)`.
//!
//! A constant column has no spread to scale by. Rather than emit NaN, the
//! configured `DegeneratePolicy` value is written for every row. The same
//! policy applies to the second pass over the composite score.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Value emitted for every row of a constant column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// 0.0 everywhere (what a zero-range min-max scaler produces)
    #[default]
    Zero,
    /// 0.5 everywhere
    Midpoint,
}

impl DegeneratePolicy {
    pub fn value(self) -> f64 {
        match self {
            DegeneratePolicy::Zero => 0.0,
            DegeneratePolicy::Midpoint => 0.5,
        }
    }
}

/// Fitted bounds of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    /// Bounds of a non-empty column, `None` when empty
    pub fn fit(values: &[f64]) -> Option<Self> {
        let first = *values.first()?;
        let (min, max) = values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(Self { min, max })
    }

    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    pub fn transform(&self, value: f64, policy: DegeneratePolicy) -> f64 {
        if self.is_degenerate() {
            return policy.value();
        }
        (value - self.min) / (self.max - self.min)
    }
}

/// Scale a finite column to [0, 1]
///
/// Empty input gives empty output.
pub fn min_max_normalize(values: &[f64], policy: DegeneratePolicy) -> Vec<f64> {
    let Some(bounds) = MinMax::fit(values) else {
        return Vec::new();
    };
    values.iter().map(|&v| bounds.transform(v, policy)).collect()
}

/// `min_max_normalize` that rejects NaN/infinite inputs, naming the column
pub fn normalize_column(
    column: &str,
    values: &[f64],
    policy: DegeneratePolicy,
) -> Result<Vec<f64>, PipelineError> {
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(PipelineError::NonFinite {
            column: column.to_string(),
            index,
        });
    }

    if let Some(bounds) = MinMax::fit(values) {
        if bounds.is_degenerate() {
            tracing::debug!(
                "Column '{}' is constant ({}); using {:?} fallback",
                column,
                bounds.min,
                policy
            );
        }
    }

    Ok(min_max_normalize(values, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_scaling() {
        let norm = min_max_normalize(&[2.0, 4.0, 6.0], DegeneratePolicy::Zero);
        assert_relative_eq!(norm[0], 0.0);
        assert_relative_eq!(norm[1], 0.5);
        assert_relative_eq!(norm[2], 1.0);
    }

    #[test]
    fn test_negative_values() {
        let norm = min_max_normalize(&[-10.0, 0.0, 30.0], DegeneratePolicy::Zero);
        assert_relative_eq!(norm[1], 0.25);
    }

    #[test]
    fn test_constant_column_zero_policy() {
        let norm = min_max_normalize(&[7.0, 7.0, 7.0], DegeneratePolicy::Zero);
        assert_eq!(norm, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_constant_column_midpoint_policy() {
        let norm = min_max_normalize(&[3.0], DegeneratePolicy::Midpoint);
        assert_eq!(norm, vec![0.5]);
    }

    #[test]
    fn test_empty_column() {
        assert!(min_max_normalize(&[], DegeneratePolicy::Zero).is_empty());
        assert!(MinMax::fit(&[]).is_none());
    }

    #[test]
    fn test_output_bounds() {
        let values: Vec<f64> = (0..50).map(|i| ((i * 37) % 11) as f64 * 0.3 - 1.0).collect();
        for v in min_max_normalize(&values, DegeneratePolicy::Zero) {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = normalize_column("size_raw", &[1.0, f64::NAN], DegeneratePolicy::Zero).unwrap_err();
        assert!(err.to_string().contains("size_raw"));
        assert!(err.to_string().contains("row 1"));
    }
}

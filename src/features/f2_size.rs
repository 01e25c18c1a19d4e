//! FEATURE 2: SIZE
//!
//! Height passed through from the configured source field. Missing,
//! non-numeric, negative or non-finite values become 0 instead of failing
//! the record.

use crate::data::{coerce_number, TreeRecord};

#[derive(Debug, Clone)]
pub struct SizeResult {
    pub size_raw: Vec<f64>,
    /// Records whose height defaulted to 0
    pub coerced: usize,
}

pub fn calculate_size(records: &[TreeRecord], height_field: &str) -> SizeResult {
    let mut coerced = 0usize;

    let size_raw = records
        .iter()
        .map(|r| match r.fields.get(height_field).and_then(coerce_number) {
            Some(h) if h >= 0.0 => h,
            _ => {
                coerced += 1;
                0.0
            }
        })
        .collect();

    if coerced > 0 {
        tracing::warn!("{} records had no usable '{}' value; size set to 0", coerced, height_field);
    }

    SizeResult { size_raw, coerced }
}

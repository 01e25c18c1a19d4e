//! FEATURE 3: SPATIAL ISOLATION
//!
//! Distance in the projected frame from each tree to its nearest *other*
//! tree. The index is queried for the two nearest points; the query point
//! itself is one of them at distance 0, so the reported value is the closest
//! hit that is not the record itself. Co-located trees get 0.
//!
//! One k-nearest query per point against the R*-tree: O(n log n) overall,
//! queries run on the rayon pool.

use crate::error::PipelineError;
use crate::spatial::{PlanarPoint, SpatialIndex};
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct IsolationResult {
    /// Metres to the nearest other record
    pub nn_dist_m: Vec<f64>,
    /// Record index of that neighbor
    pub nn_index: Vec<usize>,
}

pub fn calculate_isolation<I: SpatialIndex>(
    index: &I,
    points: &[PlanarPoint],
) -> Result<IsolationResult, PipelineError> {
    if points.len() < 2 {
        return Err(PipelineError::InsufficientRecords {
            required: 2,
            actual: points.len(),
        });
    }

    let nearest: Vec<(usize, f64)> = points
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            index
                .k_nearest(*p, 2)
                .into_iter()
                .find(|n| n.index != i)
                .map(|n| (n.index, n.distance))
                .ok_or(PipelineError::InsufficientRecords {
                    required: 2,
                    actual: index.len(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (nn_index, nn_dist_m) = nearest.into_iter().unzip();
    Ok(IsolationResult { nn_dist_m, nn_index })
}

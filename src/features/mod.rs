//! Raw feature signals for conservation scoring
//!
//! Each signal is implemented in its own module and reads the projected
//! batch only; the three passes share no mutable state and run concurrently.

pub mod f1_species_rarity;
pub mod f2_size;
pub mod f3_isolation;

pub use f1_species_rarity::{calculate_species_rarity, rarity, RarityResult};
pub use f2_size::{calculate_size, SizeResult};
pub use f3_isolation::{calculate_isolation, IsolationResult};

use crate::projection::ProjectedBatch;
use anyhow::Result;
use std::time::Instant;

/// Projected batch plus its three raw signals
pub struct FeatureBatch {
    pub projected: ProjectedBatch,
    pub rarity: RarityResult,
    pub size: SizeResult,
    pub isolation: IsolationResult,
}

impl FeatureBatch {
    pub fn len(&self) -> usize {
        self.projected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projected.is_empty()
    }
}

/// Compute rarity, size and isolation for the whole batch
pub fn compute_raw_features(projected: ProjectedBatch, height_field: &str) -> Result<FeatureBatch> {
    let start = Instant::now();

    let ((rarity, size), isolation) = rayon::join(
        || {
            rayon::join(
                || calculate_species_rarity(&projected.records),
                || calculate_size(&projected.records, height_field),
            )
        },
        || calculate_isolation(&projected.index, &projected.points),
    );
    let isolation = isolation?;

    tracing::debug!(
        "Raw features for {} records in {:?} ({} species, {} sizes defaulted)",
        projected.len(),
        start.elapsed(),
        rarity.counts.len(),
        size.coerced
    );

    Ok(FeatureBatch {
        projected,
        rarity,
        size,
        isolation,
    })
}

//! Spatial Clustering (DBSCAN)
//!
//! Density clustering over projected points only; species, size and score
//! play no part. Neighborhoods include the point itself and use distance
//! <= eps. A point with at least `min_samples` neighbors is a core point.
//! Clusters are grown from unvisited core points in ascending record order
//! and numbered from 0; a border point keeps the first cluster that reaches
//! it. Points reachable from no core point are noise.
//!
//! Ids are stable within a run for a fixed point set. Across runs only the
//! partition is meaningful.

use crate::spatial::{PlanarPoint, SpatialIndex};
use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Label for points that belong to no cluster
pub const NOISE_LABEL: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DbscanParams {
    /// Neighborhood radius in projected metres
    pub eps: f64,
    /// Neighborhood size (self included) that makes a core point
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: 50.0,
            min_samples: 3,
        }
    }
}

impl DbscanParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            anyhow::bail!("DBSCAN eps must be a positive finite distance, got {}", self.eps);
        }
        if self.min_samples == 0 {
            anyhow::bail!("DBSCAN min_samples must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClusterResult {
    /// One label per point: cluster id >= 0 or `NOISE_LABEL`
    pub labels: Vec<i64>,
    pub n_clusters: usize,
    pub n_noise: usize,
}

impl ClusterResult {
    /// Partition as sorted member lists (clusters first, then noise),
    /// independent of the numbering
    pub fn partition(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); self.n_clusters];
        let mut noise = Vec::new();
        for (i, &label) in self.labels.iter().enumerate() {
            if label == NOISE_LABEL {
                noise.push(i);
            } else {
                groups[label as usize].push(i);
            }
        }
        groups.sort();
        groups.push(noise);
        groups
    }
}

pub fn cluster_points<I: SpatialIndex>(
    index: &I,
    points: &[PlanarPoint],
    params: &DbscanParams,
) -> ClusterResult {
    let n = points.len();

    // Region queries are independent; precompute them on the rayon pool.
    let neighborhoods: Vec<Vec<usize>> = points
        .par_iter()
        .map(|p| index.within_radius(*p, params.eps))
        .collect();

    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|nb| nb.len() >= params.min_samples)
        .collect();

    let mut labels: Vec<Option<i64>> = vec![None; n];
    let mut cluster_id: i64 = 0;
    let mut queue: VecDeque<usize> = VecDeque::new();

    for start in 0..n {
        if labels[start].is_some() || !is_core[start] {
            continue;
        }

        labels[start] = Some(cluster_id);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if !is_core[current] {
                continue;
            }
            for &nb in &neighborhoods[current] {
                if labels[nb].is_none() {
                    labels[nb] = Some(cluster_id);
                    queue.push_back(nb);
                }
            }
        }

        cluster_id += 1;
    }

    let labels: Vec<i64> = labels.into_iter().map(|l| l.unwrap_or(NOISE_LABEL)).collect();
    let n_noise = labels.iter().filter(|&&l| l == NOISE_LABEL).count();

    tracing::info!(
        "DBSCAN (eps={}, min_samples={}): {} clusters, {} noise points",
        params.eps,
        params.min_samples,
        cluster_id,
        n_noise
    );

    ClusterResult {
        labels,
        n_clusters: cluster_id as usize,
        n_noise,
    }
}

//! Conservation Scorer - Main coordinator for enriching a tree batch
//!
//! Runs the pipeline as explicit stage transitions, each consuming the
//! previous stage's output and returning a new batch structure:
//!
//! `LoadedBatch -> ProjectedBatch -> FeatureBatch -> NormalizedBatch
//!  -> ScoredBatch -> EnrichedBatch`
//!
//! Score composition is normalize -> weight -> normalize again, so the final
//! score always spans the batch range regardless of weight magnitudes.

use crate::clustering::{cluster_points, ClusterResult};
use crate::config::PipelineConfig;
use crate::data::{load_records_from_path, LoadedBatch};
use crate::error::PipelineError;
use crate::export::{export_all, ExportReport, TableSink};
use crate::features::{compute_raw_features, FeatureBatch};
use crate::projection::project_batch;
use crate::utils::normalization::{normalize_column, DegeneratePolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Weight of each normalized signal in the composite score
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub rarity: f64,
    pub size: f64,
    pub isolation: f64,
}

pub const DEFAULT_WEIGHTS: ScoreWeights = ScoreWeights {
    rarity: 0.4,
    size: 0.3,
    isolation: 0.3,
};

const _: () = assert!(
    DEFAULT_WEIGHTS.rarity + DEFAULT_WEIGHTS.size + DEFAULT_WEIGHTS.isolation == 1.0,
    "default score weights must sum to 1.0"
);

/// Allowed drift from 1.0 for weights read from configuration
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

impl Default for ScoreWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl ScoreWeights {
    pub fn new(rarity: f64, size: f64, isolation: f64) -> Result<Self, PipelineError> {
        let weights = Self { rarity, size, isolation };
        weights.validate()?;
        Ok(weights)
    }

    pub fn sum(&self) -> f64 {
        self.rarity + self.size + self.isolation
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let all = [self.rarity, self.size, self.isolation];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PipelineError::InvalidWeights(format!(
                "weights must be finite and non-negative, got {:?}",
                self
            )));
        }
        if (self.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(PipelineError::InvalidWeights(format!(
                "weights must sum to 1.0, got {}",
                self.sum()
            )));
        }
        Ok(())
    }

    pub fn combine(&self, rarity_norm: f64, size_norm: f64, isolation_norm: f64) -> f64 {
        self.rarity * rarity_norm + self.size * size_norm + self.isolation * isolation_norm
    }
}

/// Feature batch with each signal scaled to [0, 1]
pub struct NormalizedBatch {
    pub features: FeatureBatch,
    pub rarity_norm: Vec<f64>,
    pub size_norm: Vec<f64>,
    pub isolation_norm: Vec<f64>,
}

/// Normalized batch with its composite score
pub struct ScoredBatch {
    pub normalized: NormalizedBatch,
    /// Weighted sum before the second normalization
    pub score_raw: Vec<f64>,
    pub conservation_score: Vec<f64>,
}

/// One fully enriched tree
///
/// Serialized field order is the tabular column order; `species_rarity`
/// stays in memory only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub species: String,
    pub genus: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub species_count: usize,
    pub rarity_norm: f64,
    pub size_raw: f64,
    pub size_norm: f64,
    pub nn_dist_m: f64,
    pub isolation_norm: f64,
    pub conservation_score: f64,
    pub cluster: i64,
    #[serde(skip)]
    pub species_rarity: f64,
}

/// Output of one pipeline run
#[derive(Debug, Clone)]
pub struct EnrichedBatch {
    pub records: Vec<EnrichedRecord>,
    /// Input records dropped by the loader
    pub dropped: usize,
    pub n_clusters: usize,
    pub n_noise: usize,
}

impl EnrichedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Scale the three raw signals over the whole batch
pub fn normalize_features(features: FeatureBatch, policy: DegeneratePolicy) -> Result<NormalizedBatch> {
    let rarity_norm = normalize_column("species_rarity", &features.rarity.species_rarity, policy)?;
    let size_norm = normalize_column("size_raw", &features.size.size_raw, policy)?;
    let isolation_norm = normalize_column("nn_dist_m", &features.isolation.nn_dist_m, policy)?;

    Ok(NormalizedBatch {
        features,
        rarity_norm,
        size_norm,
        isolation_norm,
    })
}

/// Weighted composite, then normalized again with the same policy
pub fn compose_scores(
    normalized: NormalizedBatch,
    weights: &ScoreWeights,
    policy: DegeneratePolicy,
) -> Result<ScoredBatch> {
    let score_raw: Vec<f64> = normalized
        .rarity_norm
        .iter()
        .zip(&normalized.size_norm)
        .zip(&normalized.isolation_norm)
        .map(|((&r, &s), &i)| weights.combine(r, s, i))
        .collect();

    let conservation_score = normalize_column("conservation_score", &score_raw, policy)?;

    Ok(ScoredBatch {
        normalized,
        score_raw,
        conservation_score,
    })
}

/// Zip every per-record column into `EnrichedRecord`s
pub fn assemble(scored: ScoredBatch, clusters: ClusterResult) -> EnrichedBatch {
    let ScoredBatch {
        normalized,
        conservation_score,
        ..
    } = scored;
    let NormalizedBatch {
        features,
        rarity_norm,
        size_norm,
        isolation_norm,
    } = normalized;
    let FeatureBatch {
        projected,
        rarity,
        size,
        isolation,
    } = features;

    let records = projected
        .records
        .into_iter()
        .enumerate()
        .map(|(i, tree)| EnrichedRecord {
            species: tree.species,
            genus: tree.genus,
            address: tree.address,
            latitude: tree.latitude,
            longitude: tree.longitude,
            species_count: rarity.species_count[i],
            rarity_norm: rarity_norm[i],
            size_raw: size.size_raw[i],
            size_norm: size_norm[i],
            nn_dist_m: isolation.nn_dist_m[i],
            isolation_norm: isolation_norm[i],
            conservation_score: conservation_score[i],
            cluster: clusters.labels[i],
            species_rarity: rarity.species_rarity[i],
        })
        .collect();

    EnrichedBatch {
        records,
        dropped: projected.dropped,
        n_clusters: clusters.n_clusters,
        n_noise: clusters.n_noise,
    }
}

/// Summary of one `ConservationScorer::run`
#[derive(Debug)]
pub struct RunReport {
    pub batch: EnrichedBatch,
    pub export: ExportReport,
}

/// Main conservation scorer
pub struct ConservationScorer {
    config: PipelineConfig,
}

impl ConservationScorer {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Enrich a loaded batch (stages 2-6)
    ///
    /// Any stage failure aborts the whole batch; nothing partial is returned.
    pub fn enrich(&self, loaded: LoadedBatch) -> Result<EnrichedBatch> {
        if loaded.is_empty() {
            return Err(PipelineError::EmptyBatch.into());
        }
        let start = Instant::now();
        let policy = self.config.degenerate_policy;

        let projected = project_batch(loaded)?;
        let features = compute_raw_features(projected, &self.config.loader.fields.height)?;
        let normalized = normalize_features(features, policy)?;
        let scored = compose_scores(normalized, &self.config.weights, policy)?;

        let projected = &scored.normalized.features.projected;
        let clusters = cluster_points(&projected.index, &projected.points, &self.config.clustering);

        let batch = assemble(scored, clusters);
        tracing::info!(
            "Enriched {} records in {:?} ({} clusters, {} noise)",
            batch.len(),
            start.elapsed(),
            batch.n_clusters,
            batch.n_noise
        );
        Ok(batch)
    }

    /// Load the configured input, enrich it, and export every output
    pub fn run(&self, sink: &dyn TableSink) -> Result<RunReport> {
        let loaded = load_records_from_path(&self.config.input_path, &self.config.loader)?;
        tracing::info!(
            "Input {:?}: {} usable records, {} dropped",
            self.config.input_path,
            loaded.len(),
            loaded.dropped
        );

        let batch = self.enrich(loaded)?;
        let export = export_all(&batch, &self.config.export, sink)?;

        Ok(RunReport { batch, export })
    }
}

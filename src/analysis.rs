//! Batch Analysis
//!
//! Read-only summaries over an enriched batch or its re-loaded tabular
//! export: descriptive statistics, correlations, per-species and per-address
//! aggregates, an overview, filters and priority bands for map markers.

use crate::scorer::{EnrichedBatch, EnrichedRecord};
use crate::utils::aggregation::{accumulate_by, count_by};
use crate::utils::lazy_helpers::filter_by_values;
use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;

/// Columns summarized by `describe` and `correlation_matrix` in reports
pub const STAT_COLUMNS: [&str; 3] = ["size_raw", "nn_dist_m", "conservation_score"];

/// Summary statistics of one numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); NaN for a single value
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// `None` for an empty column
pub fn describe(values: &[f64]) -> Option<Describe> {
    if values.is_empty() {
        return None;
    }
    let n = values.len();
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    Some(Describe {
        count: n,
        mean,
        std,
        min: sorted[0],
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted[n - 1],
    })
}

/// Linear interpolation between closest ranks
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Pearson correlation of two equal-length columns
///
/// NaN when either column is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return f64::NAN;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        f64::NAN
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    }
}

/// Symmetric matrix of pairwise Pearson correlations
pub fn correlation_matrix(columns: &[&[f64]]) -> Vec<Vec<f64>> {
    columns
        .iter()
        .map(|a| columns.iter().map(|b| pearson(a, b)).collect())
        .collect()
}

/// Values of one numeric column, row-aligned; nulls stay `None`
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{}' is not numeric", name))?;

    Ok(column.f64()?.into_iter().collect())
}

/// Rows where every column has a value, transposed back into columns
///
/// Pairs values by row before correlating columns that contain nulls.
pub fn complete_rows(columns: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    let n = columns.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut out: Vec<Vec<f64>> = vec![Vec::with_capacity(n); columns.len()];

    for row in 0..n {
        if columns.iter().all(|c| c[row].is_some()) {
            for (dst, src) in out.iter_mut().zip(columns) {
                dst.extend(src[row]);
            }
        }
    }
    out
}

/// Per-key `count`, `mean_size`, `mean_score`, largest groups first
///
/// `key` is a string column of the enriched table (`species` or `address`).
/// `count` covers every row of the key; the means skip null cells and are
/// null when a group has no value. Ties on count are ordered by key;
/// `top_n = None` keeps every group.
pub fn group_stats(df: &DataFrame, key: &str, top_n: Option<usize>) -> Result<DataFrame> {
    let key_column = df.column(key)
        .with_context(|| format!("Column '{}' not found", key))?
        .cast(&DataType::String)?;
    let keys: Vec<&str> = key_column
        .str()?
        .into_iter()
        .map(|k| k.unwrap_or(crate::data::UNKNOWN))
        .collect();
    let sizes = numeric_column(df, "size_raw")?;
    let scores = numeric_column(df, "conservation_score")?;

    let rows: Vec<(&str, Option<f64>, Option<f64>)> = keys
        .iter()
        .zip(sizes.iter().zip(&scores))
        .map(|(k, (s, c))| (*k, *s, *c))
        .collect();
    let sized: Vec<(&str, f64)> = rows.iter().filter_map(|r| Some((r.0, r.1?))).collect();
    let scored: Vec<(&str, f64)> = rows.iter().filter_map(|r| Some((r.0, r.2?))).collect();

    let counts = count_by(&rows, |r| r.0);
    let size_groups = accumulate_by(&sized, |r| r.0, |r| r.1);
    let score_groups = accumulate_by(&scored, |r| r.0, |r| r.1);

    let mut ranked: Vec<(&str, usize, Option<f64>, Option<f64>)> = counts
        .iter()
        .map(|(k, count)| {
            let mean_size = size_groups.get(k).and_then(|g| g.mean());
            let mean_score = score_groups.get(k).and_then(|g| g.mean());
            (*k, *count, mean_size, mean_score)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    if let Some(n) = top_n {
        ranked.truncate(n);
    }

    DataFrame::new(vec![
        Column::new(key.into(), ranked.iter().map(|r| r.0).collect::<Vec<_>>()),
        Column::new("count".into(), ranked.iter().map(|r| r.1 as u64).collect::<Vec<u64>>()),
        Column::new("mean_size".into(), ranked.iter().map(|r| r.2).collect::<Vec<Option<f64>>>()),
        Column::new("mean_score".into(), ranked.iter().map(|r| r.3).collect::<Vec<Option<f64>>>()),
    ])
    .with_context(|| format!("Failed to build group stats for '{}'", key))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOverview {
    pub total_trees: usize,
    pub unique_species: usize,
    pub mean_size: Option<f64>,
    /// Species with the fewest records, ties alphabetical
    pub rarest_species: Option<String>,
}

pub fn overview(batch: &EnrichedBatch) -> BatchOverview {
    let counts = count_by(&batch.records, |r| r.species.as_str());
    let rarest_species = counts
        .iter()
        .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
        .map(|(species, _)| species.to_string());

    let mean_size = (!batch.is_empty())
        .then(|| batch.records.iter().map(|r| r.size_raw).sum::<f64>() / batch.len() as f64);

    BatchOverview {
        total_trees: batch.len(),
        unique_species: counts.len(),
        mean_size,
        rarest_species,
    }
}

/// Species and address restrictions; an empty list does not restrict
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub species: Vec<String>,
    pub addresses: Vec<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &EnrichedRecord) -> bool {
        (self.species.is_empty() || self.species.contains(&record.species))
            && (self.addresses.is_empty() || self.addresses.contains(&record.address))
    }
}

pub fn filter_records<'a>(batch: &'a EnrichedBatch, filter: &RecordFilter) -> Vec<&'a EnrichedRecord> {
    batch.records.iter().filter(|r| filter.matches(r)).collect()
}

/// Same restriction applied to an enriched table
pub fn filter_table(df: &DataFrame, filter: &RecordFilter) -> Result<DataFrame> {
    let by_species = filter_by_values(df, &filter.species, "species", "species filter")?;
    filter_by_values(&by_species, &filter.addresses, "address", "address filter")
}

/// Conservation priority for map markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBand {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl PriorityBand {
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            PriorityBand::VeryHigh
        } else if score > 0.4 {
            PriorityBand::High
        } else if score > 0.2 {
            PriorityBand::Moderate
        } else {
            PriorityBand::Low
        }
    }

    pub fn marker_color(&self) -> &'static str {
        match self {
            PriorityBand::VeryHigh => "darkgreen",
            PriorityBand::High => "green",
            PriorityBand::Moderate => "orange",
            PriorityBand::Low => "red",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::to_dataframe;
    use approx::assert_relative_eq;

    fn record(species: &str, address: &str, size: f64, score: f64) -> EnrichedRecord {
        EnrichedRecord {
            species: species.to_string(),
            genus: "g".to_string(),
            address: address.to_string(),
            latitude: 48.85,
            longitude: 2.35,
            species_count: 1,
            rarity_norm: 0.0,
            size_raw: size,
            size_norm: 0.0,
            nn_dist_m: 10.0,
            isolation_norm: 0.0,
            conservation_score: score,
            cluster: -1,
            species_rarity: 1.0,
        }
    }

    fn batch() -> EnrichedBatch {
        EnrichedBatch {
            records: vec![
                record("platanus", "RUE A", 20.0, 0.2),
                record("tilia", "RUE B", 10.0, 0.6),
                record("platanus", "RUE A", 30.0, 0.4),
                record("acer", "RUE B", 5.0, 1.0),
                record("tilia", "RUE C", 14.0, 0.0),
            ],
            dropped: 0,
            n_clusters: 0,
            n_noise: 5,
        }
    }

    #[test]
    fn test_describe() {
        let d = describe(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(d.count, 4);
        assert_relative_eq!(d.mean, 2.5);
        assert_relative_eq!(d.std, 1.2909944487358056, epsilon = 1e-12);
        assert_relative_eq!(d.q25, 1.75);
        assert_relative_eq!(d.median, 2.5);
        assert_relative_eq!(d.q75, 3.25);
        assert_relative_eq!(d.min, 1.0);
        assert_relative_eq!(d.max, 4.0);

        assert!(describe(&[]).is_none());
        assert!(describe(&[7.0]).unwrap().std.is_nan());
    }

    #[test]
    fn test_correlation_matrix() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        let c = [3.0, 2.0, 1.0];
        let flat = [5.0, 5.0, 5.0];
        let m = correlation_matrix(&[&a, &b, &c, &flat]);

        assert_relative_eq!(m[0][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(m[0][1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(m[0][2], -1.0, epsilon = 1e-12);
        assert_relative_eq!(m[2][0], m[0][2]);
        assert!(m[0][3].is_nan());
        assert!(m[3][3].is_nan());
    }

    #[test]
    fn test_group_stats_by_species() {
        let df = to_dataframe(&batch()).unwrap();
        let stats = group_stats(&df, "species", None).unwrap();
        assert_eq!(stats.height(), 3);

        let keys: Vec<&str> = stats.column("species").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(keys, vec!["platanus", "tilia", "acer"]);

        let mean_size = stats.column("mean_size").unwrap().f64().unwrap().get(0).unwrap();
        assert_relative_eq!(mean_size, 25.0);
        let mean_score = stats.column("mean_score").unwrap().f64().unwrap().get(1).unwrap();
        assert_relative_eq!(mean_score, 0.3);

        let top = group_stats(&df, "address", Some(1)).unwrap();
        assert_eq!(top.height(), 1);
    }

    #[test]
    fn test_group_stats_keeps_rows_aligned_with_null_sizes() {
        let df = df![
            "species" => &["a", "b", "c"],
            "size_raw" => &[None, Some(100.0), Some(5.0)],
            "conservation_score" => &[0.1, 0.5, 0.9],
        ]
        .unwrap();

        let stats = group_stats(&df, "species", None).unwrap();
        assert_eq!(stats.height(), 3);

        let keys: Vec<&str> = stats.column("species").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let sizes: Vec<Option<f64>> = stats.column("mean_size").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(sizes, vec![None, Some(100.0), Some(5.0)]);
        let scores: Vec<Option<f64>> = stats.column("mean_score").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(scores, vec![Some(0.1), Some(0.5), Some(0.9)]);
    }

    #[test]
    fn test_complete_rows_drops_whole_rows() {
        let x = vec![Some(1.0), None, Some(3.0), Some(4.0)];
        let y = vec![Some(2.0), Some(9.0), None, Some(8.0)];
        let rows = complete_rows(&[x, y]);
        assert_eq!(rows, vec![vec![1.0, 4.0], vec![2.0, 8.0]]);
    }

    #[test]
    fn test_overview() {
        let o = overview(&batch());
        assert_eq!(o.total_trees, 5);
        assert_eq!(o.unique_species, 3);
        assert_relative_eq!(o.mean_size.unwrap(), 15.8);
        assert_eq!(o.rarest_species.as_deref(), Some("acer"));

        let empty = EnrichedBatch { records: vec![], dropped: 0, n_clusters: 0, n_noise: 0 };
        assert_eq!(overview(&empty).mean_size, None);
    }

    #[test]
    fn test_filters() {
        let batch = batch();
        assert_eq!(filter_records(&batch, &RecordFilter::default()).len(), 5);

        let filter = RecordFilter {
            species: vec!["tilia".into()],
            addresses: vec!["RUE B".into(), "RUE C".into()],
        };
        assert_eq!(filter_records(&batch, &filter).len(), 2);

        let only_b = RecordFilter {
            addresses: vec!["RUE B".into()],
            ..RecordFilter::default()
        };
        let df = to_dataframe(&batch).unwrap();
        assert_eq!(filter_table(&df, &only_b).unwrap().height(), 2);
    }

    #[test]
    fn test_priority_bands() {
        assert_eq!(PriorityBand::from_score(0.71), PriorityBand::VeryHigh);
        assert_eq!(PriorityBand::from_score(0.7), PriorityBand::High);
        assert_eq!(PriorityBand::from_score(0.41), PriorityBand::High);
        assert_eq!(PriorityBand::from_score(0.3), PriorityBand::Moderate);
        assert_eq!(PriorityBand::from_score(0.2), PriorityBand::Low);
        assert_eq!(PriorityBand::Moderate.marker_color(), "orange");
    }
}

//! Exporter
//!
//! Writes an enriched batch as a CSV table, a GeoJSON FeatureCollection and
//! optionally a Parquet file, then hands the table to the relational sink.
//! File exports are fatal on failure; the sink is best-effort.

pub mod geojson;
pub mod sink;
pub mod tabular;

pub use geojson::write_geojson;
pub use sink::{persist_best_effort, sink_from_config, FailingSink, NoopSink, SinkOutcome, TableSink};
pub use tabular::{batch_from_dataframe, read_enriched_csv, to_dataframe, write_csv, write_parquet};

use crate::config::ExportConfig;
use crate::scorer::EnrichedBatch;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Tabular columns, in output order
pub const ENRICHED_COLUMNS: [&str; 13] = [
    "species",
    "genus",
    "address",
    "latitude",
    "longitude",
    "species_count",
    "rarity_norm",
    "size_raw",
    "size_norm",
    "nn_dist_m",
    "isolation_norm",
    "conservation_score",
    "cluster",
];

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub csv_path: PathBuf,
    pub geojson_path: PathBuf,
    pub parquet_path: Option<PathBuf>,
    pub rows: usize,
    pub sink: SinkOutcome,
}

/// Write every primary export, then hand the table to the sink
///
/// Files are written to staging paths next to their targets and renamed
/// only once all of them succeeded; a failed run leaves no new output.
pub fn export_all(batch: &EnrichedBatch, config: &ExportConfig, sink: &dyn TableSink) -> Result<ExportReport> {
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", config.output_dir))?;

    let df = to_dataframe(batch)?;
    let csv_path = config.csv_path();
    let geojson_path = config.geojson_path();
    let parquet_path = config.parquet_path();

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut write_all = || -> Result<()> {
        write_staged(&mut staged, &csv_path, |tmp| write_csv(&df, tmp))?;
        write_staged(&mut staged, &geojson_path, |tmp| write_geojson(batch, tmp))?;
        if let Some(path) = &parquet_path {
            write_staged(&mut staged, path, |tmp| write_parquet(&df, tmp))?;
        }
        commit_staged(&staged)
    };
    let written = write_all();

    if let Err(e) = written {
        for (tmp, _) in &staged {
            let _ = fs::remove_file(tmp);
        }
        return Err(e);
    }

    tracing::info!("Wrote {} rows to {:?}", df.height(), csv_path);
    tracing::info!("Wrote {} features to {:?}", batch.len(), geojson_path);
    if let Some(path) = &parquet_path {
        tracing::info!("Wrote Parquet copy to {:?}", path);
    }

    let sink = persist_best_effort(sink, &config.table_name, &df);

    Ok(ExportReport {
        csv_path,
        geojson_path,
        parquet_path,
        rows: df.height(),
        sink,
    })
}

/// `<dir>/.<name>.partial`
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.partial", name))
}

fn write_staged<F>(staged: &mut Vec<(PathBuf, PathBuf)>, target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = staging_path(target);
    staged.push((tmp.clone(), target.to_path_buf()));
    write(&tmp)
}

fn commit_staged(staged: &[(PathBuf, PathBuf)]) -> Result<()> {
    for (tmp, target) in staged {
        fs::rename(tmp, target)
            .with_context(|| format!("Failed to move {:?} into place at {:?}", tmp, target))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::EnrichedRecord;

    fn one_record_batch() -> EnrichedBatch {
        EnrichedBatch {
            records: vec![EnrichedRecord {
                species: "alba".into(),
                genus: "Salix".into(),
                address: "PARIS 12E ARRDT".into(),
                latitude: 48.84,
                longitude: 2.39,
                species_count: 1,
                rarity_norm: 1.0,
                size_raw: 9.0,
                size_norm: 0.0,
                nn_dist_m: 70.0,
                isolation_norm: 1.0,
                conservation_score: 1.0,
                cluster: -1,
                species_rarity: 1.0,
            }],
            dropped: 0,
            n_clusters: 0,
            n_noise: 1,
        }
    }

    #[test]
    fn test_export_all_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            output_dir: dir.path().join("nested/out"),
            parquet_file: Some("enriched.parquet".into()),
            ..ExportConfig::default()
        };

        let report = export_all(&one_record_batch(), &config, &NoopSink).unwrap();
        assert_eq!(report.rows, 1);
        assert!(report.csv_path.exists());
        assert!(report.geojson_path.exists());
        assert!(report.parquet_path.as_ref().unwrap().exists());
        assert_eq!(report.sink, SinkOutcome::Skipped);

        // No staging files left behind
        let leftovers: Vec<_> = std::fs::read_dir(&config.output_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty(), "staging files left: {:?}", leftovers);
    }

    #[test]
    fn test_failed_export_leaves_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        // A directory where the GeoJSON staging file should go makes that write fail
        std::fs::create_dir_all(out.join(".arbres_enriched.geojson.partial")).unwrap();

        let config = ExportConfig {
            output_dir: out,
            ..ExportConfig::default()
        };
        assert!(export_all(&one_record_batch(), &config, &NoopSink).is_err());
        assert!(!config.csv_path().exists());
        assert!(!config.geojson_path().exists());
        assert!(!config.output_dir.join(".arbres_enriched.csv.partial").exists());
    }
}

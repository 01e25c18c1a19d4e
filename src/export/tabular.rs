//! Tabular export: enriched batch <-> polars DataFrame, CSV and Parquet

use super::ENRICHED_COLUMNS;
use crate::features::rarity;
use crate::scorer::{EnrichedBatch, EnrichedRecord};
use crate::utils::lazy_helpers::materialize_with_columns;
use crate::clustering::NOISE_LABEL;
use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::sync::Arc;
use std::path::Path;

/// One row per record, columns exactly `ENRICHED_COLUMNS`
pub fn to_dataframe(batch: &EnrichedBatch) -> Result<DataFrame> {
    let r = &batch.records;

    let columns = vec![
        Column::new("species".into(), r.iter().map(|x| x.species.as_str()).collect::<Vec<_>>()),
        Column::new("genus".into(), r.iter().map(|x| x.genus.as_str()).collect::<Vec<_>>()),
        Column::new("address".into(), r.iter().map(|x| x.address.as_str()).collect::<Vec<_>>()),
        Column::new("latitude".into(), r.iter().map(|x| x.latitude).collect::<Vec<f64>>()),
        Column::new("longitude".into(), r.iter().map(|x| x.longitude).collect::<Vec<f64>>()),
        Column::new("species_count".into(), r.iter().map(|x| x.species_count as i64).collect::<Vec<i64>>()),
        Column::new("rarity_norm".into(), r.iter().map(|x| x.rarity_norm).collect::<Vec<f64>>()),
        Column::new("size_raw".into(), r.iter().map(|x| x.size_raw).collect::<Vec<f64>>()),
        Column::new("size_norm".into(), r.iter().map(|x| x.size_norm).collect::<Vec<f64>>()),
        Column::new("nn_dist_m".into(), r.iter().map(|x| x.nn_dist_m).collect::<Vec<f64>>()),
        Column::new("isolation_norm".into(), r.iter().map(|x| x.isolation_norm).collect::<Vec<f64>>()),
        Column::new("conservation_score".into(), r.iter().map(|x| x.conservation_score).collect::<Vec<f64>>()),
        Column::new("cluster".into(), r.iter().map(|x| x.cluster).collect::<Vec<i64>>()),
    ];

    DataFrame::new(columns).context("Failed to build enriched DataFrame")
}

pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;

    let mut out = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut out)
        .with_context(|| format!("Failed to write CSV: {:?}", path))
}

pub fn write_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create Parquet file: {:?}", path))?;

    let mut out = df.clone();
    ParquetWriter::new(file)
        .finish(&mut out)
        .with_context(|| format!("Failed to write Parquet: {:?}", path))?;
    Ok(())
}

/// Columns read as text regardless of how their values look
const IDENTITY_COLUMNS: [&str; 3] = ["species", "genus", "address"];

/// Load an enriched CSV, keeping exactly the enriched columns in order
///
/// Identity columns stay text so values like `075001` keep their digits.
pub fn read_enriched_csv(path: &Path) -> Result<DataFrame> {
    let mut identity_schema = Schema::with_capacity(IDENTITY_COLUMNS.len());
    for name in IDENTITY_COLUMNS {
        identity_schema.with_column(name.into(), DataType::String);
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_schema_overwrite(Some(Arc::new(identity_schema)))
        .try_into_reader_with_file_path(Some(path.into()))
        .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to load enriched CSV: {:?}", path))?;

    materialize_with_columns(&df.lazy(), &ENRICHED_COLUMNS, "enriched CSV")
}

/// Rebuild records from an enriched table (as written by `to_dataframe`)
pub fn records_from_dataframe(df: &DataFrame) -> Result<Vec<EnrichedRecord>> {
    let species = str_column(df, "species")?;
    let genus = str_column(df, "genus")?;
    let address = str_column(df, "address")?;
    let latitude = f64_column(df, "latitude")?;
    let longitude = f64_column(df, "longitude")?;
    let species_count = i64_column(df, "species_count")?;
    let rarity_norm = f64_column(df, "rarity_norm")?;
    let size_raw = f64_column(df, "size_raw")?;
    let size_norm = f64_column(df, "size_norm")?;
    let nn_dist_m = f64_column(df, "nn_dist_m")?;
    let isolation_norm = f64_column(df, "isolation_norm")?;
    let conservation_score = f64_column(df, "conservation_score")?;
    let cluster = i64_column(df, "cluster")?;

    (0..df.height())
        .map(|i| {
            let count = usize::try_from(species_count[i])
                .ok()
                .filter(|&c| c > 0)
                .ok_or_else(|| anyhow!("species_count must be positive at row {}", i))?;
            Ok(EnrichedRecord {
                species: species[i].clone(),
                genus: genus[i].clone(),
                address: address[i].clone(),
                latitude: latitude[i],
                longitude: longitude[i],
                species_count: count,
                rarity_norm: rarity_norm[i],
                size_raw: size_raw[i],
                size_norm: size_norm[i],
                nn_dist_m: nn_dist_m[i],
                isolation_norm: isolation_norm[i],
                conservation_score: conservation_score[i],
                cluster: cluster[i],
                species_rarity: rarity(count),
            })
        })
        .collect()
}

/// Rebuild an enriched batch; cluster/noise totals are recounted from labels
pub fn batch_from_dataframe(df: &DataFrame) -> Result<EnrichedBatch> {
    let records = records_from_dataframe(df)?;
    let clusters: BTreeSet<i64> = records
        .iter()
        .map(|r| r.cluster)
        .filter(|&c| c != NOISE_LABEL)
        .collect();
    let n_noise = records.iter().filter(|r| r.cluster == NOISE_LABEL).count();

    Ok(EnrichedBatch {
        records,
        dropped: 0,
        n_clusters: clusters.len(),
        n_noise,
    })
}

fn str_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df.column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::String)
        .with_context(|| format!("Column '{}' is not castable to string", name))?;

    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(crate::data::UNKNOWN).to_string())
        .collect())
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::Float64)
        .with_context(|| format!("Column '{}' is not numeric", name))?;

    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow!("Column '{}' has a null at row {}", name, i)))
        .collect()
}

fn i64_column(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = df.column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .cast(&DataType::Int64)
        .with_context(|| format!("Column '{}' is not integer", name))?;

    column
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| anyhow!("Column '{}' has a null at row {}", name, i)))
        .collect()
}

//! Pipeline configuration
//!
//! Loaded from an optional JSON file, then overlaid with environment
//! variables. Every field has a default so an empty `{}` file is valid.

use crate::clustering::DbscanParams;
use crate::scorer::ScoreWeights;
use crate::utils::normalization::DegeneratePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_INPUT: &str = "TREE_SCORER_INPUT";
pub const ENV_OUTPUT_DIR: &str = "TREE_SCORER_OUTPUT_DIR";
pub const ENV_DB_PATH: &str = "TREE_SCORER_DB_PATH";
pub const ENV_TABLE: &str = "TREE_SCORER_TABLE";

/// Order of the two numbers inside the combined position field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateOrder {
    #[default]
    LonLat,
    LatLon,
}

/// Source field names for the attributes the pipeline reads
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldNames {
    pub species: String,
    pub genus: String,
    pub address: String,
    pub height: String,
    pub position: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            species: "arbres_espece".to_string(),
            genus: "arbres_genre".to_string(),
            address: "com_adresse".to_string(),
            height: "arbres_hauteurenm".to_string(),
            position: "geom_x_y".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub fields: FieldNames,
    pub position_order: CoordinateOrder,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub csv_file: String,
    pub geojson_file: String,
    /// Columnar copy of the tabular export, skipped when `None`
    pub parquet_file: Option<String>,
    pub table_name: String,
    /// DuckDB database file for the optional sink; no sink when `None`
    pub db_path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            csv_file: "arbres_enriched.csv".to_string(),
            geojson_file: "arbres_enriched.geojson".to_string(),
            parquet_file: None,
            table_name: "arbres_enriched".to_string(),
            db_path: None,
        }
    }
}

impl ExportConfig {
    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(&self.csv_file)
    }

    pub fn geojson_path(&self) -> PathBuf {
        self.output_dir.join(&self.geojson_file)
    }

    pub fn parquet_path(&self) -> Option<PathBuf> {
        self.parquet_file.as_ref().map(|f| self.output_dir.join(f))
    }
}

/// Full configuration for one enrichment run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub loader: LoaderConfig,
    pub clustering: DbscanParams,
    pub weights: ScoreWeights,
    pub degenerate_policy: DegeneratePolicy,
    pub export: ExportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/arbres.json"),
            loader: LoaderConfig::default(),
            clustering: DbscanParams::default(),
            weights: ScoreWeights::default(),
            degenerate_policy: DegeneratePolicy::default(),
            export: ExportConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: PipelineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.clustering.validate()?;
        crate::export::sink::validate_table_name(&self.export.table_name)?;
        Ok(())
    }

    /// Overlay values from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(input) = lookup(ENV_INPUT) {
            self.input_path = PathBuf::from(input);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.export.output_dir = PathBuf::from(dir);
        }
        if let Some(db) = lookup(ENV_DB_PATH) {
            self.export.db_path = if db.is_empty() { None } else { Some(PathBuf::from(db)) };
        }
        if let Some(table) = lookup(ENV_TABLE) {
            self.export.table_name = table;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.loader.fields.species, "arbres_espece");
        assert_eq!(config.loader.position_order, CoordinateOrder::LonLat);
        assert_relative_eq!(config.clustering.eps, 50.0);
        assert_eq!(config.clustering.min_samples, 3);
        assert_eq!(config.degenerate_policy, DegeneratePolicy::Zero);
        assert_eq!(config.export.table_name, "arbres_enriched");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let json = r#"{
            "loader": { "position_order": "lat_lon", "fields": { "height": "hauteur" } },
            "clustering": { "eps": 25.0 },
            "degenerate_policy": "midpoint"
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.loader.position_order, CoordinateOrder::LatLon);
        assert_eq!(config.loader.fields.height, "hauteur");
        assert_eq!(config.loader.fields.species, "arbres_espece");
        assert_relative_eq!(config.clustering.eps, 25.0);
        assert_eq!(config.clustering.min_samples, 3);
        assert_eq!(config.degenerate_policy, DegeneratePolicy::Midpoint);
    }

    #[test]
    fn test_bad_weights_rejected() {
        let json = r#"{ "weights": { "rarity": 0.5, "size": 0.5, "isolation": 0.5 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("weights"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_INPUT, "/tmp/in.json"),
            (ENV_OUTPUT_DIR, "/tmp/out"),
            (ENV_DB_PATH, "/tmp/trees.duckdb"),
        ]
        .into_iter()
        .collect();

        let config = PipelineConfig::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.input_path, PathBuf::from("/tmp/in.json"));
        assert_eq!(config.export.csv_path(), PathBuf::from("/tmp/out/arbres_enriched.csv"));
        assert_eq!(config.export.db_path, Some(PathBuf::from("/tmp/trees.duckdb")));
        assert_eq!(config.export.table_name, "arbres_enriched");
    }

    #[test]
    fn test_load_missing_file() {
        let result = PipelineConfig::load(Path::new("/nonexistent/config.json"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }
}

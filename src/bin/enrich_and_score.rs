//! Enrich and score a tree inventory
//!
//! Loads raw JSON records, computes conservation scores and clusters, and
//! writes the CSV/GeoJSON exports (plus the optional database table).
//!
//! Usage:
//!   cargo run --bin enrich_and_score -- [config.json]
//!
//! Environment overrides: TREE_SCORER_INPUT, TREE_SCORER_OUTPUT_DIR,
//! TREE_SCORER_DB_PATH, TREE_SCORER_TABLE. Log level via RUST_LOG.

use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tree_scorer_rust::{sink_from_config, ConservationScorer, PipelineConfig, SinkOutcome};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tree_scorer_rust=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::load(&PathBuf::from(path))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();

    tracing::info!("Configuration:");
    tracing::info!("  input: {:?}", config.input_path);
    tracing::info!("  output_dir: {:?}", config.export.output_dir);
    tracing::info!("  dbscan: eps={} min_samples={}", config.clustering.eps, config.clustering.min_samples);
    tracing::info!("  weights: {:?}", config.weights);

    let sink = sink_from_config(&config.export);
    let scorer = ConservationScorer::new(config)?;
    let report = scorer.run(sink.as_ref())?;

    println!("\n{}", "=".repeat(70));
    println!("Enrichment summary");
    println!("{}", "=".repeat(70));
    println!("Trees scored:      {}", report.batch.len());
    println!("Records dropped:   {}", report.batch.dropped);
    println!("Clusters:          {}", report.batch.n_clusters);
    println!("Noise points:      {}", report.batch.n_noise);
    println!("CSV:               {}", report.export.csv_path.display());
    println!("GeoJSON:           {}", report.export.geojson_path.display());
    if let Some(path) = &report.export.parquet_path {
        println!("Parquet:           {}", path.display());
    }
    match &report.export.sink {
        SinkOutcome::Skipped => println!("Database:          not configured"),
        SinkOutcome::Written { sink, table, rows } => {
            println!("Database:          {} rows -> {}.{}", rows, sink, table)
        }
        SinkOutcome::Failed { sink, reason, .. } => {
            println!("Database:          {} write failed ({})", sink, reason)
        }
    }

    Ok(())
}

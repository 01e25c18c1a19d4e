//! Tree Scorer Rust Implementation
//!
//! Conservation scoring for urban tree inventories: every tree in a batch is
//! scored from its species rarity, its size and its spatial isolation, and
//! grouped into density clusters.
//!
//! Pipeline stages, each in its own module:
//! - `data/`: Load raw JSON records and resolve positions
//! - `projection/`: WGS84 -> Web Mercator (EPSG:3857) and spatial index
//! - `features/`: Raw signals (F1 rarity, F2 size, F3 isolation)
//! - `utils/`: Normalization and whole-batch aggregation
//! - `scorer/`: Weighted composite score and batch coordinator
//! - `clustering/`: DBSCAN over projected points
//! - `export/`: CSV, GeoJSON, Parquet and the optional table sink
//! - `analysis/`: Summaries over enriched output

pub mod analysis;
pub mod clustering;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod features;
pub mod projection;
pub mod scorer;
pub mod spatial;
pub mod utils;

// Re-export commonly used types
pub use clustering::{cluster_points, ClusterResult, DbscanParams, NOISE_LABEL};
pub use config::{CoordinateOrder, ExportConfig, LoaderConfig, PipelineConfig};
pub use data::{load_records, load_records_from_path, LoadedBatch, TreeRecord};
pub use error::{PipelineError, SinkError};
pub use export::{export_all, sink_from_config, ExportReport, SinkOutcome, TableSink, ENRICHED_COLUMNS};
pub use projection::{project_batch, ProjectedBatch, WebMercator};
pub use scorer::{ConservationScorer, EnrichedBatch, EnrichedRecord, RunReport, ScoreWeights, DEFAULT_WEIGHTS};
pub use utils::DegeneratePolicy;

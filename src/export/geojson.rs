//! GeoJSON export (RFC 7946)
//!
//! One `Point` feature per record in WGS84 `[longitude, latitude]`, with the
//! tabular columns as properties.

use crate::scorer::{EnrichedBatch, EnrichedRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature<'a>>,
}

#[derive(Debug, Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: PointGeometry,
    properties: &'a EnrichedRecord,
}

#[derive(Debug, Serialize)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

fn feature_collection(batch: &EnrichedBatch) -> FeatureCollection<'_> {
    FeatureCollection {
        kind: "FeatureCollection",
        features: batch
            .records
            .iter()
            .map(|r| Feature {
                kind: "Feature",
                geometry: PointGeometry {
                    kind: "Point",
                    coordinates: [r.longitude, r.latitude],
                },
                properties: r,
            })
            .collect(),
    }
}

pub fn write_geojson(batch: &EnrichedBatch, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create GeoJSON file: {:?}", path))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, &feature_collection(batch))
        .with_context(|| format!("Failed to write GeoJSON: {:?}", path))?;
    writer.flush()
        .with_context(|| format!("Failed to flush GeoJSON: {:?}", path))?;
    Ok(())
}

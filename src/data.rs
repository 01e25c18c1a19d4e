//! Record Loading
//!
//! Turns raw open-data records into uniform `TreeRecord`s with an explicit
//! longitude/latitude pair. Position comes from the combined position field
//! when it holds a usable pair, otherwise from `geometry.coordinates`
//! (`[lon, lat]`). Records with neither are dropped and counted.

use crate::config::{CoordinateOrder, LoaderConfig};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Sentinel for absent identity fields
pub const UNKNOWN: &str = "unknown";

/// One tree with a resolved position
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    pub species: String,
    pub genus: String,
    pub address: String,
    pub longitude: f64,
    pub latitude: f64,
    /// All source fields, untouched
    pub fields: Map<String, Value>,
}

/// Output of the loader stage
#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    pub records: Vec<TreeRecord>,
    /// Records discarded because no position could be resolved
    pub dropped: usize,
}

impl LoadedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load records from a JSON file
///
/// Accepts either a top-level array of records or the raw API response
/// object carrying a `records` array.
pub fn load_records_from_path(path: &Path, config: &LoaderConfig) -> Result<LoadedBatch> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file: {:?}", path))?;

    let json: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse records JSON: {:?}", path))?;

    let raw = match json {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("records") {
            Some(Value::Array(items)) => items,
            _ => anyhow::bail!("{:?}: expected an array of records or an object with 'records'", path),
        },
        _ => anyhow::bail!("{:?}: expected an array of records or an object with 'records'", path),
    };

    Ok(load_records(&raw, config))
}

/// Parse raw records into a uniform batch
pub fn load_records(raw: &[Value], config: &LoaderConfig) -> LoadedBatch {
    let mut records = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for record in raw {
        let Some(fields) = source_fields(record) else {
            dropped += 1;
            continue;
        };

        let Some((longitude, latitude)) = resolve_position(record, &fields, config) else {
            dropped += 1;
            continue;
        };

        let names = &config.fields;
        records.push(TreeRecord {
            species: identity(&fields, &names.species),
            genus: identity(&fields, &names.genus),
            address: identity(&fields, &names.address),
            longitude,
            latitude,
            fields,
        });
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} of {} records with no resolvable position", dropped, raw.len());
    }
    tracing::info!("Loaded {} records", records.len());

    LoadedBatch { records, dropped }
}

/// The attribute mapping of a record: its `fields` object, or the record itself
fn source_fields(record: &Value) -> Option<Map<String, Value>> {
    let obj = record.as_object()?;
    match obj.get("fields") {
        Some(Value::Object(fields)) => Some(fields.clone()),
        _ => {
            let mut fields = obj.clone();
            fields.remove("geometry");
            Some(fields)
        }
    }
}

fn resolve_position(
    record: &Value,
    fields: &Map<String, Value>,
    config: &LoaderConfig,
) -> Option<(f64, f64)> {
    let combined = fields
        .get(&config.fields.position)
        .and_then(parse_pair)
        .map(|(a, b)| match config.position_order {
            CoordinateOrder::LonLat => (a, b),
            CoordinateOrder::LatLon => (b, a),
        });

    combined.or_else(|| {
        record
            .get("geometry")
            .and_then(|g| g.get("coordinates"))
            .and_then(parse_pair)
    })
}

/// Two finite numbers at the head of an array
fn parse_pair(value: &Value) -> Option<(f64, f64)> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    let a = coerce_number(&items[0])?;
    let b = coerce_number(&items[1])?;
    Some((a, b))
}

/// Numeric value of a JSON number or numeric string
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn identity(fields: &Map<String, Value>, name: &str) -> String {
    match fields.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

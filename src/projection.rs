//! Geometry Projection
//!
//! WGS84 degrees -> Web Mercator (EPSG:3857) metres. Nearest-neighbor and
//! clustering distances are computed in this frame only; the geographic
//! coordinates stay on the records for output.

use crate::data::{LoadedBatch, TreeRecord};
use crate::error::PipelineError;
use crate::spatial::{PlanarPoint, RTreeIndex};
use anyhow::Result;
use std::f64::consts::PI;

/// Spherical Web Mercator
pub struct WebMercator;

impl WebMercator {
    pub const EPSG: u32 = 3857;
    pub const RADIUS_M: f64 = 6_378_137.0;
    /// Latitude at which the projection becomes square
    pub const MAX_LATITUDE: f64 = 85.051_128_78;

    pub fn project(lon: f64, lat: f64) -> PlanarPoint {
        let lat = lat.clamp(-Self::MAX_LATITUDE, Self::MAX_LATITUDE);
        let x = Self::RADIUS_M * lon.to_radians();
        let y = Self::RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        PlanarPoint::new(x, y)
    }

    pub fn unproject(point: PlanarPoint) -> (f64, f64) {
        let lon = (point.x / Self::RADIUS_M).to_degrees();
        let lat = (2.0 * (point.y / Self::RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}

/// Output of the projector stage: records, their planar points, and the
/// spatial index over those points (shared by isolation and clustering)
pub struct ProjectedBatch {
    pub records: Vec<TreeRecord>,
    pub points: Vec<PlanarPoint>,
    pub index: RTreeIndex,
    /// Carried through from the loader for the run report
    pub dropped: usize,
}

impl ProjectedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Project every record and build the spatial index
pub fn project_batch(loaded: LoadedBatch) -> Result<ProjectedBatch> {
    let points = loaded
        .records
        .iter()
        .enumerate()
        .map(|(index, r)| {
            let valid = r.longitude.is_finite()
                && r.latitude.is_finite()
                && r.longitude.abs() <= 180.0
                && r.latitude.abs() <= 90.0;
            if !valid {
                return Err(PipelineError::InvalidCoordinate {
                    index,
                    lon: r.longitude,
                    lat: r.latitude,
                });
            }
            Ok(WebMercator::project(r.longitude, r.latitude))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let index = RTreeIndex::build(&points);
    tracing::debug!("Projected {} points to EPSG:{}", points.len(), WebMercator::EPSG);

    Ok(ProjectedBatch {
        records: loaded.records,
        points,
        index,
        dropped: loaded.dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::SpatialIndex;
    use approx::assert_relative_eq;
    use serde_json::Map;

    fn record(lon: f64, lat: f64) -> TreeRecord {
        TreeRecord {
            species: "s".into(),
            genus: "g".into(),
            address: "a".into(),
            longitude: lon,
            latitude: lat,
            fields: Map::new(),
        }
    }

    #[test]
    fn test_origin() {
        let p = WebMercator::project(0.0, 0.0);
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_known_point_paris() {
        let p = WebMercator::project(2.3499, 48.8530);
        assert_relative_eq!(p.x, 261_589.67, epsilon = 0.01);
        assert_relative_eq!(p.y, 6_249_955.28, epsilon = 0.01);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let (lon, lat) = WebMercator::unproject(WebMercator::project(-73.97, 40.78));
        assert_relative_eq!(lon, -73.97, epsilon = 1e-9);
        assert_relative_eq!(lat, 40.78, epsilon = 1e-9);
    }

    #[test]
    fn test_poles_are_clamped() {
        let p = WebMercator::project(0.0, 90.0);
        assert!(p.y.is_finite());
    }

    #[test]
    fn test_project_batch_keeps_geographic_coords() {
        let loaded = LoadedBatch {
            records: vec![record(2.35, 48.85), record(2.36, 48.86)],
            dropped: 4,
        };
        let projected = project_batch(loaded).unwrap();
        assert_eq!(projected.len(), 2);
        assert_eq!(projected.index.len(), 2);
        assert_eq!(projected.dropped, 4);
        assert_eq!(projected.records[0].longitude, 2.35);
        assert!(projected.points[1].x > projected.points[0].x);
    }

    #[test]
    fn test_out_of_range_coordinate_is_fatal() {
        let loaded = LoadedBatch {
            records: vec![record(2.35, 48.85), record(200.0, 48.0)],
            dropped: 0,
        };
        let err = project_batch(loaded).err().unwrap();
        assert!(err.to_string().contains("record 1"));
    }
}

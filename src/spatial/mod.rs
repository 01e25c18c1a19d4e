//! Spatial index abstraction
//!
//! Everything geometric downstream of the projector (isolation, clustering)
//! talks to a `SpatialIndex`, never to a concrete tree.

pub mod rtree_index;

pub use rtree_index::RTreeIndex;

use smallvec::SmallVec;

/// A point in the projected (metric) frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One k-nearest hit: record index and metric distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// Most queries ask for k = 2 (self + nearest other)
pub type Neighbors = SmallVec<[Neighbor; 4]>;

/// Capability needed by the geometric stages
///
/// Implementations index a fixed point set; record indices refer to
/// positions in the slice the index was built from.
pub trait SpatialIndex: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `k` closest indexed points, ascending by distance, ties by index.
    /// An indexed query point is its own first hit at distance 0.
    fn k_nearest(&self, query: PlanarPoint, k: usize) -> Neighbors;

    /// Indices of all points with distance <= `radius`, ascending
    fn within_radius(&self, query: PlanarPoint, radius: f64) -> Vec<usize>;
}

/// Brute-force reference used to check the tree in tests
#[cfg(test)]
pub(crate) struct LinearIndex {
    points: Vec<PlanarPoint>,
}

#[cfg(test)]
impl LinearIndex {
    pub(crate) fn build(points: &[PlanarPoint]) -> Self {
        Self { points: points.to_vec() }
    }
}

#[cfg(test)]
impl SpatialIndex for LinearIndex {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn k_nearest(&self, query: PlanarPoint, k: usize) -> Neighbors {
        let mut all: Vec<Neighbor> = self
            .points
            .iter()
            .enumerate()
            .map(|(index, p)| Neighbor { index, distance: p.distance(&query) })
            .collect();
        all.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        all.into_iter().take(k).collect()
    }

    fn within_radius(&self, query: PlanarPoint, radius: f64) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.distance(&query) <= radius)
            .map(|(i, _)| i)
            .collect()
    }
}

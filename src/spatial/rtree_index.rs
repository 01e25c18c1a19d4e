//! R*-tree backed spatial index
//!
//! Bulk-loaded once per batch; queries are read-only so the index is shared
//! across rayon workers without locking.

use super::{Neighbor, Neighbors, PlanarPoint, SpatialIndex};
use rstar::primitives::GeomWithData;
use rstar::RTree;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

pub struct RTreeIndex {
    tree: RTree<IndexedPoint>,
}

impl RTreeIndex {
    pub fn build(points: &[PlanarPoint]) -> Self {
        let items: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(idx, p)| GeomWithData::new([p.x, p.y], idx))
            .collect();

        Self {
            tree: RTree::bulk_load(items),
        }
    }
}

impl SpatialIndex for RTreeIndex {
    fn len(&self) -> usize {
        self.tree.size()
    }

    fn k_nearest(&self, query: PlanarPoint, k: usize) -> Neighbors {
        if k == 0 {
            return Neighbors::new();
        }

        // Keep pulling while candidates tie with the k-th distance so the
        // index tie-break below sees every equidistant point.
        let mut candidates: Vec<(usize, f64)> = Vec::with_capacity(k + 2);
        for (item, dist_2) in self.tree.nearest_neighbor_iter_with_distance_2(&[query.x, query.y]) {
            if candidates.len() >= k {
                let (_, last) = candidates[candidates.len() - 1];
                if dist_2 > last {
                    break;
                }
            }
            candidates.push((item.data, dist_2));
        }

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        candidates
            .into_iter()
            .take(k)
            .map(|(index, dist_2)| Neighbor {
                index,
                distance: dist_2.sqrt(),
            })
            .collect()
    }

    fn within_radius(&self, query: PlanarPoint, radius: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_within_distance([query.x, query.y], radius * radius)
            .map(|item| item.data)
            .collect();
        hits.sort_unstable();
        hits
    }
}

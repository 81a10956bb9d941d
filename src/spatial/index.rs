// src/spatial/index.rs - Immutable bounding-box index over a fixed geometry collection
use geo_types::{Point, Rect};
use log::debug;
use rstar::{RTree, RTreeObject, AABB};

/// Envelope stored in the R-tree. `id` is the position of the geometry in the
/// collection the index was built from.
#[derive(Debug, Clone, Copy)]
struct IndexedEnvelope {
    aabb: AABB<[f64; 2]>,
    id: usize,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

impl rstar::PointDistance for IndexedEnvelope {
    // distance to the bounding box, zero when the point is inside it
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        rstar::Envelope::distance_2(&self.aabb, point)
    }
}

fn to_aabb(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Bulk-loaded R-tree over axis-aligned bounding boxes. Built once, never mutated.
///
/// Distances are in coordinate units (degrees for lon/lat data) and are measured
/// from the query point to each geometry's bounding box.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedEnvelope>,
    skipped: usize,
}

impl SpatialIndex {
    /// Builds the index from one bounding box per geometry, in collection order.
    /// Entries without a bounding box (empty geometries) are left out of the index
    /// but still consume their id, so ids keep lining up with the source collection.
    pub fn build<I>(bounding_rects: I) -> Self
    where
        I: IntoIterator<Item = Option<Rect<f64>>>,
    {
        let mut skipped = 0;
        let envelopes: Vec<IndexedEnvelope> = bounding_rects
            .into_iter()
            .enumerate()
            .filter_map(|(id, rect)| match rect {
                Some(rect) => Some(IndexedEnvelope {
                    aabb: to_aabb(rect),
                    id,
                }),
                None => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            debug!("Spatial index: {} geometries without a bounding box were not indexed", skipped);
        }
        Self {
            tree: RTree::bulk_load(envelopes),
            skipped,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Number of input geometries that had no bounding box.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Ids of at most `max_results` geometries whose bounding box lies within
    /// `max_distance` of `point`, nearest first. Ties are broken by id.
    pub fn nearest(&self, point: Point<f64>, max_results: usize, max_distance: f64) -> Vec<usize> {
        if max_results == 0 || max_distance < 0.0 {
            return Vec::new();
        }
        let max_distance_2 = max_distance * max_distance;
        let mut found: Vec<(f64, usize)> = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[point.x(), point.y()])
            .take_while(|(_, d2)| *d2 <= max_distance_2)
            .map(|(entry, d2)| (d2, entry.id))
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.truncate(max_results);
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Ids of every geometry whose bounding box contains `point`, ordered by id.
    pub fn candidates_containing(&self, point: Point<f64>) -> Vec<usize> {
        self.nearest(point, usize::MAX, 0.0)
    }

    /// Ids of every geometry whose bounding box intersects `bbox`, ordered by id.
    pub fn candidates_overlapping(&self, bbox: Rect<f64>) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&to_aabb(bbox))
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::coord;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<Rect<f64>> {
        Some(Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }))
    }

    fn sample_index() -> SpatialIndex {
        SpatialIndex::build(vec![
            rect(0.0, 0.0, 1.0, 1.0),
            rect(5.0, 5.0, 6.0, 6.0),
            None,
            rect(0.5, 0.5, 2.0, 2.0),
            rect(10.0, 10.0, 11.0, 11.0),
        ])
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = SpatialIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.nearest(Point::new(0.0, 0.0), 10, 100.0).is_empty());
        assert!(index
            .candidates_overlapping(Rect::new(coord! { x: -1.0, y: -1.0 }, coord! { x: 1.0, y: 1.0 }))
            .is_empty());
    }

    #[test]
    fn test_ids_follow_input_positions() {
        let index = sample_index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.skipped(), 1);
        assert_eq!(index.candidates_containing(Point::new(10.5, 10.5)), vec![4]);
    }

    #[test]
    fn test_nearest_orders_by_bbox_distance() {
        let index = sample_index();
        let ids = index.nearest(Point::new(3.0, 3.0), 10, 100.0);
        assert_eq!(ids, vec![3, 0, 1, 4]);

        let limited = index.nearest(Point::new(3.0, 3.0), 2, 100.0);
        assert_eq!(limited, vec![3, 0]);

        let close = index.nearest(Point::new(3.0, 3.0), 10, 1.5);
        assert_eq!(close, vec![3]);
    }

    #[test]
    fn test_point_inside_overlapping_boxes() {
        let index = sample_index();
        assert_eq!(index.candidates_containing(Point::new(0.75, 0.75)), vec![0, 3]);
        assert!(index.candidates_containing(Point::new(3.0, 3.0)).is_empty());
    }

    #[test]
    fn test_candidates_overlapping_bbox() {
        let index = sample_index();
        let query = Rect::new(coord! { x: 1.5, y: 1.5 }, coord! { x: 5.5, y: 5.5 });
        assert_eq!(index.candidates_overlapping(query), vec![1, 3]);
    }
}

// src/spatial/blocks.rs - Point-in-polygon block lookup used to scope candidate search
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use geo::{BoundingRect, Contains, Intersects};
use geo_types::{MultiPolygon, Point};
use log::{debug, warn};
use serde::Serialize;

use crate::errors::DataQualityIssue;
use crate::spatial::index::SpatialIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

/// Bucket a reference address is filed under. Addresses outside every block
/// land in `Unassigned` rather than being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockKey {
    Assigned(BlockId),
    Unassigned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub geometry: MultiPolygon<f64>,
    /// Number of reference addresses known to fall inside the block, when the
    /// block dataset carries one.
    pub reference_count: Option<usize>,
}

impl Block {
    pub fn new(id: BlockId, geometry: MultiPolygon<f64>, reference_count: usize) -> Self {
        Self {
            id,
            geometry,
            reference_count: Some(reference_count),
        }
    }

    pub fn without_count(id: BlockId, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id,
            geometry,
            reference_count: None,
        }
    }

    /// True only when the block is known to hold no reference addresses.
    pub fn has_no_references(&self) -> bool {
        self.reference_count == Some(0)
    }
}

/// Result of locating a point: the chosen block plus any other blocks that
/// also contain it (non-empty only for overlapping, invalid partitions).
#[derive(Debug, Clone)]
pub struct BlockLocation<'a> {
    pub block: Option<&'a Block>,
    pub also_containing: Vec<BlockId>,
}

impl<'a> BlockLocation<'a> {
    pub fn is_ambiguous(&self) -> bool {
        !self.also_containing.is_empty()
    }

    /// The ambiguity as a data-quality issue, when there is one.
    pub fn issue(&self, point: Point<f64>) -> Option<DataQualityIssue> {
        let block = self.block?;
        if !self.is_ambiguous() {
            return None;
        }
        let mut blocks = Vec::with_capacity(self.also_containing.len() + 1);
        blocks.push(block.id);
        blocks.extend(self.also_containing.iter().copied());
        Some(DataQualityIssue::AmbiguousBlock {
            lon: point.x(),
            lat: point.y(),
            blocks,
        })
    }
}

/// Immutable index over the block partition.
#[derive(Debug)]
pub struct BlockIndex {
    blocks: Vec<Block>,
    positions: HashMap<BlockId, usize>,
    index: SpatialIndex,
}

impl BlockIndex {
    pub fn build(blocks: Vec<Block>) -> Self {
        let index = SpatialIndex::build(blocks.iter().map(|b| b.geometry.bounding_rect()));
        let positions = blocks
            .iter()
            .enumerate()
            .map(|(pos, b)| (b.id, pos))
            .collect();
        debug!("Block index built over {} blocks", blocks.len());
        Self {
            blocks,
            positions,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.positions.get(&id).map(|&pos| &self.blocks[pos])
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Every block whose polygon truly contains `point`, in candidate order.
    /// The first one wins; the rest are reported back so callers can flag them.
    pub fn locate(&self, point: Point<f64>) -> BlockLocation<'_> {
        let mut containing = self
            .index
            .candidates_containing(point)
            .into_iter()
            .map(|pos| &self.blocks[pos])
            .filter(|block| block.geometry.contains(&point));

        let block = containing.next();
        let also_containing = containing.map(|b| b.id).collect();
        BlockLocation {
            block,
            also_containing,
        }
    }

    /// The block containing `point`, or `None` when it falls outside all of them.
    /// Points on a block boundary are outside that block.
    pub fn find_containing(&self, point: Point<f64>) -> Option<&Block> {
        let location = self.locate(point);
        if let (Some(block), true) = (location.block, location.is_ambiguous()) {
            warn!(
                "Point ({}, {}) lies in {} and {:?}; using {}",
                point.x(),
                point.y(),
                block.id,
                location.also_containing,
                block.id
            );
        }
        location.block
    }

    /// Files each address polygon under every block it truly intersects.
    /// Values are positions into `polygons`; polygons touching no block go to
    /// `BlockKey::Unassigned`.
    pub fn assign_polygons_to_blocks<'a, I>(&self, polygons: I) -> BTreeMap<BlockKey, Vec<usize>>
    where
        I: IntoIterator<Item = &'a MultiPolygon<f64>>,
    {
        let mut assigned: BTreeMap<BlockKey, Vec<usize>> = BTreeMap::new();
        for (pos, polygon) in polygons.into_iter().enumerate() {
            let mut filed = false;
            if let Some(bbox) = polygon.bounding_rect() {
                for candidate in self.index.candidates_overlapping(bbox) {
                    let block = &self.blocks[candidate];
                    if block.geometry.intersects(polygon) {
                        assigned
                            .entry(BlockKey::Assigned(block.id))
                            .or_default()
                            .push(pos);
                        filed = true;
                    }
                }
            }
            if !filed {
                assigned.entry(BlockKey::Unassigned).or_default().push(pos);
            }
        }
        assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    fn grid() -> BlockIndex {
        BlockIndex::build(vec![
            Block::new(BlockId(1), square(0.0, 0.0, 1.0), 3),
            Block::new(BlockId(2), square(1.0, 0.0, 1.0), 0),
            Block::new(BlockId(3), square(0.0, 1.0, 1.0), 5),
        ])
    }

    #[test]
    fn test_find_containing_block() {
        let index = grid();
        assert_eq!(index.find_containing(Point::new(0.5, 0.5)).unwrap().id, BlockId(1));
        assert_eq!(index.find_containing(Point::new(1.5, 0.5)).unwrap().id, BlockId(2));
        assert_eq!(index.find_containing(Point::new(0.5, 1.5)).unwrap().id, BlockId(3));
        assert!(index.find_containing(Point::new(1.5, 1.5)).is_none());
        assert!(index.find_containing(Point::new(-3.0, 0.5)).is_none());
    }

    #[test]
    fn test_empty_block_index() {
        let index = BlockIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.find_containing(Point::new(0.0, 0.0)).is_none());
        let assigned = index.assign_polygons_to_blocks(&[square(0.0, 0.0, 1.0)]);
        assert_eq!(assigned.get(&BlockKey::Unassigned), Some(&vec![0]));
    }

    #[test]
    fn test_overlapping_blocks_take_first_candidate() {
        let index = BlockIndex::build(vec![
            Block::new(BlockId(10), square(0.0, 0.0, 2.0), 1),
            Block::new(BlockId(11), square(1.0, 1.0, 2.0), 1),
        ]);
        let point = Point::new(1.5, 1.5);
        let location = index.locate(point);
        assert_eq!(location.block.unwrap().id, BlockId(10));
        assert_eq!(location.also_containing, vec![BlockId(11)]);

        match location.issue(point) {
            Some(DataQualityIssue::AmbiguousBlock { blocks, .. }) => {
                assert_eq!(blocks, vec![BlockId(10), BlockId(11)]);
            }
            other => panic!("unexpected issue {:?}", other),
        }
        assert_eq!(index.find_containing(point).unwrap().id, BlockId(10));
    }

    #[test]
    fn test_polygon_straddling_blocks_is_filed_under_each() {
        let index = grid();
        let straddling = square(0.8, 0.2, 0.4);
        let inside_one = square(0.1, 1.1, 0.2);
        let outside = square(5.0, 5.0, 1.0);
        let assigned = index.assign_polygons_to_blocks(&[straddling, inside_one, outside]);

        assert_eq!(assigned.get(&BlockKey::Assigned(BlockId(1))), Some(&vec![0]));
        assert_eq!(assigned.get(&BlockKey::Assigned(BlockId(2))), Some(&vec![0]));
        assert_eq!(assigned.get(&BlockKey::Assigned(BlockId(3))), Some(&vec![1]));
        assert_eq!(assigned.get(&BlockKey::Unassigned), Some(&vec![2]));
    }

    #[test]
    fn test_lookup_by_id() {
        let index = grid();
        assert_eq!(index.get(BlockId(3)).unwrap().reference_count, Some(5));
        assert!(index.get(BlockId(2)).unwrap().has_no_references());
        assert!(!Block::without_count(BlockId(9), square(0.0, 0.0, 1.0)).has_no_references());
        assert!(index.get(BlockId(99)).is_none());
        assert_eq!(BlockId(4).to_string(), "block#4");
    }
}

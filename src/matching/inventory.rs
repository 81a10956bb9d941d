// src/matching/inventory.rs - Reference addresses filed by the block they fall in
use std::collections::HashMap;

use geo::Contains;
use geo_types::Point;
use log::{debug, info};
use serde::Serialize;

use crate::errors::DataQualityIssue;
use crate::models::reference::{ReferenceAddress, ReferenceGeometry};
use crate::spatial::blocks::{BlockId, BlockIndex, BlockKey};
use crate::spatial::index::SpatialIndex;

/// Positions (into the inventory's reference list) filed under one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockInventory {
    pub points: Vec<usize>,
    pub polygons: Vec<usize>,
}

impl BlockInventory {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.polygons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len() + self.polygons.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub points: usize,
    pub areas: usize,
    pub lines: usize,
    pub unassigned_points: usize,
    pub unassigned_areas: usize,
}

/// Reference addresses bucketed by block, plus a spatial index over the
/// reference address polygons for containment checks. Immutable after build.
#[derive(Debug)]
pub struct ReferenceAddressInventory {
    references: Vec<ReferenceAddress>,
    filed: HashMap<BlockKey, BlockInventory>,
    /// Reference positions of area geometries, in `area_index` id order.
    areas: Vec<usize>,
    area_index: SpatialIndex,
    stats: InventoryStats,
    issues: Vec<DataQualityIssue>,
}

impl ReferenceAddressInventory {
    pub fn build(references: Vec<ReferenceAddress>, blocks: &BlockIndex) -> Self {
        let mut filed: HashMap<BlockKey, BlockInventory> = HashMap::new();
        let mut areas = Vec::new();
        let mut stats = InventoryStats::default();
        let mut issues = Vec::new();

        for (pos, reference) in references.iter().enumerate() {
            match &reference.geometry {
                ReferenceGeometry::Point(point) => {
                    stats.points += 1;
                    let location = blocks.locate(*point);
                    if let Some(issue) = location.issue(*point) {
                        debug!("Reference {}: {}", reference.id, issue);
                        issues.push(issue);
                    }
                    let key = match location.block {
                        Some(block) => BlockKey::Assigned(block.id),
                        None => {
                            stats.unassigned_points += 1;
                            BlockKey::Unassigned
                        }
                    };
                    filed.entry(key).or_default().points.push(pos);
                }
                ReferenceGeometry::Area(_) => {
                    stats.areas += 1;
                    areas.push(pos);
                }
                ReferenceGeometry::Line(_) => stats.lines += 1,
            }
        }

        let polygons = areas.iter().filter_map(|&pos| references[pos].area());
        for (key, positions) in blocks.assign_polygons_to_blocks(polygons) {
            if key == BlockKey::Unassigned {
                stats.unassigned_areas += positions.len();
            }
            filed
                .entry(key)
                .or_default()
                .polygons
                .extend(positions.into_iter().map(|i| areas[i]));
        }

        let area_index = SpatialIndex::build(
            areas
                .iter()
                .map(|&pos| references[pos].geometry.bounding_rect()),
        );

        info!(
            "Reference inventory: {} points, {} polygons, {} lines ({} points and {} polygons outside every block)",
            stats.points, stats.areas, stats.lines, stats.unassigned_points, stats.unassigned_areas
        );

        Self {
            references,
            filed,
            areas,
            area_index,
            stats,
            issues,
        }
    }

    pub fn references(&self) -> &[ReferenceAddress] {
        &self.references
    }

    pub fn get(&self, index: usize) -> Option<&ReferenceAddress> {
        self.references.get(index)
    }

    pub fn stats(&self) -> InventoryStats {
        self.stats
    }

    /// Ambiguous block assignments seen while filing reference points.
    pub fn issues(&self) -> &[DataQualityIssue] {
        &self.issues
    }

    pub fn filed_under(&self, key: BlockKey) -> Option<&BlockInventory> {
        self.filed.get(&key)
    }

    pub fn has_filed(&self, id: BlockId) -> bool {
        self.filed_under(BlockKey::Assigned(id))
            .map_or(false, |inv| !inv.is_empty())
    }

    /// Reference points then reference polygons filed under `id`, with their positions.
    pub fn within_block(&self, id: BlockId) -> Vec<(usize, &ReferenceAddress)> {
        match self.filed_under(BlockKey::Assigned(id)) {
            Some(inv) => inv
                .points
                .iter()
                .chain(inv.polygons.iter())
                .map(|&pos| (pos, &self.references[pos]))
                .collect(),
            None => Vec::new(),
        }
    }

    /// First reference address polygon that truly contains `point`.
    pub fn containing_polygon(&self, point: Point<f64>) -> Option<(usize, &ReferenceAddress)> {
        self.area_index
            .candidates_containing(point)
            .into_iter()
            .map(|id| self.areas[id])
            .map(|pos| (pos, &self.references[pos]))
            .find(|(_, reference)| {
                reference
                    .area()
                    .map_or(false, |area| area.contains(&point))
            })
    }
}

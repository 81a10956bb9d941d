// src/matching/manager.rs - Runs the matcher over a whole source batch and partitions the results
use std::collections::BTreeMap;

use indicatif::ProgressBar;
use log::{debug, info};

use crate::errors::{DataQualityIssue, IssueSummary};
use crate::matching::address::AddressMatcher;
use crate::models::address::AddressRecord;
use crate::models::outcome::{OutcomeKind, UnitNumberSplit};
use crate::models::stats_models::ConflationStats;
use crate::utils::progress_bars::logging::{Stage, StageLogger};

const PROGRESS_TICK: usize = 1_000;

#[derive(Debug, Default)]
pub struct ConflationResult {
    /// Source records by outcome; every kind is present, possibly empty.
    pub partitions: BTreeMap<OutcomeKind, Vec<AddressRecord>>,
    /// Unit/number split suggestions keyed by reference position, one per reference.
    pub suggestions: BTreeMap<usize, UnitNumberSplit>,
    pub issues: Vec<DataQualityIssue>,
    pub stats: ConflationStats,
}

impl ConflationResult {
    pub fn partition(&self, kind: OutcomeKind) -> &[AddressRecord] {
        self.partitions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Classifies every record, keeping input order inside each partition.
pub fn conflate(
    records: Vec<AddressRecord>,
    matcher: &AddressMatcher<'_>,
    progress: Option<&ProgressBar>,
) -> ConflationResult {
    let logger = StageLogger::new(Stage::Conflate);
    let total = records.len();
    logger.log_phase("Matching", Some(&format!("{} source records", total)));

    let inventory = matcher.inventory();
    let mut result = ConflationResult {
        partitions: OutcomeKind::ALL.iter().map(|&k| (k, Vec::new())).collect(),
        issues: inventory.issues().to_vec(),
        ..Default::default()
    };

    for (i, record) in records.into_iter().enumerate() {
        let report = matcher.match_record(&record);
        for m in report.outcome.matches() {
            if let Some(split) = &m.unit_number_split {
                result.suggestions.entry(m.index).or_insert_with(|| split.clone());
            }
        }
        result.issues.extend(report.issues);
        let kind = report.outcome.kind();
        debug!("{} → {}", record.describe(), kind.output_name());
        result.partitions.entry(kind).or_default().push(record);

        let done = i + 1;
        logger.log_progress_update(done, total);
        if let Some(pb) = progress {
            if done % PROGRESS_TICK == 0 || done == total {
                pb.set_position(done as u64);
            }
        }
    }

    let inventory_stats = inventory.stats();
    result.stats = ConflationStats {
        source_records: total,
        reference_points: inventory_stats.points,
        reference_areas: inventory_stats.areas,
        reference_lines: inventory_stats.lines,
        outcome_counts: result
            .partitions
            .iter()
            .map(|(kind, records)| (*kind, records.len()))
            .collect(),
        unit_number_suggestions: result.suggestions.len(),
        issues: IssueSummary::from_issues(&result.issues),
    };

    logger.log_outcomes(&result.stats.outcome_counts);
    if !result.suggestions.is_empty() {
        info!(
            "Found {} reference addresses with a combined unit/number house number",
            result.suggestions.len()
        );
    }
    logger.log_issues(&result.stats.issues);
    logger.log_completion();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::inventory::ReferenceAddressInventory;
    use crate::models::address::AddressTags;
    use crate::models::reference::{ReferenceAddress, ReferenceGeometry};
    use crate::spatial::blocks::{Block, BlockId, BlockIndex};
    use crate::utils::config::ConflationConfig;
    use geo_types::{polygon, MultiPolygon, Point};

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    fn tags(unit: Option<&str>, number: &str, street: &str) -> AddressTags {
        AddressTags {
            unit: unit.map(str::to_string),
            house_number: Some(number.to_string()),
            street: Some(street.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_batch_partitions_and_suggestions() {
        let blocks = BlockIndex::build(vec![
            Block::new(BlockId(1), square(0.0, 0.0, 0.01), 2),
            Block::new(BlockId(2), square(0.01, 0.0, 0.01), 0),
        ]);
        let inventory = ReferenceAddressInventory::build(
            vec![
                ReferenceAddress::new(
                    "node/1",
                    tags(None, "2/8", "High Street"),
                    ReferenceGeometry::Point(Point::new(0.001, 0.001)),
                ),
                ReferenceAddress::new(
                    "node/2",
                    tags(None, "10", "High Street"),
                    ReferenceGeometry::Point(Point::new(0.002, 0.001)),
                ),
            ],
            &blocks,
        );
        let matcher = AddressMatcher::new(&blocks, &inventory, ConflationConfig::default());

        let records = vec![
            AddressRecord::at(0.0011, 0.0011, tags(Some("2"), "8", "High Street")),
            AddressRecord::at(0.0012, 0.0011, tags(Some("2"), "8", "High Street")),
            AddressRecord::at(0.0021, 0.0011, tags(None, "10", "High Street")),
            AddressRecord::at(0.005, 0.005, tags(None, "99", "High Street")),
            AddressRecord::at(0.015, 0.005, tags(None, "10", "High Street")),
            AddressRecord::at(5.0, 5.0, tags(None, "10", "High Street")),
        ];
        let result = conflate(records, &matcher, None);

        assert_eq!(result.partition(OutcomeKind::ExactMatch).len(), 3);
        assert_eq!(result.partition(OutcomeKind::NoMatch).len(), 1);
        assert_eq!(result.partition(OutcomeKind::NoReferenceInBlock).len(), 1);
        assert_eq!(result.partition(OutcomeKind::NotFoundInAnyBlock).len(), 1);
        assert!(result.partition(OutcomeKind::FuzzyStreetMatch).is_empty());
        assert_eq!(result.partitions.len(), OutcomeKind::ALL.len());

        // two source records hit the same combined reference, one suggestion
        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[&0].house_number, "8");

        assert_eq!(result.stats.source_records, 6);
        assert_eq!(result.stats.count(OutcomeKind::ExactMatch), 3);
        assert_eq!(result.stats.reference_points, 2);
        assert_eq!(result.stats.issues.total(), 0);
    }
}

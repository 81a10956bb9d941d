// src/reduction/mod.rs - Redundancy reduction over conflated address records
pub mod duplicates;
pub mod overlap;
pub mod ranges;
pub mod units;
pub mod value_limits;

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::errors::{DataQualityIssue, IssueSummary};
use crate::models::address::AddressRecord;
use crate::models::stats_models::ReductionStats;

pub use duplicates::{reduce_duplicates, DuplicateReducer};
pub use overlap::consolidate_units;
pub use ranges::{consolidate_ranges, within_range, RangeConsolidator};
pub use units::{decode_unit_ranges, encode_unit_ranges, HouseNumberRange, RangeToken};
pub use value_limits::apply_value_limits;

/// Why a set of records was set aside for a person to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// One logical address split into several distant clusters.
    UnresolvedDuplicateClusters,
    /// A unitless address and a single unit address at the same point; the unit one was kept.
    OneUnitOneNonUnit,
    /// Several unitless records share an address and point.
    MultipleUnitlessRecords,
    /// Unit consolidation could not be shown to keep every unit.
    UnprovenUnitConsolidation,
    /// A number inside a range carries a unit or flats the range lacks.
    NumberWithinRangeDifferentUnit,
}

impl ReviewReason {
    /// File stem used for the debug output of this channel.
    pub fn channel_name(&self) -> &'static str {
        match self {
            ReviewReason::UnresolvedDuplicateClusters => "multiCluster",
            ReviewReason::OneUnitOneNonUnit => "oneUnitOneNonUnit",
            ReviewReason::MultipleUnitlessRecords => "multipleNonUnit",
            ReviewReason::UnprovenUnitConsolidation => "unitsNotPreserved",
            ReviewReason::NumberWithinRangeDifferentUnit => "singleCoveredByRangeDiffUnit",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewGroup {
    pub reason: ReviewReason,
    pub records: Vec<AddressRecord>,
}

impl ReviewGroup {
    pub fn new(reason: ReviewReason, records: Vec<AddressRecord>) -> Self {
        Self { reason, records }
    }
}

/// Records kept by a reduction stage plus what it set aside or noticed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReductionOutput {
    pub records: Vec<AddressRecord>,
    pub review: Vec<ReviewGroup>,
    pub issues: Vec<DataQualityIssue>,
}

impl ReductionOutput {
    pub fn review_for(&self, reason: ReviewReason) -> impl Iterator<Item = &ReviewGroup> {
        self.review.iter().filter(move |g| g.reason == reason)
    }

    pub fn stats(&self, stage: &str, input_records: usize) -> ReductionStats {
        ReductionStats {
            stage: stage.to_string(),
            input_records,
            output_records: self.records.len(),
            review_groups: self.review.len(),
            issues: IssueSummary::from_issues(&self.issues),
        }
    }
}

/// Positions of `items` grouped by `key`, groups in order of first appearance.
pub(crate) fn group_in_order<T, K, F>(items: &[T], key: F) -> Vec<Vec<usize>>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let slot = *slots.entry(key(item)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_in_order() {
        let groups = group_in_order(&["b", "a", "b", "c", "a"], |s| s.to_string());
        assert_eq!(groups, vec![vec![0, 2], vec![1, 4], vec![3]]);
    }

    #[test]
    fn test_review_lookup_and_stats() {
        let output = ReductionOutput {
            records: vec![AddressRecord::at(0.0, 0.0, Default::default())],
            review: vec![
                ReviewGroup::new(ReviewReason::OneUnitOneNonUnit, Vec::new()),
                ReviewGroup::new(ReviewReason::UnresolvedDuplicateClusters, Vec::new()),
            ],
            issues: vec![DataQualityIssue::malformed(None, "no geometry")],
        };
        assert_eq!(output.review_for(ReviewReason::OneUnitOneNonUnit).count(), 1);
        let stats = output.stats("overlap", 4);
        assert_eq!(stats.removed(), 3);
        assert_eq!(stats.review_groups, 2);
        assert_eq!(stats.issues.total(), 1);
        assert_eq!(ReviewReason::UnresolvedDuplicateClusters.channel_name(), "multiCluster");
    }
}

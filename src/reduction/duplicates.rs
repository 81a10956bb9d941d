// src/reduction/duplicates.rs - Collapse records of one logical address by geometry and distance
use log::{debug, info};

use crate::clustering::proximity::cluster_records;
use crate::errors::DataQualityIssue;
use crate::models::address::{join_trace_ids, mean_location, AddressRecord};
use crate::reduction::overlap::consolidate_units;
use crate::reduction::{group_in_order, ReductionOutput, ReviewGroup, ReviewReason};
use crate::utils::config::ReductionConfig;

pub struct DuplicateReducer {
    config: ReductionConfig,
}

/// The first member carrying every member's trace id and, when given, a new location.
fn merged(members: &[&AddressRecord], location: Option<geo_types::Point<f64>>) -> AddressRecord {
    let mut out = members[0].clone();
    out.tags.trace_id = join_trace_ids(members.iter().copied());
    if location.is_some() {
        out.location = location;
    }
    out
}

impl DuplicateReducer {
    pub fn new(config: ReductionConfig) -> Self {
        Self { config }
    }

    /// Reduces records sharing unit, number, street, suburb, state and postcode.
    ///
    /// Records at identical coordinates collapse onto the first of them. What
    /// remains of a group is clustered by distance: one cluster becomes one record
    /// at the mean location of all its records; several clusters are averaged separately and sent to
    /// review, and only kept in the output when `keep_unresolved_clusters` is set.
    pub fn reduce(&self, records: Vec<AddressRecord>) -> ReductionOutput {
        let mut output = ReductionOutput::default();
        let input = records.len();

        for group in group_in_order(&records, AddressRecord::address_key) {
            let members: Vec<&AddressRecord> = group.iter().map(|&i| &records[i]).collect();
            if members.len() == 1 {
                output.records.push(members[0].clone());
                continue;
            }
            self.reduce_group(&members, &mut output);
        }

        info!(
            "Duplicate reduction: {} → {} records, {} groups for review",
            input,
            output.records.len(),
            output.review.len()
        );
        output
    }

    fn reduce_group(&self, members: &[&AddressRecord], output: &mut ReductionOutput) {
        // records without a point cannot be compared, pass them through
        let mut located: Vec<&AddressRecord> = Vec::with_capacity(members.len());
        for record in members {
            if record.location.is_some() {
                located.push(record);
            } else {
                output
                    .issues
                    .push(DataQualityIssue::malformed(record.trace_id(), "no point geometry"));
                output.records.push((*record).clone());
            }
        }
        if located.is_empty() {
            return;
        }

        // pass A: identical coordinates
        let point_groups: Vec<Vec<&AddressRecord>> = group_in_order(&located, |r| r.coordinate_key())
            .into_iter()
            .map(|same| same.iter().map(|&i| located[i]).collect())
            .collect();
        let by_point: Vec<AddressRecord> = point_groups.iter().map(|same| merged(same, None)).collect();
        if by_point.len() == 1 {
            output.records.extend(by_point);
            return;
        }

        // pass B: distance clustering, averaged over every record of the cluster
        let clusters = cluster_records(&by_point, self.config.duplicate_threshold_m);
        let representatives: Vec<AddressRecord> = clusters
            .iter()
            .map(|cluster| {
                if cluster.len() == 1 {
                    return by_point[cluster[0]].clone();
                }
                let members: Vec<&AddressRecord> = cluster.iter().map(|&i| &by_point[i]).collect();
                let all = cluster.iter().flat_map(|&i| point_groups[i].iter().copied());
                merged(&members, mean_location(all))
            })
            .collect();

        if representatives.len() == 1 {
            output.records.extend(representatives);
            return;
        }

        debug!(
            "{} is spread over {} clusters",
            representatives[0].describe(),
            representatives.len()
        );
        if self.config.keep_unresolved_clusters {
            output.records.extend(representatives.iter().cloned());
        }
        output.review.push(ReviewGroup::new(
            ReviewReason::UnresolvedDuplicateClusters,
            representatives,
        ));
    }

    /// Folds units at a shared point into `addr:flats`; see [`consolidate_units`].
    pub fn consolidate_units(&self, records: Vec<AddressRecord>) -> ReductionOutput {
        consolidate_units(records)
    }
}

impl Default for DuplicateReducer {
    fn default() -> Self {
        Self::new(ReductionConfig::default())
    }
}

/// Duplicate reduction with the default threshold.
pub fn reduce_duplicates(records: Vec<AddressRecord>) -> ReductionOutput {
    DuplicateReducer::default().reduce(records)
}

// src/reduction/overlap.rs - Reduce records sharing one point: number merge and unit consolidation
use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::errors::DataQualityIssue;
use crate::models::address::{join_trace_ids, AddressRecord};
use crate::reduction::units::{
    encode_unit_ranges_with_issues, unit_members, HouseNumberRange, RangeToken,
};
use crate::reduction::{group_in_order, ReductionOutput, ReviewGroup, ReviewReason};

/// Lowest and highest endpoint of a single number or `from-to` range.
fn endpoints(house_number: &str) -> Option<(RangeToken, RangeToken)> {
    if house_number.contains('-') {
        let range = HouseNumberRange::parse(house_number)?;
        Some((range.from, range.to))
    } else {
        let token = RangeToken::parse(house_number)?;
        Some((token.clone(), token))
    }
}

/// Merges unitless records on one street into a single `first-last` record.
///
/// Applies only when no record carries a unit or flats, every record shares
/// street, suburb, state and postcode, and the merged range is not a single number.
fn merge_numbers(members: &[&AddressRecord]) -> Option<AddressRecord> {
    let street = members[0].street_key();
    if members
        .iter()
        .any(|r| r.tags.unit.is_some() || r.tags.flats.is_some() || r.street_key() != street)
    {
        return None;
    }

    let mut first: Option<RangeToken> = None;
    let mut last: Option<RangeToken> = None;
    for record in members {
        let (low, high) = endpoints(record.house_number()?)?;
        if first.as_ref().map_or(true, |f| low.number < f.number) {
            first = Some(low);
        }
        if last.as_ref().map_or(true, |l| high.number > l.number) {
            last = Some(high);
        }
    }
    let (first, last) = (first?, last?);
    let (first, last) = (first.to_string(), last.to_string());
    if first == last {
        return None;
    }

    let mut merged = members[0].clone();
    merged.tags.house_number = Some(format!("{}-{}", first, last));
    merged.tags.trace_id = join_trace_ids(members.iter().copied());
    Some(merged)
}

/// Every unit and flats member carried by `records`.
fn carried_units<'a, I>(records: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a AddressRecord>,
{
    let values: Vec<&str> = records
        .into_iter()
        .flat_map(|r| [r.tags.unit.as_deref(), r.tags.flats.as_deref()])
        .flatten()
        .collect();
    unit_members(&values)
}

/// Records sharing number, street, suburb, state and postcode at one point.
fn consolidate_group(group: &[&AddressRecord], output: &mut ReductionOutput) {
    let (unitless, with_unit): (Vec<&AddressRecord>, Vec<&AddressRecord>) =
        group.iter().copied().partition(|r| r.tags.unit.is_none());

    let consolidated = match unitless.len() {
        0 => {
            let units: Vec<&str> = carried_units_raw(&with_unit);
            let mut kept = group[0].clone();
            kept.tags.unit = None;
            kept.tags.flats = encode_unit_ranges_with_issues(&units, &mut output.issues);
            kept.tags.trace_id = join_trace_ids(group.iter().copied());
            kept
        }
        1 if with_unit.len() == 1 && unitless[0].tags.flats.is_none() => {
            // one unit and one plain address at the same point, keep the unit one
            debug!("Keeping unit address {} over plain one", with_unit[0].describe());
            let mut kept = with_unit[0].clone();
            kept.tags.trace_id = join_trace_ids(group.iter().copied());
            output.review.push(ReviewGroup::new(
                ReviewReason::OneUnitOneNonUnit,
                group.iter().map(|r| (*r).clone()).collect(),
            ));
            kept
        }
        1 => {
            let units: Vec<&str> = carried_units_raw(group);
            let mut kept = unitless[0].clone();
            kept.tags.flats = encode_unit_ranges_with_issues(&units, &mut output.issues);
            kept.tags.trace_id = join_trace_ids(group.iter().copied());
            kept
        }
        count => {
            warn!(
                "{} records without a unit share {}, leaving the group as is",
                count,
                unitless[0].describe()
            );
            output.issues.push(DataQualityIssue::MultipleUnitlessRecords {
                address: unitless[0].describe(),
                count,
            });
            let originals: Vec<AddressRecord> = group.iter().map(|r| (*r).clone()).collect();
            output.records.extend(originals.iter().cloned());
            output
                .review
                .push(ReviewGroup::new(ReviewReason::MultipleUnitlessRecords, originals));
            return;
        }
    };

    let before = carried_units(group.iter().copied());
    let after = carried_units([&consolidated]);
    if before.is_subset(&after) {
        output.records.push(consolidated);
    } else {
        let lost: Vec<&String> = before.difference(&after).collect();
        warn!(
            "Consolidating {} would lose units {:?}, keeping the originals",
            consolidated.describe(),
            lost
        );
        let originals: Vec<AddressRecord> = group.iter().map(|r| (*r).clone()).collect();
        output.records.extend(originals.iter().cloned());
        output
            .review
            .push(ReviewGroup::new(ReviewReason::UnprovenUnitConsolidation, originals));
    }
}

/// Raw unit and flats values of `records`, in record order.
fn carried_units_raw<'a>(records: &[&'a AddressRecord]) -> Vec<&'a str> {
    records
        .iter()
        .flat_map(|r| [r.tags.unit.as_deref(), r.tags.flats.as_deref()])
        .flatten()
        .collect()
}

/// Reduces records that share an identical point.
///
/// Plain numbers on one street are merged into a single range; otherwise records
/// that differ only by unit are folded into one record carrying `addr:flats`.
/// Every unit of the input remains in a `unit` or `flats` value of the output, or
/// the group is kept unchanged and reported for review.
pub fn consolidate_units(records: Vec<AddressRecord>) -> ReductionOutput {
    let mut output = ReductionOutput::default();
    let input = records.len();
    let mut merged_numbers = 0usize;

    for group in group_in_order(&records, AddressRecord::coordinate_key) {
        let members: Vec<&AddressRecord> = group.iter().map(|&i| &records[i]).collect();
        if members[0].location.is_none() {
            for record in members {
                output
                    .issues
                    .push(DataQualityIssue::malformed(record.trace_id(), "no point geometry"));
                output.records.push(record.clone());
            }
            continue;
        }
        if members.len() == 1 {
            output.records.push(members[0].clone());
            continue;
        }

        if let Some(merged) = merge_numbers(&members) {
            debug!("Merged {} numbers at one point into {}", members.len(), merged.describe());
            merged_numbers += 1;
            output.records.push(merged);
            continue;
        }

        for same_number in group_in_order(&members, |r| r.non_unit_key()) {
            let subgroup: Vec<&AddressRecord> = same_number.iter().map(|&i| members[i]).collect();
            if subgroup.len() == 1 {
                output.records.push(subgroup[0].clone());
            } else {
                consolidate_group(&subgroup, &mut output);
            }
        }
    }

    info!(
        "Overlap reduction: {} → {} records ({} number merges, {} groups for review)",
        input,
        output.records.len(),
        merged_numbers,
        output.review.len()
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{IssueKind, IssueSummary};
    use crate::models::address::AddressTags;

    fn record(unit: Option<&str>, number: &str, trace: &str, at: (f64, f64)) -> AddressRecord {
        AddressRecord::at(
            at.0,
            at.1,
            AddressTags {
                unit: unit.map(str::to_string),
                house_number: Some(number.to_string()),
                street: Some("Cardigan Street".to_string()),
                suburb: Some("Carlton".to_string()),
                state: Some("VIC".to_string()),
                postcode: Some("3053".to_string()),
                trace_id: Some(trace.to_string()),
                ..Default::default()
            },
        )
    }

    const ORIGIN: (f64, f64) = (144.96, -37.8);

    #[test]
    fn test_distinct_points_are_untouched() {
        let records = vec![
            record(None, "304", "1", ORIGIN),
            record(None, "304", "2", (144.97, -37.8)),
        ];
        let output = consolidate_units(records.clone());
        assert_eq!(output.records, records);
    }

    #[test]
    fn test_adjoining_numbers_merge_into_range() {
        let records = vec![
            record(None, "51", "1", ORIGIN),
            record(None, "53", "2", ORIGIN),
            record(None, "55-57", "3", ORIGIN),
        ];
        let output = consolidate_units(records);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].house_number(), Some("51-57"));
        assert_eq!(output.records[0].trace_id(), Some("1,2,3"));
    }

    #[test]
    fn test_different_streets_at_one_point_are_kept() {
        let mut other = record(None, "200", "2", ORIGIN);
        other.tags.street = Some("Bar Street".to_string());
        let records = vec![record(None, "100", "1", ORIGIN), other];
        let output = consolidate_units(records.clone());
        assert_eq!(output.records, records);
    }

    #[test]
    fn test_units_fold_into_unitless_record() {
        let records = vec![
            record(None, "10", "0", ORIGIN),
            record(Some("1"), "10", "1", ORIGIN),
            record(Some("2"), "10", "2", ORIGIN),
            record(Some("3"), "10", "3", ORIGIN),
            record(Some("5"), "10", "5", ORIGIN),
        ];
        let output = consolidate_units(records);
        assert_eq!(output.records.len(), 1);
        let kept = &output.records[0];
        assert_eq!(kept.tags.unit, None);
        assert_eq!(kept.tags.flats.as_deref(), Some("1-3;5"));
        assert_eq!(kept.trace_id(), Some("0,1,2,3,5"));
        assert!(output.review.is_empty());
    }

    #[test]
    fn test_one_unit_one_unitless_keeps_unit_record() {
        let records = vec![
            record(None, "10", "0", ORIGIN),
            record(Some("1"), "10", "1", ORIGIN),
        ];
        let output = consolidate_units(records);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].tags.unit.as_deref(), Some("1"));
        assert_eq!(output.records[0].tags.flats, None);
        assert_eq!(output.records[0].trace_id(), Some("0,1"));
        assert_eq!(output.review_for(ReviewReason::OneUnitOneNonUnit).count(), 1);
    }

    #[test]
    fn test_units_without_plain_record_collapse_onto_first() {
        let records = vec![
            record(Some("2"), "10", "2", ORIGIN),
            record(Some("1"), "10", "1", ORIGIN),
            record(Some("G01"), "10", "3", ORIGIN),
        ];
        let output = consolidate_units(records);
        assert_eq!(output.records.len(), 1);
        let kept = &output.records[0];
        assert_eq!(kept.tags.unit, None);
        assert_eq!(kept.tags.flats.as_deref(), Some("1-2;G01"));
        assert_eq!(kept.trace_id(), Some("2,1,3"));
    }

    #[test]
    fn test_existing_flats_are_kept_when_folding() {
        let mut plain = record(None, "10", "0", ORIGIN);
        plain.tags.flats = Some("7-8".to_string());
        let records = vec![plain, record(Some("1"), "10", "1", ORIGIN)];
        let output = consolidate_units(records);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].tags.flats.as_deref(), Some("1;7-8"));
        assert!(output.review.is_empty());
    }

    #[test]
    fn test_several_unitless_records_are_reported() {
        let records = vec![
            record(None, "10", "0", ORIGIN),
            record(None, "10", "1", ORIGIN),
            record(Some("1"), "10", "2", ORIGIN),
        ];
        let output = consolidate_units(records.clone());
        assert_eq!(output.records, records);
        assert_eq!(output.review_for(ReviewReason::MultipleUnitlessRecords).count(), 1);
        let summary = IssueSummary::from_issues(&output.issues);
        assert_eq!(summary.count(IssueKind::MultipleUnitlessRecords), 1);
    }

    #[test]
    fn test_no_unit_is_lost() {
        let records = vec![
            record(Some("3"), "10", "a", ORIGIN),
            record(Some("1A-3B"), "10", "b", ORIGIN),
            record(Some("Shop 1"), "10", "c", ORIGIN),
            record(None, "10", "d", ORIGIN),
            record(Some("4"), "12", "e", ORIGIN),
        ];
        let before = carried_units(&records);
        let output = consolidate_units(records);
        let after = carried_units(&output.records);
        assert!(before.is_subset(&after), "{:?} vs {:?}", before, after);
        assert_eq!(
            IssueSummary::from_issues(&output.issues).count(IssueKind::InconsistentRangeEndpoints),
            1
        );
    }

    #[test]
    fn test_unlocated_records_pass_through() {
        let records = vec![
            AddressRecord::new(AddressTags::default(), None),
            AddressRecord::new(AddressTags::default(), None),
        ];
        let output = consolidate_units(records.clone());
        assert_eq!(output.records, records);
        assert_eq!(output.issues.len(), 2);
    }
}

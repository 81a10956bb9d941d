// src/reduction/ranges.rs - Reconcile house-number ranges with individually listed numbers
use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::errors::DataQualityIssue;
use crate::models::address::{AddressRecord, StreetKey};
use crate::reduction::units::{HouseNumberRange, RangeToken};
use crate::reduction::{ReductionOutput, ReviewGroup, ReviewReason};
use crate::utils::config::ReductionConfig;
use crate::utils::constants::MAX_EXPANDED_RANGE;

/// True when `feature`'s number lies inside `range_feature`'s `from-to` span and
/// both share street, suburb, state and postcode. Both need a street.
///
/// Membership is numeric and inclusive, ignoring prefixes and suffixes. With
/// `match_parity` the number must also share odd/even parity with both endpoints.
pub fn within_range(feature: &AddressRecord, range_feature: &AddressRecord, match_parity: bool) -> bool {
    let (a, b) = (&feature.tags, &range_feature.tags);
    if a.street.is_none() || b.street.is_none() || feature.street_key() != range_feature.street_key() {
        return false;
    }
    let (Some(number), Some(span)) = (a.house_number.as_deref(), b.house_number.as_deref()) else {
        return false;
    };
    let (Some(token), Some(range)) = (RangeToken::parse(number), HouseNumberRange::parse(span)) else {
        return false;
    };
    if !range.contains(token.number) {
        return false;
    }
    !match_parity || (token.is_even() == range.from.is_even() && token.is_even() == range.to.is_even())
}

pub struct RangeConsolidator {
    config: ReductionConfig,
}

struct IndexedRange {
    position: usize,
    range: Option<HouseNumberRange>,
}

impl RangeConsolidator {
    pub fn new(config: ReductionConfig) -> Self {
        Self { config }
    }

    /// Drops ranges whose endpoints are listed individually (filter A), then drops
    /// individual numbers covered by a surviving range (filter B). A record carrying
    /// a unit or flats the covering range lacks is kept and reported for review.
    pub fn consolidate(&self, records: Vec<AddressRecord>) -> ReductionOutput {
        let mut output = ReductionOutput::default();
        let input = records.len();

        let mut singles_by_street: HashMap<StreetKey, Vec<usize>> = HashMap::new();
        let mut ranges_by_street: HashMap<StreetKey, Vec<IndexedRange>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            match record.house_number() {
                None => output
                    .issues
                    .push(DataQualityIssue::malformed(record.trace_id(), "no house number")),
                Some(number) if record.is_range() => {
                    let range = HouseNumberRange::parse(number);
                    if range.is_none() {
                        output.issues.push(DataQualityIssue::malformed(
                            record.trace_id(),
                            format!("unparseable range {:?}", number),
                        ));
                    }
                    ranges_by_street
                        .entry(record.street_key())
                        .or_default()
                        .push(IndexedRange { position: i, range });
                }
                Some(_) => singles_by_street.entry(record.street_key()).or_default().push(i),
            }
        }

        // filter A
        let mut dropped: HashSet<usize> = HashSet::new();
        for (street, ranges) in &ranges_by_street {
            let Some(singles) = singles_by_street.get(street) else {
                continue;
            };
            for indexed in ranges {
                if self.range_is_redundant(&records, indexed, singles) {
                    dropped.insert(indexed.position);
                }
            }
        }
        let dropped_ranges = dropped.len();

        // filter B
        let mut covered = 0usize;
        for (i, feature) in records.iter().enumerate() {
            if feature.is_range() || feature.house_number().is_none() {
                continue;
            }
            let Some(ranges) = ranges_by_street.get(&feature.street_key()) else {
                continue;
            };
            let covering = ranges
                .iter()
                .filter(|r| !dropped.contains(&r.position))
                .map(|r| &records[r.position])
                .find(|range| within_range(feature, range, self.config.match_parity));
            let Some(range) = covering else {
                continue;
            };
            let (own, range_tags) = (&feature.tags, &range.tags);
            let unit_kept = own.unit.is_none() || own.unit == range_tags.unit;
            let flats_kept = own.flats.is_none() || own.flats == range_tags.flats;
            if unit_kept && flats_kept {
                dropped.insert(i);
                covered += 1;
            } else {
                debug!(
                    "{} lies within {} but carries a different unit or flats",
                    feature.describe(),
                    range.describe()
                );
                output.review.push(ReviewGroup::new(
                    ReviewReason::NumberWithinRangeDifferentUnit,
                    vec![feature.clone(), range.clone()],
                ));
            }
        }

        output.records = records
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !dropped.contains(i))
            .map(|(_, r)| r)
            .collect();

        info!(
            "Range reduction: {} → {} records ({} ranges dropped for listed endpoints, {} numbers covered by ranges)",
            input,
            output.records.len(),
            dropped_ranges,
            covered
        );
        output
    }

    fn range_is_redundant(&self, records: &[AddressRecord], indexed: &IndexedRange, singles: &[usize]) -> bool {
        let Some(range) = &indexed.range else {
            return false;
        };
        let range_record = &records[indexed.position];
        let Some((from, to)) = range_record.house_number().and_then(|n| n.split_once('-')) else {
            return false;
        };
        let with_number = |wanted: &str| {
            singles
                .iter()
                .map(|&i| &records[i])
                .filter(|r| r.house_number() == Some(wanted))
                .collect::<Vec<&AddressRecord>>()
        };
        let (starts, ends) = (with_number(from), with_number(to));

        match (starts.is_empty(), ends.is_empty()) {
            (false, false) => {
                let overlapping = starts
                    .iter()
                    .any(|s| ends.iter().any(|e| s.same_location(e)));
                if overlapping {
                    debug!(
                        "Keeping {}, its endpoints share one point",
                        range_record.describe()
                    );
                    return false;
                }
                if range.is_consistent() {
                    log_missing_interior(range, singles, records, range_record);
                }
                true
            }
            (false, true) | (true, false) => {
                let found = if starts.is_empty() { &ends } else { &starts };
                range_record.tags.flats.is_none() && found.iter().any(|r| r.tags.flats.is_some())
            }
            (true, true) => false,
        }
    }
}

/// Debug-logs same-parity numbers strictly between the endpoints that are not listed.
fn log_missing_interior(
    range: &HouseNumberRange,
    singles: &[usize],
    records: &[AddressRecord],
    range_record: &AddressRecord,
) {
    if range.span().map_or(true, |span| span > MAX_EXPANDED_RANGE) {
        return;
    }
    let listed: HashSet<&str> = singles.iter().filter_map(|&i| records[i].house_number()).collect();
    let Some(last) = range.to.number.checked_sub(2) else {
        return;
    };
    let mut missing = Vec::new();
    for n in (range.from.number.saturating_add(2)..=last).step_by(2) {
        let wanted = RangeToken {
            number: n,
            ..range.from.clone()
        }
        .to_string();
        if !listed.contains(wanted.as_str()) {
            missing.push(wanted);
        }
    }
    if !missing.is_empty() {
        debug!(
            "Dropping {} although {} interior numbers are not listed: {:?}",
            range_record.describe(),
            missing.len(),
            missing
        );
    }
}

impl Default for RangeConsolidator {
    fn default() -> Self {
        Self::new(ReductionConfig::default())
    }
}

/// Range consolidation without parity matching.
pub fn consolidate_ranges(records: Vec<AddressRecord>) -> ReductionOutput {
    RangeConsolidator::default().consolidate(records)
}

// src/matching/address.rs - Tiered classification of one source address against the reference data
use log::{debug, warn};

use crate::errors::DataQualityIssue;
use crate::matching::inventory::ReferenceAddressInventory;
use crate::matching::normalize::{
    lcs_similarity, normalize_number, normalize_street, normalize_unit,
    split_combined_house_number,
};
use crate::models::address::AddressRecord;
use crate::models::outcome::{MatchOutcome, ReferenceMatch, UnitNumberSplit};
use crate::models::reference::ReferenceAddress;
use crate::reduction::units::{HouseNumberRange, RangeToken};
use crate::spatial::blocks::BlockIndex;
use crate::spatial::distance::distance_meters;
use crate::utils::config::ConflationConfig;

/// Outcome for one record plus the data-quality issues noticed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    pub issues: Vec<DataQualityIssue>,
}

impl MatchReport {
    fn new(outcome: MatchOutcome) -> Self {
        Self {
            outcome,
            issues: Vec::new(),
        }
    }
}

/// Comparison forms of a source record, computed once per record.
struct SourceAddress<'r> {
    record: &'r AddressRecord,
    street: Option<String>,
    number: Option<String>,
    unit: Option<String>,
}

impl<'r> SourceAddress<'r> {
    fn new(record: &'r AddressRecord) -> Self {
        let tags = &record.tags;
        Self {
            record,
            street: tags.street.as_deref().map(normalize_street),
            number: tags.house_number.as_deref().map(normalize_number),
            unit: normalize_unit(tags.unit.as_deref()),
        }
    }
}

/// Comparison forms of a reference address. A combined `unit/number` house
/// number is split so its left side acts as the unit.
struct ReferenceFields<'a> {
    street: Option<String>,
    raw_number: Option<&'a str>,
    number: Option<String>,
    unit: Option<String>,
    split: Option<(&'a str, &'a str)>,
}

impl<'a> ReferenceFields<'a> {
    fn new(reference: &'a ReferenceAddress) -> Self {
        let tags = &reference.tags;
        let split = tags
            .house_number
            .as_deref()
            .and_then(split_combined_house_number);
        let (raw_number, unit) = match split {
            Some((unit, number)) => (Some(number), normalize_unit(Some(unit))),
            None => (tags.house_number.as_deref(), normalize_unit(tags.unit.as_deref())),
        };
        Self {
            street: tags.street.as_deref().map(normalize_street),
            raw_number,
            number: raw_number.map(normalize_number),
            unit,
            split,
        }
    }

    fn number_equals(&self, source: &SourceAddress) -> bool {
        matches!((&source.number, &self.number), (Some(a), Some(b)) if a == b)
    }

    /// Equal, or the source number lies inside the reference's numeric range.
    fn number_covers(&self, source: &SourceAddress) -> bool {
        if self.number_equals(source) {
            return true;
        }
        let (Some(raw), Some(number)) = (self.raw_number, source.record.house_number()) else {
            return false;
        };
        match (HouseNumberRange::parse(raw), RangeToken::parse(number)) {
            (Some(range), Some(token)) => range.contains(token.number),
            _ => false,
        }
    }

    fn unit_equals(&self, source: &SourceAddress) -> bool {
        self.unit == source.unit
    }
}

pub struct AddressMatcher<'a> {
    blocks: &'a BlockIndex,
    inventory: &'a ReferenceAddressInventory,
    config: ConflationConfig,
}

impl<'a> AddressMatcher<'a> {
    pub fn new(
        blocks: &'a BlockIndex,
        inventory: &'a ReferenceAddressInventory,
        config: ConflationConfig,
    ) -> Self {
        Self {
            blocks,
            inventory,
            config,
        }
    }

    pub fn config(&self) -> &ConflationConfig {
        &self.config
    }

    pub fn inventory(&self) -> &'a ReferenceAddressInventory {
        self.inventory
    }

    /// Classifies `record`. Tiers run in order and the first one that finds
    /// anything decides the outcome; every candidate of that tier is returned.
    pub fn match_record(&self, record: &AddressRecord) -> MatchReport {
        let Some(point) = record.location else {
            let mut report = MatchReport::new(MatchOutcome::NotFoundInAnyBlock);
            report
                .issues
                .push(DataQualityIssue::malformed(record.trace_id(), "no point geometry"));
            return report;
        };

        let location = self.blocks.locate(point);
        let mut issues = Vec::new();
        if let Some(issue) = location.issue(point) {
            warn!("{}: {}", record.describe(), issue);
            issues.push(issue);
        }

        let outcome = match location.block {
            None => MatchOutcome::NotFoundInAnyBlock,
            Some(block) if block.has_no_references() => MatchOutcome::NoReferenceInBlock,
            Some(block) if !self.inventory.has_filed(block.id) => {
                debug!(
                    "{} reports references but none are filed under it, passing {} through",
                    block.id,
                    record.describe()
                );
                MatchOutcome::NoReferenceInBlock
            }
            Some(block) => {
                let candidates = self.inventory.within_block(block.id);
                let source = SourceAddress::new(record);
                self.classify(&source, &candidates)
            }
        };

        MatchReport { outcome, issues }
    }

    fn classify(
        &self,
        source: &SourceAddress,
        candidates: &[(usize, &ReferenceAddress)],
    ) -> MatchOutcome {
        let exact = self.collect_tier(source, candidates, |fields, _| {
            matches!((&source.street, &fields.street), (Some(a), Some(b)) if a == b)
                && fields.number_covers(source)
                && fields.unit_equals(source)
        });
        if !exact.is_empty() {
            return MatchOutcome::ExactMatch(exact);
        }

        let fuzzy = self.collect_tier(source, candidates, |fields, reference| {
            if !fields.number_equals(source) || !fields.unit_equals(source) {
                return false;
            }
            match (&source.street, &fields.street) {
                (Some(a), Some(b)) => lcs_similarity(a, b) > self.config.fuzzy_street_threshold,
                (None, Some(_)) => false,
                (_, None) => self.within_unnamed_radius(source, reference),
            }
        });
        if !fuzzy.is_empty() {
            return MatchOutcome::FuzzyStreetMatch(fuzzy);
        }

        if let Some(point) = source.record.location {
            if let Some((index, reference)) = self.inventory.containing_polygon(point) {
                return MatchOutcome::WithinReferencePolygon(ReferenceMatch {
                    index,
                    reference_id: reference.id.clone(),
                    unit_number_split: None,
                });
            }
        }

        MatchOutcome::NoMatch
    }

    fn collect_tier<F>(
        &self,
        source: &SourceAddress,
        candidates: &[(usize, &ReferenceAddress)],
        accept: F,
    ) -> Vec<ReferenceMatch>
    where
        F: Fn(&ReferenceFields, &ReferenceAddress) -> bool,
    {
        candidates
            .iter()
            .filter_map(|&(index, reference)| {
                let fields = ReferenceFields::new(reference);
                if !accept(&fields, reference) {
                    return None;
                }
                Some(ReferenceMatch {
                    index,
                    reference_id: reference.id.clone(),
                    unit_number_split: unit_number_split(source, reference, &fields),
                })
            })
            .collect()
    }

    fn within_unnamed_radius(&self, source: &SourceAddress, reference: &ReferenceAddress) -> bool {
        match (source.record.location, reference.geometry.representative_point()) {
            (Some(a), Some(b)) => distance_meters(a, b) <= self.config.unnamed_street_radius_m,
            _ => false,
        }
    }
}

/// Set when the reference packs `unit/number` into its house number while the
/// source record keeps the unit in its own tag.
fn unit_number_split(
    source: &SourceAddress,
    reference: &ReferenceAddress,
    fields: &ReferenceFields,
) -> Option<UnitNumberSplit> {
    let (unit, house_number) = fields.split?;
    source.unit.as_ref()?;
    Some(UnitNumberSplit {
        reference_id: reference.id.clone(),
        unit: unit.to_string(),
        house_number: house_number.to_string(),
    })
}

/// Classifies one record with the default thresholds.
pub fn match_address(
    record: &AddressRecord,
    blocks: &BlockIndex,
    inventory: &ReferenceAddressInventory,
) -> MatchOutcome {
    AddressMatcher::new(blocks, inventory, ConflationConfig::default())
        .match_record(record)
        .outcome
}

// src/models/outcome.rs - Result of classifying one source record
use serde::Serialize;

/// A reference address that satisfied a match tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceMatch {
    /// Position of the reference in the inventory it came from.
    pub index: usize,
    pub reference_id: String,
    /// Set when the reference stores `unit/number` in its house number while the
    /// source keeps them apart; the values are the suggested separate tags.
    pub unit_number_split: Option<UnitNumberSplit>,
}

/// Suggested correction for a reference that encodes `unit/number` in one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitNumberSplit {
    pub reference_id: String,
    pub unit: String,
    pub house_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// No block contains the record; typically coastal or edge-of-dataset points.
    NotFoundInAnyBlock,
    /// The containing block has no reference addresses, safe to import as is.
    NoReferenceInBlock,
    ExactMatch(Vec<ReferenceMatch>),
    FuzzyStreetMatch(Vec<ReferenceMatch>),
    WithinReferencePolygon(ReferenceMatch),
    NoMatch,
}

/// Discriminant of `MatchOutcome`, used to partition batch output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OutcomeKind {
    NotFoundInAnyBlock,
    NoReferenceInBlock,
    ExactMatch,
    FuzzyStreetMatch,
    WithinReferencePolygon,
    NoMatch,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 6] = [
        OutcomeKind::NotFoundInAnyBlock,
        OutcomeKind::NoReferenceInBlock,
        OutcomeKind::ExactMatch,
        OutcomeKind::FuzzyStreetMatch,
        OutcomeKind::WithinReferencePolygon,
        OutcomeKind::NoMatch,
    ];

    /// File stem used when the partition is written out.
    pub fn output_name(&self) -> &'static str {
        match self {
            OutcomeKind::NotFoundInAnyBlock => "notFoundInBlocks",
            OutcomeKind::NoReferenceInBlock => "noOSMAddressWithinBlock",
            OutcomeKind::ExactMatch => "exactMatch",
            OutcomeKind::FuzzyStreetMatch => "fuzzyStreetMatch",
            OutcomeKind::WithinReferencePolygon => "withinExistingOSMAddressPoly",
            OutcomeKind::NoMatch => "noExactMatch",
        }
    }
}

impl MatchOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            MatchOutcome::NotFoundInAnyBlock => OutcomeKind::NotFoundInAnyBlock,
            MatchOutcome::NoReferenceInBlock => OutcomeKind::NoReferenceInBlock,
            MatchOutcome::ExactMatch(_) => OutcomeKind::ExactMatch,
            MatchOutcome::FuzzyStreetMatch(_) => OutcomeKind::FuzzyStreetMatch,
            MatchOutcome::WithinReferencePolygon(_) => OutcomeKind::WithinReferencePolygon,
            MatchOutcome::NoMatch => OutcomeKind::NoMatch,
        }
    }

    /// References carried by the outcome, empty for the non-matching variants.
    pub fn matches(&self) -> &[ReferenceMatch] {
        match self {
            MatchOutcome::ExactMatch(refs) | MatchOutcome::FuzzyStreetMatch(refs) => refs,
            MatchOutcome::WithinReferencePolygon(r) => std::slice::from_ref(r),
            _ => &[],
        }
    }

    /// Every unit/number split detected on a matched reference.
    pub fn unit_number_splits(&self) -> impl Iterator<Item = &UnitNumberSplit> {
        self.matches()
            .iter()
            .filter_map(|m| m.unit_number_split.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_kinds_and_matches() {
        let m = ReferenceMatch {
            index: 4,
            reference_id: "node/1".to_string(),
            unit_number_split: Some(UnitNumberSplit {
                reference_id: "node/1".to_string(),
                unit: "3".to_string(),
                house_number: "12".to_string(),
            }),
        };
        let exact = MatchOutcome::ExactMatch(vec![m.clone()]);
        assert_eq!(exact.kind(), OutcomeKind::ExactMatch);
        assert_eq!(exact.matches().len(), 1);
        assert_eq!(exact.unit_number_splits().count(), 1);

        let within = MatchOutcome::WithinReferencePolygon(m);
        assert_eq!(within.matches()[0].index, 4);

        assert!(MatchOutcome::NoMatch.matches().is_empty());
        assert_eq!(OutcomeKind::NoMatch.output_name(), "noExactMatch");
    }
}

// src/errors.rs - Recoverable data-quality issues surfaced alongside results
use std::collections::BTreeMap;
use std::fmt;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::spatial::blocks::BlockId;

/// Anomalies found in the input data. None of these abort a batch; they are
/// collected by the component that detects them and summarised at the end.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataQualityIssue {
    #[error("malformed record {trace}: {reason}")]
    MalformedRecord { trace: String, reason: String },

    #[error("point ({lon}, {lat}) is contained by {} blocks", .blocks.len())]
    AmbiguousBlock { lon: f64, lat: f64, blocks: Vec<BlockId> },

    #[error("range {value} has endpoints with different prefix/suffix")]
    InconsistentRangeEndpoints { value: String },

    #[error("unsupported geometry type {kind} on {id}")]
    UnsupportedGeometry { id: String, kind: String },

    #[error("{count} records without a unit share {address}")]
    MultipleUnitlessRecords { address: String, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MalformedRecord,
    AmbiguousBlock,
    InconsistentRangeEndpoints,
    UnsupportedGeometry,
    MultipleUnitlessRecords,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueKind::MalformedRecord => "malformed records",
            IssueKind::AmbiguousBlock => "ambiguous block assignments",
            IssueKind::InconsistentRangeEndpoints => "ranges with inconsistent endpoints",
            IssueKind::UnsupportedGeometry => "unsupported geometries",
            IssueKind::MultipleUnitlessRecords => "groups with several unitless records",
        };
        f.write_str(label)
    }
}

impl DataQualityIssue {
    pub fn kind(&self) -> IssueKind {
        match self {
            DataQualityIssue::MalformedRecord { .. } => IssueKind::MalformedRecord,
            DataQualityIssue::AmbiguousBlock { .. } => IssueKind::AmbiguousBlock,
            DataQualityIssue::InconsistentRangeEndpoints { .. } => {
                IssueKind::InconsistentRangeEndpoints
            }
            DataQualityIssue::UnsupportedGeometry { .. } => IssueKind::UnsupportedGeometry,
            DataQualityIssue::MultipleUnitlessRecords { .. } => IssueKind::MultipleUnitlessRecords,
        }
    }

    pub fn malformed(trace: Option<&str>, reason: impl Into<String>) -> Self {
        DataQualityIssue::MalformedRecord {
            trace: trace.unwrap_or("<no trace id>").to_string(),
            reason: reason.into(),
        }
    }
}

/// Per-kind counts of the issues seen during a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueSummary {
    pub counts: BTreeMap<IssueKind, usize>,
}

impl IssueSummary {
    pub fn from_issues<'a, I>(issues: I) -> Self
    where
        I: IntoIterator<Item = &'a DataQualityIssue>,
    {
        let mut counts = BTreeMap::new();
        for issue in issues {
            *counts.entry(issue.kind()).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn log(&self, stage: &str) {
        if self.counts.is_empty() {
            info!("[{}] ✨ No data quality issues found", stage);
            return;
        }
        for (kind, count) in &self.counts {
            warn!("[{}] ⚠️  {} {}", stage, count, kind);
        }
    }
}

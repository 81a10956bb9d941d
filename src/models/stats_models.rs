// src/models/stats_models.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::IssueSummary;
use crate::models::outcome::OutcomeKind;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflationStats {
    pub source_records: usize,
    pub reference_points: usize,
    pub reference_areas: usize,
    pub reference_lines: usize,
    pub outcome_counts: BTreeMap<OutcomeKind, usize>,
    pub unit_number_suggestions: usize,
    pub issues: IssueSummary,
}

impl ConflationStats {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcome_counts.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReductionStats {
    pub stage: String,
    pub input_records: usize,
    pub output_records: usize,
    pub review_groups: usize,
    pub issues: IssueSummary,
}

impl ReductionStats {
    pub fn removed(&self) -> usize {
        self.input_records.saturating_sub(self.output_records)
    }
}

/// Written next to the outputs of a binary run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub conflation: Option<ConflationStats>,
    pub reductions: Vec<ReductionStats>,
}

impl RunSummary {
    pub fn start(description: Option<&str>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            description: description.map(|s| s.to_string()),
            conflation: None,
            reductions: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_lifecycle() {
        let mut summary = RunSummary::start(Some("test run"));
        assert!(summary.finished_at.is_none());
        assert!(summary.elapsed_seconds().is_none());
        assert_eq!(summary.run_id.len(), 36);

        summary.finish();
        assert!(summary.elapsed_seconds().unwrap() >= 0.0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["description"], "test run");
    }

    #[test]
    fn test_reduction_stats_removed() {
        let stats = ReductionStats {
            stage: "duplicates".to_string(),
            input_records: 10,
            output_records: 7,
            ..Default::default()
        };
        assert_eq!(stats.removed(), 3);
    }
}

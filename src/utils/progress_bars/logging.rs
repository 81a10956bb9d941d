// src/utils/progress_bars/logging.rs - Uniform log lines for conflation and reduction stages
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::errors::IssueSummary;
use crate::models::outcome::OutcomeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Conflate,
    Duplicates,
    Overlap,
    Ranges,
    Write,
}

impl Stage {
    fn label(&self) -> (&'static str, &'static str) {
        match self {
            Stage::Load => ("LOAD", "📥"),
            Stage::Conflate => ("CONFLATE", "📍"),
            Stage::Duplicates => ("DUPLICATES", "👯"),
            Stage::Overlap => ("OVERLAP", "🏢"),
            Stage::Ranges => ("RANGES", "🔢"),
            Stage::Write => ("WRITE", "💾"),
        }
    }
}

#[derive(Clone)]
pub struct StageLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl StageLogger {
    pub fn new(stage: Stage) -> Self {
        let (stage_name, stage_emoji) = stage.label();
        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str, records: usize) {
        info!(
            "[{}] {} 🚀 Starting {} over {} records (run ID: {})",
            self.stage_name,
            self.stage_emoji,
            self.stage_name.to_lowercase(),
            records,
            run_id
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, details, elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str, skipped: usize) {
        info!(
            "[{}] {} 📊 Loaded {} {} records",
            self.stage_name, self.stage_emoji, count, data_type
        );
        if skipped > 0 {
            warn!(
                "[{}] {} ⚠️  Skipped {} unreadable {} lines",
                self.stage_name, self.stage_emoji, skipped, data_type
            );
        }
    }

    pub fn log_outcomes(&self, counts: &BTreeMap<OutcomeKind, usize>) {
        let total: usize = counts.values().sum();
        for kind in OutcomeKind::ALL {
            let count = counts.get(&kind).copied().unwrap_or(0);
            let percent = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            info!(
                "[{}] {} 🎯 {}: {} ({:.1}%)",
                self.stage_name,
                self.stage_emoji,
                kind.output_name(),
                count,
                percent
            );
        }
    }

    pub fn log_reduction(&self, input: usize, output: usize, review_groups: usize) {
        info!(
            "[{}] {} ✅ {} records → {} records ({} removed)",
            self.stage_name,
            self.stage_emoji,
            input,
            output,
            input.saturating_sub(output)
        );
        if review_groups > 0 {
            info!(
                "[{}] {} 🔍 {} groups need manual review",
                self.stage_name, self.stage_emoji, review_groups
            );
        }
    }

    pub fn log_issues(&self, summary: &IssueSummary) {
        for (kind, count) in &summary.counts {
            self.log_data_quality_issue(&kind.to_string(), *count);
        }
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} instances of {}",
                self.stage_name, self.stage_emoji, count, issue_type
            );
        }
    }

    pub fn log_progress_update(&self, current: usize, total: usize) {
        let should_log = current % 50_000 == 0
            || current == total
            || (total >= 100 && current % (total / 10) == 0);
        if should_log && current > 0 {
            let percent = (current as f64 / total as f64) * 100.0;
            debug!(
                "[{}] {} 📊 Progress: {}/{} ({:.1}%)",
                self.stage_name, self.stage_emoji, current, total, percent
            );
        }
    }

    pub fn log_completion(&self) {
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}",
            self.stage_name,
            self.stage_emoji,
            self.start_time.elapsed()
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn get_elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn get_stage_name(&self) -> &'static str {
        self.stage_name
    }
}

pub fn log_run_start(tool: &str, run_id: &str) {
    info!("🚀 ===== {} STARTING =====", tool.to_uppercase());
    info!("📅 Run ID: {}", run_id);
}

pub fn log_run_completion(tool: &str, run_id: &str, duration: Duration) {
    info!("🎉 ===== {} COMPLETED =====", tool.to_uppercase());
    info!("📅 Run ID: {}", run_id);
    info!("⏱️  Total Duration: {:.2?}", duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        let logger = StageLogger::new(Stage::Ranges);
        assert_eq!(logger.get_stage_name(), "RANGES");
        assert_eq!(Stage::Conflate.label().0, "CONFLATE");
        logger.log_progress_update(0, 0);
        logger.log_reduction(10, 7, 1);
        assert!(logger.get_elapsed() < Duration::from_secs(60));
    }
}

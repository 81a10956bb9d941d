use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use conflate_lib::errors::IssueSummary;
use conflate_lib::models::address::AddressRecord;
use conflate_lib::models::stats_models::RunSummary;
use conflate_lib::reduction::duplicates::DuplicateReducer;
use conflate_lib::reduction::ranges::RangeConsolidator;
use conflate_lib::reduction::{ReductionOutput, ReviewGroup};
use conflate_lib::utils::config::ReductionConfig;
use conflate_lib::utils::env::load_env;
use conflate_lib::utils::get_memory_usage;
use conflate_lib::utils::ndjson::{read_records, write_json, write_records};
use conflate_lib::utils::progress_bars::logging::{
    log_run_completion, log_run_start, Stage, StageLogger,
};
use conflate_lib::utils::progress_bars::progress_config::ProgressConfig;
use log::info;

/// Reduce redundancy in an address dataset.
#[derive(Parser, Debug)]
#[command(name = "reduce", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write review groups to the debug directory
    #[arg(long, global = true)]
    debug: bool,
    /// Where review groups are written with --debug
    #[arg(long, global = true, default_value = "debug")]
    debug_dir: PathBuf,
    /// Overrides REDUCE_DUPLICATE_THRESHOLD_M
    #[arg(long, global = true)]
    threshold: Option<f64>,
    /// Only drop numbers inside a range when their parity matches its endpoints
    #[arg(long, global = true)]
    match_parity: bool,
    /// Keep every cluster of an address spread over several places
    #[arg(long, global = true)]
    keep_unresolved_clusters: bool,
}

#[derive(Args, Debug)]
struct Files {
    input: PathBuf,
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge records of one address at the same or nearby points
    Duplicates(Files),
    /// Merge records sharing one point, folding units into addr:flats
    Overlap(Files),
    /// Drop ranges and numbers that duplicate each other
    Ranges(Files),
    /// Run duplicates, overlap and ranges in order
    All(Files),
}

impl Command {
    fn files(&self) -> &Files {
        match self {
            Command::Duplicates(f) | Command::Overlap(f) | Command::Ranges(f) | Command::All(f) => f,
        }
    }

    fn stages(&self) -> &'static [Stage] {
        match self {
            Command::Duplicates(_) => &[Stage::Duplicates],
            Command::Overlap(_) => &[Stage::Overlap],
            Command::Ranges(_) => &[Stage::Ranges],
            Command::All(_) => &[Stage::Duplicates, Stage::Overlap, Stage::Ranges],
        }
    }
}

fn run_stage(stage: Stage, config: &ReductionConfig, records: Vec<AddressRecord>) -> ReductionOutput {
    match stage {
        Stage::Duplicates => DuplicateReducer::new(config.clone()).reduce(records),
        Stage::Overlap => DuplicateReducer::new(config.clone()).consolidate_units(records),
        Stage::Ranges => RangeConsolidator::new(config.clone()).consolidate(records),
        Stage::Load | Stage::Conflate | Stage::Write => ReductionOutput {
            records,
            ..Default::default()
        },
    }
}

/// One file per review channel, records of every group concatenated.
fn write_review(dir: &Path, review: &[ReviewGroup]) -> Result<()> {
    let mut channels: BTreeMap<&'static str, Vec<AddressRecord>> = BTreeMap::new();
    for group in review {
        channels
            .entry(group.reason.channel_name())
            .or_default()
            .extend(group.records.iter().cloned());
    }
    for (channel, records) in channels {
        let path = dir.join(format!("{}.geojson", channel));
        write_records(&path, &records, None)?;
        info!("Saved {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let cli = Cli::parse();

    let mut config = ReductionConfig::from_env();
    if let Some(threshold) = cli.threshold {
        config.duplicate_threshold_m = threshold;
    }
    config.match_parity |= cli.match_parity;
    config.keep_unresolved_clusters |= cli.keep_unresolved_clusters;
    config.log_config();
    let progress_config = ProgressConfig::from_env();
    let multi_progress = progress_config.create_multi_progress();

    let files = cli.command.files();
    let mut summary = RunSummary::start(Some("address reduction"));
    let run_start = Instant::now();
    log_run_start("reduce", &summary.run_id);

    let loader = StageLogger::new(Stage::Load);
    let input = read_records(&files.input)
        .with_context(|| format!("Failed to load {}", files.input.display()))?;
    loader.log_data_loaded(input.items.len(), "address", input.skipped);
    loader.log_issues(&IssueSummary::from_issues(&input.issues));
    loader.log_completion();

    let mut records = input.items;
    for &stage in cli.command.stages() {
        let logger = StageLogger::new(stage);
        logger.log_start(&summary.run_id, records.len());
        let spinner = progress_config.spinner(multi_progress.as_ref(), logger.get_stage_name());

        let before = records.len();
        let output = run_stage(stage, &config, records);
        if let Some(pb) = &spinner {
            pb.finish_and_clear();
        }

        let stats = output.stats(logger.get_stage_name(), before);
        logger.log_reduction(stats.input_records, stats.output_records, stats.review_groups);
        logger.log_issues(&stats.issues);
        if cli.debug && !output.review.is_empty() {
            let dir = cli.debug_dir.join(logger.get_stage_name().to_lowercase());
            write_review(&dir, &output.review)
                .with_context(|| format!("Failed to write review groups to {}", dir.display()))?;
        }
        if progress_config.should_show_memory() {
            info!("Memory after {}: {} MB", logger.get_stage_name(), get_memory_usage());
        }
        logger.log_completion();
        summary.reductions.push(stats);
        records = output.records;
    }

    let writer = StageLogger::new(Stage::Write);
    let written = write_records(&files.output, &records, Some(config.max_tag_value_length))
        .with_context(|| format!("Failed to write {}", files.output.display()))?;
    writer.log_phase("Wrote output", Some(&format!("{} ({} records)", files.output.display(), written)));

    summary.finish();
    let summary_path = files.output.with_extension("summary.json");
    write_json(&summary_path, &summary).context("Failed to write run summary")?;
    writer.log_completion();

    log_run_completion("reduce", &summary.run_id, run_start.elapsed());
    Ok(())
}

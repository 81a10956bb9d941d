use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use conflate_lib::errors::IssueSummary;
use conflate_lib::matching::address::AddressMatcher;
use conflate_lib::matching::inventory::ReferenceAddressInventory;
use conflate_lib::matching::manager::conflate;
use conflate_lib::models::outcome::OutcomeKind;
use conflate_lib::models::stats_models::RunSummary;
use conflate_lib::spatial::blocks::BlockIndex;
use conflate_lib::utils::config::ConflationConfig;
use conflate_lib::utils::env::load_env;
use conflate_lib::utils::get_memory_usage;
use conflate_lib::utils::ndjson::{
    read_blocks, read_records, read_references, write_json, write_records, write_suggestions,
};
use conflate_lib::utils::progress_bars::logging::{
    log_run_completion, log_run_start, Stage, StageLogger,
};
use conflate_lib::utils::progress_bars::progress_config::ProgressConfig;
use log::info;

/// Classify source addresses against a reference dataset, block by block.
#[derive(Parser, Debug)]
#[command(name = "conflate", version, about)]
struct Args {
    /// Source addresses, one GeoJSON point feature per line
    source: PathBuf,
    /// Reference addresses (points, polygons, interpolation lines)
    reference: PathBuf,
    /// Block polygons, optionally carrying a NUMPOINTS reference count
    blocks: PathBuf,
    /// Directory receiving one file per outcome
    output_dir: PathBuf,

    /// Overrides CONFLATE_FUZZY_STREET_THRESHOLD
    #[arg(long)]
    fuzzy_threshold: Option<f64>,
    /// Overrides CONFLATE_UNNAMED_STREET_RADIUS_M
    #[arg(long)]
    unnamed_radius: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = Args::parse();

    let mut config = ConflationConfig::from_env();
    if let Some(threshold) = args.fuzzy_threshold {
        config.fuzzy_street_threshold = threshold;
    }
    if let Some(radius) = args.unnamed_radius {
        config.unnamed_street_radius_m = radius;
    }
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    let multi_progress = progress_config.create_multi_progress();

    let mut summary = RunSummary::start(Some("address conflation"));
    let run_start = Instant::now();
    log_run_start("conflate", &summary.run_id);

    let loader = StageLogger::new(Stage::Load);
    loader.log_phase("Reading blocks", Some(&args.blocks.display().to_string()));
    let blocks = read_blocks(&args.blocks).context("Failed to load blocks")?;
    loader.log_data_loaded(blocks.items.len(), "block", blocks.skipped);
    let block_index = BlockIndex::build(blocks.items);

    loader.log_phase("Reading reference addresses", Some(&args.reference.display().to_string()));
    let references = read_references(&args.reference).context("Failed to load reference addresses")?;
    loader.log_data_loaded(references.items.len(), "reference", references.skipped);
    let inventory = ReferenceAddressInventory::build(references.items, &block_index);

    loader.log_phase("Reading source addresses", Some(&args.source.display().to_string()));
    let source = read_records(&args.source).context("Failed to load source addresses")?;
    loader.log_data_loaded(source.items.len(), "source", source.skipped);
    if progress_config.should_show_memory() {
        info!("Memory after loading: {} MB", get_memory_usage());
    }
    loader.log_completion();

    let matcher = AddressMatcher::new(&block_index, &inventory, config);
    let pb = progress_config.record_bar(
        multi_progress.as_ref(),
        source.items.len() as u64,
        "Matching source addresses",
    );
    let mut result = conflate(source.items, &matcher, pb.as_ref());
    if let Some(pb) = &pb {
        pb.finish_with_message("Matching complete");
    }
    result.issues.extend(blocks.issues);
    result.issues.extend(references.issues);
    result.issues.extend(source.issues);

    let writer = StageLogger::new(Stage::Write);
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    for kind in OutcomeKind::ALL {
        let path = args.output_dir.join(format!("{}.geojson", kind.output_name()));
        let written = write_records(&path, result.partition(kind), None)
            .with_context(|| format!("Failed to write {}", kind.output_name()))?;
        writer.log_phase("Wrote partition", Some(&format!("{} ({} records)", path.display(), written)));
    }
    let suggestions_path = args.output_dir.join("mr_explodeUnitFromNumber.geojson");
    let written = write_suggestions(&suggestions_path, &result.suggestions, inventory.references())
        .context("Failed to write unit/number split suggestions")?;
    writer.log_phase("Wrote suggestions", Some(&format!("{} tasks", written)));

    let mut stats = result.stats;
    stats.issues = IssueSummary::from_issues(&result.issues);
    writer.log_issues(&stats.issues);
    summary.conflation = Some(stats);
    summary.finish();
    write_json(&args.output_dir.join("run_summary.json"), &summary).context("Failed to write run summary")?;
    writer.log_completion();

    log_run_completion("conflate", &summary.run_id, run_start.elapsed());
    Ok(())
}

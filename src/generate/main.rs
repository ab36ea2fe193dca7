//! Polygon-to-tree generator.
//!
//! Reads labelled boundary polygons, builds the partition tree, compacts it
//! and writes the exported tree as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use zonemapper::verify::verify;
use zonemapper::{BuildConfig, ZoneMapper};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "generate")]
#[command(about = "Build a point location tree from labelled polygons")]
struct Args {
    /// Polygon JSON file (optionally .gz)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the exported tree
    #[arg(short, long, default_value = "tree.json")]
    output: PathBuf,

    /// Optional TOML build configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Check the finished tree against the input polygons
    #[arg(long)]
    verify: bool,

    /// Fail if verification finds mismatches
    #[arg(long, requires = "verify")]
    strict: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Zonemapper Generator");
    info!("Input: {}", args.input.display());

    let config = match &args.config {
        Some(path) => BuildConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => BuildConfig::default(),
    };

    let output = ZoneMapper::build_from_file(&args.input, &config)?;

    let load = &output.load;
    info!(
        "Loaded {} polygons: {} unreadable, {} dropped as '{}', {} degenerate, {} slivers",
        load.inputs,
        load.parse_errors.len(),
        load.dropped_sentinel,
        config.dropped_label,
        load.degenerate,
        load.slivers
    );
    for failure in &load.split_failures {
        warn!("Could not split {}: {}", failure.label, failure.error);
    }
    for issue in &output.build.issues {
        warn!(
            "Dropped fragment of {} in {}: {}",
            output.mapper.label(issue.label),
            issue.cell,
            issue.error
        );
    }

    output.mapper.save(&args.output)?;

    if args.verify {
        let report = verify(&output.mapper, &output.polygons, true);
        if args.strict && !report.passed() {
            anyhow::bail!(
                "Verification failed: {} of {} samples disagree",
                report.mismatches.len(),
                report.samples
            );
        }
    }

    info!("Done");
    Ok(())
}

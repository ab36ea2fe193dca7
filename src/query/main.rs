//! Look up labels in an exported tree.
//!
//! Coordinates come from the command line as `lat,lng` pairs, or one pair
//! per line on stdin when none are given. Each answer is printed as a JSON
//! line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use zonemapper::ZoneMapper;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Look up labels in a point location tree")]
struct Args {
    /// Exported tree written by `generate`
    #[arg(short, long, default_value = "tree.json")]
    tree: PathBuf,

    /// Locations as lat,lng
    #[arg(allow_hyphen_values = true)]
    locations: Vec<String>,
}

#[derive(Serialize)]
struct LookupResponse<'a> {
    lat: f64,
    lng: f64,
    id: u32,
    label: &'a str,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mapper = ZoneMapper::load(&args.tree)?;
    info!(
        "Loaded tree with {} labels from {}",
        mapper.labels().len(),
        args.tree.display()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.locations.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read stdin")?;
            if line.trim().is_empty() {
                continue;
            }
            answer(&mapper, &line, &mut out)?;
        }
    } else {
        for location in &args.locations {
            answer(&mapper, location, &mut out)?;
        }
    }
    Ok(())
}

fn answer<W: Write>(mapper: &ZoneMapper, location: &str, out: &mut W) -> Result<()> {
    let Some((lat, lng)) = parse_location(location) else {
        warn!("Ignoring malformed location '{}'", location);
        return Ok(());
    };
    let id = mapper.lookup(lat, lng);
    let response = LookupResponse {
        lat,
        lng,
        id,
        label: mapper.label(id),
    };
    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    Ok(())
}

fn parse_location(s: &str) -> Option<(f64, f64)> {
    let (lat, lng) = s.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    Some((lat, lng))
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Tuning knobs for loading, partitioning and compacting. Every field has a
/// default, so a config file only needs the ones it changes.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Label removed while loading.
    pub dropped_label: String,
    /// Douglas-Peucker tolerance in metres.
    pub simplify_tolerance_m: f64,
    /// Split pieces with a shorter bounding-box diagonal are dropped.
    pub min_diagonal_m: f64,
    pub max_pivot_candidates: usize,
    /// Candidate windows wider than this are sampled every `pivot_stride`.
    pub stride_threshold: usize,
    pub pivot_stride: usize,
    /// Boundary points of non-default fragments above which a leaf is split
    /// further.
    pub complexity_threshold: usize,
    /// Subtree cost above which a child becomes its own procedure.
    pub indirect_cost: usize,
    pub max_clip_attempts: usize,
    pub max_depth: usize,
    /// Rings the self-intersection split may examine per input polygon.
    /// Unset means four per point plus sixteen.
    pub max_split_pieces: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dropped_label: "uninhabited".to_string(),
            simplify_tolerance_m: 1500.0,
            min_diagonal_m: 2000.0,
            max_pivot_candidates: 1000,
            stride_threshold: 100,
            pivot_stride: 5,
            complexity_threshold: 50,
            indirect_cost: 100,
            max_clip_attempts: 3,
            max_depth: 64,
            max_split_pieces: None,
        }
    }
}

impl BuildConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: BuildConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

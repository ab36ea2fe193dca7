//! The full pipeline and the runtime lookup facade.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::compact::{CompactTree, TreeCompactor};
use crate::config::BuildConfig;
use crate::input::{self, InputPolygon, LoadReport, LoadedInput};
use crate::models::{LabelId, LabelTable, LabeledPolygon};
use crate::partition::{BuildReport, SpatialPartitionBuilder};

/// Maps a location to the label of the region containing it.
#[derive(Debug, Clone)]
pub struct ZoneMapper {
    labels: LabelTable,
    tree: CompactTree,
}

/// A freshly built mapper plus what the pipeline had to say on the way.
#[derive(Debug)]
pub struct BuildOutput {
    pub mapper: ZoneMapper,
    /// The normalized polygons the tree was built from.
    pub polygons: Vec<LabeledPolygon>,
    pub load: LoadReport,
    pub build: BuildReport,
}

impl ZoneMapper {
    pub fn new(labels: LabelTable, tree: CompactTree) -> Self {
        Self { labels, tree }
    }

    /// Normalize, partition and compact raw polygons.
    pub fn build(inputs: Vec<InputPolygon>, config: &BuildConfig) -> BuildOutput {
        Self::build_loaded(input::normalize(inputs, config), config)
    }

    pub fn build_loaded(loaded: LoadedInput, config: &BuildConfig) -> BuildOutput {
        let LoadedInput {
            labels,
            polygons,
            report: load,
        } = loaded;
        let (root, build) = SpatialPartitionBuilder::new(config).build(polygons.clone());
        let tree = TreeCompactor::new(config).compact(root);
        BuildOutput {
            mapper: ZoneMapper::new(labels, tree),
            polygons,
            load,
            build,
        }
    }

    /// Read a polygon file and run the whole pipeline on it. Entries that
    /// fail to decode are listed in the load report.
    pub fn build_from_file(path: &Path, config: &BuildConfig) -> Result<BuildOutput> {
        let decoded = input::read_polygons(path)
            .with_context(|| format!("Failed to read polygons from {}", path.display()))?;
        let mut output = Self::build(decoded.polygons, config);
        output.load.parse_errors = decoded.skipped;
        Ok(output)
    }

    pub fn lookup(&self, lat: f64, lng: f64) -> LabelId {
        self.tree.lookup(lat, lng)
    }

    pub fn lookup_name(&self, lat: f64, lng: f64) -> &str {
        self.labels.name(self.lookup(lat, lng))
    }

    pub fn label(&self, id: LabelId) -> &str {
        self.labels.name(id)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn tree(&self) -> &CompactTree {
        &self.tree
    }

    /// Write the exported tree as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.tree
            .write_json(&self.labels, &mut writer)
            .context("Failed to serialize tree")?;
        writer.flush()?;
        info!("Wrote tree to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let (tree, labels) = CompactTree::read_json(BufReader::new(file))
            .with_context(|| format!("Failed to load tree from {}", path.display()))?;
        Ok(Self::new(labels, tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN;

    const ZONES: &str = r#"[
        {"tz": "Europe/Helsinki", "polygon": [[20, 60], [20, 70], [30, 70], [30, 60]]},
        {"tz": "America/Chicago", "polygon": [[-92, 38], [-92, 46], [-84, 46], [-84, 38]]},
        {"tz": "uninhabited", "polygon": [[-180, -90], [-180, -80], [180, -80], [180, -90]]},
        {"tz": "Europe/Paris", "polygon": [[-2, 42], [-2, 51], [8, 51], [8, 42]]}
    ]"#;

    fn build() -> BuildOutput {
        let decoded = input::decode_polygons(ZONES.as_bytes()).unwrap();
        ZoneMapper::build(decoded.polygons, &BuildConfig::default())
    }

    #[test]
    fn test_end_to_end_lookups() {
        let output = build();
        let mapper = &output.mapper;
        assert_eq!(output.load.dropped_sentinel, 1);
        assert!(output.build.issues.is_empty());

        let helsinki = mapper.labels().id("Europe/Helsinki").unwrap();
        let chicago = mapper.labels().id("America/Chicago").unwrap();
        let paris = mapper.labels().id("Europe/Paris").unwrap();
        assert_eq!(mapper.lookup(65.012197, 25.471152), helsinki);
        assert_eq!(mapper.lookup(41.8788764, -87.6359149), chicago);
        assert_eq!(mapper.lookup(42.75676, -0.092723), paris);
        assert_eq!(mapper.lookup(0.0, -170.0), UNKNOWN);
        assert_eq!(mapper.lookup_name(0.0, -170.0), "unknown");
        assert_eq!(mapper.lookup_name(42.75676, -0.092723), "Europe/Paris");
        // Antarctica was only ever uninhabited.
        assert_eq!(mapper.lookup(-85.0, 0.0), UNKNOWN);
    }

    #[test]
    fn test_save_and_load() {
        let output = build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        output.mapper.save(&path).unwrap();

        let loaded = ZoneMapper::load(&path).unwrap();
        assert_eq!(loaded.tree(), output.mapper.tree());
        assert_eq!(loaded.lookup_name(65.012197, 25.471152), "Europe/Helsinki");
        assert_eq!(loaded.label(2), "America/Chicago");
    }

    #[test]
    fn test_build_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        let broken = ZONES.replacen("[20, 70]", "[20, \"north\"]", 1);
        std::fs::write(&path, broken).unwrap();

        let output = ZoneMapper::build_from_file(&path, &BuildConfig::default()).unwrap();
        assert_eq!(output.load.parse_errors.len(), 1);
        assert_eq!(output.mapper.lookup_name(65.0, 25.0), "unknown");
        assert_eq!(output.mapper.lookup_name(41.88, -87.64), "America/Chicago");
        assert!(ZoneMapper::build_from_file(Path::new("/nonexistent.json"), &BuildConfig::default()).is_err());
    }
}

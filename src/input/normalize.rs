use tracing::{debug, info, warn};

use super::InputPolygon;
use crate::config::BuildConfig;
use crate::error::{ParseError, PolygonError};
use crate::geometry::Point;
use crate::models::{LabelTable, LabeledPolygon};
use crate::polygon::Polygon;

/// An input polygon that could not be split into simple rings.
#[derive(Debug, Clone)]
pub struct SplitFailure {
    pub label: String,
    pub error: PolygonError,
}

/// What happened to each input polygon on the way in.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub inputs: usize,
    pub dropped_sentinel: usize,
    /// Polygons that fell below three points or lost their orientation when
    /// simplified.
    pub degenerate: usize,
    pub split_failures: Vec<SplitFailure>,
    /// Pieces dropped for having a tiny bounding box.
    pub slivers: usize,
    pub parse_errors: Vec<ParseError>,
}

/// The flat, normalized polygon set the partition builder starts from.
#[derive(Debug)]
pub struct LoadedInput {
    pub labels: LabelTable,
    pub polygons: Vec<LabeledPolygon>,
    pub report: LoadReport,
}

/// Clean, orient, simplify and split every input polygon.
///
/// Labels get their ids in first-seen order, before any polygon is dropped,
/// so ids only depend on the order of the input.
pub fn normalize(inputs: Vec<InputPolygon>, config: &BuildConfig) -> LoadedInput {
    let mut labels = LabelTable::new();
    let mut polygons = Vec::with_capacity(inputs.len());
    let mut report = LoadReport {
        inputs: inputs.len(),
        ..Default::default()
    };

    for input in inputs {
        if input.label == config.dropped_label {
            report.dropped_sentinel += 1;
            continue;
        }
        let label = labels.intern(&input.label);

        let mut polygon = Polygon::new(input.points);
        polygon.clean_up();
        polygon.ensure_clockwise();
        polygon.simplify(config.simplify_tolerance_m);
        if polygon.len() < 3 || !polygon.is_clockwise() {
            debug!("{}: degenerate after simplification", input.label);
            report.degenerate += 1;
            continue;
        }

        let split = match config.max_split_pieces {
            Some(budget) => polygon.separate_self_intersecting_within(budget),
            None => polygon.separate_self_intersecting(),
        };
        let pieces = match split {
            Ok(pieces) => pieces,
            Err(e) => {
                warn!("{}: dropping polygon: {}", input.label, e);
                report.split_failures.push(SplitFailure {
                    label: input.label,
                    error: e,
                });
                continue;
            }
        };
        for piece in pieces {
            let b = piece.bbox();
            let diagonal = Point::new(b.lat1, b.lng1).distance_in_metres(&Point::new(b.lat2, b.lng2));
            if diagonal < config.min_diagonal_m {
                report.slivers += 1;
                continue;
            }
            polygons.push(LabeledPolygon::new(piece, label));
        }
    }

    info!(
        "Normalized {} inputs into {} polygons with {} labels",
        report.inputs,
        polygons.len(),
        labels.len() - 1
    );
    LoadedInput {
        labels,
        polygons,
        report,
    }
}

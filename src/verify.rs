//! Post-build self check: sample points inside every polygon and compare the
//! compact tree against a brute-force containment scan.

use geo::{BoundingRect, Contains};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::geometry::Point;
use crate::mapper::ZoneMapper;
use crate::models::{LabelId, LabeledPolygon, UNKNOWN};

/// Grid points per side sampled across each polygon's bounding box.
const GRID: usize = 4;

/// A sample where the tree disagrees with the polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub location: Point,
    pub expected: LabelId,
    pub found: LabelId,
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub samples: usize,
    /// Samples inside polygons of more than one label, which have no single
    /// right answer.
    pub overlapping: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Check `mapper` against the polygons it was built from.
///
/// Points are taken on a grid over each polygon's box plus one interior
/// point, so uncovered points between polygons get checked too.
pub fn verify(mapper: &ZoneMapper, polygons: &[LabeledPolygon], progress: bool) -> VerifyReport {
    let shapes: Vec<(geo::Polygon<f64>, LabelId)> = polygons
        .iter()
        .map(|p| (geo::Polygon::from(&p.polygon), p.label))
        .collect();

    let pb = if progress {
        let pb = ProgressBar::new(shapes.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<(usize, usize, Vec<Mismatch>)> = polygons
        .par_iter()
        .zip(shapes.par_iter())
        .map(|(polygon, (shape, _))| {
            let mut samples = 0;
            let mut overlapping = 0;
            let mut mismatches = Vec::new();
            for pt in sample_points(polygon, shape) {
                samples += 1;
                let Some(expected) = brute_force(&shapes, pt) else {
                    overlapping += 1;
                    continue;
                };
                let found = mapper.lookup(pt.lat, pt.lng);
                if found != expected {
                    mismatches.push(Mismatch {
                        location: pt,
                        expected,
                        found,
                    });
                }
            }
            pb.inc(1);
            (samples, overlapping, mismatches)
        })
        .collect();
    pb.finish_and_clear();

    let mut report = VerifyReport::default();
    for (samples, overlapping, mismatches) in results {
        report.samples += samples;
        report.overlapping += overlapping;
        report.mismatches.extend(mismatches);
    }
    if report.passed() {
        info!("Verified {} sample points", report.samples);
    } else {
        warn!(
            "{} of {} sample points disagree",
            report.mismatches.len(),
            report.samples
        );
        for m in report.mismatches.iter().take(10) {
            warn!(
                "  {}: expected {} found {}",
                m.location,
                mapper.label(m.expected),
                mapper.label(m.found)
            );
        }
    }
    report
}

fn sample_points(polygon: &LabeledPolygon, shape: &geo::Polygon<f64>) -> Vec<Point> {
    let mut points: Vec<Point> = polygon.polygon.internal_point().into_iter().collect();
    if let Some(rect) = shape.bounding_rect() {
        let (min, max) = (rect.min(), rect.max());
        for i in 0..GRID {
            for j in 0..GRID {
                // Cell centres keep away from the box edges.
                let fx = (i as f64 + 0.5) / GRID as f64;
                let fy = (j as f64 + 0.5) / GRID as f64;
                points.push(Point::new(
                    min.y + fy * (max.y - min.y),
                    min.x + fx * (max.x - min.x),
                ));
            }
        }
    }
    points
}

/// The single label of every polygon containing `pt`, unknown when none
/// does, or `None` when labels disagree.
fn brute_force(shapes: &[(geo::Polygon<f64>, LabelId)], pt: Point) -> Option<LabelId> {
    let probe = geo::Point::new(pt.lng, pt.lat);
    let mut found = UNKNOWN;
    for (shape, label) in shapes {
        if shape.contains(&probe) {
            if found != UNKNOWN && found != *label {
                return None;
            }
            found = *label;
        }
    }
    Some(found)
}

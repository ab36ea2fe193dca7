//! Adaptive KD-tree construction over labelled fragments.

use tracing::{debug, info, warn};

use super::node::{default_label, PartitionNode, TreeStats};
use crate::config::BuildConfig;
use crate::error::PolygonError;
use crate::geometry::{Axis, BoundingBox};
use crate::models::{LabelId, LabeledPolygon, UNKNOWN};

/// Fragments covering at least this share of a cell (less the tolerance)
/// count as filling it.
const COVERAGE_TOLERANCE: f64 = 1e-4;

/// A fragment dropped because clipping kept failing.
#[derive(Debug, Clone)]
pub struct BuildIssue {
    pub label: LabelId,
    pub cell: BoundingBox,
    pub attempts: usize,
    pub error: PolygonError,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub issues: Vec<BuildIssue>,
    pub stats: TreeStats,
}

/// Builds a [`PartitionNode`] tree by recursively cutting cells until each
/// one maps to a single label or is cheap enough to test polygon by
/// polygon.
pub struct SpatialPartitionBuilder<'a> {
    config: &'a BuildConfig,
    issues: Vec<BuildIssue>,
    shown_progress: i32,
}

/// Tally of the fragments on one side of a candidate pivot.
#[derive(Default)]
struct SideTally {
    count: usize,
    label: Option<LabelId>,
    mixed: bool,
}

impl SideTally {
    fn add(&mut self, label: LabelId) {
        self.count += 1;
        match self.label {
            None => self.label = Some(label),
            Some(seen) if seen != label => self.mixed = true,
            _ => {}
        }
    }

    /// A side holding a single label is as good as done and counts once.
    fn weight(&self) -> f64 {
        if self.label.is_some() && !self.mixed {
            1.0
        } else {
            self.count as f64
        }
    }
}

impl<'a> SpatialPartitionBuilder<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            issues: Vec::new(),
            shown_progress: -1,
        }
    }

    /// Partition the whole globe.
    pub fn build(self, fragments: Vec<LabeledPolygon>) -> (PartitionNode, BuildReport) {
        self.build_in(BoundingBox::universe(), fragments)
    }

    pub fn build_in(
        mut self,
        cell: BoundingBox,
        fragments: Vec<LabeledPolygon>,
    ) -> (PartitionNode, BuildReport) {
        info!("Partitioning {} polygons", fragments.len());
        let root = self.split_as_necessary(cell, fragments, 0, 0.0, 100.0);
        let stats = root.stats();
        info!(
            "Partition finished: {} pure leaves, {} polygon leaves holding {} fragments, depth {}",
            stats.pure_leaves, stats.ambiguous_leaves, stats.fragments, stats.max_depth
        );
        if !self.issues.is_empty() {
            warn!("{} fragments dropped after failed clipping", self.issues.len());
        }
        let report = BuildReport {
            issues: self.issues,
            stats,
        };
        (root, report)
    }

    fn split_as_necessary(
        &mut self,
        cell: BoundingBox,
        fragments: Vec<LabeledPolygon>,
        depth: usize,
        progress1: f64,
        progress2: f64,
    ) -> PartitionNode {
        if fragments.is_empty() {
            return PartitionNode::Pure(UNKNOWN);
        }
        if depth >= self.config.max_depth {
            debug!("depth limit reached at {}", cell);
            return leaf(&cell, fragments);
        }
        if let Some(label) = uniform_label(&fragments) {
            if is_covered(&cell, &fragments) {
                return PartitionNode::Pure(label);
            }
            return self.reduce_complexity(cell, fragments, depth);
        }
        if fragments.len() == 2 {
            return self.split_pair(cell, fragments, depth, progress1, progress2);
        }

        let n = fragments.len();
        let (score_lat, pivot_lat) = self.best_pivot(&fragments, Axis::Lat);
        let (score_lng, pivot_lng) = self.best_pivot(&fragments, Axis::Lng);
        let (axis, score, pivot) = if score_lat <= score_lng {
            (Axis::Lat, score_lat, pivot_lat)
        } else {
            (Axis::Lng, score_lng, pivot_lng)
        };
        if score >= (n * n) as f64 {
            // No cut line separates anything by label.
            return self.reduce_complexity(cell, fragments, depth);
        }

        debug!("split {} fragments on {} at {} (score {})", n, axis, pivot, score);
        let ((left_cell, left), (right_cell, right)) = self.distribute(&cell, &fragments, axis, pivot);
        drop(fragments);

        let mid = (progress1 + progress2) / 2.0;
        let left = self.split_as_necessary(left_cell, left, depth + 1, progress1, mid);
        let right = self.split_as_necessary(right_cell, right, depth + 1, mid, progress2);
        self.report_progress(progress2);
        PartitionNode::Split {
            axis,
            pivot,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Two fragments of different labels: cut through the gap between their
    /// boxes if there is one. Each fragment lies wholly on its side, so
    /// nothing is clipped.
    fn split_pair(
        &mut self,
        cell: BoundingBox,
        fragments: Vec<LabeledPolygon>,
        depth: usize,
        progress1: f64,
        progress2: f64,
    ) -> PartitionNode {
        let (b1, b2) = (*fragments[0].bbox(), *fragments[1].bbox());
        let gap = if b1.lat1 > b2.lat2 {
            Some((Axis::Lat, (b1.lat1 + b2.lat2) / 2.0))
        } else if b1.lat2 < b2.lat1 {
            Some((Axis::Lat, (b1.lat2 + b2.lat1) / 2.0))
        } else if b1.lng1 > b2.lng2 {
            Some((Axis::Lng, (b1.lng1 + b2.lng2) / 2.0))
        } else if b1.lng2 < b2.lng1 {
            Some((Axis::Lng, (b1.lng2 + b2.lng1) / 2.0))
        } else {
            None
        };
        let Some((axis, pivot)) = gap else {
            return self.reduce_complexity(cell, fragments, depth);
        };

        let (left_cell, right_cell) = cell.split(axis, pivot);
        let (left, right): (Vec<_>, Vec<_>) = fragments
            .into_iter()
            .partition(|f| f.bbox().range(axis).1 <= pivot);

        let mid = (progress1 + progress2) / 2.0;
        let left = self.split_as_necessary(left_cell, left, depth + 1, progress1, mid);
        let right = self.split_as_necessary(right_cell, right, depth + 1, mid, progress2);
        self.report_progress(progress2);
        PartitionNode::Split {
            axis,
            pivot,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Bisect the longer side of the fragments' extent until the polygon
    /// tests left in each cell are cheap enough.
    fn reduce_complexity(
        &mut self,
        cell: BoundingBox,
        fragments: Vec<LabeledPolygon>,
        depth: usize,
    ) -> PartitionNode {
        if fragments.is_empty() {
            return PartitionNode::Pure(UNKNOWN);
        }
        let covered = is_covered(&cell, &fragments);
        if depth >= self.config.max_depth
            || complexity(&fragments, covered) <= self.config.complexity_threshold
        {
            return leaf(&cell, fragments);
        }

        let mut extent = BoundingBox::empty();
        for f in &fragments {
            extent.extend_to_fit_box(f.bbox());
        }
        let extent = extent.intersection(&cell).unwrap_or(cell);
        let (axis, pivot) = if extent.lat2 - extent.lat1 > extent.lng2 - extent.lng1 {
            (Axis::Lat, (extent.lat1 + extent.lat2) / 2.0)
        } else {
            (Axis::Lng, (extent.lng1 + extent.lng2) / 2.0)
        };

        debug!("bisect {} fragments on {} at {}", fragments.len(), axis, pivot);
        let ((left_cell, left), (right_cell, right)) = self.distribute(&cell, &fragments, axis, pivot);
        drop(fragments);
        let left = self.reduce_complexity(left_cell, left, depth + 1);
        let right = self.reduce_complexity(right_cell, right, depth + 1);
        PartitionNode::Split {
            axis,
            pivot,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Best pivot along `axis` and its score; lower is better.
    fn best_pivot(&self, fragments: &[LabeledPolygon], axis: Axis) -> (f64, f64) {
        let mut candidates: Vec<f64> = fragments
            .iter()
            .flat_map(|f| {
                let (lo, hi) = f.bbox().range(axis);
                [lo, hi]
            })
            .collect();
        candidates.sort_by(f64::total_cmp);
        candidates.dedup();

        // The outermost edges never separate anything.
        let mut first = 1;
        let mut last = candidates.len().saturating_sub(1);
        let window = self.config.max_pivot_candidates;
        if last > window {
            let centre = last / 2;
            first = centre.saturating_sub(window / 2);
            last = centre + window / 2;
        }
        let step = if last.saturating_sub(first) > self.config.stride_threshold {
            self.config.pivot_stride.max(1)
        } else {
            1
        };

        let mut best = (f64::MAX, 0.0);
        for &pivot in candidates.get(first..last).unwrap_or(&[]).iter().step_by(step) {
            let score = score_pivot(fragments, axis, pivot);
            if score < best.0 {
                best = (score, pivot);
            }
        }
        best
    }

    /// Clip every fragment to the two halves of `cell`.
    fn distribute(
        &mut self,
        cell: &BoundingBox,
        fragments: &[LabeledPolygon],
        axis: Axis,
        pivot: f64,
    ) -> (
        (BoundingBox, Vec<LabeledPolygon>),
        (BoundingBox, Vec<LabeledPolygon>),
    ) {
        let (left_cell, right_cell) = cell.split(axis, pivot);
        let mut left = Vec::new();
        let mut right = Vec::new();
        for f in fragments {
            let (lo, hi) = f.bbox().range(axis);
            if lo < pivot {
                left.extend(self.clip(f, &left_cell));
            }
            if hi > pivot {
                right.extend(self.clip(f, &right_cell));
            }
        }
        ((left_cell, left), (right_cell, right))
    }

    /// Clip with a bounded number of attempts, each starting the ring walk
    /// from a different vertex. A fragment that never clips is dropped and
    /// reported.
    fn clip(&mut self, fragment: &LabeledPolygon, cell: &BoundingBox) -> Vec<LabeledPolygon> {
        let attempts = self.config.max_clip_attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            let result = if attempt == 0 {
                fragment.polygon.clip_to_box(cell)
            } else {
                fragment.polygon.rotated(attempt).clip_to_box(cell)
            };
            match result {
                Ok(pieces) => {
                    return pieces
                        .into_iter()
                        .map(|p| fragment.with_polygon(p))
                        .collect();
                }
                Err(e) => {
                    debug!("clip attempt {} failed at {}: {}", attempt + 1, cell, e);
                    last_error = Some(e);
                }
            }
        }
        if let Some(error) = last_error {
            warn!(
                "Dropping fragment of label {} in {} after {} attempts: {}",
                fragment.label, cell, attempts, error
            );
            self.issues.push(BuildIssue {
                label: fragment.label,
                cell: *cell,
                attempts,
                error,
            });
        }
        Vec::new()
    }

    fn report_progress(&mut self, progress: f64) {
        let progress = progress as i32;
        if progress != self.shown_progress {
            info!("[{}%]", progress);
            self.shown_progress = progress;
        }
    }
}

/// `left² + right²`, where a side holding one label counts as one fragment.
fn score_pivot(fragments: &[LabeledPolygon], axis: Axis, pivot: f64) -> f64 {
    let mut left = SideTally::default();
    let mut right = SideTally::default();
    for f in fragments {
        let (lo, hi) = f.bbox().range(axis);
        if hi > pivot {
            right.add(f.label);
        }
        if lo < pivot {
            left.add(f.label);
        }
    }
    let (l, r) = (left.weight(), right.weight());
    l * l + r * r
}

/// The one label every fragment carries, if there is one.
fn uniform_label(fragments: &[LabeledPolygon]) -> Option<LabelId> {
    let first = fragments.first()?.label;
    fragments.iter().all(|f| f.label == first).then_some(first)
}

fn is_covered(cell: &BoundingBox, fragments: &[LabeledPolygon]) -> bool {
    let covered: f64 = fragments.iter().map(|f| f.polygon.area()).sum();
    covered >= cell.area() * (1.0 - COVERAGE_TOLERANCE)
}

/// One plus the boundary points that would need testing in a leaf.
fn complexity(fragments: &[LabeledPolygon], covered: bool) -> usize {
    let default = default_label(fragments, covered);
    1 + fragments
        .iter()
        .filter(|f| f.label != default)
        .map(LabeledPolygon::size)
        .sum::<usize>()
}

fn leaf(cell: &BoundingBox, fragments: Vec<LabeledPolygon>) -> PartitionNode {
    if fragments.is_empty() {
        return PartitionNode::Pure(UNKNOWN);
    }
    let covered = is_covered(cell, &fragments);
    match uniform_label(&fragments) {
        Some(label) if covered => PartitionNode::Pure(label),
        _ => PartitionNode::Ambiguous { fragments, covered },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::polygon::Polygon;

    fn square(label: LabelId, lat1: f64, lat2: f64, lng1: f64, lng2: f64) -> LabeledPolygon {
        LabeledPolygon::new(
            Polygon::from_box(&BoundingBox::new(lat1, lat2, lng1, lng2)),
            label,
        )
    }

    /// A 0..10 x 0..39.1 block whose northern edge is a sawtooth, 64 points
    /// in all.
    fn comb(label: LabelId) -> LabeledPolygon {
        let mut points = vec![Point::new(0.0, 0.0)];
        for i in 0..=60 {
            let lat = if i % 2 == 1 { 11.0 } else { 10.0 };
            points.push(Point::new(lat, 0.1 + 0.65 * i as f64));
        }
        points.push(Point::new(0.0, 39.1));
        LabeledPolygon::new(Polygon::new(points), label)
    }

    #[test]
    fn test_single_label_covering_universe_is_one_leaf() {
        let config = BuildConfig::default();
        let everywhere = square(1, -90.0, 90.0, -180.0, 180.0);
        let (root, report) = SpatialPartitionBuilder::new(&config).build(vec![everywhere]);
        assert_eq!(root, PartitionNode::Pure(1));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_no_fragments_is_unknown() {
        let config = BuildConfig::default();
        let (root, _) = SpatialPartitionBuilder::new(&config).build(Vec::new());
        assert_eq!(root, PartitionNode::Pure(UNKNOWN));
    }

    #[test]
    fn test_disjoint_pair_splits_in_the_gap() {
        let config = BuildConfig::default();
        let a = square(1, 0.0, 10.0, 0.0, 10.0);
        let b = square(2, 0.0, 10.0, 20.0, 30.0);
        let (root, _) = SpatialPartitionBuilder::new(&config).build(vec![a, b]);
        let PartitionNode::Split { axis, pivot, .. } = &root else {
            panic!("expected a split, got {:?}", root);
        };
        assert_eq!(*axis, Axis::Lng);
        assert_eq!(*pivot, 15.0);
        assert_eq!(root.lookup(5.0, 5.0), 1);
        assert_eq!(root.lookup(5.0, 25.0), 2);
        assert_eq!(root.lookup(5.0, 15.0), UNKNOWN);
    }

    #[test]
    fn test_three_labels() {
        let config = BuildConfig::default();
        let fragments = vec![
            square(1, 0.0, 10.0, 0.0, 10.0),
            square(2, 0.0, 10.0, 20.0, 30.0),
            square(3, 20.0, 30.0, 0.0, 10.0),
        ];
        let (root, report) = SpatialPartitionBuilder::new(&config).build(fragments);
        // Every candidate scores the same, so latitude wins.
        let PartitionNode::Split { axis, pivot, .. } = &root else {
            panic!("expected a split, got {:?}", root);
        };
        assert_eq!((*axis, *pivot), (Axis::Lat, 10.0));
        assert_eq!(root.lookup(5.0, 5.0), 1);
        assert_eq!(root.lookup(5.0, 25.0), 2);
        assert_eq!(root.lookup(25.0, 5.0), 3);
        assert_eq!(root.lookup(25.0, 25.0), UNKNOWN);
        assert_eq!(root.lookup(-50.0, 100.0), UNKNOWN);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_complex_polygon_is_bisected() {
        let config = BuildConfig::default();
        let (root, report) = SpatialPartitionBuilder::new(&config).build(vec![comb(1)]);
        let PartitionNode::Split { axis, .. } = &root else {
            panic!("expected a split, got {:?}", root);
        };
        assert_eq!(*axis, Axis::Lng);
        assert!(report.issues.is_empty());
        assert!(report.stats.ambiguous_leaves >= 2);
        assert_eq!(root.lookup(5.0, 5.0), 1);
        assert_eq!(root.lookup(5.0, 30.0), 1);
        assert_eq!(root.lookup(-5.0, 5.0), UNKNOWN);
        assert_eq!(root.lookup(20.0, 5.0), UNKNOWN);
    }

    #[test]
    fn test_depth_limit_makes_a_leaf() {
        let config = BuildConfig {
            max_depth: 0,
            ..BuildConfig::default()
        };
        let fragments = vec![
            square(1, 0.0, 10.0, 0.0, 10.0),
            square(2, 0.0, 10.0, 20.0, 30.0),
            square(3, 20.0, 30.0, 0.0, 10.0),
        ];
        let (root, _) = SpatialPartitionBuilder::new(&config).build(fragments);
        assert!(matches!(root, PartitionNode::Ambiguous { covered: false, .. }));
        assert_eq!(root.lookup(25.0, 5.0), 3);
    }

    #[test]
    fn test_pivot_scores() {
        let fragments = vec![
            square(1, 0.0, 10.0, 0.0, 10.0),
            square(1, 0.0, 10.0, 20.0, 30.0),
            square(2, 20.0, 30.0, 0.0, 10.0),
        ];
        // Both sides pure.
        assert_eq!(score_pivot(&fragments, Axis::Lat, 15.0), 2.0);
        // Two mixed on the left, all three (mixed) on the right.
        assert_eq!(score_pivot(&fragments, Axis::Lng, 5.0), 13.0);
        assert_eq!(uniform_label(&fragments), None);
        assert_eq!(uniform_label(&fragments[..2]), Some(1));
    }

    #[test]
    fn test_unclippable_fragment_is_dropped_and_reported() {
        let config = BuildConfig {
            complexity_threshold: 5,
            max_clip_attempts: 4,
            ..BuildConfig::default()
        };
        // Two points can never be clipped, and this one straddles the
        // bisection at lng 15.
        let broken = LabeledPolygon::new(
            Polygon::new(vec![Point::new(2.0, 2.0), Point::new(8.0, 30.0)]),
            1,
        );
        let fragments = vec![square(1, 0.0, 10.0, 0.0, 10.0), broken];
        let (root, report) = SpatialPartitionBuilder::new(&config).build(fragments);

        let PartitionNode::Split { axis, pivot, .. } = &root else {
            panic!("expected a split, got {:?}", root);
        };
        assert_eq!((*axis, *pivot), (Axis::Lng, 15.0));
        // Dropped from both halves, and nothing else lost.
        assert_eq!(report.issues.len(), 2);
        for issue in &report.issues {
            assert_eq!(issue.label, 1);
            assert_eq!(issue.attempts, 4);
            assert_eq!(issue.error, PolygonError::Degenerate { points: 2 });
        }
        assert_eq!(report.issues[0].cell.lng2, 15.0);
        assert_eq!(report.issues[1].cell.lng1, 15.0);
        assert_eq!(report.stats.fragments, 1);
        assert_eq!(root.lookup(5.0, 5.0), 1);
        assert_eq!(root.lookup(5.0, 20.0), UNKNOWN);
    }

    /// `count` half-degree label 1 bands stacked from lat 0, and a label 2
    /// band at `far`. Any cut between the last band and `far` is perfect.
    fn bands(count: usize, far: f64) -> Vec<LabeledPolygon> {
        let mut fragments: Vec<_> = (0..count)
            .map(|i| square(1, i as f64, i as f64 + 0.5, 0.0, 1.0))
            .collect();
        fragments.push(square(2, far, far + 1.0, 0.0, 1.0));
        fragments
    }

    #[test]
    fn test_wide_candidate_list_is_strided() {
        // 122 distinct edges: indices 1, 6, .., 116 are scored, so the
        // perfect cuts at indices 119 and 120 are skipped.
        let fragments = bands(60, 100.0);
        let config = BuildConfig::default();
        let builder = SpatialPartitionBuilder::new(&config);
        assert_eq!(builder.best_pivot(&fragments, Axis::Lat), (10.0, 58.0));

        let config = BuildConfig {
            pivot_stride: 1,
            ..BuildConfig::default()
        };
        let builder = SpatialPartitionBuilder::new(&config);
        assert_eq!(builder.best_pivot(&fragments, Axis::Lat), (2.0, 59.5));
    }

    #[test]
    fn test_huge_candidate_list_is_windowed() {
        // 1202 distinct edges: only indices 100..1100 around the middle are
        // considered, every fifth one.
        let fragments = bands(600, 1000.0);
        let config = BuildConfig::default();
        let builder = SpatialPartitionBuilder::new(&config);
        // Index 1095; 52 bands and the far one remain on the right.
        assert_eq!(builder.best_pivot(&fragments, Axis::Lat), (1.0 + 53.0 * 53.0, 547.5));

        let config = BuildConfig {
            pivot_stride: 1,
            ..BuildConfig::default()
        };
        let builder = SpatialPartitionBuilder::new(&config);
        // Index 1099 is the last one inside the window.
        assert_eq!(builder.best_pivot(&fragments, Axis::Lat), (1.0 + 51.0 * 51.0, 549.5));

        let config = BuildConfig {
            max_pivot_candidates: 2000,
            pivot_stride: 1,
            ..BuildConfig::default()
        };
        let builder = SpatialPartitionBuilder::new(&config);
        assert_eq!(builder.best_pivot(&fragments, Axis::Lat), (2.0, 599.5));
    }
}

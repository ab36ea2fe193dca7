use crate::geometry::{Axis, Point};
use crate::models::{LabelId, LabeledPolygon, UNKNOWN};

/// A node of the raw partition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionNode {
    /// Every point of the cell maps to one label.
    Pure(LabelId),
    /// Fragments that have to be tested one by one. When `covered`, the
    /// fragments fill the cell and the majority label stands in for the
    /// untested ones; otherwise uncovered points are unknown.
    Ambiguous {
        fragments: Vec<LabeledPolygon>,
        covered: bool,
    },
    /// Points with `axis` below `pivot` go left, the rest right.
    Split {
        axis: Axis,
        pivot: f64,
        left: Box<PartitionNode>,
        right: Box<PartitionNode>,
    },
}

/// Shape of a finished tree, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub pure_leaves: usize,
    pub ambiguous_leaves: usize,
    pub fragments: usize,
    pub fragment_points: usize,
    pub max_depth: usize,
}

impl PartitionNode {
    pub fn lookup(&self, lat: f64, lng: f64) -> LabelId {
        let pt = Point::new(lat, lng);
        let mut node = self;
        loop {
            match node {
                PartitionNode::Pure(label) => return *label,
                PartitionNode::Ambiguous { fragments, covered } => {
                    return fragments
                        .iter()
                        .find(|f| f.contains(pt))
                        .map(|f| f.label)
                        .unwrap_or_else(|| default_label(fragments, *covered));
                }
                PartitionNode::Split {
                    axis,
                    pivot,
                    left,
                    right,
                } => {
                    node = if axis.of(pt) < *pivot { &**left } else { &**right };
                }
            }
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.collect_stats(0, &mut stats);
        stats
    }

    fn collect_stats(&self, depth: usize, stats: &mut TreeStats) {
        stats.max_depth = stats.max_depth.max(depth);
        match self {
            PartitionNode::Pure(_) => stats.pure_leaves += 1,
            PartitionNode::Ambiguous { fragments, .. } => {
                stats.ambiguous_leaves += 1;
                stats.fragments += fragments.len();
                stats.fragment_points += fragments.iter().map(LabeledPolygon::size).sum::<usize>();
            }
            PartitionNode::Split { left, right, .. } => {
                left.collect_stats(depth + 1, stats);
                right.collect_stats(depth + 1, stats);
            }
        }
    }
}

/// The label with the heaviest run after sorting by label, where a run
/// weighs two plus the boundary points of its fragments. Ties go to the
/// lower label.
pub(crate) fn majority_label(fragments: &[LabeledPolygon]) -> LabelId {
    let mut weights: Vec<(LabelId, usize)> = fragments.iter().map(|f| (f.label, f.size())).collect();
    weights.sort_by_key(|&(label, _)| label);

    let mut best = (UNKNOWN, 0);
    let mut run: Option<(LabelId, usize)> = None;
    for (label, size) in weights {
        let weight = match run {
            Some((current, weight)) if current == label => weight + size,
            _ => 2 + size,
        };
        run = Some((label, weight));
        if weight > best.1 {
            best = (label, weight);
        }
    }
    best.0
}

/// What a leaf answers when no fragment test matches.
pub(crate) fn default_label(fragments: &[LabeledPolygon], covered: bool) -> LabelId {
    if covered {
        majority_label(fragments)
    } else {
        UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::polygon::Polygon;

    fn fragment(label: LabelId, lat1: f64, lat2: f64, lng1: f64, lng2: f64) -> LabeledPolygon {
        LabeledPolygon::new(
            Polygon::from_box(&BoundingBox::new(lat1, lat2, lng1, lng2)),
            label,
        )
    }

    #[test]
    fn test_majority_weighs_runs() {
        let fragments = vec![
            fragment(2, 0.0, 1.0, 0.0, 1.0),
            fragment(1, 0.0, 1.0, 1.0, 2.0),
            fragment(2, 1.0, 2.0, 0.0, 1.0),
        ];
        // Label 2 has two fragments (2 + 4 + 4) against label 1's one (2 + 4).
        assert_eq!(majority_label(&fragments), 2);
        // Equal weights go to the lower label.
        assert_eq!(majority_label(&fragments[..2]), 1);
        assert_eq!(majority_label(&[]), UNKNOWN);
    }

    #[test]
    fn test_lookup_descends_and_defaults() {
        let tree = PartitionNode::Split {
            axis: Axis::Lng,
            pivot: 0.0,
            left: Box::new(PartitionNode::Pure(1)),
            right: Box::new(PartitionNode::Ambiguous {
                fragments: vec![fragment(2, 0.0, 1.0, 0.0, 1.0)],
                covered: false,
            }),
        };
        assert_eq!(tree.lookup(5.0, -5.0), 1);
        assert_eq!(tree.lookup(0.5, 0.5), 2);
        assert_eq!(tree.lookup(5.0, 5.0), UNKNOWN);
        let stats = tree.stats();
        assert_eq!(stats.pure_leaves, 1);
        assert_eq!(stats.ambiguous_leaves, 1);
        assert_eq!(stats.max_depth, 1);
    }
}

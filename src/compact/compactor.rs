//! Turning the partition tree into a compact decision tree.

use tracing::{debug, info};

use super::node::{CompactNode, CompactTree};
use crate::config::BuildConfig;
use crate::models::LabeledPolygon;
use crate::partition::node::default_label;
use crate::partition::PartitionNode;

/// Converts a [`PartitionNode`] tree into a [`CompactTree`], moving large
/// subtrees out into subroutines so no single procedure grows past
/// `indirect_cost` units.
pub struct TreeCompactor<'a> {
    config: &'a BuildConfig,
    subroutines: Vec<CompactNode>,
    fragments: Vec<LabeledPolygon>,
}

impl<'a> TreeCompactor<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            subroutines: Vec::new(),
            fragments: Vec::new(),
        }
    }

    pub fn compact(mut self, root: PartitionNode) -> CompactTree {
        let (root, cost) = self.convert(root);
        let tree = CompactTree {
            root,
            subroutines: self.subroutines,
            fragments: self.fragments,
        };
        info!(
            "Compacted into {} nodes, {} subroutines, {} tested fragments (root cost {})",
            tree.node_count(),
            tree.subroutines.len(),
            tree.fragments.len(),
            cost
        );
        tree
    }

    /// The compact node and its cost in units: one per decision, one per
    /// fragment of a polygon leaf whether it is tested or not. An indirect
    /// call is free, the subroutine is accounted on its own.
    fn convert(&mut self, node: PartitionNode) -> (CompactNode, usize) {
        match node {
            PartitionNode::Pure(label) => (CompactNode::Pure(label), 1),
            PartitionNode::Split {
                axis,
                pivot,
                left,
                right,
            } => {
                let left = self.convert(*left);
                let left = self.wrap(left);
                let right = self.convert(*right);
                let right = self.wrap(right);
                let cost = 1 + left.1 + right.1;
                let node = CompactNode::Split {
                    axis,
                    pivot,
                    left: Box::new(left.0),
                    right: Box::new(right.0),
                };
                (node, cost)
            }
            PartitionNode::Ambiguous { fragments, covered } => {
                let default = default_label(&fragments, covered);
                let cost = fragments.len();
                let mut tests = Vec::new();
                for fragment in fragments {
                    if fragment.label != default {
                        tests.push(self.fragments.len());
                        self.fragments.push(fragment);
                    }
                }
                if tests.is_empty() {
                    return (CompactNode::Pure(default), 1);
                }
                (CompactNode::PolygonTest { tests, default }, cost)
            }
        }
    }

    fn wrap(&mut self, (node, cost): (CompactNode, usize)) -> (CompactNode, usize) {
        if cost <= self.config.indirect_cost {
            return (node, cost);
        }
        let id = self.subroutines.len();
        debug!("subroutine {} with cost {}", id, cost);
        self.subroutines.push(node);
        (CompactNode::Indirect(id), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Axis, BoundingBox};
    use crate::models::UNKNOWN;
    use crate::polygon::Polygon;

    fn square(label: u32, lat1: f64, lat2: f64, lng1: f64, lng2: f64) -> LabeledPolygon {
        LabeledPolygon::new(
            Polygon::from_box(&BoundingBox::new(lat1, lat2, lng1, lng2)),
            label,
        )
    }

    /// A ladder of lat splits with a polygon leaf on every rung.
    fn ladder(rungs: usize) -> PartitionNode {
        let mut node = PartitionNode::Pure(1);
        for i in (0..rungs).rev() {
            let lat = i as f64;
            node = PartitionNode::Split {
                axis: Axis::Lat,
                pivot: lat + 1.0,
                left: Box::new(PartitionNode::Ambiguous {
                    fragments: vec![
                        square(2, lat, lat + 1.0, 0.0, 1.0),
                        square(3, lat, lat + 1.0, 1.0, 2.0),
                    ],
                    covered: false,
                }),
                right: Box::new(node),
            };
        }
        node
    }

    #[test]
    fn test_polygon_test_skips_majority() {
        let node = PartitionNode::Ambiguous {
            fragments: vec![
                square(2, 0.0, 1.0, 0.0, 1.0),
                square(1, 0.0, 1.0, 1.0, 2.0),
                square(2, 1.0, 2.0, 0.0, 2.0),
            ],
            covered: true,
        };
        let config = BuildConfig::default();
        let tree = TreeCompactor::new(&config).compact(node);
        assert_eq!(
            tree.root(),
            &CompactNode::PolygonTest {
                tests: vec![0],
                default: 2
            }
        );
        assert_eq!(tree.fragments()[0].label, 1);
        assert_eq!(tree.lookup(0.5, 1.5), 1);
        assert_eq!(tree.lookup(1.5, 1.5), 2);
    }

    #[test]
    fn test_uncovered_leaf_tests_everything() {
        let node = PartitionNode::Ambiguous {
            fragments: vec![square(2, 0.0, 1.0, 0.0, 1.0)],
            covered: false,
        };
        let config = BuildConfig::default();
        let tree = TreeCompactor::new(&config).compact(node);
        assert_eq!(tree.lookup(0.5, 0.5), 2);
        assert_eq!(tree.lookup(5.0, 5.0), UNKNOWN);
    }

    #[test]
    fn test_indirect_wrapping_keeps_lookups() {
        let partition = ladder(40);
        let inline = BuildConfig {
            indirect_cost: usize::MAX,
            ..BuildConfig::default()
        };
        let eager = BuildConfig {
            indirect_cost: 0,
            ..BuildConfig::default()
        };
        let default = BuildConfig::default();
        let plain = TreeCompactor::new(&inline).compact(partition.clone());
        let wrapped = TreeCompactor::new(&eager).compact(partition.clone());
        let bounded = TreeCompactor::new(&default).compact(partition.clone());
        assert!(plain.subroutines().is_empty());
        assert!(!wrapped.subroutines().is_empty());
        assert!(!bounded.subroutines().is_empty());

        for i in 0..90 {
            for j in 0..5 {
                let (lat, lng) = (i as f64 * 0.5 - 2.25, j as f64 * 0.5 - 0.25);
                let expected = partition.lookup(lat, lng);
                assert_eq!(plain.lookup(lat, lng), expected, "({}, {})", lat, lng);
                assert_eq!(wrapped.lookup(lat, lng), expected, "({}, {})", lat, lng);
                assert_eq!(bounded.lookup(lat, lng), expected, "({}, {})", lat, lng);
            }
        }
    }

    /// Every ladder leaf tests all of its fragments, so its cost is the
    /// number of tests.
    fn procedure_cost(node: &CompactNode) -> usize {
        match node {
            CompactNode::Pure(_) => 1,
            CompactNode::Split { left, right, .. } => 1 + procedure_cost(left) + procedure_cost(right),
            CompactNode::PolygonTest { tests, .. } => tests.len(),
            CompactNode::Indirect(_) => 0,
        }
    }

    #[test]
    fn test_procedures_stay_within_budget() {
        let config = BuildConfig::default();
        let tree = TreeCompactor::new(&config).compact(ladder(60));
        for sub in tree.subroutines() {
            let cost = procedure_cost(sub);
            assert!(cost <= 2 * config.indirect_cost + 1, "cost {}", cost);
        }
        assert!(procedure_cost(tree.root()) <= 2 * config.indirect_cost + 1);
    }

    #[test]
    fn test_untested_fragments_still_count_towards_cost() {
        // Five fragments, only the label 1 one gets a test.
        let mut fragments: Vec<_> = (0..4)
            .map(|i| square(2, i as f64, i as f64 + 1.0, 0.0, 1.0))
            .collect();
        fragments.push(square(1, 0.0, 4.0, 1.0, 2.0));
        let partition = PartitionNode::Split {
            axis: Axis::Lng,
            pivot: 2.0,
            left: Box::new(PartitionNode::Ambiguous {
                fragments,
                covered: true,
            }),
            right: Box::new(PartitionNode::Pure(1)),
        };
        let config = BuildConfig {
            indirect_cost: 3,
            ..BuildConfig::default()
        };
        let tree = TreeCompactor::new(&config).compact(partition);

        let CompactNode::Split { left, right, .. } = tree.root() else {
            panic!("expected a split, got {:?}", tree.root());
        };
        assert_eq!(**left, CompactNode::Indirect(0));
        assert_eq!(**right, CompactNode::Pure(1));
        assert_eq!(
            tree.subroutines(),
            &[CompactNode::PolygonTest {
                tests: vec![0],
                default: 2
            }]
        );
        assert_eq!(tree.lookup(2.0, 1.5), 1);
        assert_eq!(tree.lookup(2.0, 0.5), 2);
    }
}

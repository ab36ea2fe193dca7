use crate::geometry::{Axis, Point};
use crate::models::{LabelId, LabeledPolygon, UNKNOWN};

/// A node of the compact decision tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CompactNode {
    Pure(LabelId),
    Split {
        axis: Axis,
        pivot: f64,
        left: Box<CompactNode>,
        right: Box<CompactNode>,
    },
    /// Test the listed fragments in order; the first one containing the
    /// point wins, otherwise `default`.
    PolygonTest {
        tests: Vec<usize>,
        default: LabelId,
    },
    /// Continue at a subroutine root.
    Indirect(usize),
}

/// The finished point-location structure. Immutable; any number of threads
/// may call [`CompactTree::lookup`] at once.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactTree {
    pub(crate) root: CompactNode,
    pub(crate) subroutines: Vec<CompactNode>,
    pub(crate) fragments: Vec<LabeledPolygon>,
}

impl CompactTree {
    pub fn root(&self) -> &CompactNode {
        &self.root
    }

    pub fn subroutines(&self) -> &[CompactNode] {
        &self.subroutines
    }

    /// Every fragment a [`CompactNode::PolygonTest`] refers to, by index.
    pub fn fragments(&self) -> &[LabeledPolygon] {
        &self.fragments
    }

    /// Label at a location. Points no polygon covers are [`UNKNOWN`].
    pub fn lookup(&self, lat: f64, lng: f64) -> LabelId {
        let pt = Point::new(lat, lng);
        let mut node = &self.root;
        loop {
            match node {
                CompactNode::Pure(label) => return *label,
                CompactNode::Split {
                    axis,
                    pivot,
                    left,
                    right,
                } => {
                    node = if axis.of(pt) < *pivot { &**left } else { &**right };
                }
                CompactNode::PolygonTest { tests, default } => {
                    return tests
                        .iter()
                        .filter_map(|&i| self.fragments.get(i))
                        .find(|f| f.contains(pt))
                        .map_or(*default, |f| f.label);
                }
                CompactNode::Indirect(id) => match self.subroutines.get(*id) {
                    Some(sub) => node = sub,
                    None => return UNKNOWN,
                },
            }
        }
    }

    /// Nodes across the root and every subroutine.
    pub fn node_count(&self) -> usize {
        fn count(node: &CompactNode) -> usize {
            match node {
                CompactNode::Split { left, right, .. } => 1 + count(left) + count(right),
                _ => 1,
            }
        }
        count(&self.root) + self.subroutines.iter().map(count).sum::<usize>()
    }
}

//! Flat, serializable view of a [`CompactTree`].
//!
//! Procedure 0 is the root; procedure `k + 1` is subroutine `k`. Each
//! procedure is its tree in pre-order: a split is followed by its left
//! subtree, then its right subtree.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::node::{CompactNode, CompactTree};
use crate::error::ImportError;
use crate::geometry::{Axis, Point};
use crate::models::{LabelId, LabelTable, LabeledPolygon};
use crate::polygon::Polygon;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeExport {
    /// Label names by id; id 0 is "unknown".
    pub labels: Vec<String>,
    pub procedures: Vec<Vec<ExportNode>>,
    pub fragments: Vec<ExportFragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportNode {
    Pure { label: LabelId },
    Split { axis: Axis, pivot: f64 },
    PolygonTest { tests: Vec<usize>, default: LabelId },
    Indirect { procedure: usize },
}

/// A tested fragment: its label and ring as `[lat, lng]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFragment {
    pub label: LabelId,
    pub points: Vec<[f64; 2]>,
}

impl CompactTree {
    pub fn export(&self, labels: &LabelTable) -> TreeExport {
        let mut procedures = Vec::with_capacity(self.subroutines.len() + 1);
        for root in std::iter::once(&self.root).chain(&self.subroutines) {
            let mut nodes = Vec::new();
            flatten(root, &mut nodes);
            procedures.push(nodes);
        }
        let fragments = self
            .fragments
            .iter()
            .map(|f| ExportFragment {
                label: f.label,
                points: f.polygon.points().iter().map(|p| [p.lat, p.lng]).collect(),
            })
            .collect();
        TreeExport {
            labels: labels.names().to_vec(),
            procedures,
            fragments,
        }
    }

    /// Rebuild a tree from its export, checking every reference.
    pub fn from_export(export: TreeExport) -> Result<(CompactTree, LabelTable), ImportError> {
        let fragments: Vec<LabeledPolygon> = export
            .fragments
            .into_iter()
            .map(|f| {
                let points = f.points.into_iter().map(|[lat, lng]| Point::new(lat, lng)).collect();
                LabeledPolygon::new(Polygon::new(points), f.label)
            })
            .collect();

        let procedure_count = export.procedures.len();
        let mut roots = Vec::with_capacity(procedure_count);
        for (procedure, nodes) in export.procedures.into_iter().enumerate() {
            let mut reader = NodeReader {
                procedure,
                nodes: nodes.into_iter(),
                procedure_count,
                fragment_count: fragments.len(),
            };
            let root = reader.read()?;
            let extra = reader.nodes.len();
            if extra > 0 {
                return Err(ImportError::Trailing { procedure, extra });
            }
            roots.push(root);
        }

        let mut roots = roots.into_iter();
        let root = roots.next().ok_or(ImportError::Empty)?;
        let tree = CompactTree {
            root,
            subroutines: roots.collect(),
            fragments,
        };
        Ok((tree, LabelTable::from_names(export.labels)))
    }

    pub fn write_json<W: Write>(&self, labels: &LabelTable, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, &self.export(labels))
    }

    pub fn read_json<R: Read>(reader: R) -> Result<(CompactTree, LabelTable), ImportError> {
        let export: TreeExport = serde_json::from_reader(reader)?;
        Self::from_export(export)
    }
}

fn flatten(node: &CompactNode, out: &mut Vec<ExportNode>) {
    match node {
        CompactNode::Pure(label) => out.push(ExportNode::Pure { label: *label }),
        CompactNode::Split {
            axis,
            pivot,
            left,
            right,
        } => {
            out.push(ExportNode::Split {
                axis: *axis,
                pivot: *pivot,
            });
            flatten(left, out);
            flatten(right, out);
        }
        CompactNode::PolygonTest { tests, default } => out.push(ExportNode::PolygonTest {
            tests: tests.clone(),
            default: *default,
        }),
        CompactNode::Indirect(id) => out.push(ExportNode::Indirect { procedure: id + 1 }),
    }
}

struct NodeReader {
    procedure: usize,
    nodes: std::vec::IntoIter<ExportNode>,
    procedure_count: usize,
    fragment_count: usize,
}

impl NodeReader {
    fn read(&mut self) -> Result<CompactNode, ImportError> {
        let procedure = self.procedure;
        let node = self
            .nodes
            .next()
            .ok_or(ImportError::Truncated { procedure })?;
        match node {
            ExportNode::Pure { label } => Ok(CompactNode::Pure(label)),
            ExportNode::Split { axis, pivot } => {
                let left = self.read()?;
                let right = self.read()?;
                Ok(CompactNode::Split {
                    axis,
                    pivot,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            ExportNode::PolygonTest { tests, default } => {
                if let Some(&index) = tests.iter().find(|&&i| i >= self.fragment_count) {
                    return Err(ImportError::BadReference {
                        procedure,
                        what: "fragment",
                        index,
                    });
                }
                Ok(CompactNode::PolygonTest { tests, default })
            }
            ExportNode::Indirect { procedure: target } => {
                if target == 0 || target >= self.procedure_count {
                    return Err(ImportError::BadReference {
                        procedure,
                        what: "procedure",
                        index: target,
                    });
                }
                Ok(CompactNode::Indirect(target - 1))
            }
        }
    }
}

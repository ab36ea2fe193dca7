//! Spatial partitioning of labelled polygons into a KD-tree.

pub mod builder;
pub mod node;

pub use builder::{BuildIssue, BuildReport, SpatialPartitionBuilder};
pub use node::{PartitionNode, TreeStats};

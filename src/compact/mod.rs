//! Compact decision tree: the artifact handed to serializers and to the
//! runtime lookup.

pub mod compactor;
pub mod export;
pub mod node;

pub use compactor::TreeCompactor;
pub use export::{ExportFragment, ExportNode, TreeExport};
pub use node::{CompactNode, CompactTree};

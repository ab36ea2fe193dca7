//! Label types shared by the builder, the compactor and the runtime.

pub mod label;

pub use label::{LabelId, LabelTable, LabeledPolygon, UNKNOWN};

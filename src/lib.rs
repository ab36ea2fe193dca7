//! Zonemapper - turns labelled boundary polygons into a compact point
//! location tree.
//!
//! This library provides the geometry engine, partition builder and
//! compactor shared by the generate and query binaries.

pub mod compact;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod mapper;
pub mod models;
pub mod partition;
pub mod polygon;
pub mod verify;

pub use compact::{CompactNode, CompactTree};
pub use config::BuildConfig;
pub use error::{ImportError, ParseError, PolygonError};
pub use geometry::{Axis, BoundingBox, Point};
pub use mapper::{BuildOutput, ZoneMapper};
pub use models::{LabelId, LabelTable, LabeledPolygon};
pub use polygon::Polygon;

//! Planar geometry primitives.
//!
//! Everything here uses the equirectangular approximation: latitude and
//! longitude are treated as plane coordinates, with a `cos(lat)` correction
//! only where distances in metres are needed.

mod bbox;
mod point;

pub use bbox::BoundingBox;
pub use point::{Point, EARTH_RADIUS_M};

/// Metres per degree of latitude. Valid at every latitude.
pub const METRES_PER_DEGREE_LAT: f64 = 110_852.0;

/// The two axes a partition can split on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Lat,
    Lng,
}

impl Axis {
    /// The coordinate of `pt` along this axis.
    pub fn of(self, pt: Point) -> f64 {
        match self {
            Axis::Lat => pt.lat,
            Axis::Lng => pt.lng,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Lat => write!(f, "lat"),
            Axis::Lng => write!(f, "lng"),
        }
    }
}

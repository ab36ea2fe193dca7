//! Axis-aligned lat/lng bounding box.

use serde::{Deserialize, Serialize};

use super::{Axis, Point, METRES_PER_DEGREE_LAT};

const SENTINEL: f64 = 999_999.0;
const CONTAINS_EPSILON: f64 = 0.000_001;

/// Bounding box with `lat1 <= lat2` and `lng1 <= lng2`.
///
/// [`BoundingBox::empty`] is inverted on purpose so that the first
/// `extend_to_fit` snaps it onto the point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat1: f64,
    pub lat2: f64,
    pub lng1: f64,
    pub lng2: f64,
}

impl BoundingBox {
    /// Build a box from two corners given in any order.
    pub fn new(lat1: f64, lat2: f64, lng1: f64, lng2: f64) -> Self {
        Self {
            lat1: lat1.min(lat2),
            lat2: lat1.max(lat2),
            lng1: lng1.min(lng2),
            lng2: lng1.max(lng2),
        }
    }

    /// A box that contains nothing, ready for `extend_to_fit`.
    pub fn empty() -> Self {
        Self {
            lat1: SENTINEL,
            lat2: -SENTINEL,
            lng1: SENTINEL,
            lng2: -SENTINEL,
        }
    }

    /// A box that contains everything.
    pub fn everything() -> Self {
        Self {
            lat1: -SENTINEL,
            lat2: SENTINEL,
            lng1: -SENTINEL,
            lng2: SENTINEL,
        }
    }

    /// The whole globe: -90..90, -180..180.
    pub fn universe() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    /// A box of `metres` around a location (2 km when zero).
    pub fn from_location(pt: Point, metres: f64) -> Self {
        let mut result = Self::new(pt.lat, pt.lat, pt.lng, pt.lng);
        let metres = if metres == 0.0 { 2000.0 } else { metres };
        result.enlarge_by_metres(metres);
        result
    }

    pub fn contains(&self, pt: Point) -> bool {
        self.contains_lat_lng(pt.lat, pt.lng)
    }

    pub fn contains_lat_lng(&self, lat: f64, lng: f64) -> bool {
        lat >= self.lat1 - CONTAINS_EPSILON
            && lat <= self.lat2 + CONTAINS_EPSILON
            && lng >= self.lng1 - CONTAINS_EPSILON
            && lng <= self.lng2 + CONTAINS_EPSILON
    }

    /// Does `other` fit in this box, allowing one degree of slack?
    pub fn contains_all_of(&self, other: &BoundingBox) -> bool {
        other.lat1 >= self.lat1 - 1.0
            && other.lat2 <= self.lat2 + 1.0
            && other.lng1 >= self.lng1 - 1.0
            && other.lng2 <= self.lng2 + 1.0
    }

    pub fn extend_to_fit(&mut self, pt: Point) {
        self.lat1 = self.lat1.min(pt.lat);
        self.lat2 = self.lat2.max(pt.lat);
        self.lng1 = self.lng1.min(pt.lng);
        self.lng2 = self.lng2.max(pt.lng);
    }

    pub fn extend_to_fit_box(&mut self, other: &BoundingBox) {
        self.lat1 = self.lat1.min(other.lat1);
        self.lat2 = self.lat2.max(other.lat2);
        self.lng1 = self.lng1.min(other.lng1);
        self.lng2 = self.lng2.max(other.lng2);
    }

    /// Strict overlap: boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.lat1 >= other.lat2
            || self.lat2 <= other.lat1
            || self.lng1 >= other.lng2
            || self.lng2 <= other.lng1)
    }

    /// Closed overlap: touching edges count.
    pub fn touches(&self, other: &BoundingBox) -> bool {
        !(self.lat1 > other.lat2
            || self.lat2 < other.lat1
            || self.lng1 > other.lng2
            || self.lng2 < other.lng1)
    }

    /// Clamp this box in place to its overlap with `other`.
    pub fn intersect(&mut self, other: &BoundingBox) {
        self.lat1 = self.lat1.max(other.lat1);
        self.lat2 = self.lat2.min(other.lat2);
        self.lng1 = self.lng1.max(other.lng1);
        self.lng2 = self.lng2.min(other.lng2);
    }

    /// The overlap of the two boxes, if it has any area.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let mut overlap = *self;
        overlap.intersect(other);
        if overlap.is_empty() {
            None
        } else {
            Some(overlap)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lat1 >= self.lat2 || self.lng1 >= self.lng2
    }

    /// Grow every side by `scale` times the box's own size.
    pub fn enlarge(&mut self, scale: f64) {
        let lat_margin = scale * (self.lat2 - self.lat1);
        let lng_margin = scale * (self.lng2 - self.lng1);
        self.lat1 -= lat_margin;
        self.lat2 += lat_margin;
        self.lng1 -= lng_margin;
        self.lng2 += lng_margin;
    }

    /// Grow every side by `metres`. The longitude margin is scaled by the
    /// cosine of the southern edge.
    pub fn enlarge_by_metres(&mut self, metres: f64) {
        let lat_margin = metres / METRES_PER_DEGREE_LAT;
        let lng_margin = metres / (METRES_PER_DEGREE_LAT * self.lat1.to_radians().cos().abs());
        self.lat1 -= lat_margin;
        self.lat2 += lat_margin;
        self.lng1 -= lng_margin;
        self.lng2 += lng_margin;
    }

    /// A copy padded by `metres`, moving the south-west corner west then
    /// south and the north-east corner east then north. Corners already at a
    /// pole or on the date line simply stay put.
    pub fn pad(&self, metres: f64) -> BoundingBox {
        let sw = Point::new(self.lat1, self.lng1)
            .move_towards(&Point::new(self.lat1, -180.0), metres)
            .move_towards(&Point::new(-90.0, 0.0), metres);
        let ne = Point::new(self.lat2, self.lng2)
            .move_towards(&Point::new(self.lat2, 180.0), metres)
            .move_towards(&Point::new(90.0, 0.0), metres);
        BoundingBox::new(sw.lat, ne.lat, sw.lng, ne.lng)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.lat2 - self.lat1) / 2.0 + self.lat1,
            (self.lng2 - self.lng1) / 2.0 + self.lng1,
        )
    }

    /// North-south extent in metres.
    pub fn height(&self) -> f64 {
        (self.lat2 - self.lat1) * METRES_PER_DEGREE_LAT
    }

    /// Planar area in square degrees.
    pub fn area(&self) -> f64 {
        (self.lat2 - self.lat1).max(0.0) * (self.lng2 - self.lng1).max(0.0)
    }

    /// Lower and upper edge along `axis`.
    pub fn range(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::Lat => (self.lat1, self.lat2),
            Axis::Lng => (self.lng1, self.lng2),
        }
    }

    /// Cut the box in two at `pivot` along `axis`, lower half first.
    pub fn split(&self, axis: Axis, pivot: f64) -> (BoundingBox, BoundingBox) {
        match axis {
            Axis::Lat => (
                BoundingBox::new(self.lat1, pivot, self.lng1, self.lng2),
                BoundingBox::new(pivot, self.lat2, self.lng1, self.lng2),
            ),
            Axis::Lng => (
                BoundingBox::new(self.lat1, self.lat2, self.lng1, pivot),
                BoundingBox::new(self.lat1, self.lat2, pivot, self.lng2),
            ),
        }
    }

    /// Corners in clockwise order starting south-west.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.lat1, self.lng1),
            Point::new(self.lat2, self.lng1),
            Point::new(self.lat2, self.lng2),
            Point::new(self.lat1, self.lng2),
        ]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.4},{:.4}) to ({:.4},{:.4})",
            self.lat1, self.lng1, self.lat2, self.lng2
        )
    }
}

//! Latitude/longitude point with equirectangular distance helpers.

use serde::{Deserialize, Serialize};

/// Mean earth radius used by every distance calculation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const RADIANS: f64 = std::f64::consts::PI / 180.0;

/// A location in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    /// Sentinel for coordinates that could not be resolved.
    pub const UNDEFINED: Point = Point {
        lat: f64::NAN,
        lng: f64::NAN,
    };

    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True for NaN or anything outside the valid lat/lng ranges.
    pub fn is_undefined(&self) -> bool {
        self.lat.is_nan()
            || self.lng.is_nan()
            || self.lat < -90.0
            || self.lat > 90.0
            || self.lng < -180.0
            || self.lng > 180.0
    }

    /// Equirectangular distance in metres. The longitude delta wraps so it
    /// never exceeds 180 degrees.
    pub fn distance_in_metres(&self, other: &Point) -> f64 {
        let mut lng_delta = (self.lng - other.lng).abs();
        if lng_delta > 180.0 {
            lng_delta = 360.0 - lng_delta;
        }
        let p1 = lng_delta * (0.5 * RADIANS * (self.lat + other.lat)).cos();
        let p2 = self.lat - other.lat;
        EARTH_RADIUS_M * RADIANS * (p1 * p1 + p2 * p2).sqrt()
    }

    /// Squared planar distance in degrees. Only meaningful for ordering.
    pub fn distance_in_degrees_squared(&self, other: &Point) -> f64 {
        let d_lat = self.lat - other.lat;
        let d_lng = self.lng - other.lng;
        d_lat * d_lat + d_lng * d_lng
    }

    /// Distance in metres from this point to the segment AB.
    pub fn distance_to_segment(&self, a: &Point, b: &Point) -> f64 {
        let scale = EARTH_RADIUS_M * RADIANS;
        let ax = (a.lng - self.lng) * (0.5 * RADIANS * (a.lat + self.lat)).cos();
        let ay = a.lat - self.lat;
        let bx = (b.lng - self.lng) * (0.5 * RADIANS * (b.lat + self.lat)).cos();
        let by = b.lat - self.lat;
        let nearest_end = || (ax * ax + ay * ay).min(bx * bx + by * by).sqrt() * scale;

        if ay == by {
            if (ax < 0.0 && bx < 0.0) || (ax > 0.0 && bx > 0.0) {
                return nearest_end();
            }
            if ax == bx {
                return (ax * ax + ay * ay).sqrt() * scale;
            }
        } else {
            // Foot of the perpendicular, projected onto x.
            let ix = ((by - ay) * (ax * by - ay * bx))
                / ((ax - bx) * (ax - bx) + (ay - by) * (ay - by));
            if (ix < ax && ix < bx) || (ix > ax && ix > bx) {
                return nearest_end();
            }
        }
        ((bx - ax) * ay - ax * (by - ay)).abs()
            / ((bx - ax) * (bx - ax) + (by - ay) * (by - ay)).sqrt()
            * scale
    }

    /// Distance in metres from this point to the infinite line through AB,
    /// negative when the point is on the left of AB.
    pub fn signed_distance_to_segment(&self, a: &Point, b: &Point) -> f64 {
        let ax = (a.lng - self.lng) * (0.5 * RADIANS * (a.lat + self.lat)).cos();
        let ay = a.lat - self.lat;
        let bx = (b.lng - self.lng) * (0.5 * RADIANS * (b.lat + self.lat)).cos();
        let by = b.lat - self.lat;
        let len = ((bx - ax) * (bx - ax) + (by - ay) * (by - ay)).sqrt();
        if len == 0.0 {
            return 0.0;
        }
        ((bx - ax) * ay - ax * (by - ay)) / len * EARTH_RADIUS_M * RADIANS
    }

    /// Returns this point moved `metres` towards `target` (away from it when
    /// negative). Linear in degrees, so inaccurate near the poles.
    ///
    /// Targets that are the same place (including two points on the same
    /// pole) leave the point where it is.
    pub fn move_towards(self, target: &Point, metres: f64) -> Point {
        let r = self.distance_in_metres(target);
        if r < 1e-6 {
            return self;
        }
        let scale = metres / r;
        Point {
            lat: self.lat + (target.lat - self.lat) * scale,
            lng: self.lng + (target.lng - self.lng) * scale,
        }
    }

    /// Coordinates equal after rounding to six decimals.
    pub fn equals_6_decimals(&self, other: &Point) -> bool {
        round6(self.lat) == round6(other.lat) && round6(self.lng) == round6(other.lng)
    }
}

fn round6(d: f64) -> i64 {
    (d * 1_000_000.0 + 0.5).floor() as i64
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5},{:.5})", self.lat, self.lng)
    }
}

impl From<Point> for geo_types::Coord<f64> {
    fn from(pt: Point) -> Self {
        geo_types::Coord {
            x: pt.lng,
            y: pt.lat,
        }
    }
}

impl From<geo_types::Coord<f64>> for Point {
    fn from(c: geo_types::Coord<f64>) -> Self {
        Point::new(c.y, c.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        let d = a.distance_in_metres(&b);
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_distance_wraps_date_line() {
        let a = Point::new(0.0, 179.5);
        let b = Point::new(0.0, -179.5);
        let d = a.distance_in_metres(&b);
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_distance_to_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 2.0);
        // perpendicular foot inside the segment
        let p = Point::new(1.0, 1.0);
        assert!((p.distance_to_segment(&a, &b) - 111_195.0).abs() < 50.0);
        // beyond the end: distance to the nearest endpoint
        let q = Point::new(0.0, 3.0);
        assert!((q.distance_to_segment(&a, &b) - 111_195.0).abs() < 50.0);
    }

    #[test]
    fn test_signed_distance_sides() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(2.0, 0.0);
        let east = Point::new(1.0, 1.0);
        let west = Point::new(1.0, -1.0);
        let d_east = east.signed_distance_to_segment(&a, &b);
        let d_west = west.signed_distance_to_segment(&a, &b);
        assert!(d_east * d_west < 0.0);
        assert!((d_east.abs() - d_west.abs()).abs() < 1.0);
    }

    #[test]
    fn test_move_towards() {
        let a = Point::new(0.0, 0.0);
        let target = Point::new(1.0, 0.0);
        let moved = a.move_towards(&target, 1000.0);
        assert!((a.distance_in_metres(&moved) - 1000.0).abs() < 1e-6);
        assert_eq!(a.move_towards(&a, 1000.0), a);
    }

    #[test]
    fn test_undefined() {
        assert!(Point::UNDEFINED.is_undefined());
        assert!(Point::new(91.0, 0.0).is_undefined());
        assert!(!Point::new(0.0, 0.0).is_undefined());
    }
}

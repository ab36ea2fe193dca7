//! Polygon ring engine.
//!
//! A [`Polygon`] is a single clockwise ring: the last point connects back to
//! the first and is never repeated. All calculations are planar in degrees
//! and ignore the curvature of the earth.

mod clip;
mod self_intersection;
mod simplify;

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// Horizontal bias applied to the ray-cast crossing test. Points this close
/// to the right of an edge resolve the same way on every platform.
const CONTAINS_BIAS: f64 = 0.0001;

/// Vertices closer than this (in degrees, per axis) are the same vertex.
const ROUNDING_MARGIN: f64 = 1e-10;

/// Where a point lies relative to the wedge formed by two consecutive edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wedge {
    Inside,
    Outside,
    AlongIncoming,
    AlongOutgoing,
}

/// A simple ring of points with a cached bounding box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
    bbox: BoundingBox,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        let mut polygon = Self {
            points,
            bbox: BoundingBox::empty(),
        };
        polygon.calc_bounding_box();
        polygon
    }

    /// The box as a clockwise ring.
    pub fn from_box(bbox: &BoundingBox) -> Self {
        Self::new(bbox.corners().to_vec())
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Fewer than three points do not enclose anything.
    pub fn is_empty(&self) -> bool {
        self.points.len() <= 2
    }

    pub fn calc_bounding_box(&mut self) {
        let mut bbox = BoundingBox::empty();
        for pt in &self.points {
            bbox.extend_to_fit(*pt);
        }
        self.bbox = bbox;
    }

    /// Even-odd ray casting after a bounding box shortcut.
    pub fn contains(&self, pt: Point) -> bool {
        ring_contains(&self.points, &self.bbox, pt.lat, pt.lng)
    }

    /// Remove consecutive duplicate points, including the wrap from the last
    /// point back to the first.
    pub fn clean_up(&mut self) {
        let Some(&last) = self.points.last() else {
            return;
        };
        let mut prev = last;
        self.points.retain(|pt| {
            if *pt == prev {
                false
            } else {
                prev = *pt;
                true
            }
        });
    }

    /// Inspects the turn at the southernmost vertex, which must be convex
    /// for a clockwise ring.
    pub fn is_clockwise(&self) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut min_lat = f64::MAX;
        let mut min_i = 0;
        for (i, pt) in self.points.iter().enumerate() {
            if pt.lat < min_lat {
                min_lat = pt.lat;
                min_i = i;
            }
        }

        // Walk back over any run of equally southern vertices.
        let mut prev = min_i as isize - 1;
        loop {
            if prev < 0 {
                prev = n as isize - 1;
            }
            if self.points[prev as usize].lat == min_lat {
                prev -= 1;
            } else {
                break;
            }
            if prev == min_i as isize {
                break;
            }
        }
        let min_i = if prev == n as isize - 1 {
            0
        } else {
            (prev + 1) as usize
        };

        let a = self.points[if min_i == 0 { n - 1 } else { min_i - 1 }];
        let b = self.points[min_i];
        let c = self.points[if min_i + 1 >= n { 0 } else { min_i + 1 }];
        which_side(&a, &b, &c) > 0
    }

    pub fn ensure_clockwise(&mut self) {
        if !self.is_clockwise() {
            self.points.reverse();
        }
    }

    /// The same ring traversed the other way.
    pub fn reversed(&self) -> Polygon {
        let mut points = self.points.clone();
        points.reverse();
        Polygon {
            points,
            bbox: self.bbox,
        }
    }

    /// The same ring starting `k` vertices later.
    pub fn rotated(&self, k: usize) -> Polygon {
        let mut points = self.points.clone();
        if !points.is_empty() {
            let k = k % points.len();
            points.rotate_left(k);
        }
        Polygon {
            points,
            bbox: self.bbox,
        }
    }

    /// Same points in the same cyclic order, whatever the start vertex.
    pub fn same_ring(&self, other: &Polygon) -> bool {
        let n = self.points.len();
        if n != other.points.len() {
            return false;
        }
        if n == 0 {
            return true;
        }
        (0..n).any(|offset| (0..n).all(|i| self.points[i] == other.points[(i + offset) % n]))
    }

    /// Signed planar area in square degrees, positive for clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            sum += (q.lng - p.lng) * (q.lat + p.lat);
        }
        sum / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn centroid(&self) -> Point {
        self.bbox.center()
    }

    pub fn wholly_inside(&self, bbox: &BoundingBox) -> bool {
        self.points.iter().all(|pt| bbox.contains(*pt))
    }

    /// Is any part of this polygon inside the box?
    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        if !bbox.intersects(&self.bbox) {
            return false;
        }
        // Either the box is inside the polygon, the polygon is inside the
        // box, or an edge of the box crosses the ring.
        if self.contains(Point::new(bbox.lat1, bbox.lng1)) {
            return true;
        }
        if bbox.contains(self.points[0]) {
            return true;
        }
        let c = bbox.corners();
        (0..4).any(|i| self.segment_intersects(&c[i], &c[(i + 1) % 4]))
    }

    /// Does any edge of this ring cross the segment AB?
    pub fn segment_intersects(&self, a: &Point, b: &Point) -> bool {
        self.edges()
            .any(|(p, q)| segments_intersect(p, q, a, b))
    }

    /// Edges as (from, to) pairs, closing edge included.
    pub fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (&self.points[i], &self.points[(i + 1) % n]))
    }

    /// Push every vertex `metres` away from the box centre.
    pub fn enlarge(&mut self, metres: f64) {
        let centre = self.bbox.center();
        for pt in &mut self.points {
            *pt = pt.move_towards(&centre, -metres);
        }
        self.calc_bounding_box();
    }

    /// A point strictly inside the ring, found by nudging a vertex into the
    /// wedge of its two edges.
    pub fn internal_point(&self) -> Option<Point> {
        let n = self.points.len();
        if n < 3 {
            return None;
        }
        for fraction in [0.05, 0.005] {
            for i in 0..n {
                let a = self.points[if i == 0 { n - 1 } else { i - 1 }];
                let b = self.points[i];
                let c = self.points[(i + 1) % n];
                let sample = Point::new(
                    b.lat + fraction * (a.lat - b.lat) + fraction * (c.lat - b.lat),
                    b.lng + fraction * (a.lng - b.lng) + fraction * (c.lng - b.lng),
                );
                if self.contains(sample) {
                    return Some(sample);
                }
            }
        }
        None
    }
}

impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.same_ring(other)
    }
}

impl From<&Polygon> for geo::Polygon<f64> {
    fn from(polygon: &Polygon) -> Self {
        let mut coords: Vec<geo_types::Coord<f64>> =
            polygon.points.iter().map(|pt| (*pt).into()).collect();
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
        geo::Polygon::new(geo::LineString::new(coords), vec![])
    }
}

/// Even-odd ray casting over a flat ring.
fn ring_contains(points: &[Point], bbox: &BoundingBox, lat: f64, lng: f64) -> bool {
    if points.is_empty() || !bbox.contains_lat_lng(lat, lng) {
        return false;
    }
    let mut inside = false;
    let last = points[points.len() - 1];
    let (mut xj, mut yj) = (last.lng, last.lat);
    for pt in points {
        let (xi, yi) = (pt.lng, pt.lat);
        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi - CONTAINS_BIAS
        {
            inside = !inside;
        }
        xj = xi;
        yj = yi;
    }
    inside
}

/// Which side of AB is `pt` on? Rings run clockwise, so the right-hand side
/// (1) is inside, the left (-1) outside, and 0 is on the line.
pub fn which_side(a: &Point, b: &Point, pt: &Point) -> i8 {
    let dx = a.lng - b.lng;
    let dy = a.lat - b.lat;
    let ax = a.lng - pt.lng;
    let ay = a.lat - pt.lat;
    let c = dx * ay - ax * dy;
    if c == 0.0 {
        0
    } else if c < 0.0 {
        1
    } else {
        -1
    }
}

/// Classify `pt` against the wedge ABC formed by the incoming edge AB and
/// the outgoing edge BC of a clockwise ring.
pub fn which_side_of_wedge(a: &Point, b: &Point, c: &Point, pt: &Point) -> Wedge {
    let bc = which_side(b, c, pt);
    let ab = which_side(a, b, pt);
    if bc == ab {
        if bc != 0 {
            return if bc == 1 { Wedge::Inside } else { Wedge::Outside };
        }
        // Collinear with both edges.
        let along = |incoming: bool| {
            if incoming {
                Wedge::AlongIncoming
            } else {
                Wedge::AlongOutgoing
            }
        };
        return if (a.lat - c.lat).abs() > (a.lng - c.lng).abs() {
            if a.lat > c.lat {
                along(pt.lat > b.lat)
            } else {
                along(pt.lat < b.lat)
            }
        } else if a.lng > c.lng {
            along(pt.lng > b.lng)
        } else {
            along(pt.lng < b.lng)
        };
    }
    if which_side(a, b, c) > 0 {
        // Convex corner
        if ab < 0 || bc < 0 {
            Wedge::Outside
        } else if bc > 0 {
            Wedge::AlongIncoming
        } else {
            Wedge::AlongOutgoing
        }
    } else if ab > 0 || bc > 0 {
        Wedge::Inside
    } else if bc < 0 {
        Wedge::AlongIncoming
    } else {
        Wedge::AlongOutgoing
    }
}

/// Does AB intersect CD? Endpoints count.
pub fn segments_intersect(a: &Point, b: &Point, c: &Point, d: &Point) -> bool {
    let s1_x = b.lng - a.lng;
    let s1_y = b.lat - a.lat;
    let s2_x = d.lng - c.lng;
    let s2_y = d.lat - c.lat;
    let denom = -s2_x * s1_y + s1_x * s2_y;
    let s = (-s1_y * (a.lng - c.lng) + s1_x * (a.lat - c.lat)) / denom;
    let t = (s2_x * (a.lat - c.lat) - s2_y * (a.lng - c.lng)) / denom;
    (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t)
}

/// The point where AB crosses CD, or `None` when they miss or are parallel.
/// Exact endpoint hits return the endpoint itself.
pub fn segment_intersection_point(a: &Point, b: &Point, c: &Point, d: &Point) -> Option<Point> {
    let ba_x = b.lng - a.lng;
    let ba_y = b.lat - a.lat;
    let dc_x = d.lng - c.lng;
    let dc_y = d.lat - c.lat;

    let mut denom = ba_x * dc_y - dc_x * ba_y;
    if denom == 0.0 {
        return None;
    }
    let ac_x = a.lng - c.lng;
    let ac_y = a.lat - c.lat;
    let mut s_numer = ba_x * ac_y - ba_y * ac_x;
    let mut t_numer = dc_x * ac_y - dc_y * ac_x;
    if denom < 0.0 {
        denom = -denom;
        s_numer = -s_numer;
        t_numer = -t_numer;
    }
    if s_numer < 0.0 || t_numer < 0.0 || s_numer > denom || t_numer > denom {
        return None;
    }
    if s_numer == 0.0 {
        return Some(*c);
    }
    if t_numer == 0.0 {
        return Some(*a);
    }
    let t = t_numer / denom;
    Some(Point::new(a.lat + t * ba_y, a.lng + t * ba_x))
}

pub(crate) fn near(a: &Point, b: &Point) -> bool {
    (a.lng - b.lng).abs() <= ROUNDING_MARGIN && (a.lat - b.lat).abs() <= ROUNDING_MARGIN
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn ring(coords: &[(f64, f64)]) -> Polygon {
        Polygon::new(coords.iter().map(|&(lat, lng)| Point::new(lat, lng)).collect())
    }

    pub(crate) fn square(lat1: f64, lat2: f64, lng1: f64, lng2: f64) -> Polygon {
        Polygon::from_box(&BoundingBox::new(lat1, lat2, lng1, lng2))
    }

    fn l_shape() -> Polygon {
        // Clockwise L: tall left arm, short right foot.
        ring(&[
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ])
    }

    #[test]
    fn test_box_ring_is_clockwise() {
        let sq = square(0.0, 1.0, 0.0, 1.0);
        assert!(sq.is_clockwise());
        assert!(!sq.reversed().is_clockwise());
    }

    #[test]
    fn test_reversal_flips_orientation() {
        let l = l_shape();
        assert!(l.is_clockwise());
        assert!(!l.reversed().is_clockwise());
        for k in 0..l.len() {
            assert!(l.rotated(k).is_clockwise(), "rotation {}", k);
            assert!(!l.rotated(k).reversed().is_clockwise(), "rotation {}", k);
        }
    }

    #[test]
    fn test_contains_l_shape() {
        let l = l_shape();
        assert!(l.contains(Point::new(3.0, 0.5)));
        assert!(l.contains(Point::new(0.5, 2.5)));
        assert!(!l.contains(Point::new(3.0, 2.0)));
        assert!(!l.contains(Point::new(-1.0, 0.5)));
    }

    #[test]
    fn test_contains_invariant_under_rotation() {
        let l = l_shape();
        let probes = [
            Point::new(3.0, 0.5),
            Point::new(0.5, 2.5),
            Point::new(3.0, 2.0),
            Point::new(2.0, 0.9),
            Point::new(0.99, 2.0),
            Point::new(5.0, 5.0),
        ];
        for k in 0..l.len() {
            let r = l.rotated(k);
            for p in probes {
                assert_eq!(l.contains(p), r.contains(p), "rotation {} at {}", k, p);
            }
        }
    }

    #[test]
    fn test_clean_up_wraps() {
        let mut p = ring(&[
            (0.0, 0.0),
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (1.0, 1.0),
            (0.0, 0.0),
        ]);
        p.clean_up();
        // The leading duplicate of the closing point goes, the tail stays.
        assert_eq!(
            p.points(),
            &[Point::new(1.0, 0.0), Point::new(1.0, 1.0), Point::new(0.0, 0.0)]
        );
        assert_eq!(p, ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]));
    }

    #[test]
    fn test_clean_up_keeps_order() {
        let mut p = ring(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 1.0),
        ]);
        p.clean_up();
        assert_eq!(
            p.points(),
            &[
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0)
            ]
        );
    }

    #[test]
    fn test_same_ring() {
        let a = square(0.0, 1.0, 0.0, 1.0);
        assert_eq!(a, a.rotated(2));
        assert_ne!(a, a.reversed());
    }

    #[test]
    fn test_signed_area() {
        let a = square(0.0, 2.0, 0.0, 3.0);
        assert_eq!(a.signed_area(), 6.0);
        assert_eq!(a.reversed().signed_area(), -6.0);
    }

    #[test]
    fn test_which_side_of_wedge() {
        // Convex corner of a clockwise square at its north-east vertex.
        let a = Point::new(1.0, 0.0);
        let b = Point::new(1.0, 1.0);
        let c = Point::new(0.0, 1.0);
        assert_eq!(which_side_of_wedge(&a, &b, &c, &Point::new(0.5, 0.5)), Wedge::Inside);
        assert_eq!(which_side_of_wedge(&a, &b, &c, &Point::new(2.0, 2.0)), Wedge::Outside);
        assert_eq!(
            which_side_of_wedge(&a, &b, &c, &Point::new(1.0, 0.5)),
            Wedge::AlongIncoming
        );
        assert_eq!(
            which_side_of_wedge(&a, &b, &c, &Point::new(0.5, 1.0)),
            Wedge::AlongOutgoing
        );
    }

    #[test]
    fn test_segment_intersection_point() {
        let x = segment_intersection_point(
            &Point::new(0.0, 0.0),
            &Point::new(2.0, 2.0),
            &Point::new(0.0, 2.0),
            &Point::new(2.0, 0.0),
        );
        assert_eq!(x, Some(Point::new(1.0, 1.0)));
        let parallel = segment_intersection_point(
            &Point::new(0.0, 0.0),
            &Point::new(1.0, 0.0),
            &Point::new(0.0, 1.0),
            &Point::new(1.0, 1.0),
        );
        assert_eq!(parallel, None);
    }

    #[test]
    fn test_intersects_box() {
        let l = l_shape();
        assert!(l.intersects_box(&BoundingBox::new(2.0, 3.0, 0.5, 2.0)));
        assert!(!l.intersects_box(&BoundingBox::new(2.0, 3.0, 1.5, 2.5)));
        assert!(!l.intersects_box(&BoundingBox::new(10.0, 11.0, 10.0, 11.0)));
    }

    #[test]
    fn test_internal_point_of_concave_ring() {
        let l = l_shape();
        let inside = l.internal_point().expect("internal point");
        assert!(l.contains(inside));
    }
}

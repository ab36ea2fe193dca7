//! Ramer-Douglas-Peucker sub-sampling that keeps the bounding box intact.

use tracing::debug;

use super::Polygon;
use crate::geometry::{BoundingBox, Point};

impl Polygon {
    /// Drop vertices that deviate less than `tolerance_m` metres from the
    /// simplified outline.
    ///
    /// The ring is cut at its four extreme vertices (north, east, south, west)
    /// and each arc is simplified on its own, so the extremes survive and the
    /// bounding box does not change. Vertices lying on the box are always
    /// kept.
    pub fn simplify(&mut self, tolerance_m: f64) {
        let n = self.points.len();
        if n < 4 {
            return;
        }
        let bbox = self.bbox;
        let (mut top, mut right, mut bottom, mut left) = (0, 0, 0, 0);
        for (i, pt) in self.points.iter().enumerate() {
            if pt.lat == bbox.lat2 {
                top = i;
            }
            if pt.lat == bbox.lat1 {
                bottom = i;
            }
            if pt.lng == bbox.lng1 {
                left = i;
            }
            if pt.lng == bbox.lng2 {
                right = i;
            }
        }

        // The four arcs only tile the ring when the extremes come in
        // clockwise order.
        let arc = |from: usize, to: usize| (to + n - from) % n;
        let covered = arc(top, right) + arc(right, bottom) + arc(bottom, left) + arc(left, top);
        if covered != n {
            debug!("simplify: extremes out of order, keeping {} points", n);
            return;
        }

        let source = std::mem::take(&mut self.points);
        let mut out = Vec::with_capacity(n);
        for (from, to) in [(top, right), (right, bottom), (bottom, left), (left, top)] {
            douglas_peucker(&source, from, to, tolerance_m, &bbox, &mut out);
        }
        self.points = out;
        self.clean_up();
        self.calc_bounding_box();
    }
}

/// Emit `p[i1]` plus whatever intermediate points are needed, but not
/// `p[i2]`. Indices wrap around the ring.
fn douglas_peucker(
    p: &[Point],
    i1: usize,
    i2: usize,
    epsilon: f64,
    bbox: &BoundingBox,
    out: &mut Vec<Point>,
) {
    if i1 == i2 {
        return;
    }
    let n = p.len();
    let (a, b) = (p[i1], p[i2]);
    let mut dmax = 0.0;
    let mut index = i1;
    let mut i = i1;
    loop {
        i = (i + 1) % n;
        if i == i2 {
            break;
        }
        let d = p[i].distance_to_segment(&a, &b);
        if d > dmax {
            index = i;
            dmax = d;
        }
    }

    if dmax > epsilon {
        douglas_peucker(p, i1, index, epsilon, bbox, out);
        douglas_peucker(p, index, i2, epsilon, bbox, out);
    } else {
        out.push(a);
        // Points touching the box are load-bearing for its extent.
        let mut i = (i1 + 1) % n;
        while i != i2 {
            if on_bounding_box(&p[i], bbox) {
                out.push(p[i]);
            }
            i = (i + 1) % n;
        }
    }
}

fn on_bounding_box(pt: &Point, bbox: &BoundingBox) -> bool {
    pt.lat == bbox.lat1 || pt.lat == bbox.lat2 || pt.lng == bbox.lng1 || pt.lng == bbox.lng2
}

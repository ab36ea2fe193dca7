//! Detecting and splitting self-intersecting rings.

use tracing::debug;

use super::{segment_intersection_point, Polygon};
use crate::error::PolygonError;
use crate::geometry::{BoundingBox, Point};

/// A crossing between the edges starting at `i1` and `i2`.
#[derive(Debug, Clone, Copy)]
struct Crossing {
    i1: usize,
    i2: usize,
    at: Point,
}

impl Polygon {
    pub fn has_self_intersection(&self) -> bool {
        self.find_self_intersection().is_some()
    }

    /// Split the ring at every self-crossing until each piece is simple.
    ///
    /// Pieces with two points or fewer are discarded and the survivors are
    /// oriented clockwise. Which decomposition comes out depends on the order
    /// the sweep meets the crossings in.
    pub fn separate_self_intersecting(&self) -> Result<Vec<Polygon>, PolygonError> {
        self.separate_self_intersecting_within(4 * self.points.len() + 16)
    }

    /// As [`Polygon::separate_self_intersecting`], giving up once more than
    /// `budget` rings have been examined.
    pub fn separate_self_intersecting_within(
        &self,
        budget: usize,
    ) -> Result<Vec<Polygon>, PolygonError> {
        let mut pending = vec![self.clone()];
        let mut done = Vec::new();
        let mut examined = 0;

        while let Some(polygon) = pending.pop() {
            examined += 1;
            if examined > budget {
                return Err(PolygonError::SplitDidNotConverge { pieces: examined });
            }
            match polygon.find_self_intersection() {
                None => {
                    if polygon.points.len() > 2 {
                        let mut polygon = polygon;
                        polygon.ensure_clockwise();
                        done.push(polygon);
                    }
                }
                Some(x) => {
                    debug!("splitting {}-point ring at {}", polygon.points.len(), x.at);
                    let first = polygon.sub_ring(x.i1, x.i2, x.at);
                    let second = polygon.sub_ring(x.i2, x.i1, x.at);
                    pending.push(second);
                    pending.push(first);
                }
            }
        }
        Ok(done)
    }

    /// The ring that starts at `at`, runs through the vertices after edge
    /// `i1` up to and including the start of edge `i2`, and closes back to
    /// `at`.
    fn sub_ring(&self, i1: usize, i2: usize, at: Point) -> Polygon {
        let n = self.points.len();
        let mut points = vec![at];
        let mut i = (i1 + 1) % n;
        loop {
            let pt = self.points[i];
            if !points
                .last()
                .is_some_and(|last: &Point| last.equals_6_decimals(&pt))
            {
                points.push(pt);
            }
            if i == i2 {
                break;
            }
            i = (i + 1) % n;
        }
        let mut polygon = Polygon::new(points);
        if polygon.points.len() > 1 && polygon.points[polygon.points.len() - 1].equals_6_decimals(&at) {
            polygon.points.pop();
        }
        polygon.calc_bounding_box();
        polygon
    }

    /// Plane sweep over the edges in longitude order. Edges enter the active
    /// "loom" at their western end and leave at their eastern end; each new
    /// edge is tested against everything still in the loom.
    fn find_self_intersection(&self) -> Option<Crossing> {
        let n = self.points.len();
        if n < 4 {
            return None;
        }
        let boxes: Vec<BoundingBox> = (0..n)
            .map(|i| {
                let mut b = BoundingBox::empty();
                b.extend_to_fit(self.points[i]);
                b.extend_to_fit(self.points[(i + 1) % n]);
                b
            })
            .collect();

        let mut entering: Vec<usize> = (0..n).collect();
        entering.sort_by(|&a, &b| boxes[a].lng1.total_cmp(&boxes[b].lng1));
        let mut leaving: Vec<usize> = (0..n).collect();
        leaving.sort_by(|&a, &b| boxes[a].lng2.total_cmp(&boxes[b].lng2));

        let mut loom: Vec<usize> = Vec::new();
        let (mut e, mut l) = (0, 0);
        while l < n {
            if e < n && boxes[entering[e]].lng1 <= boxes[leaving[l]].lng2 {
                let new_edge = entering[e];
                e += 1;
                for &old in &loom {
                    if !boxes[old].touches(&boxes[new_edge]) || adjacent(old, new_edge, n) {
                        continue;
                    }
                    let a = self.points[old];
                    let b = self.points[(old + 1) % n];
                    let c = self.points[new_edge];
                    let d = self.points[(new_edge + 1) % n];
                    if let Some(at) = segment_intersection_point(&a, &b, &c, &d) {
                        return Some(Crossing {
                            i1: old,
                            i2: new_edge,
                            at,
                        });
                    }
                }
                loom.push(new_edge);
            } else {
                let gone = leaving[l];
                l += 1;
                loom.retain(|&i| i != gone);
            }
        }
        None
    }
}

/// Edges that share an endpoint never count as crossing.
fn adjacent(i: usize, j: usize, n: usize) -> bool {
    i == j || (i + 1) % n == j || (j + 1) % n == i
}

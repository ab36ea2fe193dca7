//! Polygon clipping by ring-topology walking.
//!
//! Both rings are loaded into one arena of vertices addressed by index. Each
//! vertex carries a forward link per ring; crossings are spliced into both
//! rings, so a crossing vertex has two onward links and the walk can switch
//! rings there.

use tracing::trace;

use super::{near, segment_intersection_point, which_side_of_wedge, Polygon, Wedge};
use crate::error::PolygonError;
use crate::geometry::{BoundingBox, Point};

/// Three points closer than this to a straight line collapse into two.
const COLINEAR_METRES: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ring {
    A = 0,
    B = 1,
}

impl Ring {
    fn other(self) -> Ring {
        match self {
            Ring::A => Ring::B,
            Ring::B => Ring::A,
        }
    }

    fn name(self) -> char {
        match self {
            Ring::A => 'A',
            Ring::B => 'B',
        }
    }
}

#[derive(Debug, Clone)]
struct Vertex {
    pt: Point,
    next: [Option<usize>; 2],
    /// Where each ring's outgoing edge heads relative to the other ring.
    goes: [Wedge; 2],
}

#[derive(Debug)]
struct Edge {
    src: usize,
    dst: usize,
    hits: Vec<usize>,
}

/// Arena holding both rings while they are being clipped.
#[derive(Debug)]
struct ClipArena {
    vertices: Vec<Vertex>,
    /// Union-find parents; coincident vertices share one representative.
    parent: Vec<usize>,
    edges: [Vec<Edge>; 2],
}

impl ClipArena {
    fn new(a: &Polygon, b: &Polygon) -> Self {
        let mut arena = ClipArena {
            vertices: Vec::with_capacity(a.len() + b.len()),
            parent: Vec::with_capacity(a.len() + b.len()),
            edges: [Vec::new(), Vec::new()],
        };
        arena.load_ring(a, Ring::A);
        arena.load_ring(b, Ring::B);
        arena
    }

    fn add_vertex(&mut self, pt: Point) -> usize {
        let id = self.vertices.len();
        self.vertices.push(Vertex {
            pt,
            next: [None, None],
            goes: [Wedge::Outside, Wedge::Outside],
        });
        self.parent.push(id);
        id
    }

    fn load_ring(&mut self, polygon: &Polygon, ring: Ring) {
        let mut ids: Vec<usize> = Vec::with_capacity(polygon.len());
        for pt in polygon.points() {
            // Repeated points would make zero-length edges.
            if ids.last().is_some_and(|&id| self.vertices[id].pt == *pt) {
                continue;
            }
            ids.push(self.add_vertex(*pt));
        }
        if ids.len() > 1 && self.vertices[ids[0]].pt == self.vertices[ids[ids.len() - 1]].pt {
            ids.pop();
        }
        let n = ids.len();
        self.edges[ring as usize] = (0..n)
            .map(|i| Edge {
                src: ids[i],
                dst: ids[(i + 1) % n],
                hits: Vec::new(),
            })
            .collect();
    }

    fn find(&mut self, mut id: usize) -> usize {
        while self.parent[id] != id {
            self.parent[id] = self.parent[self.parent[id]];
            id = self.parent[id];
        }
        id
    }

    fn union(&mut self, keep: usize, merge: usize) {
        let keep = self.find(keep);
        let merge = self.find(merge);
        if keep != merge {
            self.parent[merge] = keep;
        }
    }

    fn pt(&self, id: usize) -> Point {
        self.vertices[id].pt
    }

    /// Splice every crossing between the two rings into both edge lists,
    /// snapping onto existing vertices within the rounding margin.
    fn find_crossings(&mut self) {
        let mut order_b: Vec<usize> = (0..self.edges[1].len()).collect();
        let min_lat = |arena: &ClipArena, e: &Edge| arena.pt(e.src).lat.min(arena.pt(e.dst).lat);
        order_b.sort_by(|&x, &y| {
            let ex = &self.edges[1][x];
            let ey = &self.edges[1][y];
            min_lat(self, ex)
                .total_cmp(&min_lat(self, ey))
                .then(self.pt(ex.src).lng.total_cmp(&self.pt(ey.src).lng))
        });

        for ia in 0..self.edges[0].len() {
            let (a_src, a_dst) = (self.edges[0][ia].src, self.edges[0][ia].dst);
            let (pa, pb) = (self.pt(a_src), self.pt(a_dst));
            let bbox = BoundingBox::new(pa.lat, pb.lat, pa.lng, pb.lng);
            for &ib in &order_b {
                let (b_src, b_dst) = (self.edges[1][ib].src, self.edges[1][ib].dst);
                let (pc, pd) = (self.pt(b_src), self.pt(b_dst));
                if pc.lat.min(pd.lat) > bbox.lat2 {
                    break;
                }
                let seg_box = BoundingBox::new(pc.lat, pd.lat, pc.lng, pd.lng);
                if !bbox.touches(&seg_box) {
                    continue;
                }
                let Some(x) = segment_intersection_point(&pa, &pb, &pc, &pd) else {
                    continue;
                };

                let on_a = [a_src, a_dst].into_iter().find(|&v| near(&x, &self.pt(v)));
                let on_b = [b_src, b_dst].into_iter().find(|&v| near(&x, &self.pt(v)));
                let id = match (on_a, on_b) {
                    (Some(va), Some(vb)) => {
                        self.union(va, vb);
                        va
                    }
                    (Some(va), None) => va,
                    (None, Some(vb)) => vb,
                    (None, None) => self.add_vertex(x),
                };
                self.edges[0][ia].hits.push(id);
                self.edges[1][ib].hits.push(id);
            }
        }
    }

    /// Order every edge's crossings by distance from its start, merge near
    /// duplicates, then link consecutive vertices along each ring.
    fn sequence(&mut self) {
        let mut sequences: [Vec<Vec<usize>>; 2] = [Vec::new(), Vec::new()];
        for ring in [Ring::A, Ring::B] {
            let r = ring as usize;
            for ie in 0..self.edges[r].len() {
                let (src, dst) = (self.edges[r][ie].src, self.edges[r][ie].dst);
                let origin = self.pt(src);
                let mut hits = std::mem::take(&mut self.edges[r][ie].hits);
                hits.sort_by(|&x, &y| {
                    origin
                        .distance_in_degrees_squared(&self.pt(x))
                        .total_cmp(&origin.distance_in_degrees_squared(&self.pt(y)))
                });

                let mut seq = vec![src];
                for hit in hits {
                    let prev = seq[seq.len() - 1];
                    if near(&self.pt(hit), &self.pt(prev)) {
                        self.union(prev, hit);
                    } else {
                        seq.push(hit);
                    }
                }
                let last = seq[seq.len() - 1];
                if last != src && near(&self.pt(last), &self.pt(dst)) {
                    self.union(dst, last);
                    let end = seq.len() - 1;
                    seq[end] = dst;
                } else {
                    seq.push(dst);
                }
                sequences[r].push(seq);
            }
        }

        // Links go in only after every merge is known, so they always point
        // at representatives.
        for ring in [Ring::A, Ring::B] {
            let r = ring as usize;
            for seq in std::mem::take(&mut sequences[r]) {
                for pair in seq.windows(2) {
                    let from = self.find(pair[0]);
                    let to = self.find(pair[1]);
                    if from != to {
                        self.vertices[from].next[r] = Some(to);
                    }
                }
            }
        }
    }

    /// The ring's vertices in order, starting from its first edge.
    fn ring_order(&mut self, ring: Ring) -> Result<Vec<usize>, PolygonError> {
        let r = ring as usize;
        let Some(first) = self.edges[r].first().map(|e| e.src) else {
            return Err(PolygonError::BrokenRing { ring: ring.name() });
        };
        let root = self.find(first);
        let limit = self.vertices.len() + 1;
        let mut order = vec![root];
        let mut at = root;
        loop {
            let Some(next) = self.vertices[at].next[r] else {
                return Err(PolygonError::BrokenRing { ring: ring.name() });
            };
            if next == root {
                break;
            }
            order.push(next);
            if order.len() > limit {
                return Err(PolygonError::BrokenRing { ring: ring.name() });
            }
            at = next;
        }
        if order.len() < 3 {
            return Err(PolygonError::BrokenRing { ring: ring.name() });
        }
        Ok(order)
    }

    /// Decide, at every vertex of `ring`, which way the other ring's outgoing
    /// edge heads relative to this ring's wedge.
    fn classify(&mut self, ring: Ring, order: &[usize]) {
        let (r, o) = (ring as usize, ring.other() as usize);
        let m = order.len();
        for k in 0..m {
            let prev = order[(k + m - 1) % m];
            let x = order[k];
            let next = order[(k + 1) % m];
            match self.vertices[x].next[o] {
                None => {
                    self.vertices[x].goes[o] = Wedge::Outside;
                    self.vertices[x].goes[r] = Wedge::Inside;
                }
                Some(other_next) => {
                    self.vertices[x].goes[o] = if other_next == next {
                        Wedge::AlongOutgoing
                    } else {
                        which_side_of_wedge(
                            &self.pt(prev),
                            &self.pt(x),
                            &self.pt(next),
                            &self.pt(other_next),
                        )
                    };
                }
            }
        }
    }

    fn find_start(&self, order_a: &[usize]) -> Option<usize> {
        order_a.iter().copied().find(|&x| {
            let v = &self.vertices[x];
            v.next[0].is_some()
                && v.next[1].is_some()
                && (v.goes[0] == Wedge::Inside || v.goes[1] == Wedge::Inside)
        })
    }

    /// Walk from `start` back to itself, switching rings at transition
    /// vertices, and return the ring traced out.
    fn walk(&mut self, start: usize) -> Result<Vec<Point>, PolygonError> {
        let limit = 2 * self.vertices.len() + 4;
        let mut out: Vec<Point> = Vec::new();
        let mut following = Ring::A;
        let mut x = start;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > limit {
                return Err(PolygonError::WalkDidNotClose { steps });
            }
            let here = self.pt(x);
            push_collapsing(&mut out, here);

            let (a_goes, b_goes) = (self.vertices[x].goes[0], self.vertices[x].goes[1]);
            match (a_goes, b_goes) {
                (Wedge::Inside, Wedge::Outside | Wedge::AlongIncoming) => following = Ring::A,
                // Both rings head inward: leave as two rings rather than one
                // self-touching ring.
                (Wedge::Inside, Wedge::Inside) => following = following.other(),
                (Wedge::Outside | Wedge::AlongIncoming, Wedge::Inside) => following = Ring::B,
                (Wedge::AlongOutgoing, Wedge::AlongOutgoing) => {}
                (a, b) => return Err(PolygonError::ImpossibleWedge { a, b, at: here }),
            }
            // Never use an edge twice.
            self.vertices[x].goes[following as usize] = Wedge::Outside;

            let Some(next) = self.vertices[x].next[following as usize] else {
                return Err(PolygonError::DeadEnd {
                    ring: following.name(),
                });
            };
            x = next;
            if x == start {
                break;
            }
        }
        trace!("walk closed after {} steps with {} points", steps, out.len());
        Ok(out)
    }
}

/// Append `pt`, dropping spikes that double back and merging runs of
/// nearly colinear points.
fn push_collapsing(out: &mut Vec<Point>, pt: Point) {
    let len = out.len();
    if len >= 2 && near(&pt, &out[len - 2]) {
        out.pop();
    } else if len >= 2 && out[len - 1].signed_distance_to_segment(&out[len - 2], &pt).abs() < COLINEAR_METRES {
        out[len - 1] = pt;
    } else {
        out.push(pt);
    }
}

impl Polygon {
    /// The parts of this polygon that lie inside `other`.
    ///
    /// Both rings must be simple and clockwise. Returns one polygon per
    /// connected piece of the overlap, or nothing when they do not overlap.
    pub fn intersection(&self, other: &Polygon) -> Result<Vec<Polygon>, PolygonError> {
        if self.len() < 3 {
            return Err(PolygonError::Degenerate { points: self.len() });
        }
        if other.len() < 3 {
            return Err(PolygonError::Degenerate {
                points: other.len(),
            });
        }

        let mut arena = ClipArena::new(self, other);
        arena.find_crossings();
        arena.sequence();

        let order_a = arena.ring_order(Ring::A)?;
        let order_b = arena.ring_order(Ring::B)?;
        arena.classify(Ring::A, &order_a);
        arena.classify(Ring::B, &order_b);

        let Some(mut start) = arena.find_start(&order_a) else {
            // No transitions: one contains the other, or they are apart.
            if self.internal_point().is_some_and(|pt| other.contains(pt)) {
                return Ok(vec![self.clone()]);
            }
            if other.internal_point().is_some_and(|pt| self.contains(pt)) {
                return Ok(vec![other.clone()]);
            }
            return Ok(Vec::new());
        };

        let mut pieces = Vec::new();
        let mut walks = 0;
        loop {
            walks += 1;
            if walks > arena.vertices.len() {
                return Err(PolygonError::WalkDidNotClose { steps: walks });
            }
            let points = arena.walk(start)?;
            let mut piece = Polygon::new(points);
            piece.clean_up();
            if piece.len() > 2 {
                piece.calc_bounding_box();
                pieces.push(piece);
            }
            match arena.find_start(&order_a) {
                Some(next) => start = next,
                None => break,
            }
        }
        Ok(pieces)
    }

    /// The parts of this polygon inside `bbox`. Every piece must come out
    /// clockwise; anything else means the topology went wrong.
    pub fn clip_to_box(&self, bbox: &BoundingBox) -> Result<Vec<Polygon>, PolygonError> {
        if !bbox.intersects(&self.bbox) {
            return Ok(Vec::new());
        }
        if self.wholly_inside(bbox) {
            return Ok(vec![self.clone()]);
        }
        let pieces = self.intersection(&Polygon::from_box(bbox))?;
        if pieces.iter().any(|p| !p.is_clockwise()) {
            return Err(PolygonError::NotClockwise);
        }
        Ok(pieces)
    }
}

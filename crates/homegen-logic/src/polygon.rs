//! Orthogonal polygon decomposition.
//!
//! An [`OrthogonalPolygon`] tracks a room's free floor as a (multi)polygon
//! whose edges are all axis-aligned. The unique x and z coordinates of its
//! vertices cut the plane into a grid of cells; every cell whose midpoint is
//! inside the polygon is a unit rectangle. Larger rectangles are built by
//! merging unit rectangles that share exactly two corners.
//!
//! Cells are addressed by indices into the coordinate lists, so merging is
//! exact integer work and only the final conversion touches floats.

use std::collections::{BTreeSet, HashMap};

use geo::{Area, BooleanOps, BoundingRect, Contains, LineString, MultiPolygon, Point, Polygon};
use rand::Rng;

use crate::anchor::AnchorType;
use crate::config::Margins;
use crate::geom::{Facing, Rect};

/// Coordinates closer than this collapse onto one grid line.
const SNAP: f64 = 1e-6;

/// Rectangle in coordinate-index space, `i` along x and `j` along z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct CellRect {
    i0: u32,
    j0: u32,
    i1: u32,
    j1: u32,
}

impl CellRect {
    fn unit(i: u32, j: u32) -> Self {
        Self {
            i0: i,
            j0: j,
            i1: i + 1,
            j1: j + 1,
        }
    }

    fn corners(&self) -> [(u32, u32); 4] {
        [
            (self.i0, self.j0),
            (self.i0, self.j1),
            (self.i1, self.j1),
            (self.i1, self.j0),
        ]
    }

    fn shared_corners(&self, other: &CellRect) -> usize {
        let theirs = other.corners();
        self.corners().iter().filter(|c| theirs.contains(c)).count()
    }

    fn merged(&self, other: &CellRect) -> CellRect {
        CellRect {
            i0: self.i0.min(other.i0),
            j0: self.j0.min(other.j0),
            i1: self.i1.max(other.i1),
            j1: self.j1.max(other.j1),
        }
    }
}

/// Lookup from a corner to the rectangles that have it.
#[derive(Default)]
struct CornerIndex {
    by_corner: HashMap<(u32, u32), Vec<CellRect>>,
}

impl CornerIndex {
    fn build<'a>(rects: impl IntoIterator<Item = &'a CellRect>) -> Self {
        let mut index = Self::default();
        for r in rects {
            for c in r.corners() {
                index.by_corner.entry(c).or_default().push(*r);
            }
        }
        index
    }

    /// Rectangles sharing exactly two corners with `rect`, sorted.
    fn joinable(&self, rect: &CellRect) -> BTreeSet<CellRect> {
        let mut out = BTreeSet::new();
        for c in rect.corners() {
            if let Some(list) = self.by_corner.get(&c) {
                for other in list {
                    if other != rect && rect.shared_corners(other) == 2 {
                        out.insert(*other);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct OrthogonalPolygon {
    shape: MultiPolygon<f64>,
    xs: Vec<f64>,
    zs: Vec<f64>,
    cells: BTreeSet<CellRect>,
}

impl OrthogonalPolygon {
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        let mut polygon = Self {
            shape,
            xs: Vec::new(),
            zs: Vec::new(),
            cells: BTreeSet::new(),
        };
        polygon.rebuild();
        polygon
    }

    /// Closed loop of `(x, z)` vertices; the closing vertex is optional.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let ring = LineString::from(points.to_vec());
        Self::new(MultiPolygon::new(vec![Polygon::new(ring, vec![])]))
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(MultiPolygon::new(vec![rect.to_polygon()]))
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn is_point_inside(&self, x: f64, z: f64) -> bool {
        self.shape.contains(&Point::new(x, z))
    }

    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.shape
            .bounding_rect()
            .map(|r| Rect::new(r.min().x, r.min().y, r.max().x, r.max().y))
    }

    /// Finest decomposition: one rectangle per grid cell inside the polygon.
    ///
    /// Deterministic for an unmodified polygon.
    pub fn maximal_rectangles(&self) -> Vec<Rect> {
        self.to_rects(&self.cells)
    }

    /// Unit rectangles plus randomized merges of them.
    ///
    /// Combines a greedy random cover (grow one rectangle until nothing more
    /// joins, then start again from the leftovers) with two passes of
    /// pairwise corner merging. The result is not a minimal or maximal
    /// cover. Empty when the polygon has no interior.
    pub fn all_rectangles<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Rect> {
        if self.cells.is_empty() {
            return Vec::new();
        }
        let mut all = self.cells.clone();
        all.extend(random_cover(&self.cells, rng));
        all.extend(join_neighboring(&self.cells));
        self.to_rects(&all)
    }

    /// Remove `rect` from the tracked area.
    pub fn subtract(&mut self, rect: &Rect) {
        if rect.is_degenerate() {
            return;
        }
        let cut = MultiPolygon::new(vec![rect.to_polygon()]);
        self.shape = self.shape.difference(&cut);
        self.rebuild();
    }

    /// Whether the segment `a → b` lies along the polygon's boundary.
    ///
    /// Only axis-aligned segments are considered; the segment may span
    /// several collinear boundary edges.
    pub fn boundary_covers_segment(&self, a: (f64, f64), b: (f64, f64)) -> bool {
        let vertical = (a.0 - b.0).abs() < SNAP;
        let horizontal = (a.1 - b.1).abs() < SNAP;
        if vertical == horizontal {
            return false;
        }
        let (line, lo, hi) = if vertical {
            (a.0, a.1.min(b.1), a.1.max(b.1))
        } else {
            (a.1, a.0.min(b.0), a.0.max(b.0))
        };

        let mut spans: Vec<(f64, f64)> = Vec::new();
        for poly in &self.shape {
            for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
                for seg in ring.lines() {
                    let (s, e) = (seg.start, seg.end);
                    if vertical && (s.x - line).abs() < SNAP && (e.x - line).abs() < SNAP {
                        spans.push((s.y.min(e.y), s.y.max(e.y)));
                    } else if horizontal && (s.y - line).abs() < SNAP && (e.y - line).abs() < SNAP
                    {
                        spans.push((s.x.min(e.x), s.x.max(e.x)));
                    }
                }
            }
        }
        spans.sort_by(|p, q| p.0.total_cmp(&q.0));

        let mut reached = lo;
        for (s, e) in spans {
            if s > reached + SNAP {
                break;
            }
            reached = reached.max(e);
            if reached >= hi - SNAP {
                return true;
            }
        }
        false
    }

    fn rebuild(&mut self) {
        let mut xs = Vec::new();
        let mut zs = Vec::new();
        for poly in &self.shape {
            for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
                for c in ring.coords() {
                    xs.push(c.x);
                    zs.push(c.y);
                }
            }
        }
        self.xs = snapped_unique(xs);
        self.zs = snapped_unique(zs);

        self.cells.clear();
        for i in 0..self.xs.len().saturating_sub(1) {
            for j in 0..self.zs.len().saturating_sub(1) {
                let mid_x = (self.xs[i] + self.xs[i + 1]) / 2.0;
                let mid_z = (self.zs[j] + self.zs[j + 1]) / 2.0;
                if self.is_point_inside(mid_x, mid_z) {
                    self.cells.insert(CellRect::unit(i as u32, j as u32));
                }
            }
        }
    }

    fn to_rects(&self, rects: &BTreeSet<CellRect>) -> Vec<Rect> {
        rects
            .iter()
            .map(|r| Rect {
                x0: self.xs[r.i0 as usize],
                z0: self.zs[r.j0 as usize],
                x1: self.xs[r.i1 as usize],
                z1: self.zs[r.j1 as usize],
            })
            .collect()
    }
}

fn snapped_unique(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|later, kept| (*later - *kept).abs() < SNAP);
    values
}

fn random_cover<R: Rng + ?Sized>(units: &BTreeSet<CellRect>, rng: &mut R) -> BTreeSet<CellRect> {
    let index = CornerIndex::build(units);
    let mut remaining = units.clone();
    let mut out = BTreeSet::new();

    while !remaining.is_empty() {
        let pick = rng.gen_range(0..remaining.len());
        let Some(mut current) = remaining.iter().nth(pick).copied() else {
            break;
        };
        remaining.remove(&current);

        // Grown rectangles are not in the index; probe with their corners.
        loop {
            let next = current
                .corners()
                .iter()
                .filter_map(|c| index.by_corner.get(c))
                .flatten()
                .filter(|r| remaining.contains(*r) && current.shared_corners(r) == 2)
                .min()
                .copied();
            match next {
                Some(r) => {
                    remaining.remove(&r);
                    current = current.merged(&r);
                }
                None => break,
            }
        }
        out.insert(current);
    }
    out
}

/// Two passes of merging rectangle pairs that share exactly two corners.
fn join_neighboring(units: &BTreeSet<CellRect>) -> BTreeSet<CellRect> {
    let index = CornerIndex::build(units);
    let mut all = units.clone();
    let mut fresh = BTreeSet::new();
    for r in units {
        for other in index.joinable(r) {
            let merged = r.merged(&other);
            if all.insert(merged) {
                fresh.insert(merged);
            }
        }
    }

    let index = CornerIndex::build(&all);
    let mut second = BTreeSet::new();
    for r in &fresh {
        for other in index.joinable(r) {
            let merged = r.merged(&other);
            if !all.contains(&merged) {
                second.insert(merged);
            }
        }
    }
    all.extend(second);
    all
}

/// Grow a footprint by the clearances its anchor and facing call for.
///
/// Wall-anchored objects get `front` clearance on the side they face and
/// `back` against the wall; middle objects get the same margin all round.
pub fn add_margin_to_footprint(
    footprint: &Rect,
    facing: Facing,
    anchor: AnchorType,
    margins: &Margins,
) -> Rect {
    let mut r = *footprint;
    let side = match anchor {
        AnchorType::InMiddle => return footprint.expanded(margins.middle),
        AnchorType::OnEdge => margins.edge,
        AnchorType::InCorner => margins.corner,
    };
    match facing {
        Facing::PosZ => {
            r.z1 += side.front;
            r.z0 -= side.back;
            r.x0 -= side.sides;
            r.x1 += side.sides;
        }
        Facing::PosX => {
            r.x1 += side.front;
            r.x0 -= side.back;
            r.z0 -= side.sides;
            r.z1 += side.sides;
        }
        Facing::NegZ => {
            r.z0 -= side.front;
            r.z1 += side.back;
            r.x0 -= side.sides;
            r.x1 += side.sides;
        }
        Facing::NegX => {
            r.x0 -= side.front;
            r.x1 += side.back;
            r.z0 -= side.sides;
            r.z1 += side.sides;
        }
    }
    r
}

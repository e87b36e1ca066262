//! Anchoring objects inside a free rectangle.
//!
//! An anchor says where in the rectangle an object goes and which way its
//! footprint extends from the anchor point, as a cell of a 3×3 compass:
//!
//! ```text
//!     0   1   2        column 0 extends toward -x, column 2 toward +x
//!     3   4   5        row 0 extends toward +z, row 2 toward -z
//!     6   7   8        4 is centred on the point
//! ```
//!
//! A rectangle corner at `(x1, z0)` therefore anchors with delta 0: the
//! object's far corner sits on the room corner and the rest of it extends
//! inward.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geom::{Facing, Rect};
use crate::polygon::OrthogonalPolygon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnchorType {
    InCorner,
    OnEdge,
    InMiddle,
}

/// Compass cell in `0..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorDelta(u8);

impl AnchorDelta {
    pub const CENTER: AnchorDelta = AnchorDelta(4);

    pub fn new(value: u8) -> Option<Self> {
        (value <= 8).then_some(AnchorDelta(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    fn row(self) -> u8 {
        self.0 / 3
    }

    fn col(self) -> u8 {
        self.0 % 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorLocation {
    Corner { x: f64, z: f64 },
    Edge { from: (f64, f64), to: (f64, f64) },
    Anywhere,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub anchor_type: AnchorType,
    pub delta: AnchorDelta,
    pub location: AnchorLocation,
}

impl Anchor {
    pub fn middle() -> Self {
        Anchor {
            anchor_type: AnchorType::InMiddle,
            delta: AnchorDelta::CENTER,
            location: AnchorLocation::Anywhere,
        }
    }

    /// Facing forced by the anchor; `rotated` picks between the two corner
    /// options. Middle anchors return `None`.
    pub fn forced_facing(&self, rotated: bool) -> Option<Facing> {
        match self.anchor_type {
            AnchorType::InCorner => Some(corner_facing(self.delta, rotated)),
            AnchorType::OnEdge => Some(edge_facing(self.delta)),
            AnchorType::InMiddle => None,
        }
    }

    /// Whether the anchor fixes the footprint orientation.
    pub fn forced_rotation(&self) -> Option<bool> {
        match (self.anchor_type, self.delta.value()) {
            (AnchorType::OnEdge, 1 | 7) => Some(false),
            (AnchorType::OnEdge, _) => Some(true),
            _ => None,
        }
    }
}

/// Decide corner, edge, or middle placement for `rect` inside a room.
pub fn sample_anchor_location<R: Rng + ?Sized>(
    room_polygon: &OrthogonalPolygon,
    rect: &Rect,
    p_choose_edge: f64,
    epsilon: f64,
    rng: &mut R,
) -> Anchor {
    let Rect { x0, z0, x1, z1 } = *rect;

    let mut corners = vec![(x0, z0, 2), (x0, z1, 8), (x1, z1, 6), (x1, z0, 0)];
    corners.shuffle(rng);
    let qualifying: Vec<Anchor> = corners
        .into_iter()
        .filter(|&(x, z, _)| is_room_corner(room_polygon, x, z, epsilon))
        .map(|(x, z, delta)| Anchor {
            anchor_type: AnchorType::InCorner,
            delta: AnchorDelta(delta),
            location: AnchorLocation::Corner { x, z },
        })
        .collect();
    if let Some(anchor) = qualifying.choose(rng) {
        return *anchor;
    }

    let mut edges = vec![
        ((x0, z0), (x1, z0), 1),
        ((x0, z0), (x0, z1), 5),
        ((x1, z0), (x1, z1), 3),
        ((x0, z1), (x1, z1), 7),
    ];
    edges.shuffle(rng);
    let on_boundary: Vec<Anchor> = edges
        .into_iter()
        .filter(|&(a, b, _)| room_polygon.boundary_covers_segment(a, b))
        .map(|(from, to, delta)| Anchor {
            anchor_type: AnchorType::OnEdge,
            delta: AnchorDelta(delta),
            location: AnchorLocation::Edge { from, to },
        })
        .collect();
    if !on_boundary.is_empty() && rng.gen::<f64>() < p_choose_edge {
        if let Some(anchor) = on_boundary.choose(rng) {
            return *anchor;
        }
    }

    Anchor::middle()
}

/// A point is a room corner when a non-adjacent pair of diagonal probes is
/// inside, or exactly one probe is.
fn is_room_corner(room: &OrthogonalPolygon, x: f64, z: f64, eps: f64) -> bool {
    let q1 = room.is_point_inside(x + eps, z + eps);
    let q2 = room.is_point_inside(x - eps, z + eps);
    let q3 = room.is_point_inside(x - eps, z - eps);
    let q4 = room.is_point_inside(x + eps, z - eps);
    let diagonal = (q1 && q3 && !q2 && !q4) || (q2 && q4 && !q1 && !q3);
    let single = [q1, q2, q3, q4].iter().filter(|q| **q).count() == 1;
    diagonal || single
}

/// Facing of a corner-anchored object: its back and one side to the walls.
pub fn corner_facing(delta: AnchorDelta, rotated: bool) -> Facing {
    match (delta.value(), rotated) {
        (0, true) | (6, true) => Facing::NegX,
        (2, true) | (8, true) => Facing::PosX,
        (0, false) | (2, false) => Facing::PosZ,
        _ => Facing::NegZ,
    }
}

/// Facing of an edge-anchored object: back to the wall.
pub fn edge_facing(delta: AnchorDelta) -> Facing {
    match delta.value() {
        1 => Facing::PosZ,
        7 => Facing::NegZ,
        5 => Facing::PosX,
        _ => Facing::NegX,
    }
}

/// Top-down footprint of an `extent = (x, z)` object anchored at `point`.
///
/// `padding` is kept between the object and the anchor along every axis the
/// footprint extends away from (the walls); centred axes get none.
pub fn top_down_footprint(point: (f64, f64), delta: AnchorDelta, extent: (f64, f64), padding: f64) -> Rect {
    let (x, z) = point;
    let (bx, bz) = extent;
    let (xa, xb) = match delta.col() {
        0 => (x - bx - padding, x),
        1 => (x - bx / 2.0, x + bx / 2.0),
        _ => (x, x + bx + padding),
    };
    let (za, zb) = match delta.row() {
        0 => (z, z + bz + padding),
        1 => (z - bz / 2.0, z + bz / 2.0),
        _ => (z - bz - padding, z),
    };
    Rect::new(xa, za, xb, zb)
}

/// Centre of the object itself inside its padded footprint.
pub fn anchored_center(point: (f64, f64), delta: AnchorDelta, extent: (f64, f64), padding: f64) -> (f64, f64) {
    let dx = match delta.col() {
        0 => -padding,
        1 => 0.0,
        _ => padding,
    };
    let dz = match delta.row() {
        0 => padding,
        1 => 0.0,
        _ => -padding,
    };
    top_down_footprint((point.0 + dx, point.1 + dz), delta, extent, 0.0).center()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square_room() -> OrthogonalPolygon {
        OrthogonalPolygon::from_rect(Rect::new(0.0, 0.0, 4.0, 4.0))
    }

    #[test]
    fn full_room_rectangle_anchors_in_a_corner() {
        let room = square_room();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let anchor = sample_anchor_location(&room, &Rect::new(0.0, 0.0, 4.0, 4.0), 0.7, 1e-3, &mut rng);
        assert_eq!(anchor.anchor_type, AnchorType::InCorner);
    }

    #[test]
    fn strip_along_wall_anchors_on_edge_or_middle() {
        let room = square_room();
        let rect = Rect::new(1.0, 0.0, 3.0, 1.0);
        let mut edges = 0;
        for seed in 0..40 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let anchor = sample_anchor_location(&room, &rect, 0.7, 1e-3, &mut rng);
            match anchor.anchor_type {
                AnchorType::OnEdge => {
                    edges += 1;
                    assert_eq!(anchor.delta.value(), 1);
                }
                AnchorType::InMiddle => assert_eq!(anchor.delta, AnchorDelta::CENTER),
                AnchorType::InCorner => panic!("no room corner on this strip"),
            }
        }
        assert!(edges > 10 && edges < 40);
    }

    #[test]
    fn interior_rectangle_is_middle() {
        let room = square_room();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let anchor = sample_anchor_location(&room, &Rect::new(1.0, 1.0, 2.0, 2.0), 1.0, 1e-3, &mut rng);
        assert_eq!(anchor, Anchor::middle());
    }

    #[test]
    fn concave_room_corner_qualifies() {
        let room = OrthogonalPolygon::from_points(&[
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 2.0),
            (2.0, 2.0),
            (2.0, 4.0),
            (0.0, 4.0),
        ]);
        // Three probes inside at the reflex vertex: not a corner.
        assert!(!is_room_corner(&room, 2.0, 2.0, 1e-3));
        assert!(is_room_corner(&room, 4.0, 0.0, 1e-3));
    }

    #[test]
    fn corner_delta_zero_keeps_far_corner_on_anchor() {
        let fp = top_down_footprint((4.0, 0.0), AnchorDelta(0), (1.2, 0.8), 0.05);
        assert_relative_eq!(fp.x1, 4.0);
        assert_relative_eq!(fp.z0, 0.0);
        assert_relative_eq!(fp.width(), 1.25, epsilon = 1e-9);
        assert_relative_eq!(fp.depth(), 0.85, epsilon = 1e-9);
    }

    #[test]
    fn anchored_object_stays_inside_its_footprint() {
        for d in 0..=8 {
            let delta = AnchorDelta::new(d).unwrap();
            let fp = top_down_footprint((2.0, 2.0), delta, (1.0, 0.6), 0.05).expanded(1e-9);
            let (cx, cz) = anchored_center((2.0, 2.0), delta, (1.0, 0.6), 0.05);
            let object = Rect::centered(cx, cz, 1.0, 0.6);
            assert!(fp.contains_point(object.x0, object.z0) && fp.contains_point(object.x1, object.z1));
        }
    }

    #[test]
    fn corner_facing_points_away_from_walls() {
        // Corner at (x1, z0): walls below and to the right.
        assert_eq!(corner_facing(AnchorDelta(0), false), Facing::PosZ);
        assert_eq!(corner_facing(AnchorDelta(0), true), Facing::NegX);
        assert_eq!(corner_facing(AnchorDelta(8), true), Facing::PosX);
        assert_eq!(corner_facing(AnchorDelta(6), false), Facing::NegZ);
        assert_eq!(edge_facing(AnchorDelta(3)), Facing::NegX);
    }

    #[test]
    fn centred_footprint_has_no_padding() {
        let fp = top_down_footprint((1.0, 1.0), AnchorDelta::CENTER, (2.0, 1.0), 0.5);
        assert_eq!(fp, Rect::new(0.0, 0.5, 2.0, 1.5));
    }
}

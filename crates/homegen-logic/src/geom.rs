//! Floor-plane primitives: axis-aligned rectangles in world x/z, yaw
//! rotation, and a couple of sampling helpers shared by the placers.
//!
//! Yaw follows the simulator convention: a positive angle turns the local
//! +z (front) axis toward world +x.

use geo::{LineString, Polygon};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Three-component size or position, as stored in the object database.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Which way an object's front points, in quarter turns of yaw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    PosZ,
    PosX,
    NegZ,
    NegX,
}

impl Facing {
    pub fn degrees(self) -> f64 {
        match self {
            Facing::PosZ => 0.0,
            Facing::PosX => 90.0,
            Facing::NegZ => 180.0,
            Facing::NegX => 270.0,
        }
    }

    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Facing::PosZ),
            90 => Some(Facing::PosX),
            180 => Some(Facing::NegZ),
            270 => Some(Facing::NegX),
            _ => None,
        }
    }

    /// Quarter turns swap the x and z extents of a footprint.
    pub fn is_rotated(self) -> bool {
        matches!(self, Facing::PosX | Facing::NegX)
    }
}

/// Axis-aligned rectangle on the floor plane, `x0 <= x1`, `z0 <= z1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub z0: f64,
    pub x1: f64,
    pub z1: f64,
}

impl Rect {
    /// Build from two opposite corners in any order.
    pub fn new(xa: f64, za: f64, xb: f64, zb: f64) -> Self {
        Self {
            x0: xa.min(xb),
            z0: za.min(zb),
            x1: xa.max(xb),
            z1: za.max(zb),
        }
    }

    pub fn centered(cx: f64, cz: f64, x_size: f64, z_size: f64) -> Self {
        Self::new(
            cx - x_size / 2.0,
            cz - z_size / 2.0,
            cx + x_size / 2.0,
            cz + z_size / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn depth(&self) -> f64 {
        self.z1 - self.z0
    }

    pub fn area(&self) -> f64 {
        self.width() * self.depth()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.z0 + self.z1) / 2.0)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= f64::EPSILON || self.depth() <= f64::EPSILON
    }

    /// Interiors overlap. Rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.z0 < other.z1 && other.z0 < self.z1
    }

    pub fn contains_point(&self, x: f64, z: f64) -> bool {
        x >= self.x0 && x <= self.x1 && z >= self.z0 && z <= self.z1
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            z0: self.z0.min(other.z0),
            x1: self.x1.max(other.x1),
            z1: self.z1.max(other.z1),
        }
    }

    /// Grow (or shrink, for negative `d`) every side by `d`.
    pub fn expanded(&self, d: f64) -> Rect {
        Rect {
            x0: self.x0 - d,
            z0: self.z0 - d,
            x1: self.x1 + d,
            z1: self.z1 + d,
        }
    }

    /// Counter-clockwise closed polygon in (x, z).
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.x0, self.z0),
                (self.x1, self.z0),
                (self.x1, self.z1),
                (self.x0, self.z1),
                (self.x0, self.z0),
            ]),
            vec![],
        )
    }

    /// Bounds of this rectangle after rotating it by `degrees` about `pivot`.
    pub fn rotated_about(&self, pivot: (f64, f64), degrees: f64) -> Rect {
        let corners = [
            (self.x0, self.z0),
            (self.x1, self.z0),
            (self.x1, self.z1),
            (self.x0, self.z1),
        ];
        let mut out: Option<Rect> = None;
        for (x, z) in corners {
            let (rx, rz) = rotate_xz(x - pivot.0, z - pivot.1, degrees);
            let p = Rect::new(pivot.0 + rx, pivot.1 + rz, pivot.0 + rx, pivot.1 + rz);
            out = Some(match out {
                Some(r) => r.union(&p),
                None => p,
            });
        }
        out.unwrap_or(*self)
    }
}

/// Rotate a local floor-plane offset by a yaw in degrees.
pub fn rotate_xz(x: f64, z: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (x * cos + z * sin, -x * sin + z * cos)
}

/// Footprint extent of an `x_size × z_size` object yawed by `degrees`.
pub fn rotated_extent(x_size: f64, z_size: f64, degrees: f64) -> (f64, f64) {
    let r = Rect::centered(0.0, 0.0, x_size, z_size).rotated_about((0.0, 0.0), degrees);
    (r.width(), r.depth())
}

/// Normalize an angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0)
}

/// Uniform draw in `[lo, hi]`; returns `lo` when the range is empty.
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    lo + (hi - lo) * rng.gen::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(1.0, 0.0, 2.0, 1.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(0.5, 0.5, 1.5, 1.5)));
    }

    #[test]
    fn yaw_turns_front_toward_positive_x() {
        let (x, z) = rotate_xz(0.0, 1.0, 90.0);
        assert_relative_eq!(x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        let (w, d) = rotated_extent(2.0, 0.5, 270.0);
        assert_relative_eq!(w, 0.5, epsilon = 1e-9);
        assert_relative_eq!(d, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn uniform_handles_empty_range() {
        let mut rng = rand::thread_rng();
        assert_eq!(uniform(&mut rng, 3.0, 1.0), 3.0);
        let v = uniform(&mut rng, 1.0, 2.0);
        assert!((1.0..=2.0).contains(&v));
    }
}

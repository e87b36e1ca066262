//! House structure: walls between grid cells and per-room polygons.
//!
//! Grid-line coordinates are unpadded: interior cell `(row, col)` of the
//! padded [`FloorGrid`] covers `x ∈ [row-1, row]`, `z ∈ [col-1, col]`, scaled
//! by the unit size to get world metres.

use std::collections::BTreeMap;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::constants::{retries, EXTERIOR_ROOM_ID};
use crate::error::{GenerationError, Result};
use crate::floorplan::{generate_floorplan, FloorGrid};
use crate::room_spec::RoomSpec;

/// A grid-line intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub z: i32,
}

impl GridPoint {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn to_world(self, unit_size: f64) -> (f64, f64) {
        (self.x as f64 * unit_size, self.z as f64 * unit_size)
    }
}

/// Unordered pair of room ids, stored smaller first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomPair(pub u32, pub u32);

impl RoomPair {
    pub fn new(a: u32, b: u32) -> Self {
        if a <= b {
            RoomPair(a, b)
        } else {
            RoomPair(b, a)
        }
    }

    pub fn contains(&self, room_id: u32) -> bool {
        self.0 == room_id || self.1 == room_id
    }

    pub fn touches_exterior(&self) -> bool {
        self.contains(EXTERIOR_ROOM_ID)
    }

    /// The room on the other side from `room_id`.
    pub fn other(&self, room_id: u32) -> u32 {
        if self.0 == room_id {
            self.1
        } else {
            self.0
        }
    }
}

/// Straight wall run between two rooms, `p0 < p1` along its axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallSegment {
    pub p0: GridPoint,
    pub p1: GridPoint,
    pub rooms: RoomPair,
}

impl WallSegment {
    /// Runs along z at constant x.
    pub fn is_vertical(&self) -> bool {
        self.p0.x == self.p1.x
    }

    pub fn length(&self) -> u32 {
        ((self.p1.x - self.p0.x).abs() + (self.p1.z - self.p0.z).abs()) as u32
    }

    /// Unit-length pieces of this run, in order.
    pub fn unit_segments(&self) -> Vec<WallSegment> {
        let (dx, dz) = if self.is_vertical() { (0, 1) } else { (1, 0) };
        (0..self.length() as i32)
            .map(|k| WallSegment {
                p0: GridPoint::new(self.p0.x + dx * k, self.p0.z + dz * k),
                p1: GridPoint::new(self.p0.x + dx * (k + 1), self.p0.z + dz * (k + 1)),
                rooms: self.rooms,
            })
            .collect()
    }

    pub fn world_midpoint(&self, unit_size: f64) -> (f64, f64) {
        let (x0, z0) = self.p0.to_world(unit_size);
        let (x1, z1) = self.p1.to_world(unit_size);
        ((x0 + x1) / 2.0, (z0 + z1) / 2.0)
    }
}

pub type WallMap = BTreeMap<RoomPair, Vec<WallSegment>>;

/// Everything later stages need to know about the layout.
#[derive(Debug, Clone)]
pub struct HouseStructure {
    pub grid: FloorGrid,
    /// Unit wall segments keyed by the rooms they separate.
    pub unit_walls: WallMap,
    /// The same walls merged into maximal straight runs.
    pub boundary_groups: WallMap,
    /// World-space closed loop per room, clockwise, inset for wall thickness.
    pub room_polygons: BTreeMap<u32, Vec<(f64, f64)>>,
    pub unit_size: f64,
}

impl HouseStructure {
    /// Adjacent room pairs, exterior included.
    pub fn adjacent_pairs(&self) -> Vec<RoomPair> {
        self.boundary_groups.keys().copied().collect()
    }

    /// World centre of padded cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            (row as f64 - 0.5) * self.unit_size,
            (col as f64 - 0.5) * self.unit_size,
        )
    }

    /// World extent of the interior grid.
    pub fn extent(&self) -> (f64, f64) {
        (
            (self.grid.rows() - 2) as f64 * self.unit_size,
            (self.grid.cols() - 2) as f64 * self.unit_size,
        )
    }
}

/// Sample a floorplan for `spec` and derive its walls and room polygons.
pub fn build_house_structure<R: Rng + ?Sized>(
    spec: &RoomSpec,
    config: &GenerationConfig,
    rng: &mut R,
) -> Result<HouseStructure> {
    let grid = generate_floorplan(spec, config, rng)?;
    house_from_grid(grid, config)
}

/// Derive walls and room polygons for a fixed floorplan.
pub fn house_from_grid(grid: FloorGrid, config: &GenerationConfig) -> Result<HouseStructure> {
    let unit_walls = find_walls(&grid);
    let boundary_groups = consolidate_walls(&unit_walls)?;
    let mut room_polygons = BTreeMap::new();
    for room_id in grid.room_ids() {
        let corners = room_wall_loop(room_id, &boundary_groups)?;
        let polygon = inset_polygon(&corners, config.unit_size, config.wall_thickness);
        debug!("room {} polygon has {} corners", room_id, polygon.len());
        room_polygons.insert(room_id, polygon);
    }
    Ok(HouseStructure {
        grid,
        unit_walls,
        boundary_groups,
        room_polygons,
        unit_size: config.unit_size,
    })
}

/// One unit segment per pair of 4-adjacent cells with differing ids.
pub fn find_walls(grid: &FloorGrid) -> WallMap {
    let mut walls = WallMap::new();
    for r in 0..grid.rows() {
        for c in 0..grid.cols() {
            let here = grid.get(r, c);
            let (ri, ci) = (r as i32, c as i32);
            if r + 1 < grid.rows() && grid.get(r + 1, c) != here {
                let rooms = RoomPair::new(here, grid.get(r + 1, c));
                walls.entry(rooms).or_default().push(WallSegment {
                    p0: GridPoint::new(ri, ci - 1),
                    p1: GridPoint::new(ri, ci),
                    rooms,
                });
            }
            if c + 1 < grid.cols() && grid.get(r, c + 1) != here {
                let rooms = RoomPair::new(here, grid.get(r, c + 1));
                walls.entry(rooms).or_default().push(WallSegment {
                    p0: GridPoint::new(ri - 1, ci),
                    p1: GridPoint::new(ri, ci),
                    rooms,
                });
            }
        }
    }
    walls
}

/// Merge collinear segments of each room pair that share an endpoint.
pub fn consolidate_walls(walls: &WallMap) -> Result<WallMap> {
    let mut out = WallMap::new();
    for (rooms, segments) in walls {
        out.insert(*rooms, merge_runs(segments)?);
    }
    Ok(out)
}

fn merge_runs(segments: &[WallSegment]) -> Result<Vec<WallSegment>> {
    let mut current: Vec<WallSegment> = segments.to_vec();
    current.sort();
    for _ in 0..retries::MAX_WALL_MERGE_ITERATIONS {
        let mut merged_any = false;
        let mut next: Vec<WallSegment> = Vec::with_capacity(current.len());
        for seg in current {
            let vertical = seg.is_vertical();
            if let Some(prev) = next
                .iter_mut()
                .find(|o| o.is_vertical() == vertical && o.p1 == seg.p0)
            {
                prev.p1 = seg.p1;
                merged_any = true;
            } else if let Some(after) = next
                .iter_mut()
                .find(|o| o.is_vertical() == vertical && o.p0 == seg.p1)
            {
                after.p0 = seg.p0;
                merged_any = true;
            } else {
                next.push(seg);
            }
        }
        current = next;
        if !merged_any {
            return Ok(current);
        }
    }
    Err(GenerationError::WallMergeDiverged(
        retries::MAX_WALL_MERGE_ITERATIONS,
    ))
}

/// Corners of `room_id`'s boundary in walking order, collinear points removed.
pub fn room_wall_loop(room_id: u32, groups: &WallMap) -> Result<Vec<GridPoint>> {
    let mut remaining: Vec<WallSegment> = groups
        .iter()
        .filter(|(rooms, _)| rooms.contains(room_id))
        .flat_map(|(_, segs)| segs.iter().copied())
        .collect();
    if remaining.is_empty() {
        return Err(GenerationError::OpenWallLoop {
            room_id,
            at: (0, 0),
        });
    }

    let first = remaining.remove(0);
    let mut points = vec![first.p0, first.p1];
    let mut end = first.p1;
    while !remaining.is_empty() {
        let idx = remaining
            .iter()
            .position(|s| s.p0 == end || s.p1 == end)
            .ok_or(GenerationError::OpenWallLoop {
                room_id,
                at: (end.x, end.z),
            })?;
        let seg = remaining.remove(idx);
        end = if seg.p0 == end { seg.p1 } else { seg.p0 };
        points.push(end);
    }
    if end != points[0] {
        return Err(GenerationError::OpenWallLoop {
            room_id,
            at: (end.x, end.z),
        });
    }
    points.pop();
    Ok(drop_collinear(points))
}

fn drop_collinear(points: Vec<GridPoint>) -> Vec<GridPoint> {
    let n = points.len();
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let here = points[i];
            let next = points[(i + 1) % n];
            !((prev.x == here.x && here.x == next.x) || (prev.z == here.z && here.z == next.z))
        })
        .map(|i| points[i])
        .collect()
}

/// Twice the signed area; positive for counter-clockwise loops.
pub fn signed_area2(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (x0, z0) = points[i];
            let (x1, z1) = points[(i + 1) % n];
            x0 * z1 - x1 * z0
        })
        .sum()
}

/// Scale a grid loop to world space, wind it clockwise, and pull every
/// corner inward by `thickness` along both adjacent edges.
pub fn inset_polygon(corners: &[GridPoint], unit_size: f64, thickness: f64) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = corners.iter().map(|p| p.to_world(unit_size)).collect();
    if signed_area2(&pts) > 0.0 {
        pts.reverse();
    }
    let n = pts.len();
    // Clockwise: the interior is on the right of each edge.
    let inward = |from: (f64, f64), to: (f64, f64)| {
        let dx = (to.0 - from.0).signum();
        let dz = (to.1 - from.1).signum();
        (dz, -dx)
    };
    (0..n)
        .map(|i| {
            let prev = pts[(i + n - 1) % n];
            let here = pts[i];
            let next = pts[(i + 1) % n];
            let a = inward(prev, here);
            let b = inward(here, next);
            (here.0 + thickness * (a.0 + b.0), here.1 + thickness * (a.1 + b.1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_by_two() -> FloorGrid {
        // Room 1 along row 0, room 2 along row 1.
        FloorGrid::from_interior(&[vec![1, 1], vec![2, 2]])
    }

    fn l_rooms() -> FloorGrid {
        FloorGrid::from_interior(&[vec![1, 1, 1], vec![1, 2, 2], vec![1, 2, 2]])
    }

    #[test]
    fn finds_unit_walls_by_pair() {
        let walls = find_walls(&two_by_two());
        assert_eq!(walls[&RoomPair::new(1, 2)].len(), 2);
        assert_eq!(walls[&RoomPair::new(0, 1)].len(), 4);
        assert_eq!(walls[&RoomPair::new(0, 2)].len(), 4);
    }

    #[test]
    fn consolidation_merges_collinear_runs() {
        let groups = consolidate_walls(&find_walls(&two_by_two())).unwrap();
        let shared = &groups[&RoomPair::new(1, 2)];
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].length(), 2);
        assert_eq!(shared[0].p0, GridPoint::new(1, 0));
        assert_eq!(shared[0].p1, GridPoint::new(1, 2));
        // Exterior of room 1: one long wall, two short ones.
        assert_eq!(groups[&RoomPair::new(0, 1)].len(), 3);
    }

    #[test]
    fn unit_segments_split_runs() {
        let groups = consolidate_walls(&find_walls(&two_by_two())).unwrap();
        let units = groups[&RoomPair::new(1, 2)][0].unit_segments();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].p1, GridPoint::new(1, 2));
    }

    #[test]
    fn wall_loop_closes_with_turn_corners_only() {
        let groups = consolidate_walls(&find_walls(&l_rooms())).unwrap();
        let loop1 = room_wall_loop(1, &groups).unwrap();
        assert_eq!(loop1.len(), 6);
        let loop2 = room_wall_loop(2, &groups).unwrap();
        assert_eq!(loop2.len(), 4);
    }

    #[test]
    fn open_loop_is_an_error() {
        let mut groups = consolidate_walls(&find_walls(&two_by_two())).unwrap();
        groups.remove(&RoomPair::new(1, 2));
        assert!(matches!(
            room_wall_loop(1, &groups),
            Err(GenerationError::OpenWallLoop { room_id: 1, .. })
        ));
    }

    #[test]
    fn polygons_are_clockwise_and_inset() {
        let house = house_from_grid(two_by_two(), &GenerationConfig::default()).unwrap();
        let u = house.unit_size;
        let t = 0.1;
        let poly = &house.room_polygons[&1];
        assert!(signed_area2(poly) < 0.0);
        let area = signed_area2(poly).abs() / 2.0;
        assert_relative_eq!(area, (u - 2.0 * t) * (2.0 * u - 2.0 * t), epsilon = 1e-9);
        for &(x, z) in poly {
            assert!(x > 0.0 && x < u);
            assert!(z > 0.0 && z < 2.0 * u);
        }
    }

    #[test]
    fn concave_corner_is_inset_too() {
        let house = house_from_grid(l_rooms(), &GenerationConfig::default()).unwrap();
        let u = house.unit_size;
        let t = 0.1;
        let area = signed_area2(&house.room_polygons[&1]).abs() / 2.0;
        // Two overlapping arms of the L, each pulled in by the wall band.
        let arm = (u - 2.0 * t) * (3.0 * u - 2.0 * t);
        let overlap = (u - 2.0 * t) * (u - 2.0 * t);
        assert_relative_eq!(area, 2.0 * arm - overlap, epsilon = 1e-9);
    }
}

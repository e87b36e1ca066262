//! Floorplan sampling: interior boundary and room-id assignment.
//!
//! The interior boundary is a rectangle of grid cells with up to two corner
//! notches cut away. Rooms are assigned by recursive guillotine cuts that
//! follow the room spec tree, so every room and every meta group occupies
//! one orthogonally convex, 4-connected region.

use std::collections::{HashSet, VecDeque};

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::GenerationConfig;
use crate::constants::{grid, retries, EXTERIOR_ROOM_ID};
use crate::error::{GenerationError, Result};
use crate::room_spec::{RoomNode, RoomSpec};

/// Room ids per cell, padded with an exterior ring on every side.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorGrid {
    cells: Vec<Vec<u32>>,
}

impl FloorGrid {
    /// Pad an unpadded `rows × cols` assignment with the exterior sentinel.
    pub fn from_interior(interior: &[Vec<u32>]) -> Self {
        let cols = interior.first().map_or(0, Vec::len);
        let mut cells = vec![vec![EXTERIOR_ROOM_ID; cols + 2]];
        for row in interior {
            let mut padded = Vec::with_capacity(cols + 2);
            padded.push(EXTERIOR_ROOM_ID);
            padded.extend_from_slice(row);
            padded.push(EXTERIOR_ROOM_ID);
            cells.push(padded);
        }
        cells.push(vec![EXTERIOR_ROOM_ID; cols + 2]);
        Self { cells }
    }

    /// Padded row count.
    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    /// Padded column count.
    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.cells[row][col]
    }

    pub fn rows_iter(&self) -> impl Iterator<Item = &Vec<u32>> {
        self.cells.iter()
    }

    /// Padded `(row, col, room_id)` of every non-exterior cell.
    pub fn interior_cells(&self) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, id)| **id != EXTERIOR_ROOM_ID)
                .map(move |(c, id)| (r, c, *id))
        })
    }

    pub fn room_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.interior_cells().map(|(_, _, id)| id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn cell_count(&self, room_id: u32) -> usize {
        self.interior_cells().filter(|(_, _, id)| *id == room_id).count()
    }
}

/// Interior grid size for `spec`: explicit dims, else derived from room count.
pub fn grid_dims(spec: &RoomSpec, config: &GenerationConfig) -> (u32, u32) {
    if let Some(dims) = spec.dims {
        return dims;
    }
    let rooms = spec.leaves().len() as u32;
    let cells = (rooms * config.cells_per_room).max(1);
    let side = ((cells as f64).sqrt().ceil() as u32).clamp(grid::MIN_GRID_SIDE, grid::MAX_GRID_SIDE);
    let other = cells.div_ceil(side).clamp(grid::MIN_GRID_SIDE, grid::MAX_GRID_SIDE);
    (side, other)
}

/// Sample a rectangle with up to two notched corners.
///
/// Each notch is smaller than half the grid on both axes, so the centre
/// row and column survive and the shape stays orthogonally convex.
pub fn sample_interior_boundary<R: Rng + ?Sized>(
    rows: u32,
    cols: u32,
    min_cells: usize,
    rng: &mut R,
) -> Vec<Vec<bool>> {
    let (rows, cols) = (rows as usize, cols as usize);
    let mut inside = vec![vec![true; cols]; rows];
    let max_h = (rows - 1) / 2;
    let max_w = (cols - 1) / 2;
    if max_h == 0 || max_w == 0 {
        return inside;
    }

    let mut corners = [(false, false), (false, true), (true, false), (true, true)];
    corners.shuffle(rng);
    let cuts = rng.gen_range(0..=2);
    for &(bottom, right) in corners.iter().take(cuts) {
        let h = rng.gen_range(1..=max_h);
        let w = rng.gen_range(1..=max_w);
        let remaining: usize = inside.iter().flatten().filter(|c| **c).count();
        if remaining.saturating_sub(h * w) < min_cells {
            continue;
        }
        for r in 0..h {
            for c in 0..w {
                let row = if bottom { rows - 1 - r } else { r };
                let col = if right { cols - 1 - c } else { c };
                inside[row][col] = false;
            }
        }
    }
    inside
}

/// Assign room ids inside `boundary` following the spec tree.
pub fn partition_rooms<R: Rng + ?Sized>(
    boundary: &[Vec<bool>],
    spec: &RoomSpec,
    rng: &mut R,
) -> Result<Vec<Vec<u32>>> {
    let cols = boundary.first().map_or(0, Vec::len);
    let mut out = vec![vec![EXTERIOR_ROOM_ID; cols]; boundary.len()];
    let cells: Vec<(usize, usize)> = boundary
        .iter()
        .enumerate()
        .flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, inside)| **inside)
                .map(move |(c, _)| (r, c))
        })
        .collect();
    assign(&cells, &spec.spec, &mut out, rng)?;
    Ok(out)
}

/// Sample a boundary and partition it, resampling when no cut fits.
pub fn generate_floorplan<R: Rng + ?Sized>(
    spec: &RoomSpec,
    config: &GenerationConfig,
    rng: &mut R,
) -> Result<FloorGrid> {
    let (rows, cols) = grid_dims(spec, config);
    let min_cells = spec.leaves().len();
    let mut last_error = String::new();
    for attempt in 0..retries::MAX_FLOORPLAN_RETRIES {
        let boundary = sample_interior_boundary(rows, cols, min_cells, rng);
        match partition_rooms(&boundary, spec, rng) {
            Ok(interior) => return Ok(FloorGrid::from_interior(&interior)),
            Err(GenerationError::Floorplan(msg)) => {
                debug!("floorplan attempt {} failed: {}", attempt, msg);
                last_error = msg;
            }
            Err(e) => return Err(e),
        }
    }
    Err(GenerationError::Floorplan(format!(
        "no partition of a {}×{} grid after {} attempts: {}",
        rows,
        cols,
        retries::MAX_FLOORPLAN_RETRIES,
        last_error
    )))
}

fn assign<R: Rng + ?Sized>(
    cells: &[(usize, usize)],
    nodes: &[RoomNode],
    out: &mut [Vec<u32>],
    rng: &mut R,
) -> Result<()> {
    match nodes {
        [] => Err(GenerationError::Floorplan("empty room group".into())),
        [RoomNode::Leaf(leaf)] => {
            for &(r, c) in cells {
                out[r][c] = leaf.room_id;
            }
            Ok(())
        }
        [RoomNode::Meta(meta)] => assign(cells, &meta.children, out, rng),
        _ => {
            let (first, second) = nodes.split_at(balanced_split(nodes));
            let (low_nodes, high_nodes) = if rng.gen_bool(0.5) {
                (first, second)
            } else {
                (second, first)
            };
            let low_ratio: f64 = low_nodes.iter().map(RoomNode::ratio).sum();
            let high_ratio: f64 = high_nodes.iter().map(RoomNode::ratio).sum();
            let target = low_ratio / (low_ratio + high_ratio);
            let low_need: usize = low_nodes.iter().map(RoomNode::leaf_count).sum();
            let high_need: usize = high_nodes.iter().map(RoomNode::leaf_count).sum();

            let (low, high) = best_cut(cells, target, low_need, high_need, rng).ok_or_else(|| {
                GenerationError::Floorplan(format!(
                    "no cut of {} cells fits {} + {} rooms",
                    cells.len(),
                    low_need,
                    high_need
                ))
            })?;
            assign(&low, low_nodes, out, rng)?;
            assign(&high, high_nodes, out, rng)
        }
    }
}

/// Split index that best balances the ratio sums of both halves.
fn balanced_split(nodes: &[RoomNode]) -> usize {
    let total: f64 = nodes.iter().map(RoomNode::ratio).sum();
    let mut acc = 0.0;
    let mut best = (1, f64::INFINITY);
    for (k, node) in nodes.iter().enumerate().take(nodes.len() - 1) {
        acc += node.ratio();
        let diff = (acc - total / 2.0).abs();
        if diff < best.1 {
            best = (k + 1, diff);
        }
    }
    best.0
}

type Cells = Vec<(usize, usize)>;

/// Straight cut whose low side's area share is closest to `target`.
fn best_cut<R: Rng + ?Sized>(
    cells: &[(usize, usize)],
    target: f64,
    low_need: usize,
    high_need: usize,
    rng: &mut R,
) -> Option<(Cells, Cells)> {
    let extent = |axis: usize| {
        let coords = cells.iter().map(|&(r, c)| if axis == 0 { r } else { c });
        let lo = coords.clone().min().unwrap_or(0);
        let hi = coords.max().unwrap_or(0);
        (lo, hi)
    };
    let spans = [extent(0), extent(1)];
    let longer = if spans[0].1 - spans[0].0 >= spans[1].1 - spans[1].0 { 0 } else { 1 };

    let mut best: Option<(f64, Cells, Cells)> = None;
    for axis in [0, 1] {
        let (lo, hi) = spans[axis];
        for cut in lo + 1..=hi {
            let (low, high): (Cells, Cells) = cells
                .iter()
                .partition(|&&(r, c)| if axis == 0 { r < cut } else { c < cut });
            if low.len() < low_need || high.len() < high_need {
                continue;
            }
            if !is_connected(&low) || !is_connected(&high) {
                continue;
            }
            let share = low.len() as f64 / cells.len() as f64;
            let mut score = (share - target).abs() + rng.gen::<f64>() * 0.02;
            if axis != longer {
                score += 0.05;
            }
            if best.as_ref().map_or(true, |(s, _, _)| score < *s) {
                best = Some((score, low, high));
            }
        }
    }
    best.map(|(_, low, high)| (low, high))
}

fn is_connected(cells: &[(usize, usize)]) -> bool {
    let Some(&start) = cells.first() else {
        return false;
    };
    let set: HashSet<(usize, usize)> = cells.iter().copied().collect();
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some((r, c)) = queue.pop_front() {
        let neighbors = [
            (r.wrapping_sub(1), c),
            (r + 1, c),
            (r, c.wrapping_sub(1)),
            (r, c + 1),
        ];
        for n in neighbors {
            if set.contains(&n) && seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
    seen.len() == set.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room_spec::RoomType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn four_rooms() -> RoomSpec {
        RoomSpec::new(vec![
            RoomNode::leaf(1, RoomType::Kitchen, 2.0),
            RoomNode::leaf(2, RoomType::LivingRoom, 3.0),
            RoomNode::meta(vec![
                RoomNode::leaf(3, RoomType::Bedroom, 2.0),
                RoomNode::leaf(4, RoomType::Bathroom, 1.0),
            ]),
        ])
        .with_dims(6, 7)
    }

    fn cells_of(grid: &FloorGrid, ids: &[u32]) -> Vec<(usize, usize)> {
        grid.interior_cells()
            .filter(|(_, _, id)| ids.contains(id))
            .map(|(r, c, _)| (r, c))
            .collect()
    }

    #[test]
    fn boundary_keeps_center_cross() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..50 {
            let b = sample_interior_boundary(7, 7, 4, &mut rng);
            assert!(b[3].iter().all(|c| *c));
            assert!(b.iter().all(|row| row[3]));
        }
    }

    #[test]
    fn every_room_is_connected_and_present() {
        let spec = four_rooms();
        let config = GenerationConfig::default();
        for seed in 0..30 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let grid = generate_floorplan(&spec, &config, &mut rng).unwrap();
            assert_eq!(grid.room_ids(), vec![1, 2, 3, 4]);
            for id in 1..=4 {
                assert!(is_connected(&cells_of(&grid, &[id])), "room {} split", id);
            }
            assert!(is_connected(&cells_of(&grid, &[3, 4])), "meta group split");
        }
    }

    #[test]
    fn padding_ring_is_exterior() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let grid = generate_floorplan(&four_rooms(), &GenerationConfig::default(), &mut rng).unwrap();
        assert_eq!(grid.rows(), 8);
        assert_eq!(grid.cols(), 9);
        for c in 0..grid.cols() {
            assert_eq!(grid.get(0, c), EXTERIOR_ROOM_ID);
            assert_eq!(grid.get(grid.rows() - 1, c), EXTERIOR_ROOM_ID);
        }
    }

    #[test]
    fn area_follows_ratio_roughly() {
        let spec = RoomSpec::new(vec![
            RoomNode::leaf(1, RoomType::Bedroom, 1.0),
            RoomNode::leaf(2, RoomType::LivingRoom, 3.0),
        ])
        .with_dims(8, 8);
        let boundary = vec![vec![true; 8]; 8];
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let interior = partition_rooms(&boundary, &spec, &mut rng).unwrap();
        let grid = FloorGrid::from_interior(&interior);
        let small = grid.cell_count(1) as f64;
        assert!((small / 64.0 - 0.25).abs() < 0.15, "share {}", small / 64.0);
    }

    #[test]
    fn derived_dims_scale_with_rooms() {
        let config = GenerationConfig::default();
        let one = RoomSpec::new(vec![RoomNode::leaf(1, RoomType::Bedroom, 1.0)]);
        let (r1, c1) = grid_dims(&one, &config);
        let (r4, c4) = grid_dims(&four_rooms_without_dims(), &config);
        assert!(r4 * c4 > r1 * c1);
    }

    fn four_rooms_without_dims() -> RoomSpec {
        let mut spec = four_rooms();
        spec.dims = None;
        spec
    }

    #[test]
    fn too_many_rooms_for_grid_fails() {
        let spec = RoomSpec::new(vec![
            RoomNode::leaf(1, RoomType::Bedroom, 1.0),
            RoomNode::leaf(2, RoomType::Bedroom, 1.0),
            RoomNode::leaf(3, RoomType::Bedroom, 1.0),
        ]);
        let boundary = vec![vec![true; 2]; 1];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            partition_rooms(&boundary, &spec, &mut rng),
            Err(GenerationError::Floorplan(_))
        ));
    }
}

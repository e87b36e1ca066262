//! Player and agent spawn points.

use rand::prelude::*;

use crate::constants::{retries, spawn};
use crate::error::{GenerationError, Result};
use crate::geom::{normalize_degrees, uniform, Rect};
use crate::house::HouseStructure;
use crate::rect_index::RectIndex;
use crate::room::Room;
use crate::scene::Spawn;

/// Pick a free spot in a random interior cell and reserve it.
pub fn place_spawn<R: Rng + ?Sized>(
    what: &'static str,
    house: &HouseStructure,
    rooms: &mut [Room],
    floor_index: &mut RectIndex,
    rng: &mut R,
) -> Result<(f64, f64)> {
    let cells: Vec<(usize, usize, u32)> = house.grid.interior_cells().collect();
    let u = house.unit_size;
    let m = spawn::CELL_EDGE_MARGIN;
    for _ in 0..retries::MAX_SPAWN_RETRIES {
        let Some(&(row, col, room_id)) = cells.choose(rng) else { break };
        let (cx, cz) = house.cell_center(row, col);
        let x = uniform(rng, cx - u / 2.0 + m, cx + u / 2.0 - m);
        let z = uniform(rng, cz - u / 2.0 + m, cz + u / 2.0 - m);
        let footprint = Rect::centered(x, z, spawn::FOOTPRINT, spawn::FOOTPRINT);
        if !floor_index.place(what, footprint) {
            continue;
        }
        if let Some(room) = rooms.iter_mut().find(|r| r.room_id == room_id) {
            room.reserve(&footprint);
        }
        return Ok((x, z));
    }
    Err(GenerationError::SpawnFailed {
        what,
        retries: retries::MAX_SPAWN_RETRIES,
    })
}

/// Player looking at the agent; the agent faces a random way.
pub fn spawn_pair<R: Rng + ?Sized>(player: (f64, f64), agent: (f64, f64), rng: &mut R) -> (Spawn, Spawn) {
    let (dx, dz) = (agent.0 - player.0, agent.1 - player.1);
    let player_yaw = normalize_degrees(dx.atan2(dz).to_degrees());
    let agent_yaw = uniform(rng, 0.0, 360.0);
    (
        Spawn {
            position: [player.0, 0.0, player.1],
            rotation: [0.0, player_yaw, 0.0],
        },
        Spawn {
            position: [agent.0, 0.0, agent.1],
            rotation: [0.0, agent_yaw, 0.0],
        },
    )
}

/// Camera orbit target over the interior, high enough to see it all.
pub fn camera_center(house: &HouseStructure) -> [f64; 3] {
    let (x_len, z_len) = house.extent();
    [x_len / 2.0, spawn::MIN_CAMERA_HEIGHT.max(z_len + 2.0), z_len / 2.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::floorplan::FloorGrid;
    use crate::house::house_from_grid;
    use crate::room_spec::RoomType;
    use approx::assert_relative_eq;
    use rand_chacha::ChaCha8Rng;

    fn house() -> HouseStructure {
        house_from_grid(FloorGrid::from_interior(&[vec![1, 1]]), &GenerationConfig::default()).unwrap()
    }

    #[test]
    fn spawns_do_not_overlap_and_reserve_space() {
        let house = house();
        let mut rooms = vec![Room::new(1, RoomType::Bedroom, &house.room_polygons[&1])];
        let before = rooms[0].open_polygon.area();
        let mut index = RectIndex::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = place_spawn("player", &house, &mut rooms, &mut index, &mut rng).unwrap();
        let b = place_spawn("agent", &house, &mut rooms, &mut index, &mut rng).unwrap();
        assert!(!Rect::centered(a.0, a.1, 0.3, 0.3).intersects(&Rect::centered(b.0, b.1, 0.3, 0.3)));
        assert!(rooms[0].room_polygon.is_point_inside(a.0, a.1));
        assert!(rooms[0].open_polygon.area() < before);
    }

    #[test]
    fn full_index_exhausts_retries() {
        let house = house();
        let mut rooms = Vec::new();
        let mut index = RectIndex::new();
        index.insert("wall", Rect::new(-10.0, -10.0, 20.0, 20.0));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let err = place_spawn("player", &house, &mut rooms, &mut index, &mut rng).unwrap_err();
        assert!(matches!(err, GenerationError::SpawnFailed { what: "player", .. }));
    }

    #[test]
    fn player_looks_at_agent() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (player, agent) = spawn_pair((0.0, 0.0), (1.0, 0.0), &mut rng);
        assert_relative_eq!(player.rotation[1], 90.0, epsilon = 1e-9);
        assert!((0.0..=360.0).contains(&agent.rotation[1]));
    }

    #[test]
    fn camera_rises_with_depth() {
        let c = camera_center(&house());
        assert_relative_eq!(c[1], 12.0);
        assert_relative_eq!(c[0], 1.25);
    }
}

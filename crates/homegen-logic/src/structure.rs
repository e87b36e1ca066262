//! Floors, walls and doors as scene instances.
//!
//! Every interior cell gets a floor tile. Every unit wall segment gets one
//! half-thickness wall per interior side, so each room owns the face it
//! sees. Openings swap in the with-door wall prefab, add a door panel for
//! doored openings, or drop the wall entirely for open connections.

use std::collections::BTreeMap;

use rand::prelude::*;

use crate::config::GenerationConfig;
use crate::constants::{doors, EXTERIOR_ROOM_ID};
use crate::database::ObjectDatabase;
use crate::doors::{DoorOpening, OpeningKind};
use crate::error::Result;
use crate::geom::Rect;
use crate::house::{HouseStructure, RoomPair, WallSegment};
use crate::scene::{Instance, InstanceRole};

/// Structural instances plus the clearance each opening reserves.
#[derive(Debug, Clone, Default)]
pub struct StructureInstances {
    pub instances: Vec<Instance>,
    pub clearances: Vec<(RoomPair, Rect)>,
}

struct RoomPrefabs<'db> {
    floor: &'db str,
    wall: &'db str,
    wall_with_door: &'db str,
}

pub fn instantiate_structure<R: Rng + ?Sized>(
    house: &HouseStructure,
    openings: &[DoorOpening],
    db: &ObjectDatabase,
    config: &GenerationConfig,
    rng: &mut R,
) -> Result<StructureInstances> {
    let structure = &db.structure;
    let mut prefabs: BTreeMap<u32, RoomPrefabs<'_>> = BTreeMap::new();
    for room_id in house.grid.room_ids() {
        let (Some(floor), Some(wall)) = (structure.floors.choose(rng), structure.walls.choose(rng)) else {
            continue;
        };
        prefabs.insert(
            room_id,
            RoomPrefabs {
                floor,
                wall: &wall.solid,
                wall_with_door: &wall.with_door,
            },
        );
    }

    let mut out = StructureInstances::default();
    let u = house.unit_size;

    for (row, col, room_id) in house.grid.interior_cells() {
        let Some(p) = prefabs.get(&room_id) else { continue };
        let size = db.require_prefab(p.floor)?.size;
        let (x, z) = house.cell_center(row, col);
        let mut tile = Instance::new(p.floor, [x, -size.y / 2.0, z], 90.0, InstanceRole::Floor, room_id);
        tile.scale = [u / size.x, 1.0, u / size.z];
        out.instances.push(tile);
    }

    let door_prefab = match structure.doors.choose(rng) {
        Some(id) => id.as_str(),
        None => return Ok(out),
    };
    let door_size = db.require_prefab(door_prefab)?.size;

    for segments in house.unit_walls.values() {
        for seg in segments {
            let opening = openings.iter().find(|o| o.unit == *seg);
            if opening.is_some_and(|o| o.kind == OpeningKind::Open) {
                continue;
            }
            let holed = opening.is_some();
            for (room_id, yaw, toward) in wall_sides(house, seg) {
                if room_id == EXTERIOR_ROOM_ID {
                    continue;
                }
                let Some(p) = prefabs.get(&room_id) else { continue };
                let prefab = if holed { p.wall_with_door } else { p.wall };
                let size = db.require_prefab(prefab)?.size;
                let (mx, mz) = seg.world_midpoint(u);
                let offset = size.z / 4.0;
                let position = [mx + toward.0 * offset, config.wall_height / 2.0, mz + toward.1 * offset];
                let mut wall = Instance::new(prefab, position, yaw, InstanceRole::Wall, room_id);
                wall.scale = [u / size.x, config.wall_height / size.y, 0.5];
                out.instances.push(wall);
            }
        }
    }

    for opening in openings {
        let (mx, mz) = opening.unit.world_midpoint(u);
        let along = door_size.x + 2.0 * doors::PADDING_BESIDE_DOOR;
        let across = 2.0 * config.door_clearance;
        let clearance = if opening.unit.is_vertical() {
            Rect::centered(mx, mz, across, along)
        } else {
            Rect::centered(mx, mz, along, across)
        };
        out.clearances.push((opening.rooms, clearance));

        if opening.kind != OpeningKind::Doored {
            continue;
        }
        let yaw = if opening.unit.is_vertical() { 90.0 } else { 0.0 };
        let owner = if opening.rooms.0 == EXTERIOR_ROOM_ID {
            opening.rooms.1
        } else {
            opening.rooms.0
        };
        let mut door = Instance::new(door_prefab, [mx, door_size.y / 2.0, mz], yaw, InstanceRole::Door, owner);
        door.connects = Some(opening.rooms);
        out.instances.push(door);
    }

    Ok(out)
}

/// Room on each side of a unit segment, with the yaw of its wall half and
/// the unit direction from the segment into that room.
fn wall_sides(house: &HouseStructure, seg: &WallSegment) -> [(u32, f64, (f64, f64)); 2] {
    let grid = &house.grid;
    if seg.is_vertical() {
        let (line, cell) = (seg.p0.x as usize, seg.p1.z as usize);
        [
            (grid.get(line, cell), 270.0, (-1.0, 0.0)),
            (grid.get(line + 1, cell), 90.0, (1.0, 0.0)),
        ]
    } else {
        let (cell, line) = (seg.p1.x as usize, seg.p0.z as usize);
        [
            (grid.get(cell, line), 180.0, (0.0, -1.0)),
            (grid.get(cell, line + 1), 0.0, (0.0, 1.0)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floorplan::FloorGrid;
    use crate::house::{house_from_grid, GridPoint};
    use rand_chacha::ChaCha8Rng;

    const DB_JSON: &str = include_str!("../../../data/object_db.json");

    fn two_rooms() -> HouseStructure {
        house_from_grid(
            FloorGrid::from_interior(&[vec![1, 1], vec![2, 2]]),
            &GenerationConfig::default(),
        )
        .unwrap()
    }

    fn opening(house: &HouseStructure, kind: OpeningKind) -> DoorOpening {
        let pair = RoomPair::new(1, 2);
        let wall = house.boundary_groups[&pair][0];
        DoorOpening {
            rooms: pair,
            wall,
            unit: wall.unit_segments()[0],
            kind,
        }
    }

    fn count(out: &StructureInstances, role: InstanceRole) -> usize {
        out.instances.iter().filter(|i| i.role == role).count()
    }

    #[test]
    fn floors_and_walls_without_openings() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let house = two_rooms();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let out = instantiate_structure(&house, &[], &db, &GenerationConfig::default(), &mut rng).unwrap();
        assert_eq!(count(&out, InstanceRole::Floor), 4);
        // 8 exterior unit segments with one half each, 2 interior with two.
        assert_eq!(count(&out, InstanceRole::Wall), 12);
        assert_eq!(count(&out, InstanceRole::Door), 0);
        assert!(out.clearances.is_empty());
    }

    #[test]
    fn doored_opening_adds_a_door_between_the_rooms() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let house = two_rooms();
        let door = opening(&house, OpeningKind::Doored);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let out = instantiate_structure(&house, &[door], &db, &GenerationConfig::default(), &mut rng).unwrap();
        let doors: Vec<&Instance> = out.instances.iter().filter(|i| i.role == InstanceRole::Door).collect();
        assert_eq!(doors.len(), 1);
        assert_eq!(doors[0].connects, Some(RoomPair::new(1, 2)));
        assert_eq!(out.clearances.len(), 1);
        assert!(out.clearances[0].1.contains_point(doors[0].position[0], doors[0].position[2]));
    }

    #[test]
    fn open_connection_removes_the_wall() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let house = two_rooms();
        let open = opening(&house, OpeningKind::Open);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let out = instantiate_structure(&house, &[open], &db, &GenerationConfig::default(), &mut rng).unwrap();
        assert_eq!(count(&out, InstanceRole::Wall), 10);
        assert_eq!(count(&out, InstanceRole::Door), 0);
    }

    #[test]
    fn wall_halves_face_their_rooms() {
        let house = two_rooms();
        // Line x = 1 separates row 1 (room 1) from row 2 (room 2).
        let seg = WallSegment {
            p0: GridPoint::new(1, 0),
            p1: GridPoint::new(1, 1),
            rooms: RoomPair::new(1, 2),
        };
        let sides = wall_sides(&house, &seg);
        assert_eq!(sides[0].0, 1);
        assert_eq!(sides[1].0, 2);
    }
}

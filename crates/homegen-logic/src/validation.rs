//! Invariant checks for generated scenes.
//!
//! Pure functions over a [`SceneDocument`]; each returns the problems it
//! found. Used by the integration tests and the headless harness.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::constants::EXTERIOR_ROOM_ID;
use crate::doors::OpeningKind;
use crate::geom::Rect;
use crate::polygon::OrthogonalPolygon;
use crate::scene::{InstanceRole, SceneDocument};

/// A scene validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

/// Shrink applied before overlap tests so shared edges never count.
const TOUCH_TOLERANCE: f64 = 1e-6;

// ── A. Overlaps ─────────────────────────────────────────────────────────

fn check_role_overlaps(scene: &SceneDocument, role: InstanceRole, category: &'static str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut by_room: BTreeMap<u32, Vec<(usize, Rect)>> = BTreeMap::new();
    for (idx, inst) in scene.instances_with_role(role) {
        // Stacked group members share their parent's floor space.
        if role == InstanceRole::FloorObject && inst.parent.is_some() {
            continue;
        }
        if let Some(bbox) = inst.bbox {
            by_room.entry(inst.room_id).or_default().push((idx, bbox));
        }
    }
    for (room_id, boxes) in &by_room {
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                let (a_idx, a) = boxes[i];
                let (b_idx, b) = boxes[j];
                if a.expanded(-TOUCH_TOLERANCE).intersects(&b) {
                    errors.push(ValidationError {
                        category,
                        severity: Severity::Error,
                        message: format!(
                            "Room #{}: instance {} ({}) overlaps instance {} ({})",
                            room_id, a_idx, scene.instances[a_idx].prefab, b_idx, scene.instances[b_idx].prefab
                        ),
                    });
                }
            }
        }
    }
    errors
}

/// Floor objects in the same room never overlap.
pub fn check_floor_overlaps(scene: &SceneDocument) -> Vec<ValidationError> {
    check_role_overlaps(scene, InstanceRole::FloorObject, "floor_objects")
}

/// Small objects in the same room never overlap.
pub fn check_small_object_overlaps(scene: &SceneDocument) -> Vec<ValidationError> {
    check_role_overlaps(scene, InstanceRole::SmallObject, "small_objects")
}

/// No receptacle holds more than `max` small objects.
pub fn check_receptacle_loads(scene: &SceneDocument, max: u32) -> Vec<ValidationError> {
    let mut loads: HashMap<usize, u32> = HashMap::new();
    for (_, inst) in scene.instances_with_role(InstanceRole::SmallObject) {
        if let Some(parent) = inst.parent {
            *loads.entry(parent).or_default() += 1;
        }
    }
    let mut errors: Vec<ValidationError> = loads
        .into_iter()
        .filter(|(_, n)| *n > max)
        .map(|(idx, n)| ValidationError {
            category: "small_objects",
            severity: Severity::Error,
            message: format!("Receptacle {} holds {} objects (max {})", idx, n, max),
        })
        .collect();
    errors.sort_by(|a, b| a.message.cmp(&b.message));
    errors
}

// ── B. Spawns ───────────────────────────────────────────────────────────

/// Player and agent stand strictly inside a room.
pub fn check_spawns_inside_rooms(scene: &SceneDocument) -> Vec<ValidationError> {
    let polygons: Vec<OrthogonalPolygon> = scene
        .rooms
        .iter()
        .map(|r| OrthogonalPolygon::from_points(&r.polygon))
        .collect();
    let mut errors = Vec::new();
    for (name, spawn) in [("player", &scene.player), ("agent", &scene.agent)] {
        let (x, z) = (spawn.position[0], spawn.position[2]);
        if !polygons.iter().any(|p| p.is_point_inside(x, z)) {
            errors.push(ValidationError {
                category: "spawns",
                severity: Severity::Error,
                message: format!("{} spawn ({:.2}, {:.2}) is outside every room", name, x, z),
            });
        }
    }
    errors
}

// ── C. Connectivity ─────────────────────────────────────────────────────

/// Interior openings connect every room (BFS from the first room).
pub fn check_connectivity(scene: &SceneDocument) -> Vec<ValidationError> {
    let rooms: BTreeSet<u32> = scene.rooms.iter().map(|r| r.room_id).collect();
    let Some(&start) = rooms.iter().next() else {
        return Vec::new();
    };
    let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for o in &scene.openings {
        if o.rooms.touches_exterior() {
            continue;
        }
        adjacency.entry(o.rooms.0).or_default().push(o.rooms.1);
        adjacency.entry(o.rooms.1).or_default().push(o.rooms.0);
    }
    let mut visited = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(room) = queue.pop_front() {
        for &next in adjacency.get(&room).map(Vec::as_slice).unwrap_or(&[]) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    rooms
        .difference(&visited)
        .map(|id| ValidationError {
            category: "connectivity",
            severity: Severity::Error,
            message: format!("Room #{} is unreachable from room #{}", id, start),
        })
        .collect()
}

/// Every doored opening has a door instance joining the same rooms.
pub fn check_doors_instantiated(scene: &SceneDocument) -> Vec<ValidationError> {
    let doors: BTreeSet<_> = scene
        .instances_with_role(InstanceRole::Door)
        .filter_map(|(_, i)| i.connects)
        .collect();
    scene
        .openings
        .iter()
        .filter(|o| o.kind == OpeningKind::Doored && !doors.contains(&o.rooms))
        .map(|o| ValidationError {
            category: "doors",
            severity: Severity::Error,
            message: format!("Opening {}↔{} has no door instance", o.rooms.0, o.rooms.1),
        })
        .collect()
}

/// Every room has at least one opening.
pub fn check_rooms_have_openings(scene: &SceneDocument) -> Vec<ValidationError> {
    scene
        .rooms
        .iter()
        .filter(|r| r.room_id != EXTERIOR_ROOM_ID)
        .filter(|r| !scene.openings.iter().any(|o| o.rooms.contains(r.room_id)))
        .map(|r| ValidationError {
            category: "doors",
            severity: Severity::Warning,
            message: format!("Room #{} ({:?}) has no opening", r.room_id, r.room_type),
        })
        .collect()
}

// ── Run all ─────────────────────────────────────────────────────────────

pub fn validate_scene(scene: &SceneDocument, max_per_receptacle: u32) -> Vec<ValidationError> {
    let mut all = Vec::new();
    all.extend(check_floor_overlaps(scene));
    all.extend(check_small_object_overlaps(scene));
    all.extend(check_receptacle_loads(scene, max_per_receptacle));
    all.extend(check_spawns_inside_rooms(scene));
    all.extend(check_connectivity(scene));
    all.extend(check_doors_instantiated(scene));
    all.extend(check_rooms_have_openings(scene));
    all
}

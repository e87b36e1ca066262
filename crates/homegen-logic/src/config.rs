//! Generation tunables and their validation.
//!
//! ```
//! use homegen_logic::config::{validate_config, GenerationConfig};
//!
//! let mut config = GenerationConfig::default();
//! config.max_floor_objects = 8;
//! assert!(validate_config(&config).is_empty());
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{doors, grid, placement, retries, small_objects};
use crate::room_spec::RoomType;

/// Front/back/side clearance for a wall-anchored object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideMargins {
    pub front: f64,
    pub back: f64,
    pub sides: f64,
}

/// Clearances added around footprints before they are cut from the open area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub middle: f64,
    pub edge: SideMargins,
    pub corner: SideMargins,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            middle: placement::MARGIN_MIDDLE,
            edge: SideMargins {
                front: placement::MARGIN_EDGE_FRONT,
                back: placement::MARGIN_EDGE_BACK,
                sides: placement::MARGIN_EDGE_SIDES,
            },
            corner: SideMargins {
                front: placement::MARGIN_CORNER_FRONT,
                back: placement::MARGIN_CORNER_BACK,
                sides: placement::MARGIN_CORNER_SIDES,
            },
        }
    }
}

/// Two room types that may be joined without a door.
///
/// `p` is the chance the connection is open at all; `p_frame` the chance an
/// open connection keeps an empty doorframe instead of removing the wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenConnectionRule {
    pub rooms: (RoomType, RoomType),
    pub p: f64,
    pub p_frame: f64,
}

impl OpenConnectionRule {
    pub fn matches(&self, a: RoomType, b: RoomType) -> bool {
        (self.rooms.0 == a && self.rooms.1 == b) || (self.rooms.0 == b && self.rooms.1 == a)
    }
}

/// How a door wall is chosen among the consolidated segments of a room pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DoorWallChoice {
    #[default]
    Uniform,
    LengthWeighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub unit_size: f64,
    pub wall_thickness: f64,
    pub wall_height: f64,
    pub cells_per_room: u32,

    pub max_floor_objects: u32,
    pub p_choose_edge: f64,
    pub p_largest_rectangle: f64,
    pub p_choose_asset_group: f64,
    pub p_w1_asset_skipped: f64,
    pub min_rectangle_side: f64,
    pub padding_against_wall: f64,
    pub corner_probe_epsilon: f64,
    pub margins: Margins,

    pub min_doors_to_outside: u32,
    pub max_doors_to_outside: u32,
    pub preferred_rooms_to_outside: Vec<RoomType>,
    pub open_room_connections: Vec<OpenConnectionRule>,
    pub door_wall_choice: DoorWallChoice,
    pub door_clearance: f64,

    pub max_objects_on_receptacle: u32,
    pub max_objects_on_surface: u32,
    pub small_object_margin: f64,
    pub max_object_types_per_room: u32,
    pub max_place_on_surface_retries: u32,

    /// Extra gap the rectangle index demands between neighbours.
    pub rect_index_gap: f64,
    pub max_neighbor_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            unit_size: grid::UNIT_SIZE,
            wall_thickness: grid::WALL_THICKNESS,
            wall_height: grid::WALL_HEIGHT,
            cells_per_room: grid::CELLS_PER_ROOM,
            max_floor_objects: placement::MAX_FLOOR_OBJECTS,
            p_choose_edge: placement::P_CHOOSE_EDGE,
            p_largest_rectangle: placement::P_LARGEST_RECTANGLE,
            p_choose_asset_group: placement::P_CHOOSE_ASSET_GROUP,
            p_w1_asset_skipped: placement::P_W1_ASSET_SKIPPED,
            min_rectangle_side: placement::MIN_RECTANGLE_SIDE_SIZE,
            padding_against_wall: placement::PADDING_AGAINST_WALL,
            corner_probe_epsilon: placement::CORNER_PROBE_EPSILON,
            margins: Margins::default(),
            min_doors_to_outside: doors::MIN_DOORS_TO_OUTSIDE,
            max_doors_to_outside: doors::MAX_DOORS_TO_OUTSIDE,
            preferred_rooms_to_outside: vec![RoomType::Kitchen, RoomType::LivingRoom],
            open_room_connections: vec![OpenConnectionRule {
                rooms: (RoomType::Kitchen, RoomType::LivingRoom),
                p: doors::P_OPEN_CONNECTION,
                p_frame: doors::P_OPEN_CONNECTION_FRAME,
            }],
            door_wall_choice: DoorWallChoice::Uniform,
            door_clearance: doors::DOOR_CLEARANCE,
            max_objects_on_receptacle: small_objects::MAX_OBJECT_NUM_ON_RECEPTACLE,
            max_objects_on_surface: small_objects::MAX_OBJECT_NUM_ON_SURFACE,
            small_object_margin: small_objects::SMALL_OBJECT_MIN_MARGIN,
            max_object_types_per_room: small_objects::MAX_OBJECT_TYPES_PER_ROOM,
            max_place_on_surface_retries: retries::MAX_PLACE_ON_SURFACE_RETRIES,
            rect_index_gap: 0.0,
            max_neighbor_retries: retries::MAX_NEIGHBOR_RETRIES,
        }
    }
}

/// A problem with a [`GenerationConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A probability outside `[0, 1]`.
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    /// A length that must be strictly positive.
    NonPositive { field: &'static str, value: f64 },
    /// A length that must not be negative.
    Negative { field: &'static str, value: f64 },
    /// A count or cap that must be at least one.
    ZeroCap(&'static str),
    /// More minimum than maximum exterior doors.
    ExteriorDoorRange { min: u32, max: u32 },
    /// Walls as thick as half a cell leave no floor.
    WallTooThick { thickness: f64, unit_size: f64 },
}

/// Collect every problem with `config`; empty means valid.
pub fn validate_config(config: &GenerationConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    let probabilities = [
        ("p_choose_edge", config.p_choose_edge),
        ("p_largest_rectangle", config.p_largest_rectangle),
        ("p_choose_asset_group", config.p_choose_asset_group),
        ("p_w1_asset_skipped", config.p_w1_asset_skipped),
    ];
    for (field, value) in probabilities {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::ProbabilityOutOfRange { field, value });
        }
    }
    for rule in &config.open_room_connections {
        for (field, value) in [("open_room_connections.p", rule.p), ("open_room_connections.p_frame", rule.p_frame)] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ConfigError::ProbabilityOutOfRange { field, value });
            }
        }
    }

    for (field, value) in [
        ("unit_size", config.unit_size),
        ("wall_thickness", config.wall_thickness),
        ("wall_height", config.wall_height),
        ("min_rectangle_side", config.min_rectangle_side),
        ("corner_probe_epsilon", config.corner_probe_epsilon),
    ] {
        if value <= 0.0 {
            errors.push(ConfigError::NonPositive { field, value });
        }
    }

    let m = &config.margins;
    for (field, value) in [
        ("padding_against_wall", config.padding_against_wall),
        ("door_clearance", config.door_clearance),
        ("small_object_margin", config.small_object_margin),
        ("rect_index_gap", config.rect_index_gap),
        ("margins.middle", m.middle),
        ("margins.edge.front", m.edge.front),
        ("margins.edge.back", m.edge.back),
        ("margins.edge.sides", m.edge.sides),
        ("margins.corner.front", m.corner.front),
        ("margins.corner.back", m.corner.back),
        ("margins.corner.sides", m.corner.sides),
    ] {
        if value < 0.0 {
            errors.push(ConfigError::Negative { field, value });
        }
    }

    for (field, value) in [
        ("cells_per_room", config.cells_per_room),
        ("max_objects_on_receptacle", config.max_objects_on_receptacle),
        ("max_objects_on_surface", config.max_objects_on_surface),
        ("max_place_on_surface_retries", config.max_place_on_surface_retries),
        ("max_neighbor_retries", config.max_neighbor_retries),
    ] {
        if value == 0 {
            errors.push(ConfigError::ZeroCap(field));
        }
    }

    if config.min_doors_to_outside > config.max_doors_to_outside {
        errors.push(ConfigError::ExteriorDoorRange {
            min: config.min_doors_to_outside,
            max: config.max_doors_to_outside,
        });
    }
    if config.unit_size > 0.0 && config.wall_thickness * 2.0 >= config.unit_size {
        errors.push(ConfigError::WallTooThick {
            thickness: config.wall_thickness,
            unit_size: config.unit_size,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GenerationConfig::default()).is_empty());
    }

    #[test]
    fn probability_out_of_range() {
        let config = GenerationConfig {
            p_choose_edge: 1.5,
            ..Default::default()
        };
        assert!(validate_config(&config).contains(&ConfigError::ProbabilityOutOfRange {
            field: "p_choose_edge",
            value: 1.5
        }));
    }

    #[test]
    fn exterior_door_range_inverted() {
        let config = GenerationConfig {
            min_doors_to_outside: 3,
            max_doors_to_outside: 1,
            ..Default::default()
        };
        assert!(validate_config(&config)
            .contains(&ConfigError::ExteriorDoorRange { min: 3, max: 1 }));
    }

    #[test]
    fn zero_receptacle_cap_rejected() {
        let config = GenerationConfig {
            max_objects_on_receptacle: 0,
            ..Default::default()
        };
        assert!(validate_config(&config)
            .contains(&ConfigError::ZeroCap("max_objects_on_receptacle")));
    }

    #[test]
    fn wall_thicker_than_half_cell() {
        let config = GenerationConfig {
            wall_thickness: 1.5,
            ..Default::default()
        };
        assert!(validate_config(&config)
            .iter()
            .any(|e| matches!(e, ConfigError::WallTooThick { .. })));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"max_floor_objects": 4}"#).unwrap();
        assert_eq!(config.max_floor_objects, 4);
        assert_eq!(config.max_objects_on_receptacle, 3);
        assert_eq!(config.preferred_rooms_to_outside.len(), 2);
    }
}

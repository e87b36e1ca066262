//! Generation constants: ids, retry caps, and default tunables.
//!
//! Everything a caller may want to tweak is mirrored into
//! [`GenerationConfig`](crate::config::GenerationConfig); the values here
//! are its defaults plus a few structural constants that are not tunable.

/// Room id of the exterior sentinel ring around the interior boundary.
pub const EXTERIOR_ROOM_ID: u32 = 0;

pub mod grid {
    /// World size of one floorplan cell, in metres.
    pub const UNIT_SIZE: f64 = 2.5;
    /// Corner inset applied to room polygons.
    pub const WALL_THICKNESS: f64 = 0.1;
    pub const WALL_HEIGHT: f64 = 3.0;
    /// Cells per leaf room when the grid size is derived from the spec.
    pub const CELLS_PER_ROOM: u32 = 9;
    /// Largest derived grid side.
    pub const MAX_GRID_SIDE: u32 = 10;
    pub const MIN_GRID_SIDE: u32 = 2;
}

pub mod retries {
    /// Door search across subgroups before giving up.
    pub const MAX_NEIGHBOR_RETRIES: u32 = 100;
    /// Wall consolidation sweeps before giving up.
    pub const MAX_WALL_MERGE_ITERATIONS: u32 = 1_000;
    /// Interior boundary resamples when no room partition fits.
    pub const MAX_FLOORPLAN_RETRIES: u32 = 20;
    pub const MAX_SPAWN_RETRIES: u32 = 200;
    /// Resampling an asset group until it fits its rectangle.
    pub const MAX_INTERSECTING_OBJECT_RETRIES: u32 = 5;
    pub const MAX_PLACE_ON_SURFACE_RETRIES: u32 = 10;
    pub const MAX_SPECIFIED_RECTANGLE_RETRIES: u32 = 10;
    /// Upper bound on one requested receptacle's count.
    pub const MAX_SPECIFIED_NUMBER: u32 = 20;
}

pub mod placement {
    pub const MAX_FLOOR_OBJECTS: u32 = 15;
    pub const P_CHOOSE_EDGE: f64 = 0.7;
    pub const P_LARGEST_RECTANGLE: f64 = 0.8;
    pub const P_CHOOSE_ASSET_GROUP: f64 = 0.4;
    pub const P_W1_ASSET_SKIPPED: f64 = 0.8;
    pub const MIN_RECTANGLE_SIDE_SIZE: f64 = 0.5;
    /// Gap kept between a wall-anchored object and the wall.
    pub const PADDING_AGAINST_WALL: f64 = 0.05;
    /// Offset of the four diagonal probes in the corner test.
    pub const CORNER_PROBE_EPSILON: f64 = 1e-3;
    /// Fraction of a rectangle an object may occupy along an axis.
    pub const FIT_FRACTION: f64 = 0.9;

    pub const MARGIN_MIDDLE: f64 = 0.35;
    pub const MARGIN_EDGE_FRONT: f64 = 0.5;
    pub const MARGIN_EDGE_BACK: f64 = 0.0;
    pub const MARGIN_EDGE_SIDES: f64 = 0.0;
    pub const MARGIN_CORNER_FRONT: f64 = 0.5;
    pub const MARGIN_CORNER_BACK: f64 = 0.0;
    pub const MARGIN_CORNER_SIDES: f64 = 0.0;
}

pub mod doors {
    pub const MIN_DOORS_TO_OUTSIDE: u32 = 1;
    pub const MAX_DOORS_TO_OUTSIDE: u32 = 1;
    /// Clearance kept free on each side of a doorway.
    pub const DOOR_CLEARANCE: f64 = 1.0;
    /// Extra width kept free beside the door panel.
    pub const PADDING_BESIDE_DOOR: f64 = 0.1;
    pub const P_OPEN_CONNECTION: f64 = 0.75;
    pub const P_OPEN_CONNECTION_FRAME: f64 = 0.5;
}

pub mod small_objects {
    pub const MAX_OBJECT_NUM_ON_RECEPTACLE: u32 = 3;
    pub const MAX_OBJECT_NUM_ON_SURFACE: u32 = 2;
    pub const SMALL_OBJECT_MIN_MARGIN: f64 = 0.1;
    pub const MAX_OBJECT_TYPES_PER_ROOM: u32 = 10;
}

pub mod spawn {
    /// Distance kept from cell edges when sampling a spawn point.
    pub const CELL_EDGE_MARGIN: f64 = 0.5;
    pub const FOOTPRINT: f64 = 0.3;
    /// Minimum camera height for the orbit hint.
    pub const MIN_CAMERA_HEIGHT: f64 = 12.0;
}

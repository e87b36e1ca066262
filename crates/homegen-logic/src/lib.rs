//! Procedural house generation: floorplans, walls, doors and furniture.
//!
//! This crate turns a room adjacency spec, a static object database and a
//! seed into a plain scene document. Functions take plain data and return
//! results; the only I/O is JSON (de)serialization, so everything here is
//! unit-testable and safe to run from many threads against one database.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`anchor`] | Corner / edge / middle anchoring of objects in free rectangles |
//! | [`asset_groups`] | Asset group templates and their layout sampler |
//! | [`config`] | Generation tunables and their validation |
//! | [`constants`] | Grid sizes, probabilities, margins, retry caps |
//! | [`database`] | Static object database (prefabs, types, receptacles) |
//! | [`doors`] | Door and opening selection with guaranteed connectivity |
//! | [`error`] | Terminal generation errors |
//! | [`floorplan`] | Interior boundary sampling and room partitioning |
//! | [`generator`] | End-to-end pipeline behind [`HouseGenerator`] |
//! | [`geom`] | Floor-plane rectangles, yaw rotation, sampling helpers |
//! | [`house`] | Wall segments, consolidation, room polygons |
//! | [`placement`] | Floor asset and asset group placement |
//! | [`polygon`] | Orthogonal polygon decomposition into rectangles |
//! | [`rect_index`] | R-tree backed non-overlap index |
//! | [`room`] | Per-room open area, placed items, rectangle cache |
//! | [`room_spec`] | Room types and the room adjacency tree |
//! | [`scene`] | Output scene document |
//! | [`small_objects`] | Small objects on receptacle surfaces |
//! | [`spawn`] | Player / agent spawns and camera centre |
//! | [`structure`] | Floor, wall and door instances |
//! | [`validation`] | Scene invariant checks |

pub mod anchor;
pub mod asset_groups;
pub mod config;
pub mod constants;
pub mod database;
pub mod doors;
pub mod error;
pub mod floorplan;
pub mod generator;
pub mod geom;
pub mod house;
pub mod placement;
pub mod polygon;
pub mod rect_index;
pub mod room;
pub mod room_spec;
pub mod scene;
pub mod small_objects;
pub mod spawn;
pub mod structure;
pub mod validation;

pub use config::GenerationConfig;
pub use database::ObjectDatabase;
pub use error::{GenerationError, Result};
pub use generator::HouseGenerator;
pub use placement::{ReceptacleRequest, SceneRequest};
pub use room_spec::{RoomNode, RoomSpec, RoomType};
pub use scene::SceneDocument;

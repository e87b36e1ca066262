//! Terminal generation errors.
//!
//! Only structurally unsatisfiable requests end up here. A rectangle that
//! fits nothing or a small object with no free surface is an `Option`, not
//! an error.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("invalid room spec: {0}")]
    InvalidRoomSpec(String),

    #[error("invalid generation config: {0:?}")]
    InvalidConfig(Vec<ConfigError>),

    #[error("floorplan sampling failed: {0}")]
    Floorplan(String),

    #[error("walls of room {room_id} do not close: no connecting wall at {at:?}")]
    OpenWallLoop { room_id: u32, at: (i32, i32) },

    #[error("wall consolidation did not converge after {0} iterations")]
    WallMergeDiverged(u32),

    #[error("could not connect room groups {groups:?} after {retries} retries")]
    UnconnectableRooms { groups: Vec<Vec<u32>>, retries: u32 },

    #[error("could not place {what} after {retries} retries")]
    SpawnFailed { what: &'static str, retries: u32 },

    #[error("object database: {0}")]
    Database(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GenerationError>;

//! Output scene document handed to the renderer.

use serde::{Deserialize, Serialize};

use crate::doors::DoorOpening;
use crate::error::Result;
use crate::geom::Rect;
use crate::house::RoomPair;
use crate::room_spec::RoomType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    Interactable,
    Kinematic,
    Receptacle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceRole {
    Floor,
    Wall,
    Door,
    FloorObject,
    SmallObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub prefab: String,
    pub position: [f64; 3],
    /// Euler angles in degrees; only yaw is ever non-zero.
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    #[serde(rename = "type")]
    pub instance_type: InstanceType,
    pub role: InstanceRole,
    pub room_id: u32,
    /// Index of the instance this one rests on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    /// Rooms joined by a door.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connects: Option<RoomPair>,
    /// Top-down bounds used for overlap bookkeeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Rect>,
}

impl Instance {
    pub fn new(prefab: impl Into<String>, position: [f64; 3], yaw: f64, role: InstanceRole, room_id: u32) -> Self {
        Self {
            prefab: prefab.into(),
            position,
            rotation: [0.0, yaw, 0.0],
            scale: [1.0, 1.0, 1.0],
            instance_type: InstanceType::Kinematic,
            role,
            room_id,
            parent: None,
            connects: None,
            bbox: None,
        }
    }

    pub fn yaw(&self) -> f64 {
        self.rotation[1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spawn {
    pub position: [f64; 3],
    pub rotation: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub room_id: u32,
    pub room_type: RoomType,
    /// Closed floor outline, `(x, z)` per vertex.
    pub polygon: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    pub instances: Vec<Instance>,
    pub player: Spawn,
    pub agent: Spawn,
    /// Camera orbit target and height.
    pub center: [f64; 3],
    pub rooms: Vec<RoomRecord>,
    pub openings: Vec<DoorOpening>,
}

impl SceneDocument {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn instances_with_role(&self, role: InstanceRole) -> impl Iterator<Item = (usize, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .filter(move |(_, i)| i.role == role)
    }

    pub fn room(&self, room_id: u32) -> Option<&RoomRecord> {
        self.rooms.iter().find(|r| r.room_id == room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_type_serializes_lowercase() {
        let mut inst = Instance::new("Apple_01", [1.0, 0.8, 2.0], 90.0, InstanceRole::SmallObject, 3);
        inst.instance_type = InstanceType::Interactable;
        inst.parent = Some(4);
        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(json["type"], "interactable");
        assert_eq!(json["role"], "smallObject");
        assert_eq!(json["roomId"], 3);
        assert_eq!(json["parent"], 4);
        assert!(json.get("connects").is_none());
    }

    #[test]
    fn document_survives_json() {
        let doc = SceneDocument {
            instances: vec![Instance::new("Floor_01", [1.25, -0.05, 1.25], 90.0, InstanceRole::Floor, 1)],
            player: Spawn {
                position: [1.0, 0.0, 1.0],
                rotation: [0.0, 45.0, 0.0],
            },
            agent: Spawn::default(),
            center: [1.25, 12.0, 1.25],
            rooms: vec![RoomRecord {
                room_id: 1,
                room_type: RoomType::Bedroom,
                polygon: vec![(0.1, 0.1), (0.1, 2.4), (2.4, 2.4), (2.4, 0.1)],
            }],
            openings: Vec::new(),
        };
        let back = SceneDocument::from_json(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.instances_with_role(InstanceRole::Floor).count(), 1);
    }
}

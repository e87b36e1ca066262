//! Static object database.
//!
//! Loaded once from JSON and shared read-only between generations. Holds
//! prefab sizes and surfaces, per-type placement annotations, receptacle
//! compatibility scores, asset group templates, per-room priority types,
//! and the structural prefabs (floors, walls, doors).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::asset_groups::AssetGroupTemplate;
use crate::error::{GenerationError, Result};
use crate::geom::{Rect, Vec3};
use crate::room_spec::RoomType;

/// Flat top of a prefab, in the prefab's local frame relative to its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceableSurface {
    pub x_min: f64,
    pub x_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    /// Height of the surface above the prefab's centre.
    pub y: f64,
}

impl PlaceableSurface {
    pub fn local_rect(&self) -> Rect {
        Rect::new(self.x_min, self.z_min, self.x_max, self.z_max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefab {
    pub size: Vec3,
    #[serde(default)]
    pub placeable_surfaces: Vec<PlaceableSurface>,
    /// Static furniture the agent cannot pick up.
    #[serde(default)]
    pub kinematic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomWeights {
    pub kitchens: u32,
    pub living_rooms: u32,
    pub bedrooms: u32,
    pub bathrooms: u32,
}

impl RoomWeights {
    pub fn weight(&self, room_type: RoomType) -> u32 {
        match room_type {
            RoomType::Kitchen => self.kitchens,
            RoomType::LivingRoom => self.living_rooms,
            RoomType::Bedroom => self.bedrooms,
            RoomType::Bathroom => self.bathrooms,
        }
    }
}

/// Where in a free rectangle an object may be anchored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementFlags {
    pub in_corner: bool,
    pub on_edge: bool,
    pub in_middle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    pub assets: Vec<String>,
    #[serde(default)]
    pub on_floor: bool,
    #[serde(default)]
    pub multiple_per_room: bool,
    #[serde(default)]
    pub room_weights: RoomWeights,
    #[serde(default)]
    pub placement: PlacementFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallPrefab {
    pub solid: String,
    pub with_door: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructurePrefabs {
    pub floors: Vec<String>,
    pub walls: Vec<WallPrefab>,
    pub doors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDatabase {
    pub prefabs: BTreeMap<String, Prefab>,
    pub object_types: BTreeMap<String, ObjectType>,
    /// Receptacle type → small object type → co-occurrence score.
    #[serde(default)]
    pub receptacles: BTreeMap<String, BTreeMap<String, u32>>,
    #[serde(default)]
    pub asset_groups: BTreeMap<String, AssetGroupTemplate>,
    #[serde(default)]
    pub priority_types: BTreeMap<RoomType, Vec<String>>,
    pub structure: StructurePrefabs,
    #[serde(skip)]
    asset_types: HashMap<String, String>,
}

impl ObjectDatabase {
    /// Parse and cross-check a database.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut db: ObjectDatabase = serde_json::from_str(json)?;
        db.index()?;
        db.validate()?;
        Ok(db)
    }

    fn index(&mut self) -> Result<()> {
        self.asset_types.clear();
        for (type_name, object_type) in &self.object_types {
            for asset in &object_type.assets {
                if let Some(previous) = self.asset_types.insert(asset.clone(), type_name.clone()) {
                    return Err(GenerationError::Database(format!(
                        "asset {} listed under both {} and {}",
                        asset, previous, type_name
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let missing = |id: &str, owner: &str| {
            GenerationError::Database(format!("{} references unknown prefab {}", owner, id))
        };
        for (type_name, object_type) in &self.object_types {
            if object_type.assets.is_empty() {
                return Err(GenerationError::Database(format!(
                    "object type {} has no assets",
                    type_name
                )));
            }
            for asset in &object_type.assets {
                if !self.prefabs.contains_key(asset) {
                    return Err(missing(asset, type_name));
                }
            }
        }
        for (group_name, group) in &self.asset_groups {
            for (i, member) in group.members.iter().enumerate() {
                if !self.object_types.contains_key(&member.object_type) {
                    return Err(GenerationError::Database(format!(
                        "asset group {} member {} has unknown type {}",
                        group_name, member.name, member.object_type
                    )));
                }
                if member.parent.is_some_and(|p| p >= i) {
                    return Err(GenerationError::Database(format!(
                        "asset group {} member {} must come after its parent",
                        group_name, member.name
                    )));
                }
            }
        }
        for (receptacle, contents) in &self.receptacles {
            for small in std::iter::once(receptacle).chain(contents.keys()) {
                if !self.object_types.contains_key(small) {
                    return Err(GenerationError::Database(format!(
                        "receptacle table references unknown type {}",
                        small
                    )));
                }
            }
        }
        let s = &self.structure;
        if s.floors.is_empty() || s.walls.is_empty() || s.doors.is_empty() {
            return Err(GenerationError::Database(
                "structure needs at least one floor, wall, and door".into(),
            ));
        }
        for id in s
            .floors
            .iter()
            .chain(s.doors.iter())
            .chain(s.walls.iter().flat_map(|w| [&w.solid, &w.with_door]))
        {
            if !self.prefabs.contains_key(id) {
                return Err(missing(id, "structure"));
            }
        }
        Ok(())
    }

    pub fn prefab(&self, asset_id: &str) -> Option<&Prefab> {
        self.prefabs.get(asset_id)
    }

    /// Prefab lookup for ids the database already vouched for.
    pub(crate) fn require_prefab(&self, asset_id: &str) -> Result<&Prefab> {
        self.prefab(asset_id)
            .ok_or_else(|| GenerationError::Database(format!("unknown prefab {}", asset_id)))
    }

    pub fn object_type(&self, type_name: &str) -> Option<&ObjectType> {
        self.object_types.get(type_name)
    }

    /// Object type an asset belongs to.
    pub fn asset_type(&self, asset_id: &str) -> Option<&str> {
        self.asset_types.get(asset_id).map(String::as_str)
    }

    /// Whether small objects may rest on objects of this type.
    pub fn is_receptacle_type(&self, type_name: &str) -> bool {
        self.receptacles.contains_key(type_name)
    }

    pub fn priority_types(&self, room_type: RoomType) -> &[String] {
        self.priority_types
            .get(&room_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn room_weight(&self, type_name: &str, room_type: RoomType) -> u32 {
        self.object_type(type_name)
            .map_or(0, |t| t.room_weights.weight(room_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB_JSON: &str = include_str!("../../../data/object_db.json");

    #[test]
    fn bundled_database_loads() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        assert!(!db.prefabs.is_empty());
        assert!(db.is_receptacle_type("dining_table"));
        assert_eq!(db.asset_type("Bed_01"), Some("bed"));
        assert_eq!(db.priority_types(RoomType::Bedroom)[0], "bed");
        assert!(db.room_weight("bed", RoomType::Bedroom) > 0);
        assert_eq!(db.room_weight("bed", RoomType::Kitchen), 0);
    }

    #[test]
    fn unknown_prefab_rejected() {
        let json = r#"{
            "prefabs": {"Floor": {"size": {"x": 2.5, "y": 0.1, "z": 2.5}}},
            "objectTypes": {"bed": {"assets": ["Bed_404"]}},
            "structure": {"floors": ["Floor"], "walls": [], "doors": []}
        }"#;
        assert!(matches!(
            ObjectDatabase::from_json(json),
            Err(GenerationError::Database(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            ObjectDatabase::from_json("{ not json"),
            Err(GenerationError::Json(_))
        ));
    }

    #[test]
    fn asset_in_two_types_rejected() {
        let json = r#"{
            "prefabs": {"A": {"size": {"x": 1, "y": 1, "z": 1}}},
            "objectTypes": {"t1": {"assets": ["A"]}, "t2": {"assets": ["A"]}},
            "structure": {"floors": ["A"], "walls": [{"solid": "A", "withDoor": "A"}], "doors": ["A"]}
        }"#;
        assert!(ObjectDatabase::from_json(json).is_err());
    }
}

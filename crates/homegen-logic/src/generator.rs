//! End-to-end scene generation.
//!
//! [`HouseGenerator`] borrows the shared object database and owns the
//! config plus the asset group samplers built from it. Each call to
//! [`HouseGenerator::generate`] seeds its own RNG and builds all mutable
//! state locally, so one generator can serve many threads.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::asset_groups::{AssetGroupGenerator, VerticalAlignment};
use crate::config::{validate_config, GenerationConfig};
use crate::database::ObjectDatabase;
use crate::doors::add_doors;
use crate::error::{GenerationError, Result};
use crate::house::build_house_structure;
use crate::placement::{FloorPlacer, SceneRequest};
use crate::rect_index::RectIndex;
use crate::room::{PlacedItem, Room};
use crate::room_spec::RoomSpec;
use crate::scene::{Instance, InstanceRole, InstanceType, RoomRecord, SceneDocument};
use crate::small_objects::SmallObjectPlacer;
use crate::spawn::{camera_center, place_spawn, spawn_pair};
use crate::structure::instantiate_structure;

pub struct HouseGenerator<'db> {
    db: &'db ObjectDatabase,
    config: GenerationConfig,
    groups: Vec<AssetGroupGenerator<'db>>,
}

impl<'db> HouseGenerator<'db> {
    pub fn new(db: &'db ObjectDatabase, config: GenerationConfig) -> Result<Self> {
        let errors = validate_config(&config);
        if !errors.is_empty() {
            return Err(GenerationError::InvalidConfig(errors));
        }
        let groups = db
            .asset_groups
            .iter()
            .map(|(name, template)| AssetGroupGenerator::new(name, template, db))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { db, config, groups })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn database(&self) -> &'db ObjectDatabase {
        self.db
    }

    /// Generate one scene; the same seed always yields the same scene.
    pub fn generate(&self, spec: &RoomSpec, request: &SceneRequest, seed: u64) -> Result<SceneDocument> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scene = self.generate_with_rng(spec, request, &mut rng)?;
        info!(
            "seed {}: {} rooms, {} instances, {} openings",
            seed,
            scene.rooms.len(),
            scene.instances.len(),
            scene.openings.len()
        );
        Ok(scene)
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        spec: &RoomSpec,
        request: &SceneRequest,
        rng: &mut R,
    ) -> Result<SceneDocument> {
        spec.validate()?;
        let config = &self.config;

        let house = build_house_structure(spec, config, rng)?;
        let openings = add_doors(&house, spec, config, rng)?;

        let mut rooms = Vec::with_capacity(house.room_polygons.len());
        for (&room_id, polygon) in &house.room_polygons {
            let room_type = spec.room_type(room_id).ok_or_else(|| {
                GenerationError::InvalidRoomSpec(format!("floorplan holds unknown room {}", room_id))
            })?;
            rooms.push(Room::new(room_id, room_type, polygon));
        }

        let mut floor_index = RectIndex::with_gap(config.rect_index_gap);
        let structure = instantiate_structure(&house, &openings, self.db, config, rng)?;
        for (pair, clearance) in &structure.clearances {
            floor_index.insert("door", *clearance);
            for room in rooms.iter_mut().filter(|r| pair.contains(r.room_id)) {
                room.reserve(clearance);
            }
        }
        let mut instances = structure.instances;

        let player = place_spawn("player", &house, &mut rooms, &mut floor_index, rng)?;
        let agent = place_spawn("agent", &house, &mut rooms, &mut floor_index, rng)?;
        let (player, agent) = spawn_pair(player, agent, rng);

        let placer = FloorPlacer::new(self.db, config, &self.groups);
        let requested = placer.place_requested(&mut rooms, &floor_index, request, rng);
        let floor_excluded = request.floor_exclusions();
        for room in rooms.iter_mut() {
            let mut candidates = placer.candidates_for(room.room_type, &floor_excluded);
            placer.populate_room(room, &mut candidates, rng);
        }

        let mut item_instances: BTreeMap<(u32, usize), usize> = BTreeMap::new();
        let keep_all = BTreeSet::new();
        for room in &rooms {
            for (item_idx, item) in room.items.iter().enumerate() {
                let is_requested = requested
                    .iter()
                    .any(|r| r.room_id == room.room_id && r.item == item_idx);
                let excluded = if is_requested { &keep_all } else { &floor_excluded };
                if let Some(first) = self.finalize_item(room.room_id, item, excluded, &mut floor_index, &mut instances) {
                    item_instances.insert((room.room_id, item_idx), first);
                }
            }
        }

        let specified: BTreeMap<usize, BTreeMap<String, u32>> = requested
            .iter()
            .filter_map(|r| {
                item_instances
                    .get(&(r.room_id, r.item))
                    .map(|&idx| (idx, r.objects.clone()))
            })
            .collect();
        let small_excluded = request.small_exclusions();
        let mut small = SmallObjectPlacer::new(self.db, config);
        for room in &rooms {
            small.populate_room(room.room_id, room.room_type, &mut instances, &specified, &small_excluded, rng);
        }

        Ok(SceneDocument {
            instances,
            player,
            agent,
            center: camera_center(&house),
            rooms: rooms
                .iter()
                .map(|r| RoomRecord {
                    room_id: r.room_id,
                    room_type: r.room_type,
                    polygon: house.room_polygons.get(&r.room_id).cloned().unwrap_or_default(),
                })
                .collect(),
            openings,
        })
    }

    /// Turn a committed item into instances if the floor index accepts it.
    /// Returns the index of its first instance.
    fn finalize_item(
        &self,
        room_id: u32,
        item: &PlacedItem,
        excluded: &BTreeSet<String>,
        floor_index: &mut RectIndex,
        instances: &mut Vec<Instance>,
    ) -> Option<usize> {
        match item {
            PlacedItem::Asset(asset) => {
                if excluded.contains(&asset.object_type) {
                    return None;
                }
                if !floor_index.place(asset.asset_id.as_str(), asset.footprint) {
                    debug!("dropping {} in room {}: blocked", asset.asset_id, room_id);
                    return None;
                }
                let mut inst = Instance::new(
                    asset.asset_id.as_str(),
                    [asset.x, asset.y, asset.z],
                    asset.facing.degrees(),
                    InstanceRole::FloorObject,
                    room_id,
                );
                inst.instance_type = self.instance_type(&asset.object_type, &asset.asset_id);
                inst.bbox = Some(asset.footprint);
                instances.push(inst);
                Some(instances.len() - 1)
            }
            PlacedItem::Group(group) => {
                let template = self.db.asset_groups.get(&group.name)?;
                let kept: Vec<usize> = (0..group.members.len())
                    .filter(|&i| !excluded.contains(&group.members[i].object_type))
                    .collect();
                let union = kept
                    .iter()
                    .map(|&i| group.members[i].footprint)
                    .reduce(|a, b| a.union(&b))?;
                if !floor_index.place(group.name.as_str(), union) {
                    debug!("dropping group {} in room {}: blocked", group.name, room_id);
                    return None;
                }
                let first = instances.len();
                let mut member_instance: BTreeMap<usize, usize> = BTreeMap::new();
                for i in kept {
                    let m = &group.members[i];
                    let mut inst = Instance::new(
                        m.asset_id.as_str(),
                        [m.x, m.y, m.z],
                        m.rotation,
                        InstanceRole::FloorObject,
                        room_id,
                    );
                    inst.instance_type = self.instance_type(&m.object_type, &m.asset_id);
                    inst.bbox = Some(m.footprint);
                    let spec = template.members.get(i);
                    if spec.is_some_and(|s| s.vertical == VerticalAlignment::Above) {
                        inst.parent = spec
                            .and_then(|s| s.parent)
                            .and_then(|p| member_instance.get(&p).copied());
                    }
                    member_instance.insert(i, instances.len());
                    instances.push(inst);
                }
                Some(first)
            }
        }
    }

    fn instance_type(&self, object_type: &str, asset_id: &str) -> InstanceType {
        let prefab = self.db.prefab(asset_id);
        let has_surfaces = prefab.is_some_and(|p| !p.placeable_surfaces.is_empty());
        if self.db.is_receptacle_type(object_type) && has_surfaces {
            InstanceType::Receptacle
        } else if prefab.is_some_and(|p| p.kinematic) {
            InstanceType::Kinematic
        } else {
            InstanceType::Interactable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::room_spec::{RoomNode, RoomType};

    const DB_JSON: &str = include_str!("../../../data/object_db.json");

    #[test]
    fn invalid_config_is_rejected() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let config = GenerationConfig {
            p_choose_edge: 1.5,
            ..GenerationConfig::default()
        };
        match HouseGenerator::new(&db, config) {
            Err(GenerationError::InvalidConfig(errors)) => {
                assert!(matches!(errors[0], ConfigError::ProbabilityOutOfRange { .. }));
            }
            _ => panic!("expected InvalidConfig"),
        }
    }

    #[test]
    fn invalid_spec_is_rejected() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let generator = HouseGenerator::new(&db, GenerationConfig::default()).unwrap();
        let spec = RoomSpec::new(vec![
            RoomNode::leaf(1, RoomType::Bedroom, 1.0),
            RoomNode::leaf(1, RoomType::Kitchen, 1.0),
        ]);
        let result = generator.generate(&spec, &SceneRequest::default(), 0);
        assert!(matches!(result, Err(GenerationError::InvalidRoomSpec(_))));
    }

    #[test]
    fn single_room_scene_has_structure() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let generator = HouseGenerator::new(&db, GenerationConfig::default()).unwrap();
        let spec = RoomSpec::new(vec![RoomNode::leaf(1, RoomType::Bedroom, 1.0)]).with_dims(3, 3);
        let scene = generator.generate(&spec, &SceneRequest::default(), 4).unwrap();
        assert_eq!(scene.rooms.len(), 1);
        assert!(scene.instances_with_role(InstanceRole::Floor).count() > 0);
        assert!(scene.instances_with_role(InstanceRole::Wall).count() > 0);
        // The only opening is the front door.
        assert!(scene.openings.iter().all(|o| o.rooms.touches_exterior()));
    }
}

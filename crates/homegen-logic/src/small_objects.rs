//! Small objects on receptacle surfaces.
//!
//! Runs after the floor objects became instances. Each room gets its own
//! rectangle index so small objects only compete with each other. Placement
//! is greedy and first-fit: an object that fits no surface is dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;
use rand::prelude::*;

use crate::config::GenerationConfig;
use crate::database::{ObjectDatabase, PlaceableSurface};
use crate::geom::{uniform, Rect};
use crate::rect_index::RectIndex;
use crate::room_spec::RoomType;
use crate::scene::{Instance, InstanceRole, InstanceType};

#[derive(Debug, Default, Clone)]
struct ReceptacleLoad {
    total: u32,
    per_surface: Vec<u32>,
}

pub struct SmallObjectPlacer<'a> {
    db: &'a ObjectDatabase,
    config: &'a GenerationConfig,
    loads: HashMap<usize, ReceptacleLoad>,
}

impl<'a> SmallObjectPlacer<'a> {
    pub fn new(db: &'a ObjectDatabase, config: &'a GenerationConfig) -> Self {
        Self {
            db,
            config,
            loads: HashMap::new(),
        }
    }

    /// Place small objects in one room.
    ///
    /// `specified` maps receptacle instance indices to explicit contents,
    /// placed before the random pass. Types in `excluded` are left out of
    /// the random pass.
    pub fn populate_room<R: Rng + ?Sized>(
        &mut self,
        room_id: u32,
        room_type: RoomType,
        instances: &mut Vec<Instance>,
        specified: &BTreeMap<usize, BTreeMap<String, u32>>,
        excluded: &BTreeSet<String>,
        rng: &mut R,
    ) {
        let mut index = RectIndex::with_gap(self.config.rect_index_gap);
        let receptacles: Vec<usize> = instances
            .iter()
            .enumerate()
            .filter(|(_, i)| {
                i.room_id == room_id
                    && i.role == InstanceRole::FloorObject
                    && i.instance_type == InstanceType::Receptacle
            })
            .map(|(idx, _)| idx)
            .collect();

        let mut types_in_room: BTreeSet<String> = BTreeSet::new();
        for &rec in &receptacles {
            let Some(contents) = specified.get(&rec) else { continue };
            for (small_type, &count) in contents {
                for _ in 0..count {
                    if let Some(inst) = self.place_on_receptacle(rec, small_type, instances, &mut index, rng) {
                        instances.push(inst);
                        types_in_room.insert(small_type.clone());
                    }
                }
            }
        }

        let mut candidates: Vec<(usize, String)> = Vec::new();
        for &rec in &receptacles {
            let Some(rec_type) = self.db.asset_type(&instances[rec].prefab) else {
                continue;
            };
            let Some(table) = self.db.receptacles.get(rec_type) else { continue };
            for (small_type, &score) in table {
                if score >= 1
                    && self.db.room_weight(small_type, room_type) > 0
                    && !excluded.contains(small_type)
                {
                    candidates.push((rec, small_type.clone()));
                }
            }
        }
        candidates.shuffle(rng);

        let max_types = self.config.max_object_types_per_room as usize;
        for (rec, small_type) in candidates {
            let present = types_in_room.contains(&small_type);
            if present {
                let multiple = self
                    .db
                    .object_type(&small_type)
                    .is_some_and(|t| t.multiple_per_room);
                if !multiple {
                    continue;
                }
            } else if types_in_room.len() >= max_types {
                continue;
            }
            if let Some(inst) = self.place_on_receptacle(rec, &small_type, instances, &mut index, rng) {
                instances.push(inst);
                types_in_room.insert(small_type);
            }
        }
    }

    /// Objects currently resting on the receptacle at `index`.
    pub fn load(&self, index: usize) -> u32 {
        self.loads.get(&index).map_or(0, |l| l.total)
    }

    fn place_on_receptacle<R: Rng + ?Sized>(
        &mut self,
        rec: usize,
        small_type: &str,
        instances: &[Instance],
        index: &mut RectIndex,
        rng: &mut R,
    ) -> Option<Instance> {
        let receptacle = &instances[rec];
        let surfaces = &self.db.prefab(&receptacle.prefab)?.placeable_surfaces;
        let asset_id = self.db.object_type(small_type)?.assets.choose(rng)?;
        let small = self.db.prefab(asset_id)?;
        let size = small.size;

        let load = self.loads.entry(rec).or_insert_with(|| ReceptacleLoad {
            total: 0,
            per_surface: vec![0; surfaces.len()],
        });
        if load.total >= self.config.max_objects_on_receptacle {
            return None;
        }

        let yaw = receptacle.yaw();
        let center = (receptacle.position[0], receptacle.position[2]);
        let mut fitting: Vec<(usize, Rect)> = surfaces
            .iter()
            .enumerate()
            .filter(|(s, _)| load.per_surface[*s] < self.config.max_objects_on_surface)
            .map(|(s, surface)| (s, world_surface(surface, center, yaw)))
            .filter(|(_, r)| size.x < 0.9 * r.width() && size.z < 0.9 * r.depth())
            .collect();
        fitting.shuffle(rng);

        let margin = self.config.small_object_margin;
        for (s, world) in fitting {
            for _ in 0..self.config.max_place_on_surface_retries {
                let x = uniform(rng, world.x0 + size.x / 2.0 + margin, world.x1 - size.x / 2.0 - margin);
                let z = uniform(rng, world.z0 + size.z / 2.0 + margin, world.z1 - size.z / 2.0 - margin);
                let reserved = Rect::centered(x, z, size.x + 2.0 * margin, size.z + 2.0 * margin);
                if !index.place(asset_id.as_str(), reserved) {
                    continue;
                }
                load.total += 1;
                load.per_surface[s] += 1;
                let y = receptacle.position[1] + surfaces[s].y + size.y / 2.0;
                let mut inst = Instance::new(
                    asset_id.as_str(),
                    [x, y, z],
                    0.0,
                    InstanceRole::SmallObject,
                    receptacle.room_id,
                );
                inst.instance_type = if small.kinematic {
                    InstanceType::Kinematic
                } else {
                    InstanceType::Interactable
                };
                inst.parent = Some(rec);
                inst.bbox = Some(Rect::centered(x, z, size.x, size.z));
                debug!("{} on {} at ({:.2}, {:.2})", asset_id, receptacle.prefab, x, z);
                return Some(inst);
            }
        }
        None
    }
}

/// Surface bounds in world space for a receptacle yawed by `yaw` degrees.
pub fn world_surface(surface: &PlaceableSurface, center: (f64, f64), yaw: f64) -> Rect {
    let r = surface.local_rect().rotated_about((0.0, 0.0), yaw);
    Rect::new(r.x0 + center.0, r.z0 + center.1, r.x1 + center.0, r.z1 + center.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand_chacha::ChaCha8Rng;

    const DB_JSON: &str = include_str!("../../../data/object_db.json");

    fn table(db: &ObjectDatabase, x: f64, z: f64) -> Instance {
        let size = db.prefab("DiningTable_01").unwrap().size;
        let mut inst = Instance::new("DiningTable_01", [x, size.y / 2.0, z], 0.0, InstanceRole::FloorObject, 1);
        inst.instance_type = InstanceType::Receptacle;
        inst.bbox = Some(Rect::centered(x, z, size.x, size.z));
        inst
    }

    #[test]
    fn rotated_surface_swaps_extent() {
        let surface = PlaceableSurface {
            x_min: -0.8,
            x_max: 0.8,
            z_min: -0.4,
            z_max: 0.4,
            y: 0.4,
        };
        let r = world_surface(&surface, (2.0, 3.0), 90.0);
        assert_relative_eq!(r.width(), 0.8, epsilon = 1e-9);
        assert_relative_eq!(r.depth(), 1.6, epsilon = 1e-9);
        assert_relative_eq!(r.center().0, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn receptacle_never_exceeds_cap() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let config = GenerationConfig::default();
        for seed in 0..10 {
            let mut instances = vec![table(&db, 2.0, 2.0)];
            let mut placer = SmallObjectPlacer::new(&db, &config);
            let specified: BTreeMap<usize, BTreeMap<String, u32>> =
                [(0, [("apple".to_string(), 10)].into())].into();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            placer.populate_room(1, RoomType::Kitchen, &mut instances, &specified, &BTreeSet::new(), &mut rng);
            let on_table = instances.iter().filter(|i| i.parent == Some(0)).count();
            assert!(on_table <= 3, "seed {} put {} objects on the table", seed, on_table);
            assert_eq!(placer.load(0) as usize, on_table);
        }
    }

    #[test]
    fn objects_rest_on_the_surface() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let config = GenerationConfig::default();
        let mut instances = vec![table(&db, 0.0, 0.0)];
        let mut placer = SmallObjectPlacer::new(&db, &config);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        placer.populate_room(
            1,
            RoomType::Kitchen,
            &mut instances,
            &BTreeMap::new(),
            &BTreeSet::new(),
            &mut rng,
        );
        let prefab = db.prefab("DiningTable_01").unwrap();
        let top = prefab.size.y / 2.0 + prefab.placeable_surfaces[0].y;
        let smalls: Vec<&Instance> = instances.iter().filter(|i| i.role == InstanceRole::SmallObject).collect();
        assert!(!smalls.is_empty());
        for s in &smalls {
            let size = db.prefab(&s.prefab).unwrap().size;
            assert_relative_eq!(s.position[1], top + size.y / 2.0, epsilon = 1e-9);
            let bbox = s.bbox.unwrap();
            assert!(instances[0].bbox.unwrap().contains_point(bbox.center().0, bbox.center().1));
        }
        for (i, a) in smalls.iter().enumerate() {
            for b in &smalls[i + 1..] {
                assert!(!a.bbox.unwrap().intersects(&b.bbox.unwrap()));
            }
        }
    }

    #[test]
    fn excluded_types_stay_off() {
        let db = ObjectDatabase::from_json(DB_JSON).unwrap();
        let config = GenerationConfig::default();
        let excluded: BTreeSet<String> = db.receptacles["dining_table"].keys().cloned().collect();
        let mut instances = vec![table(&db, 0.0, 0.0)];
        let mut placer = SmallObjectPlacer::new(&db, &config);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        placer.populate_room(1, RoomType::Kitchen, &mut instances, &BTreeMap::new(), &excluded, &mut rng);
        assert_eq!(instances.len(), 1);
    }
}

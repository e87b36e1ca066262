//! Floor object placement.
//!
//! Each room draws free rectangles from its open area, anchors them against
//! the room polygon and fills them with a standalone asset or an asset
//! group. Priority types (the bed of a bedroom) go first. A rectangle that
//! takes nothing is dropped from the room's cache and the next one is drawn.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::anchor::{
    anchored_center, sample_anchor_location, top_down_footprint, Anchor, AnchorLocation, AnchorType,
};
use crate::asset_groups::AssetGroupGenerator;
use crate::config::GenerationConfig;
use crate::constants::{placement, retries};
use crate::database::{ObjectDatabase, PlacementFlags};
use crate::geom::{uniform, Facing, Rect};
use crate::polygon::add_margin_to_footprint;
use crate::rect_index::RectIndex;
use crate::room::{fitting_orientations, sample_rotation, PlacedAsset, PlacedGroup, PlacedItem, Room};
use crate::room_spec::RoomType;

/// Receptacles the caller wants in the scene, with optional contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRequest {
    #[serde(default)]
    pub receptacles: Vec<ReceptacleRequest>,
}

impl SceneRequest {
    /// Object types the random floor pass must leave alone.
    pub fn floor_exclusions(&self) -> BTreeSet<String> {
        self.receptacles.iter().map(|r| r.object_type.clone()).collect()
    }

    /// Small object types the random small-object pass must leave alone.
    pub fn small_exclusions(&self) -> BTreeSet<String> {
        self.receptacles
            .iter()
            .flat_map(|r| r.objects.iter().flat_map(|m| m.keys().cloned()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptacleRequest {
    pub object_type: String,
    #[serde(default = "one")]
    pub count: u32,
    /// Contents of the i-th placed receptacle: small object type → count.
    #[serde(default)]
    pub objects: Vec<BTreeMap<String, u32>>,
}

fn one() -> u32 {
    1
}

/// A requested receptacle that made it into a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedPlacement {
    pub room_id: u32,
    /// Index into the room's items.
    pub item: usize,
    pub objects: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq)]
struct AssetCandidate {
    object_type: String,
    asset_id: String,
    placement: PlacementFlags,
}

/// What a room may still receive.
#[derive(Debug, Clone)]
pub struct RoomCandidates {
    assets: Vec<AssetCandidate>,
    /// Indices into the placer's group generators.
    groups: Vec<usize>,
    priority: Vec<String>,
}

impl RoomCandidates {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.groups.is_empty()
    }

    pub fn priority(&self) -> &[String] {
        &self.priority
    }
}

enum Choice {
    Asset(usize),
    Group(usize),
}

pub struct FloorPlacer<'a, 'db> {
    db: &'db ObjectDatabase,
    config: &'a GenerationConfig,
    groups: &'a [AssetGroupGenerator<'db>],
}

impl<'a, 'db> FloorPlacer<'a, 'db> {
    pub fn new(
        db: &'db ObjectDatabase,
        config: &'a GenerationConfig,
        groups: &'a [AssetGroupGenerator<'db>],
    ) -> Self {
        Self { db, config, groups }
    }

    /// Floor assets and groups allowed in a room of `room_type`.
    pub fn candidates_for(&self, room_type: RoomType, excluded: &BTreeSet<String>) -> RoomCandidates {
        let mut assets = Vec::new();
        for (type_name, object_type) in &self.db.object_types {
            if !object_type.on_floor
                || object_type.room_weights.weight(room_type) == 0
                || excluded.contains(type_name)
            {
                continue;
            }
            for asset_id in &object_type.assets {
                assets.push(AssetCandidate {
                    object_type: type_name.clone(),
                    asset_id: asset_id.clone(),
                    placement: object_type.placement,
                });
            }
        }
        let groups = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.template().room_weights.weight(room_type) > 0)
            .map(|(i, _)| i)
            .collect();
        RoomCandidates {
            assets,
            groups,
            priority: self.db.priority_types(room_type).to_vec(),
        }
    }

    /// Run the rectangle loop for one room.
    pub fn populate_room<R: Rng + ?Sized>(&self, room: &mut Room, candidates: &mut RoomCandidates, rng: &mut R) {
        let mut failed: Option<Rect> = None;
        for _ in 0..self.config.max_floor_objects {
            if candidates.is_empty() {
                break;
            }
            if let Some(rect) = failed.take() {
                room.discard_rectangle(&rect);
            }
            let Some(rect) = room.sample_next_rectangle(self.config, false, rng) else {
                break;
            };
            match self.place_in_rectangle(room, &rect, candidates, rng) {
                Some(item) => {
                    self.record_placement(&item, candidates);
                    room.commit(item);
                }
                None => failed = Some(rect),
            }
        }
        debug!("room {} holds {} floor items", room.room_id, room.items.len());
    }

    /// Try to fill one free rectangle of `room`.
    pub fn place_in_rectangle<R: Rng + ?Sized>(
        &self,
        room: &Room,
        rect: &Rect,
        candidates: &RoomCandidates,
        rng: &mut R,
    ) -> Option<PlacedItem> {
        let anchor = sample_anchor_location(
            &room.room_polygon,
            rect,
            self.config.p_choose_edge,
            self.config.corner_probe_epsilon,
            rng,
        );

        let fitting_assets: Vec<usize> = candidates
            .assets
            .iter()
            .enumerate()
            .filter(|(_, c)| allows(&c.placement, anchor.anchor_type))
            .filter(|(_, c)| {
                self.db.prefab(&c.asset_id).is_some_and(|p| {
                    let needed = self.needed_space((p.size.x, p.size.z), anchor.anchor_type);
                    !fitting_orientations(rect, &anchor, needed).is_empty()
                })
            })
            .map(|(i, _)| i)
            .collect();
        let fitting_groups: Vec<usize> = candidates
            .groups
            .iter()
            .copied()
            .filter(|&g| {
                let generator = &self.groups[g];
                let needed = self.needed_space(generator.dimensions(), anchor.anchor_type);
                allows(&generator.template().placement, anchor.anchor_type)
                    && !fitting_orientations(rect, &anchor, needed).is_empty()
            })
            .collect();

        let choice = self
            .choose_priority(candidates, &fitting_assets, &fitting_groups, rng)
            .or_else(|| self.choose_general(candidates, room.room_type, &fitting_assets, &fitting_groups, rng))?;
        match choice {
            Choice::Asset(i) => self.place_asset(&candidates.assets[i], rect, &anchor, rng),
            Choice::Group(g) => self.place_group(&self.groups[g], rect, &anchor, rng),
        }
    }

    /// Place requested receptacles before the random pass.
    pub fn place_requested<R: Rng + ?Sized>(
        &self,
        rooms: &mut [Room],
        floor_index: &RectIndex,
        request: &SceneRequest,
        rng: &mut R,
    ) -> Vec<RequestedPlacement> {
        let mut placed = Vec::new();
        for req in &request.receptacles {
            let Some(object_type) = self.db.object_type(&req.object_type) else {
                warn!("requested receptacle type {} is unknown", req.object_type);
                continue;
            };
            let count = req.count.min(retries::MAX_SPECIFIED_NUMBER);
            let mut failures = 0;
            for i in 0..count as usize {
                let hosts: Vec<usize> = (0..rooms.len())
                    .filter(|&r| object_type.room_weights.weight(rooms[r].room_type) > 0)
                    .collect();
                let hosts = if hosts.is_empty() {
                    (0..rooms.len()).collect()
                } else {
                    hosts
                };
                let mut done = false;
                for _ in 0..retries::MAX_SPECIFIED_RECTANGLE_RETRIES {
                    let Some(&r) = hosts.choose(rng) else { break };
                    let Some(asset_id) = object_type.assets.choose(rng) else { break };
                    let room = &mut rooms[r];
                    let Some(rect) = room.sample_next_rectangle(self.config, false, rng) else {
                        continue;
                    };
                    let Some(item) = self.place_requested_in(asset_id, &req.object_type, &rect, rng) else {
                        continue;
                    };
                    if floor_index.intersects(&item.footprint()) {
                        continue;
                    }
                    placed.push(RequestedPlacement {
                        room_id: room.room_id,
                        item: room.items.len(),
                        objects: req.objects.get(i).cloned().unwrap_or_default(),
                    });
                    room.commit(item);
                    done = true;
                    break;
                }
                if !done {
                    failures += 1;
                }
            }
            if failures > 0 {
                warn!(
                    "placed {} of {} requested {}",
                    count - failures,
                    count,
                    req.object_type
                );
            }
        }
        placed
    }

    fn place_requested_in<R: Rng + ?Sized>(
        &self,
        asset_id: &str,
        object_type: &str,
        rect: &Rect,
        rng: &mut R,
    ) -> Option<PlacedItem> {
        let size = self.db.prefab(asset_id)?.size;
        let fit = placement::FIT_FRACTION;
        let facing = if size.x < rect.width() * fit && size.z < rect.depth() * fit {
            Facing::PosZ
        } else if size.z < rect.width() * fit && size.x < rect.depth() * fit {
            Facing::PosX
        } else {
            return None;
        };
        let (ex, ez) = if facing.is_rotated() {
            (size.z, size.x)
        } else {
            (size.x, size.z)
        };
        let t = self.config.wall_thickness;
        let x = uniform(rng, rect.x0 + ex / 2.0 + t, rect.x1 - ex / 2.0 - t);
        let z = uniform(rng, rect.z0 + ez / 2.0 + t, rect.z1 - ez / 2.0 - t);
        let footprint = Rect::centered(x, z, ex, ez);
        Some(PlacedItem::Asset(PlacedAsset {
            asset_id: asset_id.to_string(),
            object_type: object_type.to_string(),
            x,
            y: size.y / 2.0,
            z,
            facing,
            anchor_type: AnchorType::InMiddle,
            footprint,
            margined: footprint,
        }))
    }

    /// Space an `extent` object needs in a rectangle, before rotation.
    fn needed_space(&self, extent: (f64, f64), anchor_type: AnchorType) -> (f64, f64) {
        let m = &self.config.margins;
        let p = self.config.padding_against_wall;
        let (x, z) = extent;
        match anchor_type {
            AnchorType::InMiddle => (x + 2.0 * m.middle, z + 2.0 * m.middle),
            AnchorType::OnEdge => (x + 2.0 * m.edge.sides, z + m.edge.front + m.edge.back + p),
            AnchorType::InCorner => (
                x + 2.0 * m.corner.sides + p,
                z + m.corner.front + m.corner.back + p,
            ),
        }
    }

    fn choose_priority<R: Rng + ?Sized>(
        &self,
        candidates: &RoomCandidates,
        assets: &[usize],
        groups: &[usize],
        rng: &mut R,
    ) -> Option<Choice> {
        for wanted in &candidates.priority {
            let type_groups: Vec<usize> = groups
                .iter()
                .copied()
                .filter(|&g| self.groups[g].template().object_types().any(|t| t == wanted.as_str()))
                .collect();
            let type_assets: Vec<usize> = assets
                .iter()
                .copied()
                .filter(|&a| candidates.assets[a].object_type == *wanted)
                .collect();
            let use_group = match (type_groups.is_empty(), type_assets.is_empty()) {
                (true, true) => continue,
                (false, true) => true,
                (true, false) => false,
                (false, false) => rng.gen::<f64>() < self.config.p_choose_asset_group,
            };
            return if use_group {
                type_groups.choose(rng).map(|&g| Choice::Group(g))
            } else {
                type_assets.choose(rng).map(|&a| Choice::Asset(a))
            };
        }
        None
    }

    fn choose_general<R: Rng + ?Sized>(
        &self,
        candidates: &RoomCandidates,
        room_type: RoomType,
        assets: &[usize],
        groups: &[usize],
        rng: &mut R,
    ) -> Option<Choice> {
        if !groups.is_empty() && (assets.is_empty() || rng.gen::<f64>() < self.config.p_choose_asset_group) {
            return groups.choose(rng).map(|&g| Choice::Group(g));
        }
        let mut types: Vec<&str> = assets
            .iter()
            .map(|&a| candidates.assets[a].object_type.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if rng.gen::<f64>() < self.config.p_w1_asset_skipped {
            types.retain(|t| self.db.room_weight(t, room_type) != 1);
        }
        let chosen_type = *types.choose(rng)?;
        let of_type: Vec<usize> = assets
            .iter()
            .copied()
            .filter(|&a| candidates.assets[a].object_type == chosen_type)
            .collect();
        of_type.choose(rng).map(|&a| Choice::Asset(a))
    }

    /// Where an `extent` object sits for `anchor`: its centre and its
    /// anchored footprint including wall padding.
    fn anchor_position<R: Rng + ?Sized>(
        &self,
        rect: &Rect,
        anchor: &Anchor,
        extent: (f64, f64),
        rng: &mut R,
    ) -> ((f64, f64), Rect) {
        let padding = self.config.padding_against_wall;
        let (ex, ez) = extent;
        let point = match anchor.location {
            AnchorLocation::Corner { x, z } => (x, z),
            AnchorLocation::Edge { from, to } => {
                let sides = self.config.margins.edge.sides;
                if (from.1 - to.1).abs() < f64::EPSILON {
                    let x = uniform(rng, rect.x0 + ex / 2.0 + sides, rect.x1 - ex / 2.0 - sides);
                    (x, from.1)
                } else {
                    let z = uniform(rng, rect.z0 + ez / 2.0 + sides, rect.z1 - ez / 2.0 - sides);
                    (from.0, z)
                }
            }
            AnchorLocation::Anywhere => {
                let m = self.config.margins.middle;
                (
                    uniform(rng, rect.x0 + ex / 2.0 + m, rect.x1 - ex / 2.0 - m),
                    uniform(rng, rect.z0 + ez / 2.0 + m, rect.z1 - ez / 2.0 - m),
                )
            }
        };
        let anchored = top_down_footprint(point, anchor.delta, extent, padding);
        let center = anchored_center(point, anchor.delta, extent, padding);
        (center, anchored)
    }

    fn place_asset<R: Rng + ?Sized>(
        &self,
        candidate: &AssetCandidate,
        rect: &Rect,
        anchor: &Anchor,
        rng: &mut R,
    ) -> Option<PlacedItem> {
        let size = self.db.prefab(&candidate.asset_id)?.size;
        let needed = self.needed_space((size.x, size.z), anchor.anchor_type);
        let facing = sample_rotation(rect, anchor, needed, rng)?;
        let extent = if facing.is_rotated() {
            (size.z, size.x)
        } else {
            (size.x, size.z)
        };
        let ((x, z), anchored) = self.anchor_position(rect, anchor, extent, rng);
        Some(PlacedItem::Asset(PlacedAsset {
            asset_id: candidate.asset_id.clone(),
            object_type: candidate.object_type.clone(),
            x,
            y: size.y / 2.0,
            z,
            facing,
            anchor_type: anchor.anchor_type,
            footprint: Rect::centered(x, z, extent.0, extent.1),
            margined: add_margin_to_footprint(&anchored, facing, anchor.anchor_type, &self.config.margins),
        }))
    }

    fn place_group<R: Rng + ?Sized>(
        &self,
        generator: &AssetGroupGenerator<'db>,
        rect: &Rect,
        anchor: &Anchor,
        rng: &mut R,
    ) -> Option<PlacedItem> {
        let needed = self.needed_space(generator.dimensions(), anchor.anchor_type);
        let facing = sample_rotation(rect, anchor, needed, rng)?;
        for _ in 0..retries::MAX_INTERSECTING_OBJECT_RETRIES {
            let sample = match generator.sample_object_placement(rng) {
                Ok(sample) => sample,
                Err(err) => {
                    warn!("asset group {} failed to sample: {}", generator.name, err);
                    return None;
                }
            };
            let (lx, lz) = (sample.x_length(), sample.z_length());
            let (nx, nz) = self.needed_space((lx, lz), anchor.anchor_type);
            let (nx, nz) = if facing.is_rotated() { (nz, nx) } else { (nx, nz) };
            if nx >= rect.width() || nz >= rect.depth() {
                continue;
            }
            let extent = if facing.is_rotated() { (lz, lx) } else { (lx, lz) };
            let ((x, z), anchored) = self.anchor_position(rect, anchor, extent, rng);
            let members = sample.to_world((x, z), facing.degrees());
            let footprint = members
                .iter()
                .map(|m| m.footprint)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_else(|| Rect::centered(x, z, extent.0, extent.1));
            return Some(PlacedItem::Group(PlacedGroup {
                name: generator.name.clone(),
                members,
                x,
                z,
                facing,
                anchor_type: anchor.anchor_type,
                footprint,
                margined: add_margin_to_footprint(&anchored, facing, anchor.anchor_type, &self.config.margins),
            }));
        }
        None
    }

    /// Narrow the room's pools after `item` was committed.
    fn record_placement(&self, item: &PlacedItem, candidates: &mut RoomCandidates) {
        let placed: BTreeSet<String> = item.object_types().into_iter().map(String::from).collect();
        candidates.priority.retain(|t| !placed.contains(t));

        if let PlacedItem::Group(group) = item {
            if let Some(pos) = self.groups.iter().position(|g| g.name == group.name) {
                if !self.groups[pos].template().allow_duplicates {
                    candidates.groups.retain(|&g| g != pos);
                }
            }
        }

        for type_name in &placed {
            let multiple = self
                .db
                .object_type(type_name)
                .is_some_and(|t| t.multiple_per_room);
            if multiple {
                continue;
            }
            candidates.assets.retain(|a| a.object_type != *type_name);
            let groups = self.groups;
            candidates
                .groups
                .retain(|&g| !groups[g].template().object_types().any(|t| t == type_name.as_str()));
        }
    }
}

fn allows(flags: &PlacementFlags, anchor_type: AnchorType) -> bool {
    match anchor_type {
        AnchorType::InCorner => flags.in_corner,
        AnchorType::OnEdge => flags.on_edge,
        AnchorType::InMiddle => flags.in_middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ObjectDatabase;
    use rand_chacha::ChaCha8Rng;

    const DB_JSON: &str = include_str!("../../../data/object_db.json");

    fn db() -> ObjectDatabase {
        ObjectDatabase::from_json(DB_JSON).unwrap()
    }

    fn generators(db: &ObjectDatabase) -> Vec<AssetGroupGenerator<'_>> {
        db.asset_groups
            .iter()
            .map(|(name, t)| AssetGroupGenerator::new(name, t, db).unwrap())
            .collect()
    }

    fn bedroom() -> Room {
        Room::new(
            1,
            RoomType::Bedroom,
            &[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)],
        )
    }

    #[test]
    fn bedroom_gets_a_bed_first() {
        let db = db();
        let config = GenerationConfig::default();
        let groups = generators(&db);
        let placer = FloorPlacer::new(&db, &config, &groups);
        let mut room = bedroom();
        let mut candidates = placer.candidates_for(RoomType::Bedroom, &BTreeSet::new());
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        placer.populate_room(&mut room, &mut candidates, &mut rng);
        let first = room.items.first().expect("an empty 5×5 bedroom takes something");
        assert!(first.object_types().contains(&"bed"));
        assert!(!candidates.priority().contains(&"bed".to_string()));
    }

    #[test]
    fn committed_items_stay_inside_and_apart() {
        let db = db();
        let config = GenerationConfig::default();
        let groups = generators(&db);
        let placer = FloorPlacer::new(&db, &config, &groups);
        for seed in 0..10 {
            let mut room = bedroom();
            let mut candidates = placer.candidates_for(RoomType::Bedroom, &BTreeSet::new());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            placer.populate_room(&mut room, &mut candidates, &mut rng);
            let boxes: Vec<Rect> = room.items.iter().map(PlacedItem::footprint).collect();
            for (i, a) in boxes.iter().enumerate() {
                assert!(a.x0 >= -1e-6 && a.z0 >= -1e-6 && a.x1 <= 5.0 + 1e-6 && a.z1 <= 5.0 + 1e-6);
                for b in &boxes[i + 1..] {
                    assert!(!a.intersects(b), "seed {}: {:?} overlaps {:?}", seed, a, b);
                }
            }
        }
    }

    #[test]
    fn single_bed_per_room() {
        let db = db();
        let config = GenerationConfig::default();
        let groups = generators(&db);
        let placer = FloorPlacer::new(&db, &config, &groups);
        for seed in 0..10 {
            let mut room = bedroom();
            let mut candidates = placer.candidates_for(RoomType::Bedroom, &BTreeSet::new());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            placer.populate_room(&mut room, &mut candidates, &mut rng);
            let beds = room
                .items
                .iter()
                .flat_map(|i| i.object_types())
                .filter(|t| *t == "bed")
                .count();
            assert!(beds <= 1, "seed {} placed {} beds", seed, beds);
        }
    }

    #[test]
    fn excluded_types_are_never_candidates() {
        let db = db();
        let config = GenerationConfig::default();
        let groups = generators(&db);
        let placer = FloorPlacer::new(&db, &config, &groups);
        let excluded: BTreeSet<String> = ["dining_table".to_string()].into();
        let candidates = placer.candidates_for(RoomType::Kitchen, &excluded);
        assert!(candidates.assets.iter().all(|a| a.object_type != "dining_table"));
    }

    #[test]
    fn requested_receptacle_lands_in_a_room() {
        let db = db();
        let config = GenerationConfig::default();
        let groups = generators(&db);
        let placer = FloorPlacer::new(&db, &config, &groups);
        let mut rooms = vec![Room::new(
            1,
            RoomType::Kitchen,
            &[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)],
        )];
        let request = SceneRequest {
            receptacles: vec![ReceptacleRequest {
                object_type: "dining_table".into(),
                count: 1,
                objects: vec![[("apple".to_string(), 2)].into()],
            }],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let placed = placer.place_requested(&mut rooms, &RectIndex::new(), &request, &mut rng);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].objects["apple"], 2);
        assert_eq!(rooms[0].items[0].object_types(), vec!["dining_table"]);
        assert!(request.floor_exclusions().contains("dining_table"));
        assert!(request.small_exclusions().contains("apple"));
    }
}

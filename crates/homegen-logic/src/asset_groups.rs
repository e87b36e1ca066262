//! Asset group templates and their sampler.
//!
//! A template is a small tree of members laid out in a local frame. Roots
//! sit at fixed offsets; children hang off a point of their parent's
//! footprint picked on a 3×3 grid (row 0 is the parent's low-z side,
//! column 0 its low-x side) and are shifted by their own half extent
//! according to the alignment (0 negative, 1 centred, 2 positive).

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::database::{ObjectDatabase, PlacementFlags, RoomWeights};
use crate::error::{GenerationError, Result};
use crate::geom::{normalize_degrees, rotate_xz, rotated_extent, uniform, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerticalAlignment {
    /// Rests on the floor beside its parent.
    #[default]
    NextTo,
    /// Rests on top of its parent.
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalPosition {
    pub x: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// Members with the same name share one asset choice.
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    /// Index of the parent member; roots use `position`.
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub position: LocalPosition,
    #[serde(default = "centre")]
    pub anchor: u8,
    #[serde(default = "middle")]
    pub x_alignment: u8,
    #[serde(default = "middle")]
    pub z_alignment: u8,
    #[serde(default)]
    pub vertical: VerticalAlignment,
    /// Base yaw in degrees within the group frame.
    #[serde(default)]
    pub rotation: f64,
    /// Uniform yaw jitter in `[-dtheta, dtheta]`.
    #[serde(default)]
    pub dtheta: f64,
}

fn centre() -> u8 {
    4
}

fn middle() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetGroupTemplate {
    #[serde(default)]
    pub allow_duplicates: bool,
    #[serde(default)]
    pub room_weights: RoomWeights,
    #[serde(default)]
    pub placement: PlacementFlags,
    pub members: Vec<GroupMember>,
}

impl AssetGroupTemplate {
    pub fn object_types(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.object_type.as_str())
    }
}

/// One member of a sampled group, in the group's local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberPlacement {
    pub name: String,
    pub asset_id: String,
    pub object_type: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation: f64,
    pub footprint: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlacement {
    pub members: Vec<MemberPlacement>,
    pub bounds: Rect,
}

impl GroupPlacement {
    pub fn x_length(&self) -> f64 {
        self.bounds.width()
    }

    pub fn z_length(&self) -> f64 {
        self.bounds.depth()
    }

    /// Members moved into the world: the group's bounds centre lands on
    /// `center` and the whole layout is yawed by `rotation` degrees.
    pub fn to_world(&self, center: (f64, f64), rotation: f64) -> Vec<MemberPlacement> {
        let (bx, bz) = self.bounds.center();
        self.members
            .iter()
            .map(|m| {
                let (dx, dz) = rotate_xz(m.x - bx, m.z - bz, rotation);
                let (x, z) = (center.0 + dx, center.1 + dz);
                let yaw = normalize_degrees(m.rotation + rotation);
                let local = m.footprint;
                let (w, d) = rotated_extent(local.width(), local.depth(), rotation);
                MemberPlacement {
                    x,
                    z,
                    rotation: yaw,
                    footprint: Rect::centered(x, z, w, d),
                    ..m.clone()
                }
            })
            .collect()
    }
}

/// Samples concrete layouts of one template against the database.
pub struct AssetGroupGenerator<'db> {
    pub name: String,
    template: &'db AssetGroupTemplate,
    db: &'db ObjectDatabase,
    /// Nominal `(x, z)` extent with the widest and deepest assets, no jitter.
    dimensions: (f64, f64),
}

enum AssetPick {
    Random,
    WidestX,
    DeepestZ,
}

impl<'db> AssetGroupGenerator<'db> {
    pub fn new(name: &str, template: &'db AssetGroupTemplate, db: &'db ObjectDatabase) -> Result<Self> {
        let mut generator = Self {
            name: name.to_string(),
            template,
            db,
            dimensions: (0.0, 0.0),
        };
        let mut rng = rand::rngs::mock::StepRng::new(0, 0);
        let wide = generator.layout(AssetPick::WidestX, false, &mut rng)?;
        let deep = generator.layout(AssetPick::DeepestZ, false, &mut rng)?;
        generator.dimensions = (wide.x_length(), deep.z_length());
        Ok(generator)
    }

    pub fn template(&self) -> &AssetGroupTemplate {
        self.template
    }

    pub fn dimensions(&self) -> (f64, f64) {
        self.dimensions
    }

    /// Random asset per member name, random yaw jitter.
    pub fn sample_object_placement<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GroupPlacement> {
        self.layout(AssetPick::Random, true, rng)
    }

    fn pick_asset<R: Rng + ?Sized>(
        &self,
        member: &GroupMember,
        pick: &AssetPick,
        rng: &mut R,
    ) -> Result<String> {
        let assets = self
            .db
            .object_type(&member.object_type)
            .map(|t| t.assets.as_slice())
            .unwrap_or(&[]);
        // Extent of an asset once turned to the member's base yaw.
        let extent = |id: &String| {
            self.db.prefab(id).map_or((0.0, 0.0), |p| {
                rotated_extent(p.size.x, p.size.z, member.rotation)
            })
        };
        let chosen = match pick {
            AssetPick::Random => assets.choose(rng),
            AssetPick::WidestX => assets
                .iter()
                .max_by(|a, b| extent(a).0.total_cmp(&extent(b).0)),
            AssetPick::DeepestZ => assets
                .iter()
                .max_by(|a, b| extent(a).1.total_cmp(&extent(b).1)),
        };
        chosen.cloned().ok_or_else(|| {
            GenerationError::Database(format!(
                "asset group {} has no assets of type {}",
                self.name, member.object_type
            ))
        })
    }

    fn layout<R: Rng + ?Sized>(&self, pick: AssetPick, jitter: bool, rng: &mut R) -> Result<GroupPlacement> {
        let mut chosen: HashMap<&str, String> = HashMap::new();
        let mut members: Vec<MemberPlacement> = Vec::with_capacity(self.template.members.len());

        for member in &self.template.members {
            let asset_id = match chosen.get(member.name.as_str()) {
                Some(id) => id.clone(),
                None => {
                    let id = self.pick_asset(member, &pick, rng)?;
                    chosen.insert(member.name.as_str(), id.clone());
                    id
                }
            };
            let size = self.db.require_prefab(&asset_id)?.size;
            let jitter_deg = if jitter && member.dtheta > 0.0 {
                uniform(rng, -member.dtheta, member.dtheta)
            } else {
                0.0
            };
            let rotation = normalize_degrees(member.rotation + jitter_deg);
            let (w, d) = rotated_extent(size.x, size.z, rotation);

            let (x, y, z) = match member.parent.and_then(|p| members.get(p)) {
                None => (member.position.x, size.y / 2.0, member.position.z),
                Some(parent) => {
                    let (row, col) = ((member.anchor / 3) as f64, (member.anchor % 3) as f64);
                    let pw = parent.footprint.width();
                    let pd = parent.footprint.depth();
                    let mut x = parent.x + (col - 1.0) * pw / 2.0;
                    let mut z = parent.z + (row - 1.0) * pd / 2.0;
                    x += (member.x_alignment as f64 - 1.0) * w / 2.0;
                    z += (member.z_alignment as f64 - 1.0) * d / 2.0;
                    let y = match member.vertical {
                        VerticalAlignment::NextTo => size.y / 2.0,
                        VerticalAlignment::Above => {
                            let parent_size = self.db.require_prefab(&parent.asset_id)?.size;
                            parent.y + parent_size.y / 2.0 + size.y / 2.0
                        }
                    };
                    (x, y, z)
                }
            };

            members.push(MemberPlacement {
                name: member.name.clone(),
                asset_id,
                object_type: member.object_type.clone(),
                x,
                y,
                z,
                rotation,
                footprint: Rect::centered(x, z, w, d),
            });
        }

        let bounds = members
            .iter()
            .map(|m| m.footprint)
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| GenerationError::Database(format!("asset group {} is empty", self.name)))?;
        Ok(GroupPlacement { members, bounds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DB_JSON: &str = include_str!("../../../data/object_db.json");

    fn db() -> ObjectDatabase {
        ObjectDatabase::from_json(DB_JSON).unwrap()
    }

    #[test]
    fn nightstands_flank_the_bed_headboard() {
        let db = db();
        let template = &db.asset_groups["bed_with_nightstands"];
        let generator = AssetGroupGenerator::new("bed_with_nightstands", template, &db).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let placement = generator.sample_object_placement(&mut rng).unwrap();
        let bed = &placement.members[0];
        for stand in &placement.members[1..] {
            assert!(!stand.footprint.intersects(&bed.footprint));
            // Back edges line up.
            assert_relative_eq!(stand.footprint.z0, bed.footprint.z0, epsilon = 1e-9);
        }
        // Shared name means one asset for both nightstands.
        assert_eq!(placement.members[1].asset_id, placement.members[2].asset_id);
    }

    #[test]
    fn dimensions_cover_every_sample() {
        let db = db();
        for (name, template) in &db.asset_groups {
            let generator = AssetGroupGenerator::new(name, template, &db).unwrap();
            let (dx, dz) = generator.dimensions();
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            for _ in 0..20 {
                let p = generator.sample_object_placement(&mut rng).unwrap();
                // Jitter may widen a sample slightly past the nominal size.
                assert!(p.x_length() <= dx + 0.3, "{} x {} > {}", name, p.x_length(), dx);
                assert!(p.z_length() <= dz + 0.3, "{} z {} > {}", name, p.z_length(), dz);
            }
        }
    }

    #[test]
    fn world_transform_rotates_about_bounds_centre() {
        let db = db();
        let template = &db.asset_groups["bed_with_nightstands"];
        let generator = AssetGroupGenerator::new("bed_with_nightstands", template, &db).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let placement = generator.sample_object_placement(&mut rng).unwrap();
        let world = placement.to_world((10.0, 5.0), 90.0);
        let union = world
            .iter()
            .map(|m| m.footprint)
            .reduce(|a, b| a.union(&b))
            .unwrap();
        let (cx, cz) = union.center();
        assert_relative_eq!(cx, 10.0, epsilon = 1e-6);
        assert_relative_eq!(cz, 5.0, epsilon = 1e-6);
        assert_relative_eq!(union.width(), placement.z_length(), epsilon = 1e-6);
        assert_relative_eq!(world[0].rotation, 90.0, epsilon = 1e-9);
    }
}

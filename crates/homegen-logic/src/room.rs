//! Per-room placement state.
//!
//! A [`Room`] owns its polygon, the shrinking open area, the items committed
//! so far and a cache of free rectangles drawn from the open area.

use log::debug;
use rand::distributions::WeightedIndex;
use rand::prelude::*;

use crate::anchor::{Anchor, AnchorType};
use crate::asset_groups::MemberPlacement;
use crate::config::GenerationConfig;
use crate::geom::{Facing, Rect};
use crate::polygon::OrthogonalPolygon;
use crate::room_spec::RoomType;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedAsset {
    pub asset_id: String,
    pub object_type: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub facing: Facing,
    pub anchor_type: AnchorType,
    /// Object bounds on the floor.
    pub footprint: Rect,
    /// Anchored footprint plus clearances; removed from the open area.
    pub margined: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGroup {
    pub name: String,
    /// Members in world space.
    pub members: Vec<MemberPlacement>,
    pub x: f64,
    pub z: f64,
    pub facing: Facing,
    pub anchor_type: AnchorType,
    pub footprint: Rect,
    pub margined: Rect,
}

/// A committed floor item.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacedItem {
    Asset(PlacedAsset),
    Group(PlacedGroup),
}

impl PlacedItem {
    pub fn footprint(&self) -> Rect {
        match self {
            PlacedItem::Asset(a) => a.footprint,
            PlacedItem::Group(g) => g.footprint,
        }
    }

    pub fn margined_footprint(&self) -> Rect {
        match self {
            PlacedItem::Asset(a) => a.margined,
            PlacedItem::Group(g) => g.margined,
        }
    }

    pub fn anchor_type(&self) -> AnchorType {
        match self {
            PlacedItem::Asset(a) => a.anchor_type,
            PlacedItem::Group(g) => g.anchor_type,
        }
    }

    pub fn object_types(&self) -> Vec<&str> {
        match self {
            PlacedItem::Asset(a) => vec![a.object_type.as_str()],
            PlacedItem::Group(g) => g.members.iter().map(|m| m.object_type.as_str()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: u32,
    pub room_type: RoomType,
    pub room_polygon: OrthogonalPolygon,
    pub open_polygon: OrthogonalPolygon,
    pub items: Vec<PlacedItem>,
    rectangles: Vec<Rect>,
    rectangles_stale: bool,
}

impl Room {
    pub fn new(room_id: u32, room_type: RoomType, points: &[(f64, f64)]) -> Self {
        let polygon = OrthogonalPolygon::from_points(points);
        Self {
            room_id,
            room_type,
            open_polygon: polygon.clone(),
            room_polygon: polygon,
            items: Vec::new(),
            rectangles: Vec::new(),
            rectangles_stale: true,
        }
    }

    /// Carve `rect` out of the open area without committing an item.
    pub fn reserve(&mut self, rect: &Rect) {
        self.open_polygon.subtract(rect);
        self.rectangles_stale = true;
    }

    /// Add an item and remove its margined footprint from the open area.
    pub fn commit(&mut self, item: PlacedItem) {
        debug!(
            "room {} commits {:?} at {:?}",
            self.room_id,
            item.object_types(),
            item.footprint()
        );
        self.reserve(&item.margined_footprint());
        self.items.push(item);
    }

    /// Drop a rectangle that produced no placement so the next draw skips it.
    pub fn discard_rectangle(&mut self, rect: &Rect) {
        self.rectangles.retain(|r| r != rect);
    }

    /// Next free rectangle to try.
    ///
    /// Recomputes the cover only after the open area changed. With
    /// probability `p_largest_rectangle` (or when `force_largest`) the
    /// largest rectangle wins; otherwise one of the rectangles with both
    /// sides at least `min_rectangle_side` is drawn weighted by area.
    pub fn sample_next_rectangle<R: Rng + ?Sized>(
        &mut self,
        config: &GenerationConfig,
        force_largest: bool,
        rng: &mut R,
    ) -> Option<Rect> {
        if self.rectangles_stale {
            self.rectangles = self.open_polygon.all_rectangles(rng);
            self.rectangles_stale = false;
        }
        if self.rectangles.is_empty() {
            return None;
        }
        if force_largest || rng.gen::<f64>() < config.p_largest_rectangle {
            return self
                .rectangles
                .iter()
                .max_by(|a, b| a.area().total_cmp(&b.area()))
                .copied();
        }
        let big: Vec<&Rect> = self
            .rectangles
            .iter()
            .filter(|r| r.width() >= config.min_rectangle_side && r.depth() >= config.min_rectangle_side)
            .collect();
        let dist = WeightedIndex::new(big.iter().map(|r| r.area())).ok()?;
        Some(*big[dist.sample(rng)])
    }

    pub fn cached_rectangles(&self) -> &[Rect] {
        &self.rectangles
    }
}

/// Orientations in which `needed` (x, z, unrotated) fits strictly inside
/// `rect`; `true` means a quarter turn.
pub fn fitting_orientations(rect: &Rect, anchor: &Anchor, needed: (f64, f64)) -> Vec<bool> {
    let candidates: &[bool] = match anchor.forced_rotation() {
        Some(false) => &[false],
        Some(true) => &[true],
        None => &[false, true],
    };
    candidates
        .iter()
        .copied()
        .filter(|&rotated| {
            let (x, z) = if rotated { (needed.1, needed.0) } else { needed };
            x < rect.width() && z < rect.depth()
        })
        .collect()
}

/// Pick a facing for an object needing `needed` space in `rect`.
pub fn sample_rotation<R: Rng + ?Sized>(
    rect: &Rect,
    anchor: &Anchor,
    needed: (f64, f64),
    rng: &mut R,
) -> Option<Facing> {
    let rotated = *fitting_orientations(rect, anchor, needed).choose(rng)?;
    Some(match anchor.forced_facing(rotated) {
        Some(facing) => facing,
        None if rotated => *[Facing::PosX, Facing::NegX].choose(rng)?,
        None => *[Facing::PosZ, Facing::NegZ].choose(rng)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{AnchorDelta, AnchorLocation};
    use rand_chacha::ChaCha8Rng;

    fn square() -> Room {
        Room::new(
            1,
            RoomType::Bedroom,
            &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)],
        )
    }

    fn asset(footprint: Rect, margined: Rect) -> PlacedItem {
        PlacedItem::Asset(PlacedAsset {
            asset_id: "Bed_01".into(),
            object_type: "bed".into(),
            x: footprint.center().0,
            y: 0.3,
            z: footprint.center().1,
            facing: Facing::PosZ,
            anchor_type: AnchorType::InCorner,
            footprint,
            margined,
        })
    }

    #[test]
    fn commit_shrinks_open_area() {
        let mut room = square();
        let before = room.open_polygon.area();
        let fp = Rect::new(0.0, 0.0, 1.0, 2.0);
        room.commit(asset(fp, fp.expanded(0.1)));
        assert!(room.open_polygon.area() < before);
        assert_eq!(room.items.len(), 1);
        assert_eq!(room.room_polygon.area(), before);
    }

    #[test]
    fn largest_rectangle_is_whole_empty_room() {
        let mut room = square();
        let config = GenerationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let rect = room.sample_next_rectangle(&config, true, &mut rng).unwrap();
        assert_eq!(rect, Rect::new(0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn discarded_rectangles_are_not_drawn_again() {
        let mut room = square();
        let config = GenerationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let first = room.sample_next_rectangle(&config, true, &mut rng).unwrap();
        room.discard_rectangle(&first);
        let second = room.sample_next_rectangle(&config, true, &mut rng);
        assert_ne!(second, Some(first));
    }

    #[test]
    fn full_room_yields_nothing() {
        let mut room = square();
        room.reserve(&Rect::new(-1.0, -1.0, 5.0, 5.0));
        let config = GenerationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(room.sample_next_rectangle(&config, false, &mut rng).is_none());
    }

    #[test]
    fn edge_anchor_forces_orientation() {
        let anchor = Anchor {
            anchor_type: AnchorType::OnEdge,
            delta: AnchorDelta::new(3).unwrap(),
            location: AnchorLocation::Edge {
                from: (4.0, 0.0),
                to: (4.0, 1.0),
            },
        };
        let rect = Rect::new(0.0, 0.0, 4.0, 1.0);
        // The forced quarter turn puts 2.0 across a 1.0 deep rectangle.
        assert!(fitting_orientations(&rect, &anchor, (2.0, 0.8)).is_empty());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert_eq!(
            sample_rotation(&rect, &anchor, (2.0, 0.8), &mut rng),
            None
        );
        assert_eq!(
            sample_rotation(&Rect::new(0.0, 0.0, 1.0, 4.0), &anchor, (2.0, 0.8), &mut rng),
            Some(Facing::NegX)
        );
    }

    #[test]
    fn middle_anchor_picks_matching_axis() {
        let rect = Rect::new(0.0, 0.0, 3.0, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..10 {
            let facing = sample_rotation(&rect, &Anchor::middle(), (2.0, 0.5), &mut rng).unwrap();
            assert!(!facing.is_rotated());
        }
    }
}

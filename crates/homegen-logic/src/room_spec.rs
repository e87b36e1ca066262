//! Room adjacency specifications.
//!
//! A [`RoomSpec`] is a tree: leaves are concrete rooms with a target area
//! ratio, meta nodes group rooms that must reach each other without
//! passing through rooms outside the group.
//!
//! ```
//! use homegen_logic::room_spec::{RoomSpec, RoomNode, RoomType};
//!
//! let spec = RoomSpec::new(vec![
//!     RoomNode::leaf(1, RoomType::Bedroom, 2.0),
//!     RoomNode::leaf(2, RoomType::LivingRoom, 3.0),
//! ]);
//! assert!(spec.validate().is_ok());
//! assert_eq!(spec.leaves().len(), 2);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::EXTERIOR_ROOM_ID;
use crate::error::{GenerationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomType {
    Kitchen,
    LivingRoom,
    Bedroom,
    Bathroom,
}

impl RoomType {
    pub const ALL: [RoomType; 4] = [
        RoomType::Kitchen,
        RoomType::LivingRoom,
        RoomType::Bedroom,
        RoomType::Bathroom,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRoom {
    pub room_id: u32,
    pub room_type: RoomType,
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    /// Prefer doors to siblings over doors into other groups.
    #[serde(default)]
    pub avoid_doors_from_metarooms: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRoom {
    /// Explicit share of the parent's area; defaults to the children's sum.
    #[serde(default)]
    pub ratio: Option<f64>,
    pub children: Vec<RoomNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomNode {
    Leaf(LeafRoom),
    Meta(MetaRoom),
}

fn default_ratio() -> f64 {
    1.0
}

impl RoomNode {
    pub fn leaf(room_id: u32, room_type: RoomType, ratio: f64) -> Self {
        RoomNode::Leaf(LeafRoom {
            room_id,
            room_type,
            ratio,
            avoid_doors_from_metarooms: false,
        })
    }

    pub fn meta(children: Vec<RoomNode>) -> Self {
        RoomNode::Meta(MetaRoom {
            ratio: None,
            children,
        })
    }

    pub fn ratio(&self) -> f64 {
        match self {
            RoomNode::Leaf(leaf) => leaf.ratio,
            RoomNode::Meta(meta) => meta
                .ratio
                .unwrap_or_else(|| meta.children.iter().map(RoomNode::ratio).sum()),
        }
    }

    pub fn leaf_ids(&self) -> Vec<u32> {
        let mut out = Vec::new();
        self.collect_leaves(&mut |leaf| out.push(leaf.room_id));
        out
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_ids().len()
    }

    fn collect_leaves<'a>(&'a self, f: &mut dyn FnMut(&'a LeafRoom)) {
        match self {
            RoomNode::Leaf(leaf) => f(leaf),
            RoomNode::Meta(meta) => {
                for child in &meta.children {
                    child.collect_leaves(f);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSpec {
    pub spec: Vec<RoomNode>,
    /// Interior grid size `(rows, cols)`; derived from the room count if unset.
    #[serde(default)]
    pub dims: Option<(u32, u32)>,
}

impl RoomSpec {
    pub fn new(spec: Vec<RoomNode>) -> Self {
        Self { spec, dims: None }
    }

    pub fn with_dims(mut self, rows: u32, cols: u32) -> Self {
        self.dims = Some((rows, cols));
        self
    }

    pub fn leaves(&self) -> Vec<&LeafRoom> {
        let mut out = Vec::new();
        for node in &self.spec {
            node.collect_leaves(&mut |leaf| out.push(leaf));
        }
        out
    }

    pub fn leaf(&self, room_id: u32) -> Option<&LeafRoom> {
        self.leaves().into_iter().find(|l| l.room_id == room_id)
    }

    pub fn room_type(&self, room_id: u32) -> Option<RoomType> {
        self.leaf(room_id).map(|l| l.room_type)
    }

    /// Reject trees the floorplan builder cannot realize.
    pub fn validate(&self) -> Result<()> {
        if self.spec.is_empty() {
            return Err(GenerationError::InvalidRoomSpec("no rooms".into()));
        }
        let mut seen = HashSet::new();
        for leaf in self.leaves() {
            if leaf.room_id == EXTERIOR_ROOM_ID {
                return Err(GenerationError::InvalidRoomSpec(format!(
                    "room id {} is reserved for the exterior",
                    EXTERIOR_ROOM_ID
                )));
            }
            if !seen.insert(leaf.room_id) {
                return Err(GenerationError::InvalidRoomSpec(format!(
                    "duplicate room id {}",
                    leaf.room_id
                )));
            }
            if !(leaf.ratio > 0.0) {
                return Err(GenerationError::InvalidRoomSpec(format!(
                    "room {} has non-positive ratio {}",
                    leaf.room_id, leaf.ratio
                )));
            }
        }
        for node in &self.spec {
            check_meta(node)?;
        }
        if let Some((rows, cols)) = self.dims {
            if (rows as usize) * (cols as usize) < seen.len() {
                return Err(GenerationError::InvalidRoomSpec(format!(
                    "{}×{} grid cannot hold {} rooms",
                    rows,
                    cols,
                    seen.len()
                )));
            }
        }
        Ok(())
    }
}

fn check_meta(node: &RoomNode) -> Result<()> {
    if let RoomNode::Meta(meta) = node {
        if meta.children.is_empty() {
            return Err(GenerationError::InvalidRoomSpec("empty meta room".into()));
        }
        if let Some(r) = meta.ratio {
            if !(r > 0.0) {
                return Err(GenerationError::InvalidRoomSpec(format!(
                    "meta room has non-positive ratio {}",
                    r
                )));
            }
        }
        for child in &meta.children {
            check_meta(child)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> RoomSpec {
        RoomSpec::new(vec![
            RoomNode::leaf(2, RoomType::LivingRoom, 3.0),
            RoomNode::meta(vec![
                RoomNode::leaf(3, RoomType::Bedroom, 2.0),
                RoomNode::leaf(4, RoomType::Bathroom, 1.0),
            ]),
        ])
    }

    #[test]
    fn meta_ratio_sums_children() {
        let spec = nested();
        assert_eq!(spec.spec[1].ratio(), 3.0);
        assert_eq!(spec.spec[1].leaf_ids(), vec![3, 4]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let spec = RoomSpec::new(vec![
            RoomNode::leaf(1, RoomType::Bedroom, 1.0),
            RoomNode::leaf(1, RoomType::Kitchen, 1.0),
        ]);
        assert!(matches!(
            spec.validate(),
            Err(GenerationError::InvalidRoomSpec(_))
        ));
    }

    #[test]
    fn exterior_id_rejected() {
        let spec = RoomSpec::new(vec![RoomNode::leaf(0, RoomType::Bedroom, 1.0)]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn grid_too_small_rejected() {
        let spec = nested().with_dims(1, 2);
        assert!(spec.validate().is_err());
        assert!(nested().with_dims(3, 3).validate().is_ok());
    }

    #[test]
    fn parses_from_json() {
        let json = r#"{
            "spec": [
                {"room_id": 1, "room_type": "Kitchen", "ratio": 2},
                {"children": [
                    {"room_id": 2, "room_type": "Bedroom"},
                    {"room_id": 3, "room_type": "Bathroom", "avoid_doors_from_metarooms": true}
                ]}
            ],
            "dims": [6, 6]
        }"#;
        let spec: RoomSpec = serde_json::from_str(json).unwrap();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.room_type(3), Some(RoomType::Bathroom));
        assert!(spec.leaf(3).unwrap().avoid_doors_from_metarooms);
        assert_eq!(spec.dims, Some((6, 6)));
    }
}

//! Door and opening selection.
//!
//! The room spec tree is flattened into groups whose subgroups must end up
//! connected. Openings are chosen per group until all its subgroups form
//! one component, then every opening gets a concrete wall.

use std::collections::BTreeSet;

use log::{debug, warn};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{DoorWallChoice, GenerationConfig, OpenConnectionRule};
use crate::constants::EXTERIOR_ROOM_ID;
use crate::error::{GenerationError, Result};
use crate::house::{HouseStructure, RoomPair, WallMap, WallSegment};
use crate::room_spec::{RoomNode, RoomSpec};

/// What fills the wall where two rooms connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpeningKind {
    /// Wall with a hole and a door prefab in it.
    Doored,
    /// Wall with a hole and no door.
    Doorframe,
    /// No wall at all on that segment.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoorOpening {
    pub rooms: RoomPair,
    /// The consolidated wall run the opening was picked from.
    pub wall: WallSegment,
    /// The unit segment that hosts the opening.
    pub unit: WallSegment,
    pub kind: OpeningKind,
}

/// Subgroups of leaf ids that must end up connected to each other.
pub type NeighborGroup = Vec<Vec<u32>>;

/// Flatten the spec tree into connection groups, innermost first.
///
/// Each meta room contributes the groups of its children followed by one
/// group whose subgroups are its direct leaves and the flattened ids of its
/// nested metas. The top level forms the final group.
pub fn room_spec_neighbors(nodes: &[RoomNode]) -> Vec<NeighborGroup> {
    let mut out = Vec::new();
    let mut top: NeighborGroup = nodes
        .iter()
        .filter_map(|n| match n {
            RoomNode::Leaf(leaf) => Some(vec![leaf.room_id]),
            RoomNode::Meta(_) => None,
        })
        .collect();
    for node in nodes {
        if let RoomNode::Meta(meta) = node {
            out.extend(room_spec_neighbors(&meta.children));
            top.push(node.leaf_ids());
        }
    }
    out.push(top);
    out
}

/// Shuffle pairs, moving those touching an "avoid doors" room to the back.
pub fn randomly_prioritize<R: Rng + ?Sized>(
    pairs: Vec<RoomPair>,
    spec: &RoomSpec,
    rng: &mut R,
) -> Vec<RoomPair> {
    let avoids = |id: u32| spec.leaf(id).is_some_and(|l| l.avoid_doors_from_metarooms);
    let (mut avoided, mut preferred): (Vec<RoomPair>, Vec<RoomPair>) = pairs
        .into_iter()
        .partition(|p| avoids(p.0) || avoids(p.1));
    preferred.shuffle(rng);
    avoided.shuffle(rng);
    preferred.extend(avoided);
    preferred
}

fn find(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }
    let mut cur = i;
    while parent[cur] != root {
        let next = parent[cur];
        parent[cur] = root;
        cur = next;
    }
    root
}

/// Pick room pairs to open so every group's subgroups become connected.
///
/// Fails after `max_retries` draws per group; that means the requested
/// topology cannot be realized with the sampled floorplan.
pub fn select_openings<R: Rng + ?Sized>(
    neighboring: &BTreeSet<RoomPair>,
    groups: &[NeighborGroup],
    spec: &RoomSpec,
    max_retries: u32,
    rng: &mut R,
) -> Result<Vec<RoomPair>> {
    let mut selected: Vec<RoomPair> = Vec::new();
    for group in groups {
        let n = group.len();
        if n <= 1 {
            continue;
        }
        let mut parent: Vec<usize> = (0..n).collect();
        let mut components = n;
        let mut attempts = 0;
        while components > 1 {
            attempts += 1;
            if attempts > max_retries {
                return Err(GenerationError::UnconnectableRooms {
                    groups: group.clone(),
                    retries: max_retries,
                });
            }
            let i = rng.gen_range(0..n);
            let root_i = find(&mut parent, i);
            let mut others: Vec<usize> = (0..n).filter(|&j| find(&mut parent, j) != root_i).collect();
            others.shuffle(rng);

            'search: for j in others {
                let combos: Vec<RoomPair> = group[i]
                    .iter()
                    .flat_map(|&a| group[j].iter().map(move |&b| RoomPair::new(a, b)))
                    .collect();
                for combo in randomly_prioritize(combos, spec, rng) {
                    if neighboring.contains(&combo) {
                        selected.push(combo);
                        let root_j = find(&mut parent, j);
                        parent[root_j] = root_i;
                        components -= 1;
                        break 'search;
                    }
                }
            }
        }
    }
    let mut seen = BTreeSet::new();
    selected.retain(|p| seen.insert(*p));
    Ok(selected)
}

/// Choose rooms that get a door to the outside, preferred room types first.
pub fn select_outdoor_openings<R: Rng + ?Sized>(
    groups: &WallMap,
    spec: &RoomSpec,
    config: &GenerationConfig,
    rng: &mut R,
) -> Vec<RoomPair> {
    let mut candidates: Vec<RoomPair> = groups
        .keys()
        .filter(|p| p.touches_exterior())
        .copied()
        .collect();
    candidates.shuffle(rng);
    let target = rng.gen_range(config.min_doors_to_outside..=config.max_doors_to_outside) as usize;

    let is_preferred = |pair: &RoomPair| {
        spec.room_type(pair.other(EXTERIOR_ROOM_ID))
            .is_some_and(|t| config.preferred_rooms_to_outside.contains(&t))
    };

    let mut chosen = Vec::new();
    for preferred_pass in [true, false] {
        for pair in candidates.iter().filter(|p| is_preferred(p) == preferred_pass) {
            if chosen.len() >= target {
                return chosen;
            }
            chosen.push(*pair);
        }
        if chosen.len() >= config.min_doors_to_outside as usize {
            return chosen;
        }
    }
    if chosen.len() < config.min_doors_to_outside as usize {
        warn!(
            "only {} exterior doors available, wanted at least {}",
            chosen.len(),
            config.min_doors_to_outside
        );
    }
    chosen
}

/// Pick the wall run and unit segment hosting each opening.
pub fn select_door_walls<R: Rng + ?Sized>(
    openings: &[RoomPair],
    groups: &WallMap,
    choice: DoorWallChoice,
    rng: &mut R,
) -> Vec<(RoomPair, WallSegment, WallSegment)> {
    let mut out = Vec::new();
    for pair in openings {
        let Some(candidates) = groups.get(pair).filter(|c| !c.is_empty()) else {
            continue;
        };
        let wall = match choice {
            DoorWallChoice::Uniform => candidates.choose(rng).copied(),
            DoorWallChoice::LengthWeighted => WeightedIndex::new(candidates.iter().map(|w| w.length()))
                .ok()
                .map(|dist| candidates[dist.sample(rng)]),
        };
        let Some(wall) = wall else { continue };
        if let Some(unit) = wall.unit_segments().choose(rng).copied() {
            out.push((*pair, wall, unit));
        }
    }
    out
}

/// Doors to the outside are always doored; listed room-type pairs may
/// instead get a bare frame or no wall.
pub fn opening_kind<R: Rng + ?Sized>(
    pair: RoomPair,
    spec: &RoomSpec,
    rules: &[OpenConnectionRule],
    rng: &mut R,
) -> OpeningKind {
    if pair.touches_exterior() {
        return OpeningKind::Doored;
    }
    let (Some(a), Some(b)) = (spec.room_type(pair.0), spec.room_type(pair.1)) else {
        return OpeningKind::Doored;
    };
    for rule in rules.iter().filter(|r| r.matches(a, b)) {
        if rng.gen::<f64>() < rule.p {
            return if rng.gen::<f64>() < rule.p_frame {
                OpeningKind::Doorframe
            } else {
                OpeningKind::Open
            };
        }
    }
    OpeningKind::Doored
}

/// Select interior and exterior openings for `house`.
pub fn add_doors<R: Rng + ?Sized>(
    house: &HouseStructure,
    spec: &RoomSpec,
    config: &GenerationConfig,
    rng: &mut R,
) -> Result<Vec<DoorOpening>> {
    let neighboring: BTreeSet<RoomPair> = house.boundary_groups.keys().copied().collect();
    let groups = room_spec_neighbors(&spec.spec);
    let mut pairs = select_openings(&neighboring, &groups, spec, config.max_neighbor_retries, rng)?;
    pairs.extend(select_outdoor_openings(&house.boundary_groups, spec, config, rng));

    let doors: Vec<DoorOpening> =
        select_door_walls(&pairs, &house.boundary_groups, config.door_wall_choice, rng)
            .into_iter()
            .map(|(rooms, wall, unit)| DoorOpening {
                rooms,
                wall,
                unit,
                kind: opening_kind(rooms, spec, &config.open_room_connections, rng),
            })
            .collect();
    debug!("selected {} openings", doors.len());
    Ok(doors)
}

//! Non-overlap index for axis-aligned floor rectangles.
//!
//! Backed by an R-tree so the placement loops can probe hundreds of
//! rectangles per scene without a linear scan. Rectangles that merely share
//! an edge do not collide; a positive `gap` makes the index stricter by
//! demanding that much free space between neighbours.

use rstar::{RTree, RTreeObject, AABB};

use crate::geom::Rect;

#[derive(Debug, Clone)]
struct IndexedRect {
    name: String,
    rect: Rect,
}

impl RTreeObject for IndexedRect {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.rect.x0, self.rect.z0], [self.rect.x1, self.rect.z1])
    }
}

#[derive(Debug, Default)]
pub struct RectIndex {
    tree: RTree<IndexedRect>,
    gap: f64,
}

impl RectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gap(gap: f64) -> Self {
        Self {
            tree: RTree::new(),
            gap: gap.max(0.0),
        }
    }

    /// Record `rect` regardless of what it overlaps.
    pub fn insert(&mut self, name: impl Into<String>, rect: Rect) {
        self.tree.insert(IndexedRect {
            name: name.into(),
            rect,
        });
    }

    /// Record `rect` only if it collides with nothing already stored.
    pub fn place(&mut self, name: impl Into<String>, rect: Rect) -> bool {
        if self.intersects(&rect) {
            return false;
        }
        self.insert(name, rect);
        true
    }

    /// Place an `x_size × z_size` rectangle centred on `(x, z)`.
    pub fn place_centered(
        &mut self,
        name: impl Into<String>,
        x: f64,
        z: f64,
        x_size: f64,
        z_size: f64,
    ) -> bool {
        self.place(name, Rect::centered(x, z, x_size, z_size))
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        self.colliding(rect).next().is_some()
    }

    /// Names of stored rectangles that collide with `rect`.
    pub fn intersecting_names(&self, rect: &Rect) -> Vec<&str> {
        self.colliding(rect).map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    fn colliding<'a>(&'a self, rect: &Rect) -> impl Iterator<Item = &'a IndexedRect> + 'a {
        let probe = rect.expanded(self.gap / 2.0);
        let envelope = AABB::from_corners([probe.x0, probe.z0], [probe.x1, probe.z1]);
        let gap = self.gap;
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(move |item| item.rect.expanded(gap / 2.0).intersects(&probe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_rejects_overlap() {
        let mut index = RectIndex::new();
        assert!(index.place("bed", Rect::new(0.0, 0.0, 2.0, 1.0)));
        assert!(!index.place("chair", Rect::new(1.5, 0.5, 2.5, 1.5)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn shared_edge_is_not_a_collision() {
        let mut index = RectIndex::new();
        index.insert("a", Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(index.place("b", Rect::new(1.0, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn gap_makes_neighbours_collide() {
        let mut index = RectIndex::with_gap(0.1);
        index.insert("a", Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(index.intersects(&Rect::new(1.05, 0.0, 2.0, 1.0)));
        assert!(!index.intersects(&Rect::new(1.2, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn insert_ignores_collisions() {
        let mut index = RectIndex::new();
        index.insert("door", Rect::new(0.0, 0.0, 1.0, 1.0));
        index.insert("door", Rect::new(0.5, 0.5, 1.5, 1.5));
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.intersecting_names(&Rect::new(0.6, 0.6, 0.7, 0.7)),
            vec!["door", "door"]
        );
    }

    #[test]
    fn many_disjoint_rectangles() {
        let mut index = RectIndex::new();
        for i in 0..20 {
            for j in 0..20 {
                let (x, z) = (i as f64, j as f64);
                assert!(index.place_centered(format!("{i}-{j}"), x, z, 0.9, 0.9));
            }
        }
        assert_eq!(index.len(), 400);
        assert!(!index.intersects(&Rect::centered(10.5, 10.5, 0.05, 0.05)));
        assert!(index.intersects(&Rect::centered(10.0, 10.0, 0.1, 0.1)));
    }
}

//! Snap index
//!
//! Point snaps contributed by each item, partitioned into a live map and a
//! hidden map. Hiding an item moves its snaps wholesale between the two so
//! unhiding restores them without recomputation.

use std::hash::{Hash, Hasher};

use glam::Vec3;
use tracing::debug;
use uuid::Uuid;

use crate::memento::{invariant, InvariantViolation, MementoOriginator};

/// What a point snap anchors to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapKind {
    Begin,
    End,
    Midpoint,
    FaceCenter,
}

/// A snappable point in space
#[derive(Debug, Clone, Copy)]
pub struct PointSnap {
    pub position: Vec3,
    pub kind: SnapKind,
}

impl PointSnap {
    /// Create a snap at a position
    pub fn new(position: Vec3, kind: SnapKind) -> Self {
        Self { position, kind }
    }

    fn bits(&self) -> [u32; 3] {
        self.position.to_array().map(f32::to_bits)
    }
}

// Snaps live in hash sets; equality is exact bit equality of the position,
// which is what dedup wants (snaps are computed, never user-typed).
impl PartialEq for PointSnap {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.bits() == other.bits()
    }
}

impl Eq for PointSnap {}

impl Hash for PointSnap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.bits().hash(state);
    }
}

/// Snapshot of the snap index
#[derive(Debug, Clone)]
pub struct SnapMemento {
    pub id_to_snaps: im::HashMap<Uuid, im::HashSet<PointSnap>>,
    pub hidden: im::HashMap<Uuid, im::HashSet<PointSnap>>,
}

/// The snap index
#[derive(Debug, Default)]
pub struct SnapDatabase {
    id_to_snaps: im::HashMap<Uuid, im::HashSet<PointSnap>>,
    hidden: im::HashMap<Uuid, im::HashSet<PointSnap>>,
}

impl SnapDatabase {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add snaps contributed by an item
    pub fn add_snaps(&mut self, id: Uuid, snaps: impl IntoIterator<Item = PointSnap>) {
        let target = if self.hidden.contains_key(&id) {
            self.hidden.entry(id).or_default()
        } else {
            self.id_to_snaps.entry(id).or_default()
        };
        for snap in snaps {
            target.insert(snap);
        }
    }

    /// Drop every snap contributed by an item
    pub fn remove_item(&mut self, id: Uuid) {
        self.id_to_snaps.remove(&id);
        self.hidden.remove(&id);
    }

    /// Move an item's snaps out of the live set
    pub fn hide_item(&mut self, id: Uuid) {
        if let Some(snaps) = self.id_to_snaps.remove(&id) {
            self.hidden.insert(id, snaps);
        }
    }

    /// Move an item's snaps back into the live set
    pub fn show_item(&mut self, id: Uuid) {
        if let Some(snaps) = self.hidden.remove(&id) {
            self.id_to_snaps.insert(id, snaps);
        }
    }

    /// Every live snap point
    pub fn all_points(&self) -> Vec<PointSnap> {
        let mut points: Vec<PointSnap> = self
            .id_to_snaps
            .values()
            .flat_map(|snaps| snaps.iter().copied())
            .collect();
        points.sort_by(|a, b| {
            a.position
                .to_array()
                .partial_cmp(&b.position.to_array())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        points
    }

    /// Live snaps contributed by one item
    pub fn snaps_for(&self, id: Uuid) -> Option<&im::HashSet<PointSnap>> {
        self.id_to_snaps.get(&id)
    }

    /// Check that no item is both live and hidden
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for id in self.id_to_snaps.keys() {
            invariant(!self.hidden.contains_key(id), || {
                format!("item {id} has both live and hidden snaps")
            })?;
        }
        Ok(())
    }

    /// Log a summary of the index
    pub fn debug(&self) {
        debug!(
            live_items = self.id_to_snaps.len(),
            hidden_items = self.hidden.len(),
            points = self.all_points().len(),
            "snap index"
        );
    }
}

impl MementoOriginator for SnapDatabase {
    type Memento = SnapMemento;

    fn save_to_memento(&self) -> SnapMemento {
        SnapMemento {
            id_to_snaps: self.id_to_snaps.clone(),
            hidden: self.hidden.clone(),
        }
    }

    fn restore_from_memento(&mut self, memento: &SnapMemento) {
        self.id_to_snaps = memento.id_to_snaps.clone();
        self.hidden = memento.hidden.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(x: f32) -> PointSnap {
        PointSnap::new(Vec3::new(x, 0.0, 0.0), SnapKind::Begin)
    }

    #[test]
    fn hide_and_show_move_snaps_wholesale() {
        let mut snaps = SnapDatabase::new();
        let id = Uuid::new_v4();
        snaps.add_snaps(id, [snap(1.0), snap(2.0)]);
        assert_eq!(snaps.all_points().len(), 2);

        snaps.hide_item(id);
        assert!(snaps.all_points().is_empty());
        snaps.validate().unwrap();

        snaps.show_item(id);
        assert_eq!(snaps.all_points().len(), 2);
        snaps.validate().unwrap();
    }

    #[test]
    fn snaps_added_while_hidden_stay_hidden() {
        let mut snaps = SnapDatabase::new();
        let id = Uuid::new_v4();
        snaps.add_snaps(id, [snap(1.0)]);
        snaps.hide_item(id);
        snaps.add_snaps(id, [snap(2.0)]);
        assert!(snaps.all_points().is_empty());
        snaps.show_item(id);
        assert_eq!(snaps.all_points().len(), 2);
    }

    #[test]
    fn duplicate_points_are_deduplicated() {
        let mut snaps = SnapDatabase::new();
        let id = Uuid::new_v4();
        snaps.add_snaps(id, [snap(1.0), snap(1.0)]);
        assert_eq!(snaps.all_points().len(), 1);
    }

    #[test]
    fn memento_round_trip() {
        let mut snaps = SnapDatabase::new();
        let id = Uuid::new_v4();
        snaps.add_snaps(id, [snap(1.0)]);
        snaps.hide_item(id);
        let memento = snaps.save_to_memento();

        snaps.remove_item(id);
        snaps.restore_from_memento(&memento);
        snaps.show_item(id);
        assert_eq!(snaps.all_points().len(), 1);
        snaps.validate().unwrap();
    }
}

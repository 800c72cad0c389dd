//! Geometry database
//!
//! Owns the identity→{view, model} mapping for every modeled item, the
//! topology and control-point sub-item maps, and the hidden/invisible/
//! automatic id sets. All snapshot-visible collections are persistent
//! (`im`), so capturing a memento is an O(1) structural-sharing clone.

use std::sync::Arc;

use burin_kernel::{Model, ModelItem, ModelKernel, SubItem};
use tracing::debug;
use uuid::Uuid;

use crate::memento::{invariant, InvariantViolation, MementoOriginator};
use crate::view::{ControlPointId, TopologyId, ViewControlPoint, ViewItem, ViewKind, ViewSubItem};

/// A stored item: the scene-side handle and the model-side value
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEntry {
    pub view: ViewItem,
    pub model: ModelItem,
}

/// A stored topology sub-item (face or edge)
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyEntry {
    pub model: SubItem,
    pub views: im::HashSet<ViewSubItem>,
}

/// A stored control point of a curve
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPointEntry {
    pub index: u32,
    pub views: im::HashSet<ViewControlPoint>,
}

/// Snapshot of the geometry database
#[derive(Debug, Clone)]
pub struct GeometryMemento {
    pub items: im::HashMap<Uuid, ItemEntry>,
    pub topology: im::HashMap<TopologyId, TopologyEntry>,
    pub control_points: im::HashMap<ControlPointId, ControlPointEntry>,
    pub hidden: im::HashSet<Uuid>,
    pub invisible: im::HashSet<Uuid>,
    pub automatics: im::HashSet<Uuid>,
}

impl GeometryMemento {
    /// Flatten into the persistable model container
    ///
    /// Automatically generated items are construction byproducts and are
    /// excluded; entries are ordered by identity so the payload bytes are
    /// deterministic.
    pub fn to_model(&self) -> Model {
        let mut ids: Vec<Uuid> = self
            .items
            .keys()
            .filter(|id| !self.automatics.contains(*id))
            .copied()
            .collect();
        ids.sort();
        let mut model = Model::new();
        for id in ids {
            model.add_item(id, self.items[&id].model.clone());
        }
        model
    }

    /// Encode the flattened model as payload bytes
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.to_model())
    }
}

/// The geometry store
pub struct GeometryDatabase {
    items: im::HashMap<Uuid, ItemEntry>,
    topology: im::HashMap<TopologyId, TopologyEntry>,
    control_points: im::HashMap<ControlPointId, ControlPointEntry>,
    hidden: im::HashSet<Uuid>,
    invisible: im::HashSet<Uuid>,
    automatics: im::HashSet<Uuid>,
    kernel: Arc<dyn ModelKernel>,
}

impl std::fmt::Debug for GeometryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryDatabase")
            .field("items", &self.items.len())
            .field("topology", &self.topology.len())
            .field("control_points", &self.control_points.len())
            .field("kernel", &self.kernel.name())
            .finish()
    }
}

impl GeometryDatabase {
    /// Create an empty database over a modeling kernel
    pub fn new(kernel: Arc<dyn ModelKernel>) -> Self {
        Self {
            items: im::HashMap::new(),
            topology: im::HashMap::new(),
            control_points: im::HashMap::new(),
            hidden: im::HashSet::new(),
            invisible: im::HashSet::new(),
            automatics: im::HashSet::new(),
            kernel,
        }
    }

    /// Rebuild a database from a persisted model container
    ///
    /// Item identities are preserved exactly as persisted; sub-item records
    /// are re-derived through the kernel.
    pub fn from_model(model: &Model, kernel: Arc<dyn ModelKernel>) -> Self {
        let mut db = Self::new(kernel);
        for (id, item) in model.iter() {
            db.insert(*id, item.clone());
        }
        db
    }

    /// The kernel behind this database
    pub fn kernel(&self) -> &Arc<dyn ModelKernel> {
        &self.kernel
    }

    /// Add an item under a fresh identity
    pub fn add_item(&mut self, item: ModelItem) -> Uuid {
        let id = Uuid::new_v4();
        self.insert(id, item);
        id
    }

    /// Add an automatically-generated item under a fresh identity
    pub fn add_automatic(&mut self, item: ModelItem) -> Uuid {
        let id = self.add_item(item);
        self.automatics.insert(id);
        id
    }

    /// Replace an item's model, assigning a fresh identity
    ///
    /// Hidden/invisible/automatic flags carry over to the new identity.
    pub fn replace_item(&mut self, from: Uuid, item: ModelItem) -> Result<Uuid, DatabaseError> {
        if !self.items.contains_key(&from) {
            return Err(DatabaseError::ItemNotFound(from));
        }
        let was_hidden = self.hidden.contains(&from);
        let was_invisible = self.invisible.contains(&from);
        let was_automatic = self.automatics.contains(&from);
        self.remove_item(from)?;
        let id = self.add_item(item);
        if was_hidden {
            self.hidden.insert(id);
        }
        if was_invisible {
            self.invisible.insert(id);
        }
        if was_automatic {
            self.automatics.insert(id);
        }
        Ok(id)
    }

    /// Remove an item and all of its sub-item records
    pub fn remove_item(&mut self, id: Uuid) -> Result<(), DatabaseError> {
        if self.items.remove(&id).is_none() {
            return Err(DatabaseError::ItemNotFound(id));
        }
        let topo: Vec<TopologyId> = self.topology.keys().filter(|t| t.item == id).copied().collect();
        for key in topo {
            self.topology.remove(&key);
        }
        let points: Vec<ControlPointId> = self
            .control_points
            .keys()
            .filter(|c| c.item == id)
            .copied()
            .collect();
        for key in points {
            self.control_points.remove(&key);
        }
        self.hidden.remove(&id);
        self.invisible.remove(&id);
        self.automatics.remove(&id);
        Ok(())
    }

    /// Deep-copy an item under a fresh identity
    pub fn duplicate(&mut self, id: Uuid) -> Result<Uuid, DatabaseError> {
        let entry = self.items.get(&id).ok_or(DatabaseError::ItemNotFound(id))?;
        let model = entry.model.clone();
        Ok(self.add_item(model))
    }

    /// Look up an item by identity
    pub fn lookup_item(&self, id: Uuid) -> Option<&ItemEntry> {
        self.items.get(&id)
    }

    /// Look up a topology sub-item by composite identity
    pub fn lookup_topology(&self, id: TopologyId) -> Option<&TopologyEntry> {
        self.topology.get(&id)
    }

    /// Look up a control point by composite identity
    pub fn lookup_control_point(&self, id: ControlPointId) -> Option<&ControlPointEntry> {
        self.control_points.get(&id)
    }

    /// All items, optionally including automatically-generated ones
    pub fn find_all(&self, include_automatics: bool) -> Vec<(Uuid, &ItemEntry)> {
        let mut all: Vec<(Uuid, &ItemEntry)> = self
            .items
            .iter()
            .filter(|(id, _)| include_automatics || !self.automatics.contains(*id))
            .map(|(id, entry)| (*id, entry))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Handles of every item that is neither hidden nor invisible
    pub fn visible_items(&self) -> Vec<ViewItem> {
        let mut visible: Vec<ViewItem> = self
            .items
            .iter()
            .filter(|(id, _)| !self.hidden.contains(*id) && !self.invisible.contains(*id))
            .map(|(_, entry)| entry.view)
            .collect();
        visible.sort_by_key(|v| v.id);
        visible
    }

    /// Handles the user may pick: visible and not automatically generated
    pub fn selectable_items(&self) -> Vec<ViewItem> {
        self.visible_items()
            .into_iter()
            .filter(|v| !self.automatics.contains(&v.id))
            .collect()
    }

    /// Check the user-hidden flag
    pub fn is_hidden(&self, id: Uuid) -> bool {
        self.hidden.contains(&id)
    }

    /// Set or clear the user-hidden flag
    pub fn make_hidden(&mut self, id: Uuid, value: bool) -> Result<(), DatabaseError> {
        if !self.items.contains_key(&id) {
            return Err(DatabaseError::ItemNotFound(id));
        }
        if value {
            self.hidden.insert(id);
        } else {
            self.hidden.remove(&id);
        }
        Ok(())
    }

    /// Clear every user-hidden flag, returning the newly revealed items
    pub fn unhide_all(&mut self) -> Vec<Uuid> {
        let mut revealed: Vec<Uuid> = self.hidden.iter().copied().collect();
        revealed.sort();
        self.hidden.clear();
        revealed
    }

    /// Check the visibility flag
    pub fn is_visible(&self, id: Uuid) -> bool {
        !self.invisible.contains(&id)
    }

    /// Set or clear the visibility flag
    pub fn make_visible(&mut self, id: Uuid, value: bool) -> Result<(), DatabaseError> {
        if !self.items.contains_key(&id) {
            return Err(DatabaseError::ItemNotFound(id));
        }
        if value {
            self.invisible.remove(&id);
        } else {
            self.invisible.insert(id);
        }
        Ok(())
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if no item is stored
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Encode the flattened model as payload bytes
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.save_to_memento().serialize()
    }

    fn insert(&mut self, id: Uuid, item: ModelItem) {
        let kind = match item {
            ModelItem::Solid(_) => ViewKind::Solid,
            ModelItem::Curve(_) => ViewKind::Curve,
        };
        self.index_subitems(id, &item);
        self.items.insert(
            id,
            ItemEntry {
                view: ViewItem::new(id, kind),
                model: item,
            },
        );
    }

    fn index_subitems(&mut self, id: Uuid, item: &ModelItem) {
        match item {
            ModelItem::Solid(solid) => {
                let mut index = 0u32;
                match self.kernel.faces(solid) {
                    Ok(faces) => {
                        for face in faces {
                            let key = TopologyId::new(id, index);
                            self.topology.insert(
                                key,
                                TopologyEntry {
                                    model: SubItem::Face(face),
                                    views: im::hashset![ViewSubItem::Face(key)],
                                },
                            );
                            index += 1;
                        }
                    }
                    Err(e) => debug!(item = %id, "face indexing skipped: {e}"),
                }
                match self.kernel.edges(solid) {
                    Ok(edges) => {
                        for edge in edges {
                            let key = TopologyId::new(id, index);
                            self.topology.insert(
                                key,
                                TopologyEntry {
                                    model: SubItem::Edge(edge),
                                    views: im::hashset![ViewSubItem::Edge(key)],
                                },
                            );
                            index += 1;
                        }
                    }
                    Err(e) => debug!(item = %id, "edge indexing skipped: {e}"),
                }
            }
            ModelItem::Curve(curve) => {
                for (i, _) in curve.points.iter().enumerate() {
                    let key = ControlPointId::new(id, i as u32);
                    self.control_points.insert(
                        key,
                        ControlPointEntry {
                            index: i as u32,
                            views: im::hashset![ViewControlPoint { id: key }],
                        },
                    );
                }
            }
        }
    }

    /// Check every internal invariant
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for id in &self.automatics {
            invariant(self.items.contains_key(id), || {
                format!("automatic {id} is not a stored item")
            })?;
        }
        for id in self.hidden.iter().chain(self.invisible.iter()) {
            invariant(self.items.contains_key(id), || {
                format!("flagged {id} is not a stored item")
            })?;
        }
        for (key, _) in &self.topology {
            let Some(entry) = self.items.get(&key.item) else {
                return Err(InvariantViolation(format!(
                    "topology {key:?} references missing item"
                )));
            };
            invariant(entry.model.as_solid().is_some(), || {
                format!("topology {key:?} references a non-solid item")
            })?;
        }
        for (key, entry) in &self.control_points {
            invariant(entry.index == key.index, || {
                format!("control point {key:?} stored under wrong index")
            })?;
            let Some(item) = self.items.get(&key.item) else {
                return Err(InvariantViolation(format!(
                    "control point {key:?} references missing item"
                )));
            };
            invariant(
                item.model
                    .as_curve()
                    .is_some_and(|c| (key.index as usize) < c.points.len()),
                || format!("control point {key:?} out of range"),
            )?;
        }
        Ok(())
    }

    /// Log a summary of the stored state
    pub fn debug(&self) {
        debug!(
            items = self.items.len(),
            topology = self.topology.len(),
            control_points = self.control_points.len(),
            hidden = self.hidden.len(),
            invisible = self.invisible.len(),
            automatics = self.automatics.len(),
            "geometry database"
        );
    }
}

impl MementoOriginator for GeometryDatabase {
    type Memento = GeometryMemento;

    fn save_to_memento(&self) -> GeometryMemento {
        GeometryMemento {
            items: self.items.clone(),
            topology: self.topology.clone(),
            control_points: self.control_points.clone(),
            hidden: self.hidden.clone(),
            invisible: self.invisible.clone(),
            automatics: self.automatics.clone(),
        }
    }

    fn restore_from_memento(&mut self, memento: &GeometryMemento) {
        self.items = memento.items.clone();
        self.topology = memento.topology.clone();
        self.control_points = memento.control_points.clone();
        self.hidden = memento.hidden.clone();
        self.invisible = memento.invisible.clone();
        self.automatics = memento.automatics.clone();
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DatabaseError {
    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use burin_kernel::{default_kernel, Curve3, ModelItem, Solid};
    use glam::Vec3;

    fn db() -> GeometryDatabase {
        GeometryDatabase::new(default_kernel())
    }

    fn cube() -> ModelItem {
        ModelItem::Solid(Solid::cuboid(Vec3::ZERO, Vec3::splat(2.0)))
    }

    fn line() -> ModelItem {
        ModelItem::Curve(Curve3::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], false))
    }

    #[test]
    fn add_indexes_faces_edges_and_control_points() {
        let mut db = db();
        let solid = db.add_item(cube());
        let curve = db.add_item(line());

        // 6 faces + 12 feature edges
        assert!(db.lookup_topology(TopologyId::new(solid, 0)).is_some());
        assert!(db.lookup_topology(TopologyId::new(solid, 17)).is_some());
        assert!(db.lookup_topology(TopologyId::new(solid, 18)).is_none());

        assert!(db.lookup_control_point(ControlPointId::new(curve, 2)).is_some());
        assert!(db.lookup_control_point(ControlPointId::new(curve, 3)).is_none());
        db.validate().unwrap();
    }

    #[test]
    fn remove_clears_subitem_records() {
        let mut db = db();
        let solid = db.add_item(cube());
        db.remove_item(solid).unwrap();
        assert!(db.lookup_item(solid).is_none());
        assert!(db.lookup_topology(TopologyId::new(solid, 0)).is_none());
        db.validate().unwrap();
    }

    #[test]
    fn replace_assigns_a_fresh_identity_and_keeps_flags() {
        let mut db = db();
        let before = db.add_item(cube());
        db.make_hidden(before, true).unwrap();
        let after = db.replace_item(before, cube()).unwrap();
        assert_ne!(before, after);
        assert!(db.lookup_item(before).is_none());
        assert!(db.is_hidden(after));
    }

    #[test]
    fn removing_a_missing_item_is_an_error() {
        let mut db = db();
        assert!(matches!(
            db.remove_item(Uuid::new_v4()),
            Err(DatabaseError::ItemNotFound(_))
        ));
    }

    #[test]
    fn unhide_all_reveals_exactly_the_hidden_set() {
        let mut db = db();
        let a = db.add_item(cube());
        let b = db.add_item(cube());
        let c = db.add_item(cube());
        db.make_hidden(a, true).unwrap();
        db.make_hidden(b, true).unwrap();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(db.unhide_all(), expected);
        assert!(!db.is_hidden(a));
        assert_eq!(db.visible_items().len(), 3);
        let _ = c;
    }

    #[test]
    fn automatics_are_excluded_from_the_flattened_model() {
        let mut db = db();
        let kept = db.add_item(cube());
        let auto = db.add_automatic(line());
        let model = db.save_to_memento().to_model();
        let ids: Vec<Uuid> = model.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![kept]);
        assert!(db.find_all(true).iter().any(|(id, _)| *id == auto));
        assert!(!db.find_all(false).iter().any(|(id, _)| *id == auto));
    }

    #[test]
    fn memento_round_trip_restores_everything() {
        let mut db = db();
        let solid = db.add_item(cube());
        let ghost = db.add_item(cube());
        let auto = db.add_automatic(line());
        db.make_hidden(solid, true).unwrap();
        db.make_visible(ghost, false).unwrap();
        let memento = db.save_to_memento();

        db.remove_item(solid).unwrap();
        db.remove_item(auto).unwrap();
        let _ = db.add_item(line());
        assert!(db.lookup_item(solid).is_none());

        db.restore_from_memento(&memento);
        assert!(db.lookup_item(solid).is_some());
        assert!(db.is_hidden(solid));
        assert!(!db.is_visible(ghost));
        assert!(db.find_all(true).iter().any(|(id, _)| *id == auto));
        assert_eq!(db.len(), 3);
        db.validate().unwrap();
    }

    #[test]
    fn persisted_model_preserves_identities() {
        let mut db = db();
        let solid = db.add_item(cube());
        let bytes = db.serialize().unwrap();
        let model: Model = serde_json::from_slice(&bytes).unwrap();
        let restored = GeometryDatabase::from_model(&model, default_kernel());
        assert!(restored.lookup_item(solid).is_some());
        restored.validate().unwrap();
    }
}

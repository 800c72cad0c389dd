//! Selection database
//!
//! Tracks what the user has selected, one id-set per kind, plus a counted
//! multiset of parents with selected sub-items so "does this solid still
//! have any selected topology" is O(1).

use tracing::debug;
use uuid::Uuid;

use crate::memento::{invariant, InvariantViolation, MementoOriginator};
use crate::util::RefCounter;
use crate::view::{ControlPointId, TopologyId};

/// Snapshot of the selection database
#[derive(Debug, Clone)]
pub struct SelectionMemento {
    pub solids: im::HashSet<Uuid>,
    pub curves: im::HashSet<Uuid>,
    pub faces: im::HashSet<TopologyId>,
    pub edges: im::HashSet<TopologyId>,
    pub control_points: im::HashSet<ControlPointId>,
    pub parents_with_selected_children: RefCounter<Uuid>,
}

/// The selection store
#[derive(Debug, Default)]
pub struct SelectionDatabase {
    solids: im::HashSet<Uuid>,
    curves: im::HashSet<Uuid>,
    faces: im::HashSet<TopologyId>,
    edges: im::HashSet<TopologyId>,
    control_points: im::HashSet<ControlPointId>,
    parents_with_selected_children: RefCounter<Uuid>,
}

impl SelectionDatabase {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a solid
    pub fn add_solid(&mut self, id: Uuid) {
        self.solids.insert(id);
    }

    /// Deselect a solid
    pub fn remove_solid(&mut self, id: Uuid) {
        self.solids.remove(&id);
    }

    /// Select a curve
    pub fn add_curve(&mut self, id: Uuid) {
        self.curves.insert(id);
    }

    /// Deselect a curve
    pub fn remove_curve(&mut self, id: Uuid) {
        self.curves.remove(&id);
    }

    /// Select a face
    pub fn add_face(&mut self, id: TopologyId) {
        if self.faces.insert(id).is_none() {
            self.parents_with_selected_children.incr(id.item);
        }
    }

    /// Deselect a face
    pub fn remove_face(&mut self, id: TopologyId) {
        if self.faces.remove(&id).is_some() {
            self.parents_with_selected_children.decr(&id.item);
        }
    }

    /// Select an edge
    pub fn add_edge(&mut self, id: TopologyId) {
        if self.edges.insert(id).is_none() {
            self.parents_with_selected_children.incr(id.item);
        }
    }

    /// Deselect an edge
    pub fn remove_edge(&mut self, id: TopologyId) {
        if self.edges.remove(&id).is_some() {
            self.parents_with_selected_children.decr(&id.item);
        }
    }

    /// Select a control point
    pub fn add_control_point(&mut self, id: ControlPointId) {
        if self.control_points.insert(id).is_none() {
            self.parents_with_selected_children.incr(id.item);
        }
    }

    /// Deselect a control point
    pub fn remove_control_point(&mut self, id: ControlPointId) {
        if self.control_points.remove(&id).is_some() {
            self.parents_with_selected_children.decr(&id.item);
        }
    }

    /// Check whether any sub-item of a parent is selected
    pub fn has_selected_children(&self, parent: Uuid) -> bool {
        self.parents_with_selected_children.has(&parent)
    }

    /// Check whether a solid is selected
    pub fn is_solid_selected(&self, id: Uuid) -> bool {
        self.solids.contains(&id)
    }

    /// Check whether a curve is selected
    pub fn is_curve_selected(&self, id: Uuid) -> bool {
        self.curves.contains(&id)
    }

    /// Selected solid ids
    pub fn solids(&self) -> &im::HashSet<Uuid> {
        &self.solids
    }

    /// Selected curve ids
    pub fn curves(&self) -> &im::HashSet<Uuid> {
        &self.curves
    }

    /// Selected face ids
    pub fn faces(&self) -> &im::HashSet<TopologyId> {
        &self.faces
    }

    /// Selected edge ids
    pub fn edges(&self) -> &im::HashSet<TopologyId> {
        &self.edges
    }

    /// Selected control point ids
    pub fn control_points(&self) -> &im::HashSet<ControlPointId> {
        &self.control_points
    }

    /// Clear the entire selection
    pub fn deselect_all(&mut self) {
        self.solids.clear();
        self.curves.clear();
        self.faces.clear();
        self.edges.clear();
        self.control_points.clear();
        self.parents_with_selected_children.clear();
    }

    /// Check that the parent counter matches the selected sub-items
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut expected: RefCounter<Uuid> = RefCounter::new();
        for face in &self.faces {
            expected.incr(face.item);
        }
        for edge in &self.edges {
            expected.incr(edge.item);
        }
        for point in &self.control_points {
            expected.incr(point.item);
        }
        invariant(expected == self.parents_with_selected_children, || {
            "parent refcounts disagree with selected sub-items".to_string()
        })
    }

    /// Log a summary of the selection
    pub fn debug(&self) {
        debug!(
            solids = self.solids.len(),
            curves = self.curves.len(),
            faces = self.faces.len(),
            edges = self.edges.len(),
            control_points = self.control_points.len(),
            "selection"
        );
    }
}

impl MementoOriginator for SelectionDatabase {
    type Memento = SelectionMemento;

    fn save_to_memento(&self) -> SelectionMemento {
        SelectionMemento {
            solids: self.solids.clone(),
            curves: self.curves.clone(),
            faces: self.faces.clone(),
            edges: self.edges.clone(),
            control_points: self.control_points.clone(),
            parents_with_selected_children: self.parents_with_selected_children.clone(),
        }
    }

    fn restore_from_memento(&mut self, memento: &SelectionMemento) {
        self.solids = memento.solids.clone();
        self.curves = memento.curves.clone();
        self.faces = memento.faces.clone();
        self.edges = memento.edges.clone();
        self.control_points = memento.control_points.clone();
        self.parents_with_selected_children = memento.parents_with_selected_children.clone();
    }
}

//! View-side handles
//!
//! The rendering layer owns the actual scene objects; the editor core only
//! tracks lightweight handles so selection and modifier bookkeeping can
//! refer to "what the user sees" without depending on a renderer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Composite identity of a topology sub-item (face or edge) within an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyId {
    /// Identity of the owning item
    pub item: Uuid,
    /// Index of the sub-item within the item
    pub index: u32,
}

impl TopologyId {
    /// Create a new topology identity
    pub fn new(item: Uuid, index: u32) -> Self {
        Self { item, index }
    }
}

/// Composite identity of a control point within a curve item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlPointId {
    /// Identity of the owning curve
    pub item: Uuid,
    /// Index of the control point
    pub index: u32,
}

impl ControlPointId {
    /// Create a new control point identity
    pub fn new(item: Uuid, index: u32) -> Self {
        Self { item, index }
    }
}

/// Kind of a top-level view item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    Solid,
    Curve,
}

/// Handle for a top-level scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewItem {
    /// Item identity, shared with the model side
    pub id: Uuid,
    /// What the handle points at
    pub kind: ViewKind,
}

impl ViewItem {
    /// Create a new view handle
    pub fn new(id: Uuid, kind: ViewKind) -> Self {
        Self { id, kind }
    }
}

/// Handle for a face or edge scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewSubItem {
    Face(TopologyId),
    Edge(TopologyId),
}

impl ViewSubItem {
    /// The topology identity behind the handle
    pub fn id(&self) -> TopologyId {
        match self {
            ViewSubItem::Face(id) | ViewSubItem::Edge(id) => *id,
        }
    }
}

/// Handle for a control point scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewControlPoint {
    pub id: ControlPointId,
}

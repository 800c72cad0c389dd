//! Versioned editor state
//!
//! The state core of a solid-modeling editor: cooperating snapshot
//! producers (geometry store, selection, snap index, cross-point cache,
//! planar-curve cache, modifier tracker, viewports) coordinated by one
//! originator, an undo/redo history built on its snapshots, and a
//! length-prefixed binary container persisting the whole aggregated
//! state to a single buffer.

pub mod crosses;
pub mod curves;
pub mod database;
pub mod editor;
pub mod history;
pub mod memento;
pub mod modifier;
pub mod selection;
pub mod signals;
pub mod snaps;
pub mod util;
pub mod view;
pub mod viewport;
pub mod wire;

// Re-exports for convenience
pub use crosses::{CrossPoint, CrossPointDatabase, CrossPointMemento};
pub use curves::{CurveInfo, CurveMemento, PlanarCurveDatabase};
pub use database::{DatabaseError, GeometryDatabase, GeometryMemento, ItemEntry};
pub use editor::{Editor, EditorError, PersistError};
pub use history::{History, HistoryStackItem};
pub use memento::{InvariantViolation, Memento, MementoOriginator, SharedMemento};
pub use modifier::{ModifierError, ModifierMemento, ModifierStack, ModifierTracker, StackState};
pub use selection::{SelectionDatabase, SelectionMemento};
pub use signals::{EditorSignals, Signal};
pub use snaps::{PointSnap, SnapDatabase, SnapKind, SnapMemento};
pub use util::RefCounter;
pub use view::{ControlPointId, TopologyId, ViewControlPoint, ViewItem, ViewKind, ViewSubItem};
pub use viewport::{Camera, CameraMode, Viewport, ViewportMemento};
pub use wire::{FrameReader, FrameWriter, WireError};

//! Editor originator
//!
//! The single point of truth for what a full application snapshot looks
//! like and in what order subsystems are restored. Also owns the version
//! counter, grouped transactions, and whole-state persistence.

use std::sync::Arc;

use burin_kernel::{Curve3, KernelError, Model, ModelItem, ModelKernel, Solid};
use tracing::debug;
use uuid::Uuid;

use crate::crosses::CrossPointDatabase;
use crate::curves::PlanarCurveDatabase;
use crate::database::{DatabaseError, GeometryDatabase, ItemEntry};
use crate::memento::{InvariantViolation, Memento, MementoOriginator, SharedMemento};
use crate::modifier::{ModifierError, ModifierMemento, ModifierTracker, StackState};
use crate::selection::SelectionDatabase;
use crate::signals::EditorSignals;
use crate::snaps::{PointSnap, SnapDatabase, SnapKind};
use crate::view::TopologyId;
use crate::viewport::{Viewport, ViewportMemento};
use crate::wire::{FrameReader, FrameWriter, WireError};

enum OriginatorState {
    Start,
    Group(SharedMemento),
}

/// The aggregated editor state
pub struct Editor {
    pub db: GeometryDatabase,
    pub modifiers: ModifierTracker,
    pub selection: SelectionDatabase,
    pub snaps: SnapDatabase,
    pub crosses: CrossPointDatabase,
    pub curves: PlanarCurveDatabase,
    pub viewports: Vec<Viewport>,
    pub signals: Arc<EditorSignals>,
    version: u64,
    state: OriginatorState,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(burin_kernel::default_kernel())
    }
}

impl Editor {
    /// Create an empty editor over a modeling kernel
    pub fn new(kernel: Arc<dyn ModelKernel>) -> Self {
        Self {
            db: GeometryDatabase::new(kernel.clone()),
            modifiers: ModifierTracker::new(kernel),
            selection: SelectionDatabase::new(),
            snaps: SnapDatabase::new(),
            crosses: CrossPointDatabase::new(),
            curves: PlanarCurveDatabase::new(),
            viewports: Vec::new(),
            signals: EditorSignals::new(),
            version: 0,
            state: OriginatorState::Start,
        }
    }

    /// The live version counter
    pub fn version(&self) -> u64 {
        self.version
    }

    // ----- snapshots --------------------------------------------------

    fn capture(&mut self) -> SharedMemento {
        self.version += 1;
        Arc::new(Memento {
            version: self.version,
            db: self.db.save_to_memento(),
            selection: self.selection.save_to_memento(),
            snaps: self.snaps.save_to_memento(),
            crosses: self.crosses.save_to_memento(),
            curves: self.curves.save_to_memento(),
            modifiers: self.modifiers.save_to_memento(),
        })
    }

    /// Capture a full snapshot
    ///
    /// Inside a grouped transaction this returns the snapshot captured at
    /// scope entry, unchanged, so the whole scope collapses into one
    /// undoable step.
    pub fn save_to_memento(&mut self) -> SharedMemento {
        match &self.state {
            OriginatorState::Start => self.capture(),
            OriginatorState::Group(memento) => memento.clone(),
        }
    }

    /// Restore every subsystem from a snapshot
    pub fn restore_from_memento(&mut self, memento: &Memento) {
        // Order is load-bearing: the geometry store is the source of
        // truth for identity, the modifier indices reference geometry
        // identities, and everything after references both.
        self.db.restore_from_memento(&memento.db);
        self.modifiers.restore_from_memento(&memento.modifiers);
        self.selection.restore_from_memento(&memento.selection);
        self.crosses.restore_from_memento(&memento.crosses);
        self.snaps.restore_from_memento(&memento.snaps);
        self.curves.restore_from_memento(&memento.curves);
    }

    /// Unwind to a snapshot only if nothing was snapshotted since
    ///
    /// Used to cleanly abort an operation that produced only transient
    /// side effects.
    pub fn discard_side_effects(&mut self, memento: &Memento) {
        if self.version == memento.version {
            self.restore_from_memento(memento);
        }
    }

    /// Run a scope as one atomic undo step
    ///
    /// Every `save_to_memento` call inside the scope returns the snapshot
    /// captured at entry. Grouping does not nest; re-entry fails loudly.
    /// The pass-through state is cleared before this returns, so a body
    /// that reports failure through its return value cannot leave the
    /// editor grouped.
    pub fn group<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> Result<T, EditorError> {
        if matches!(self.state, OriginatorState::Group(_)) {
            return Err(EditorError::AlreadyGrouped);
        }
        let memento = self.capture();
        self.state = OriginatorState::Group(memento);
        let result = f(self);
        self.state = OriginatorState::Start;
        Ok(result)
    }

    // ----- editing surface --------------------------------------------

    /// Add a solid, registering it everywhere it needs to be known
    pub fn add_solid(&mut self, solid: Solid) -> Uuid {
        let id = self.modifiers.add_item(&mut self.db, ModelItem::Solid(solid));
        if let Some(entry) = self.db.lookup_item(id) {
            let snaps = item_snaps(self.db.kernel().as_ref(), entry);
            self.snaps.add_snaps(id, snaps);
        }
        id
    }

    /// Add a curve, registering crossings, snaps and cached info
    pub fn add_curve(&mut self, curve: Curve3) -> Result<Uuid, EditorError> {
        let id = self
            .modifiers
            .add_item(&mut self.db, ModelItem::Curve(curve.clone()));
        let kernel = self.db.kernel().clone();
        if let Err(e) = self.crosses.add_curve(id, curve.clone(), kernel.as_ref()) {
            // Unwind the half-registered item so a kernel failure leaves
            // no trace of the curve anywhere.
            let _ = self.modifiers.remove_item(&mut self.db, id);
            return Err(e.into());
        }
        if let Some(entry) = self.db.lookup_item(id) {
            let snaps = item_snaps(kernel.as_ref(), entry);
            self.snaps.add_snaps(id, snaps);
        }
        self.curves.update(id, &curve);
        Ok(id)
    }

    /// Remove an item from every subsystem
    pub fn remove_item(&mut self, id: Uuid) -> Result<(), EditorError> {
        self.modifiers.remove_item(&mut self.db, id)?;
        self.crosses.remove_curve(id);
        self.snaps.remove_item(id);
        self.curves.remove(id);
        Ok(())
    }

    /// Hide or reveal an item, keeping its snaps in step
    pub fn make_hidden(&mut self, id: Uuid, value: bool) -> Result<(), EditorError> {
        self.db.make_hidden(id, value)?;
        if value {
            self.snaps.hide_item(id);
        } else {
            self.snaps.show_item(id);
        }
        Ok(())
    }

    /// Reveal every hidden item, returning what was revealed
    pub fn unhide_all(&mut self) -> Vec<Uuid> {
        let revealed = self.db.unhide_all();
        for id in &revealed {
            self.snaps.show_item(*id);
        }
        revealed
    }

    /// Select a solid through its modifier stack
    pub fn select_solid(&mut self, id: Uuid) {
        self.modifiers.select_solid(&mut self.selection, id);
    }

    /// Deselect a solid through its modifier stack
    pub fn deselect_solid(&mut self, id: Uuid) -> Result<(), EditorError> {
        Ok(self.modifiers.deselect_solid(&mut self.selection, id)?)
    }

    /// Deselect a face, with derived-object coupling
    pub fn deselect_face(&mut self, face: TopologyId) -> Result<(), EditorError> {
        Ok(self.modifiers.deselect_face(&mut self.selection, face)?)
    }

    /// Deselect an edge, with derived-object coupling
    pub fn deselect_edge(&mut self, edge: TopologyId) -> Result<(), EditorError> {
        Ok(self.modifiers.deselect_edge(&mut self.selection, edge)?)
    }

    // ----- persistence ------------------------------------------------

    /// Serialize the whole aggregated state into one buffer
    ///
    /// Layout: geometry frame, modifier frame, viewport count, then one
    /// frame per viewport in pane order.
    pub fn serialize(&self) -> Result<Vec<u8>, PersistError> {
        let geometry = self.db.serialize().map_err(|e| PersistError::Payload {
            frame: "geometry",
            message: e.to_string(),
        })?;
        let modifiers = self
            .modifiers
            .save_to_memento()
            .serialize()
            .map_err(|e| PersistError::Payload {
                frame: "modifier",
                message: e.to_string(),
            })?;
        let mut writer = FrameWriter::new();
        writer.write_frame(&geometry);
        writer.write_frame(&modifiers);
        writer.write_u64(self.viewports.len() as u64);
        for viewport in &self.viewports {
            let payload = viewport.serialize().map_err(|e| PersistError::Payload {
                frame: "viewport",
                message: e.to_string(),
            })?;
            writer.write_frame(&payload);
        }
        Ok(writer.finish())
    }

    /// Rebuild the whole aggregated state from one buffer
    ///
    /// Every payload is decoded and staged before any live state is
    /// touched; a failure anywhere leaves the editor exactly as it was.
    /// Viewport payload `i` applies to live viewport `i`, and the count
    /// must match the live pane list.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<(), PersistError> {
        let mut reader = FrameReader::new(data);
        let geometry_bytes = reader.read_frame()?;
        let modifier_bytes = reader.read_frame()?;
        let count = reader.read_u64()? as usize;
        if count != self.viewports.len() {
            return Err(PersistError::ViewportCountMismatch {
                persisted: count,
                live: self.viewports.len(),
            });
        }
        let mut viewport_frames = Vec::with_capacity(count);
        for _ in 0..count {
            viewport_frames.push(reader.read_frame()?);
        }
        reader.finish()?;

        let kernel = self.db.kernel().clone();
        let model: Model =
            serde_json::from_slice(geometry_bytes).map_err(|e| PersistError::Payload {
                frame: "geometry",
                message: e.to_string(),
            })?;
        let staged_db = GeometryDatabase::from_model(&model, kernel.clone());
        let staged_modifiers = ModifierMemento::deserialize(modifier_bytes, &staged_db)?;
        let mut staged_tracker = ModifierTracker::new(kernel.clone());
        staged_tracker.restore_from_memento(&staged_modifiers);

        let staged_viewports: Vec<ViewportMemento> = viewport_frames
            .iter()
            .map(|frame| {
                Viewport::deserialize(frame).map_err(|e| PersistError::Payload {
                    frame: "viewport",
                    message: e.to_string(),
                })
            })
            .collect::<Result<_, _>>()?;

        // Dependent re-derivation, still staged: crossings and curve
        // info read from both the geometry and the modifier state.
        let mut staged_crosses = CrossPointDatabase::new();
        let mut staged_snaps = SnapDatabase::new();
        for (id, entry) in staged_db.find_all(true) {
            if let Some(curve) = entry.model.as_curve() {
                staged_crosses.add_curve(id, curve.clone(), kernel.as_ref())?;
            }
            // Derived results never contribute snaps; the user snaps to
            // the source geometry they actually edit.
            if staged_tracker.state_of(id) != StackState::Modified {
                staged_snaps.add_snaps(id, item_snaps(kernel.as_ref(), entry));
            }
        }
        let mut staged_curves = PlanarCurveDatabase::new();
        staged_curves.rebuild(&staged_db, &staged_tracker);

        self.db = staged_db;
        self.modifiers = staged_tracker;
        self.crosses = staged_crosses;
        self.snaps = staged_snaps;
        self.curves = staged_curves;
        self.selection.deselect_all();
        for (viewport, memento) in self.viewports.iter_mut().zip(&staged_viewports) {
            viewport.restore_from_memento(memento);
        }
        self.signals.modifiers_loaded.dispatch();
        Ok(())
    }

    // ----- contract ---------------------------------------------------

    /// Fan out every subsystem self-check
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        self.modifiers.validate(&self.db)?;
        self.snaps.validate()?;
        self.crosses.validate()?;
        self.selection.validate()?;
        self.curves.validate(&self.db)?;
        self.db.validate()?;
        for viewport in &self.viewports {
            viewport.validate()?;
        }
        Ok(())
    }

    /// Log the whole aggregated state
    pub fn debug(&self) {
        debug!(version = self.version, "editor");
        self.modifiers.debug();
        self.snaps.debug();
        self.selection.debug();
        self.curves.debug();
        self.crosses.debug();
        self.db.debug();
        for viewport in &self.viewports {
            viewport.debug();
        }
    }
}

/// Snap points contributed by one item
fn item_snaps(kernel: &dyn ModelKernel, entry: &ItemEntry) -> Vec<PointSnap> {
    let mut snaps = Vec::new();
    match &entry.model {
        ModelItem::Solid(solid) => {
            if let Ok(faces) = kernel.faces(solid) {
                snaps.extend(
                    faces
                        .iter()
                        .map(|f| PointSnap::new(f.center, SnapKind::FaceCenter)),
                );
            }
        }
        ModelItem::Curve(curve) => {
            if let (Some(first), Some(last)) = (curve.points.first(), curve.points.last()) {
                snaps.push(PointSnap::new(*first, SnapKind::Begin));
                snaps.push(PointSnap::new(*last, SnapKind::End));
            }
            snaps.extend(
                curve
                    .segments()
                    .map(|(a, b)| PointSnap::new((a + b) * 0.5, SnapKind::Midpoint)),
            );
        }
    }
    snaps
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EditorError {
    #[error("Already inside a grouped transaction")]
    AlreadyGrouped,

    #[error(transparent)]
    Modifier(#[from] ModifierError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("Malformed {frame} payload: {message}")]
    Payload {
        frame: &'static str,
        message: String,
    },

    #[error("Viewport count mismatch: persisted {persisted}, live {live}")]
    ViewportCountMismatch { persisted: usize, live: usize },

    #[error(transparent)]
    Modifiers(#[from] ModifierError),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use burin_kernel::{Modifier, Plane3, SymmetryParams};
    use glam::Vec3;

    fn half_cube() -> Solid {
        Solid::cuboid(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(2.0))
    }

    fn x_axis() -> Curve3 {
        Curve3::new(vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)], false)
    }

    fn y_axis() -> Curve3 {
        Curve3::new(vec![Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)], false)
    }

    fn symmetry() -> Modifier {
        Modifier::Symmetry(SymmetryParams::across(Plane3::yz()))
    }

    #[test]
    fn grouped_saves_return_the_identical_snapshot() {
        let mut editor = Editor::default();
        editor.add_solid(half_cube());
        let snapshots = editor
            .group(|editor| {
                let a = editor.save_to_memento();
                editor.add_solid(half_cube());
                let b = editor.save_to_memento();
                let c = editor.save_to_memento();
                (a, b, c)
            })
            .unwrap();
        assert!(Arc::ptr_eq(&snapshots.0, &snapshots.1));
        assert!(Arc::ptr_eq(&snapshots.1, &snapshots.2));

        // the scope is exited: a fresh save captures fresh state
        let after = editor.save_to_memento();
        assert!(!Arc::ptr_eq(&snapshots.0, &after));
    }

    #[test]
    fn nested_grouping_fails_loudly() {
        let mut editor = Editor::default();
        let result = editor.group(|editor| editor.group(|_| ()));
        let inner = result.unwrap();
        assert!(matches!(inner, Err(EditorError::AlreadyGrouped)));
        // outer scope was still cleared
        assert!(editor.group(|_| ()).is_ok());
    }

    #[test]
    fn group_state_is_cleared_when_the_body_reports_failure() {
        let mut editor = Editor::default();
        let result: Result<Result<(), &str>, _> = editor.group(|_| Err("operation failed"));
        assert!(result.unwrap().is_err());
        assert!(editor.group(|_| ()).is_ok());
    }

    #[test]
    fn discard_side_effects_unwinds_only_the_latest_snapshot() {
        let mut editor = Editor::default();
        let before = editor.save_to_memento();
        editor.add_solid(half_cube());
        editor.discard_side_effects(&before);
        assert!(editor.db.is_empty());

        // a later snapshot makes the discard a no-op
        let stale = editor.save_to_memento();
        editor.add_solid(half_cube());
        let _newer = editor.save_to_memento();
        editor.discard_side_effects(&stale);
        assert_eq!(editor.db.len(), 1);
    }

    #[test]
    fn restore_round_trips_the_whole_editor() {
        let mut editor = Editor::default();
        let solid = editor.add_solid(half_cube());
        let a = editor.add_curve(x_axis()).unwrap();
        let _b = editor.add_curve(y_axis()).unwrap();
        let stack = editor.modifiers.add(&mut editor.db, solid, symmetry()).unwrap();
        editor.select_solid(stack.modified);
        editor.validate().unwrap();

        let memento = editor.save_to_memento();
        editor.remove_item(a).unwrap();
        editor.remove_item(solid).unwrap();
        editor.selection.deselect_all();
        editor.validate().unwrap();

        editor.restore_from_memento(&memento);
        assert!(editor.db.lookup_item(solid).is_some());
        assert_eq!(editor.crosses.crosses().len(), 1);
        assert!(editor.selection.is_solid_selected(stack.modified));
        assert!(editor.selection.is_solid_selected(solid));
        assert_eq!(
            editor.modifiers.get_by_premodified(solid).unwrap().modified,
            stack.modified
        );
        editor.validate().unwrap();
    }

    #[test]
    fn failed_curve_registration_leaves_no_trace() {
        let mut editor = Editor::new(Arc::new(burin_kernel::NullKernel));
        editor.add_curve(x_axis()).unwrap();
        let before = editor.db.len();
        assert!(editor.add_curve(y_axis()).is_err());
        assert_eq!(editor.db.len(), before);
        editor.validate().unwrap();
    }

    #[test]
    fn serialize_round_trips_geometry_modifiers_and_viewports() {
        let mut editor = Editor::default();
        editor.viewports.push(Viewport::new());
        editor.viewports.push(Viewport::new());
        editor.viewports[1].is_xray = true;
        editor.viewports[1].camera.zoom = 3.0;

        let solid = editor.add_solid(half_cube());
        let curve = editor.add_curve(x_axis()).unwrap();
        let stack = editor.modifiers.add(&mut editor.db, solid, symmetry()).unwrap();
        let buffer = editor.serialize().unwrap();

        let mut loaded = Editor::default();
        loaded.viewports.push(Viewport::new());
        loaded.viewports.push(Viewport::new());
        loaded.deserialize(&buffer).unwrap();

        assert!(loaded.db.lookup_item(solid).is_some());
        assert!(loaded.db.lookup_item(curve).is_some());
        assert_eq!(
            loaded.modifiers.get_by_premodified(solid).unwrap().modified,
            stack.modified
        );
        assert_eq!(loaded.modifiers.state_of(stack.modified), StackState::Modified);
        assert!(loaded.snaps.snaps_for(stack.modified).is_none());
        assert!(loaded.snaps.snaps_for(curve).is_some());
        assert!(loaded.viewports[1].is_xray);
        assert_eq!(loaded.viewports[1].camera.zoom, 3.0);
        assert!(loaded.curves.info(curve).is_some());
        loaded.validate().unwrap();
    }

    #[test]
    fn empty_state_round_trips_with_zero_viewports() {
        let editor = Editor::default();
        let buffer = editor.serialize().unwrap();

        let mut loaded = Editor::default();
        loaded.deserialize(&buffer).unwrap();
        assert!(loaded.db.is_empty());
        assert_eq!(loaded.modifiers.stacks().count(), 0);
        assert!(loaded.viewports.is_empty());
        loaded.validate().unwrap();
    }

    #[test]
    fn viewport_count_mismatch_aborts_the_load() {
        let mut editor = Editor::default();
        editor.viewports.push(Viewport::new());
        let buffer = editor.serialize().unwrap();

        let mut loaded = Editor::default();
        assert!(matches!(
            loaded.deserialize(&buffer),
            Err(PersistError::ViewportCountMismatch { persisted: 1, live: 0 })
        ));
    }

    #[test]
    fn failed_deserialize_leaves_live_state_untouched() {
        let mut editor = Editor::default();
        let survivor = editor.add_solid(half_cube());
        let buffer = editor.serialize().unwrap();

        // truncated buffer
        assert!(editor.deserialize(&buffer[..12]).is_err());
        assert!(editor.db.lookup_item(survivor).is_some());

        // geometry payload that is not json
        let mut writer = FrameWriter::new();
        writer.write_frame(b"not json");
        writer.write_frame(b"{}");
        writer.write_u64(0);
        assert!(matches!(
            editor.deserialize(&writer.finish()),
            Err(PersistError::Payload { frame: "geometry", .. })
        ));
        assert!(editor.db.lookup_item(survivor).is_some());
        editor.validate().unwrap();
    }

    #[test]
    fn modifiers_loaded_fires_after_a_successful_load() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let mut editor = Editor::default();
        let buffer = editor.serialize().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            editor.signals.modifiers_loaded.connect(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        editor.deserialize(&buffer).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

//! Undo/redo history
//!
//! Two stacks of (label, before, after) triples built entirely on the
//! originator's save/restore contract. Undo moves an item to the redo
//! stack without copying snapshots; any new entry discards the redo
//! stack (branching history is not supported). An empty stack is a
//! routine UI condition, reported as `false`, never an error.

use std::sync::Arc;

use crate::editor::Editor;
use crate::memento::SharedMemento;
use crate::signals::EditorSignals;

/// One undoable operation
#[derive(Debug, Clone)]
pub struct HistoryStackItem {
    pub label: String,
    pub before: SharedMemento,
    pub after: SharedMemento,
}

/// The undo/redo history
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryStackItem>,
    redo_stack: Vec<HistoryStackItem>,
    signals: Arc<EditorSignals>,
}

impl History {
    /// Create an empty history sharing the editor's signal hub
    pub fn new(signals: Arc<EditorSignals>) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            signals,
        }
    }

    /// Completed operations, oldest first
    pub fn undo_stack(&self) -> &[HistoryStackItem] {
        &self.undo_stack
    }

    /// Undone operations, most recently undone last
    pub fn redo_stack(&self) -> &[HistoryStackItem] {
        &self.redo_stack
    }

    /// The snapshot the live state corresponds to
    ///
    /// The `after` of the latest entry, or a fresh capture when nothing
    /// has been recorded yet.
    pub fn current(&self, editor: &mut Editor) -> SharedMemento {
        match self.undo_stack.last() {
            Some(item) => item.after.clone(),
            None => editor.save_to_memento(),
        }
    }

    /// Record a completed operation
    ///
    /// The `after` state is captured here. Calling twice with the same
    /// `before` reference records exactly one entry; recording discards
    /// the redo stack.
    pub fn add(&mut self, editor: &mut Editor, label: impl Into<String>, before: SharedMemento) {
        if let Some(top) = self.undo_stack.last() {
            if Arc::ptr_eq(&top.before, &before) {
                return;
            }
        }
        let after = editor.save_to_memento();
        self.undo_stack.push(HistoryStackItem {
            label: label.into(),
            before,
            after,
        });
        self.redo_stack.clear();
        self.signals.history_added.dispatch();
    }

    /// Undo the latest operation; `false` when there is nothing to undo
    pub fn undo(&mut self, editor: &mut Editor) -> bool {
        let Some(item) = self.undo_stack.pop() else {
            return false;
        };
        editor.restore_from_memento(&item.before);
        self.redo_stack.push(item);
        self.signals.history_changed.dispatch();
        true
    }

    /// Redo the latest undone operation; `false` when there is nothing
    /// to redo
    pub fn redo(&mut self, editor: &mut Editor) -> bool {
        let Some(item) = self.redo_stack.pop() else {
            return false;
        };
        editor.restore_from_memento(&item.after);
        self.undo_stack.push(item);
        self.signals.history_changed.dispatch();
        true
    }

    /// Jump directly to an arbitrary snapshot
    pub fn restore(&self, editor: &mut Editor, memento: &SharedMemento) {
        editor.restore_from_memento(memento);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burin_kernel::Solid;
    use glam::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cube() -> Solid {
        Solid::cuboid(Vec3::ZERO, Vec3::splat(2.0))
    }

    fn setup() -> (Editor, History) {
        let editor = Editor::default();
        let history = History::new(editor.signals.clone());
        (editor, history)
    }

    #[test]
    fn undo_then_redo_returns_to_the_pre_undo_state() {
        let (mut editor, mut history) = setup();
        let before = editor.save_to_memento();
        let id = editor.add_solid(cube());
        history.add(&mut editor, "Add cube", before);

        assert!(history.undo(&mut editor));
        assert!(editor.db.lookup_item(id).is_none());

        assert!(history.redo(&mut editor));
        assert!(editor.db.lookup_item(id).is_some());
        editor.validate().unwrap();
    }

    #[test]
    fn adding_the_same_before_twice_records_one_entry() {
        let (mut editor, mut history) = setup();
        let before = editor.save_to_memento();
        editor.add_solid(cube());
        history.add(&mut editor, "Add cube", before.clone());
        history.add(&mut editor, "Add cube", before);
        assert_eq!(history.undo_stack().len(), 1);
    }

    #[test]
    fn adding_discards_the_redo_stack() {
        let (mut editor, mut history) = setup();
        let before = editor.save_to_memento();
        editor.add_solid(cube());
        history.add(&mut editor, "Add first", before);

        assert!(history.undo(&mut editor));
        assert!(!history.redo_stack().is_empty());

        let before = editor.save_to_memento();
        editor.add_solid(cube());
        history.add(&mut editor, "Add second", before);
        assert!(!history.redo(&mut editor));
    }

    #[test]
    fn empty_stacks_report_false() {
        let (mut editor, mut history) = setup();
        assert!(!history.undo(&mut editor));
        assert!(!history.redo(&mut editor));
    }

    #[test]
    fn current_without_history_is_a_fresh_capture() {
        let (mut editor, history) = setup();
        let id = editor.add_solid(cube());
        let current = history.current(&mut editor);
        assert!(current.db.items.contains_key(&id));
    }

    #[test]
    fn current_follows_the_latest_entry() {
        let (mut editor, mut history) = setup();
        let before = editor.save_to_memento();
        editor.add_solid(cube());
        history.add(&mut editor, "Add cube", before);
        let current = history.current(&mut editor);
        assert!(Arc::ptr_eq(&current, &history.undo_stack().last().unwrap().after));
    }

    #[test]
    fn signals_fire_on_add_and_on_change() {
        let (mut editor, mut history) = setup();
        let added = Arc::new(AtomicUsize::new(0));
        let changed = Arc::new(AtomicUsize::new(0));
        {
            let added = added.clone();
            editor.signals.history_added.connect(move || {
                added.fetch_add(1, Ordering::SeqCst);
            });
            let changed = changed.clone();
            editor.signals.history_changed.connect(move || {
                changed.fetch_add(1, Ordering::SeqCst);
            });
        }

        let before = editor.save_to_memento();
        editor.add_solid(cube());
        history.add(&mut editor, "Add cube", before);
        history.undo(&mut editor);
        history.redo(&mut editor);

        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert_eq!(changed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn grouped_operations_undo_as_one_step() {
        let (mut editor, mut history) = setup();
        let (before, first, second) = editor
            .group(|editor| {
                let before = editor.save_to_memento();
                let first = editor.add_solid(cube());
                let second = editor.add_solid(cube());
                (before, first, second)
            })
            .unwrap();
        history.add(&mut editor, "Add two cubes", before);

        assert!(history.undo(&mut editor));
        assert!(editor.db.lookup_item(first).is_none());
        assert!(editor.db.lookup_item(second).is_none());

        assert!(history.redo(&mut editor));
        assert!(editor.db.lookup_item(first).is_some());
        assert!(editor.db.lookup_item(second).is_some());
    }
}

//! Modifier-stack tracker
//!
//! A modifier stack is a pipeline of post-processing operations attached
//! to an object, re-run after every edit of its source. Vocabulary:
//! "unmodified" is a normal object with no stack; "premodified" is the
//! source object of a stack; "modified" is the derived result of running
//! a non-empty stack.
//!
//! The tracker wraps the geometry database: item add/replace/remove/
//! duplicate go through it so its three indices stay synchronized with
//! item identity. The indices are
//! `item2name` (identity → stack key), `modified2name` (derived identity
//! → stack key) and `name2stack` (stack key → stack); `validate()` checks
//! their mutual consistency.

use std::sync::Arc;

use burin_kernel::{KernelError, ModelItem, ModelKernel, Modifier, Solid};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::database::{DatabaseError, GeometryDatabase};
use crate::memento::{invariant, InvariantViolation, MementoOriginator};
use crate::selection::SelectionDatabase;
use crate::view::TopologyId;

/// Classification of an object with respect to modifier stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Unmodified,
    Premodified,
    Modified,
}

/// An immutable modifier pipeline
///
/// `modified` equals `premodified` only while the stack is empty; every
/// mutation produces a fresh value, the old one is never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierStack {
    /// Source object identity
    pub premodified: Uuid,
    /// Derived result identity
    pub modified: Uuid,
    /// Derivation steps, applied in order
    pub modifiers: im::Vector<Modifier>,
}

impl ModifierStack {
    fn anchored(premodified: Uuid) -> Self {
        Self {
            premodified,
            modified: premodified,
            modifiers: im::Vector::new(),
        }
    }

    /// Check whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// A new stack with one more step appended
    pub fn added(&self, modifier: Modifier) -> Self {
        let mut modifiers = self.modifiers.clone();
        modifiers.push_back(modifier);
        Self {
            modifiers,
            ..self.clone()
        }
    }

    /// A new stack with the step at `index` removed
    pub fn removed(&self, index: usize) -> Result<Self, ModifierError> {
        if index >= self.modifiers.len() {
            return Err(ModifierError::InvalidIndex {
                index,
                len: self.modifiers.len(),
            });
        }
        let mut modifiers = self.modifiers.clone();
        modifiers.remove(index);
        Ok(Self {
            modifiers,
            ..self.clone()
        })
    }
}

/// Snapshot of the tracker's three indices
#[derive(Debug, Clone)]
pub struct ModifierMemento {
    pub item2name: im::HashMap<Uuid, Uuid>,
    pub modified2name: im::HashMap<Uuid, Uuid>,
    pub name2stack: im::HashMap<Uuid, ModifierStack>,
}

/// The modifier-stack tracker
pub struct ModifierTracker {
    item2name: im::HashMap<Uuid, Uuid>,
    modified2name: im::HashMap<Uuid, Uuid>,
    name2stack: im::HashMap<Uuid, ModifierStack>,
    kernel: Arc<dyn ModelKernel>,
}

impl std::fmt::Debug for ModifierTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModifierTracker")
            .field("item2name", &self.item2name.len())
            .field("modified2name", &self.modified2name.len())
            .field("name2stack", &self.name2stack.len())
            .finish()
    }
}

impl ModifierTracker {
    /// Create an empty tracker over a modeling kernel
    pub fn new(kernel: Arc<dyn ModelKernel>) -> Self {
        Self {
            item2name: im::HashMap::new(),
            modified2name: im::HashMap::new(),
            name2stack: im::HashMap::new(),
            kernel,
        }
    }

    // ----- classification ---------------------------------------------

    /// O(1) classification via the two identity-indexed maps
    pub fn state_of(&self, id: Uuid) -> StackState {
        if self.get_by_premodified(id).is_some() {
            StackState::Premodified
        } else if self.get_by_modified(id).is_some() {
            StackState::Modified
        } else {
            StackState::Unmodified
        }
    }

    /// The stack whose source is `id`, if any
    pub fn get_by_premodified(&self, id: Uuid) -> Option<&ModifierStack> {
        let name = self.item2name.get(&id)?;
        self.name2stack.get(name)
    }

    /// The stack whose derived result is `id`, if any
    pub fn get_by_modified(&self, id: Uuid) -> Option<&ModifierStack> {
        let name = self.modified2name.get(&id)?;
        let stack = self.name2stack.get(name);
        debug_assert!(stack.is_some(), "modified2name entry without a stack");
        stack
    }

    /// Every registered stack
    pub fn stacks(&self) -> impl Iterator<Item = &ModifierStack> {
        self.name2stack.values()
    }

    // ----- stack operations -------------------------------------------

    /// Attach a modifier to an object, deriving its result
    ///
    /// An unmodified object gets a fresh stack anchored at it; a
    /// premodified object gets the step appended to its existing stack.
    /// Adding to a derived object is a precondition violation.
    pub fn add(
        &mut self,
        db: &mut GeometryDatabase,
        object: Uuid,
        modifier: Modifier,
    ) -> Result<ModifierStack, ModifierError> {
        let (name, base) = match self.state_of(object) {
            StackState::Unmodified => {
                let name = *self
                    .item2name
                    .get(&object)
                    .ok_or(ModifierError::Unregistered(object))?;
                (name, ModifierStack::anchored(object))
            }
            StackState::Premodified => {
                let name = self.item2name[&object];
                (name, self.name2stack[&name].clone())
            }
            StackState::Modified => {
                return Err(ModifierError::InvalidState(
                    "cannot add a modifier to a derived object",
                ));
            }
        };
        let candidate = base.added(modifier);
        let solid = self.compute(db, &candidate)?;
        self.register(db, name, candidate, solid)
    }

    /// Drop an object's whole stack, disposing its derived result
    pub fn remove(&mut self, db: &mut GeometryDatabase, object: Uuid) -> Result<(), ModifierError> {
        let stack = self
            .get_by_premodified(object)
            .cloned()
            .ok_or(ModifierError::InvalidState("remove on an object with no stack"))?;
        self.modified2name.remove(&stack.modified);
        let name = self.item2name[&object];
        self.name2stack.remove(&name);
        self.dispose(db, &stack)
    }

    /// Remove one step from an object's stack and re-derive
    ///
    /// Removing the last step disposes the stack entirely and returns
    /// `None`; the object reverts to unmodified.
    pub fn remove_modifier(
        &mut self,
        db: &mut GeometryDatabase,
        object: Uuid,
        index: usize,
    ) -> Result<Option<ModifierStack>, ModifierError> {
        let stack = self
            .get_by_premodified(object)
            .cloned()
            .ok_or(ModifierError::InvalidState("remove_modifier on an object with no stack"))?;
        let spliced = stack.removed(index)?;
        self.rebuild_value(db, spliced)
    }

    /// Recompute an object's derived result from its current source state
    ///
    /// The premodified identity never changes across a rebuild; only the
    /// modified identity may.
    pub fn rebuild(
        &mut self,
        db: &mut GeometryDatabase,
        object: Uuid,
    ) -> Result<Option<ModifierStack>, ModifierError> {
        let stack = self
            .get_by_premodified(object)
            .cloned()
            .ok_or(ModifierError::InvalidState("rebuild on an object with no stack"))?;
        self.rebuild_value(db, stack)
    }

    /// Bake a stack: the derived result becomes a first-class unmodified
    /// object and the source object is deleted
    pub fn apply(&mut self, db: &mut GeometryDatabase, object: Uuid) -> Result<Uuid, ModifierError> {
        let stack = self
            .get_by_premodified(object)
            .cloned()
            .ok_or(ModifierError::InvalidState("apply on an object with no stack"))?;
        if stack.is_empty() {
            return Err(ModifierError::InvalidState("apply on an empty stack"));
        }
        let ModifierStack {
            premodified,
            modified,
            ..
        } = stack;
        self.modified2name.remove(&modified);
        let name = self
            .item2name
            .get(&premodified)
            .copied()
            .ok_or(ModifierError::Unregistered(premodified))?;
        self.name2stack.remove(&name);
        self.item2name.insert(modified, name);
        self.item2name.remove(&premodified);
        db.remove_item(premodified)?;
        Ok(modified)
    }

    // ----- geometry-store decorator -----------------------------------

    /// Add an item, registering its identity with the tracker
    pub fn add_item(&mut self, db: &mut GeometryDatabase, item: ModelItem) -> Uuid {
        let id = db.add_item(item);
        self.item2name.insert(id, id);
        id
    }

    /// Replace an item's model, re-deriving its stack if it has one
    pub fn replace_item(
        &mut self,
        db: &mut GeometryDatabase,
        from: Uuid,
        item: ModelItem,
    ) -> Result<Uuid, ModifierError> {
        let name = self
            .item2name
            .get(&from)
            .copied()
            .ok_or(ModifierError::Unregistered(from))?;
        let staged = match self.name2stack.get(&name) {
            Some(stack) => {
                let source = item.as_solid().ok_or(ModifierError::NotASolid(from))?;
                let solid = self.derive(source, &stack.modifiers)?;
                Some((stack.clone(), solid))
            }
            None => None,
        };
        let new_premodified = db.replace_item(from, item)?;
        if let Some((stack, solid)) = staged {
            let new_modified = if stack.modified == stack.premodified {
                db.add_item(ModelItem::Solid(solid))
            } else {
                db.replace_item(stack.modified, ModelItem::Solid(solid))?
            };
            self.modified2name.remove(&stack.modified);
            self.modified2name.insert(new_modified, name);
            self.name2stack.insert(
                name,
                ModifierStack {
                    premodified: new_premodified,
                    modified: new_modified,
                    modifiers: stack.modifiers,
                },
            );
        }
        self.item2name.remove(&from);
        self.item2name.insert(new_premodified, name);
        Ok(new_premodified)
    }

    /// Remove an item, dropping any stack registrations it participates in
    pub fn remove_item(&mut self, db: &mut GeometryDatabase, id: Uuid) -> Result<(), ModifierError> {
        match self.state_of(id) {
            StackState::Unmodified => {
                self.item2name.remove(&id);
            }
            StackState::Premodified => {
                let name = self.item2name[&id];
                let stack = self.name2stack[&name].clone();
                self.modified2name.remove(&stack.modified);
                self.item2name.remove(&id);
                self.name2stack.remove(&name);
                self.dispose(db, &stack)?;
            }
            StackState::Modified => {
                // The derived item is the one being removed; its source
                // survives as a plain unmodified object.
                let name = self.modified2name[&id];
                self.modified2name.remove(&id);
                self.name2stack.remove(&name);
            }
        }
        db.remove_item(id)?;
        Ok(())
    }

    /// Deep-copy an item, registering the copy's identity
    pub fn duplicate(&mut self, db: &mut GeometryDatabase, id: Uuid) -> Result<Uuid, ModifierError> {
        let copy = db.duplicate(id)?;
        self.item2name.insert(copy, copy);
        Ok(copy)
    }

    // ----- selection coupling -----------------------------------------

    /// Select a solid, routing through its stack
    ///
    /// Selecting a derived object also marks its source as selected, so
    /// edits target the source while the user sees the derived result.
    /// Selecting a premodified object redirects to its derived result.
    pub fn select_solid(&self, selection: &mut SelectionDatabase, id: Uuid) {
        match self.state_of(id) {
            StackState::Unmodified => selection.add_solid(id),
            StackState::Modified => {
                selection.add_solid(id);
                if let Some(stack) = self.get_by_modified(id) {
                    selection.add_solid(stack.premodified);
                }
            }
            StackState::Premodified => {
                if let Some(stack) = self.get_by_premodified(id) {
                    if stack.modified == stack.premodified {
                        selection.add_solid(id);
                    } else {
                        selection.add_solid(stack.modified);
                        selection.add_solid(stack.premodified);
                    }
                }
            }
        }
    }

    /// Deselect a solid; derived objects cannot be deselected directly
    pub fn deselect_solid(
        &self,
        selection: &mut SelectionDatabase,
        id: Uuid,
    ) -> Result<(), ModifierError> {
        match self.state_of(id) {
            StackState::Unmodified | StackState::Premodified => {
                selection.remove_solid(id);
                Ok(())
            }
            StackState::Modified => Err(ModifierError::InvalidState(
                "deselect the source object, not its derived result",
            )),
        }
    }

    /// Deselect a face; when the source loses its last selected sub-item,
    /// the derived result is deselected as well
    pub fn deselect_face(
        &self,
        selection: &mut SelectionDatabase,
        face: TopologyId,
    ) -> Result<(), ModifierError> {
        match self.state_of(face.item) {
            StackState::Unmodified => {
                selection.remove_face(face);
                Ok(())
            }
            StackState::Premodified => {
                selection.remove_face(face);
                self.deselect_modified_without_selected_topology(selection, face.item);
                Ok(())
            }
            StackState::Modified => Err(ModifierError::InvalidState(
                "sub-items of a derived object are not directly selectable",
            )),
        }
    }

    /// Deselect an edge, with the same coupling as faces
    pub fn deselect_edge(
        &self,
        selection: &mut SelectionDatabase,
        edge: TopologyId,
    ) -> Result<(), ModifierError> {
        match self.state_of(edge.item) {
            StackState::Unmodified => {
                selection.remove_edge(edge);
                Ok(())
            }
            StackState::Premodified => {
                selection.remove_edge(edge);
                self.deselect_modified_without_selected_topology(selection, edge.item);
                Ok(())
            }
            StackState::Modified => Err(ModifierError::InvalidState(
                "sub-items of a derived object are not directly selectable",
            )),
        }
    }

    fn deselect_modified_without_selected_topology(
        &self,
        selection: &mut SelectionDatabase,
        parent: Uuid,
    ) {
        if !selection.has_selected_children(parent) {
            if let Some(stack) = self.get_by_premodified(parent) {
                selection.remove_solid(stack.modified);
            }
        }
    }

    // ----- internals --------------------------------------------------

    fn derive(
        &self,
        source: &Solid,
        modifiers: &im::Vector<Modifier>,
    ) -> Result<Solid, ModifierError> {
        let mut result = source.clone();
        for modifier in modifiers {
            result = self.kernel.apply_modifier(&result, modifier)?;
        }
        Ok(result)
    }

    fn compute(
        &self,
        db: &GeometryDatabase,
        stack: &ModifierStack,
    ) -> Result<Solid, ModifierError> {
        let entry = db
            .lookup_item(stack.premodified)
            .ok_or(ModifierError::Unregistered(stack.premodified))?;
        let source = entry
            .model
            .as_solid()
            .ok_or(ModifierError::NotASolid(stack.premodified))?;
        self.derive(source, &stack.modifiers)
    }

    /// Register a freshly derived result under all three maps
    fn register(
        &mut self,
        db: &mut GeometryDatabase,
        name: Uuid,
        stack: ModifierStack,
        solid: Solid,
    ) -> Result<ModifierStack, ModifierError> {
        let new_modified = if stack.modified == stack.premodified {
            db.add_item(ModelItem::Solid(solid))
        } else {
            db.replace_item(stack.modified, ModelItem::Solid(solid))?
        };
        self.modified2name.remove(&stack.modified);
        self.modified2name.insert(new_modified, name);
        let stack = ModifierStack {
            modified: new_modified,
            ..stack
        };
        self.name2stack.insert(name, stack.clone());
        Ok(stack)
    }

    /// Re-register a stack value: dispose if empty, recompute otherwise.
    /// Kernel computation happens before any index mutation, so a failed
    /// rebuild leaves the maps in their last registered state.
    fn rebuild_value(
        &mut self,
        db: &mut GeometryDatabase,
        stack: ModifierStack,
    ) -> Result<Option<ModifierStack>, ModifierError> {
        if stack.is_empty() {
            let name = self
                .modified2name
                .get(&stack.modified)
                .copied()
                .ok_or(ModifierError::InvalidState("rebuild of an unregistered stack"))?;
            self.name2stack.remove(&name);
            self.modified2name.remove(&stack.modified);
            self.dispose(db, &stack)?;
            return Ok(None);
        }
        let name = self
            .item2name
            .get(&stack.premodified)
            .copied()
            .ok_or(ModifierError::Unregistered(stack.premodified))?;
        if !self.name2stack.contains_key(&name) {
            return Err(ModifierError::InvalidState("rebuild of an unregistered stack"));
        }
        let solid = self.compute(db, &stack)?;
        Ok(Some(self.register(db, name, stack, solid)?))
    }

    fn dispose(&mut self, db: &mut GeometryDatabase, stack: &ModifierStack) -> Result<(), ModifierError> {
        if stack.modified != stack.premodified {
            db.remove_item(stack.modified)?;
        }
        Ok(())
    }

    // ----- contract ---------------------------------------------------

    /// Check every index invariant; a pure read-only traversal
    pub fn validate(&self, db: &GeometryDatabase) -> Result<(), InvariantViolation> {
        invariant(self.modified2name.len() <= self.name2stack.len(), || {
            "more derived registrations than stacks".to_string()
        })?;
        for (modified, name) in &self.modified2name {
            let Some(stack) = self.name2stack.get(name) else {
                return Err(InvariantViolation(format!(
                    "derived {modified} registered under missing stack {name}"
                )));
            };
            invariant(stack.modified == *modified, || {
                format!("stack {name} derives {} but is registered under {modified}", stack.modified)
            })?;
            invariant(self.item2name.get(&stack.premodified) == Some(name), || {
                format!("source of stack {name} does not map back to it")
            })?;
            invariant(!stack.is_empty(), || {
                format!("stack {name} is registered as derived but has no modifiers")
            })?;
        }
        for (name, stack) in &self.name2stack {
            invariant(self.item2name.get(&stack.premodified) == Some(name), || {
                format!("stack {name} unreachable from its source identity")
            })?;
            invariant(self.modified2name.get(&stack.modified) == Some(name), || {
                format!("stack {name} unreachable from its derived identity")
            })?;
        }
        for (id, _) in &self.item2name {
            invariant(db.lookup_item(*id).is_some(), || {
                format!("tracked identity {id} does not resolve to a live item")
            })?;
        }
        Ok(())
    }

    /// Log the three indices
    pub fn debug(&self) {
        debug!(tracked = self.item2name.len(), "modifier tracker");
        for (name, stack) in &self.name2stack {
            debug!(
                %name,
                premodified = %stack.premodified,
                modified = %stack.modified,
                modifiers = stack.modifiers.len(),
                "stack"
            );
        }
    }
}

impl MementoOriginator for ModifierTracker {
    type Memento = ModifierMemento;

    fn save_to_memento(&self) -> ModifierMemento {
        ModifierMemento {
            item2name: self.item2name.clone(),
            modified2name: self.modified2name.clone(),
            name2stack: self.name2stack.clone(),
        }
    }

    fn restore_from_memento(&mut self, memento: &ModifierMemento) {
        self.item2name = memento.item2name.clone();
        self.modified2name = memento.modified2name.clone();
        self.name2stack = memento.name2stack.clone();
    }
}

// ----- persistence ----------------------------------------------------

// Two of the three indices map identities to identities of the same
// domain, so the payload tags every field with an explicit map type
// instead of relying on the ambient encoding's native maps.

const IDENTITY_MAP_TAG: &str = "Map<Uuid, Uuid>";
const STACK_MAP_TAG: &str = "Map<Uuid, ModifierStack>";

#[derive(Debug, Serialize, Deserialize)]
struct TaggedMap<V> {
    data_type: String,
    value: Vec<(Uuid, V)>,
}

impl<V> TaggedMap<V> {
    fn new(tag: &str, mut value: Vec<(Uuid, V)>) -> Self {
        value.sort_by_key(|(key, _)| *key);
        Self {
            data_type: tag.to_string(),
            value,
        }
    }

    fn expect(self, tag: &str) -> Result<Vec<(Uuid, V)>, ModifierError> {
        if self.data_type != tag {
            return Err(ModifierError::Payload(format!(
                "expected {tag}, found {}",
                self.data_type
            )));
        }
        Ok(self.value)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StackImage {
    premodified: Uuid,
    modified: Uuid,
    modifiers: Vec<Modifier>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModifierImage {
    item2name: TaggedMap<Uuid>,
    modified2name: TaggedMap<Uuid>,
    name2stack: TaggedMap<StackImage>,
}

impl ModifierMemento {
    /// Encode the three indices as payload bytes
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        let image = ModifierImage {
            item2name: TaggedMap::new(
                IDENTITY_MAP_TAG,
                self.item2name.iter().map(|(k, v)| (*k, *v)).collect(),
            ),
            modified2name: TaggedMap::new(
                IDENTITY_MAP_TAG,
                self.modified2name.iter().map(|(k, v)| (*k, *v)).collect(),
            ),
            name2stack: TaggedMap::new(
                STACK_MAP_TAG,
                self.name2stack
                    .iter()
                    .map(|(k, stack)| {
                        (
                            *k,
                            StackImage {
                                premodified: stack.premodified,
                                modified: stack.modified,
                                modifiers: stack.modifiers.iter().cloned().collect(),
                            },
                        )
                    })
                    .collect(),
            ),
        };
        serde_json::to_vec(&image)
    }

    /// Decode payload bytes, resolving every identity against a database
    pub fn deserialize(data: &[u8], db: &GeometryDatabase) -> Result<Self, ModifierError> {
        let image: ModifierImage =
            serde_json::from_slice(data).map_err(|e| ModifierError::Payload(e.to_string()))?;
        let mut memento = ModifierMemento {
            item2name: im::HashMap::new(),
            modified2name: im::HashMap::new(),
            name2stack: im::HashMap::new(),
        };
        for (id, name) in image.item2name.expect(IDENTITY_MAP_TAG)? {
            if db.lookup_item(id).is_none() {
                return Err(ModifierError::UnknownItem(id));
            }
            memento.item2name.insert(id, name);
        }
        for (modified, name) in image.modified2name.expect(IDENTITY_MAP_TAG)? {
            memento.modified2name.insert(modified, name);
        }
        for (name, stack) in image.name2stack.expect(STACK_MAP_TAG)? {
            for id in [stack.premodified, stack.modified] {
                if db.lookup_item(id).is_none() {
                    return Err(ModifierError::UnknownItem(id));
                }
            }
            memento.name2stack.insert(
                name,
                ModifierStack {
                    premodified: stack.premodified,
                    modified: stack.modified,
                    modifiers: stack.modifiers.into_iter().collect(),
                },
            );
        }
        Ok(memento)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModifierError {
    #[error("Item not registered with the tracker: {0}")]
    Unregistered(Uuid),

    #[error("Invalid modifier state: {0}")]
    InvalidState(&'static str),

    #[error("Modifier index {index} out of range ({len} modifiers)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Modifier stacks only apply to solids: {0}")]
    NotASolid(Uuid),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Malformed modifier payload: {0}")]
    Payload(String),

    #[error("Modifier payload references unknown item: {0}")]
    UnknownItem(Uuid),
}

//! The composite memento and the snapshot-producer contract
//!
//! Every stateful subsystem implements [`MementoOriginator`]: it can hand
//! out an immutable snapshot of itself and later restore from one. The
//! [`Memento`] aggregates one child snapshot per subsystem; the editor
//! originator is the only component that composes and decomposes it.

use std::sync::Arc;

use crate::crosses::CrossPointMemento;
use crate::curves::CurveMemento;
use crate::database::GeometryMemento;
use crate::modifier::ModifierMemento;
use crate::selection::SelectionMemento;
use crate::snaps::SnapMemento;

/// A subsystem that can snapshot and restore its own state
///
/// Capturing must not mutate the subsystem; snapshots are immutable and
/// cheap to clone (structural sharing), so holding many of them on the
/// undo stack costs O(changes), not O(state).
pub trait MementoOriginator {
    type Memento: Clone;

    /// Capture the current state
    fn save_to_memento(&self) -> Self::Memento;

    /// Replace the current state with a previously captured one
    fn restore_from_memento(&mut self, memento: &Self::Memento);
}

/// A full application snapshot
///
/// Shared as `Arc<Memento>`: the history stack and grouped transactions
/// compare snapshots by Arc identity, never by content.
#[derive(Debug, Clone)]
pub struct Memento {
    /// Version counter value at capture time
    pub version: u64,
    pub db: GeometryMemento,
    pub selection: SelectionMemento,
    pub snaps: SnapMemento,
    pub crosses: CrossPointMemento,
    pub curves: CurveMemento,
    pub modifiers: ModifierMemento,
}

/// Shared handle to a full snapshot
pub type SharedMemento = Arc<Memento>;

/// A broken internal invariant
///
/// Raised by the `validate()` self-checks; always a programming error,
/// never a user-facing condition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Check one invariant, naming it on failure
pub(crate) fn invariant(holds: bool, describe: impl FnOnce() -> String) -> Result<(), InvariantViolation> {
    if holds {
        Ok(())
    } else {
        Err(InvariantViolation(describe()))
    }
}

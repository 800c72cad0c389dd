//! Editor signals
//!
//! Fire-and-forget notifications to external listeners (rendering, UI).
//! Dispatch order is registration order; listeners cannot fail and cannot
//! unsubscribe (the editor outlives every listener in practice).

use parking_lot::RwLock;
use std::sync::Arc;

type Listener = Box<dyn Fn() + Send + Sync>;

/// A single broadcast signal
#[derive(Default)]
pub struct Signal {
    listeners: RwLock<Vec<Listener>>,
}

impl Signal {
    /// Register a listener
    pub fn connect(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    /// Invoke every listener
    pub fn dispatch(&self) {
        for listener in self.listeners.read().iter() {
            listener();
        }
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

/// The signals the state engine raises
#[derive(Debug, Default)]
pub struct EditorSignals {
    /// A new entry was pushed onto the undo stack
    pub history_added: Signal,
    /// Undo or redo changed the live state
    pub history_changed: Signal,
    /// Modifier stacks were restored from a persisted buffer
    pub modifiers_loaded: Signal,
}

impl EditorSignals {
    /// Create a shared signal hub
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_reaches_every_listener() {
        let signals = EditorSignals::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            signals.history_added.connect(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        signals.history_added.dispatch();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}

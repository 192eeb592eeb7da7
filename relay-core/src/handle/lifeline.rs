//! Lifelines
//!
//! A [`Lifeline`] is a liveness token for components that are not shared
//! through an `Arc`. The component owns the lifeline (usually as a field);
//! slots hold a [`LifelineWatch`]. When the component is dropped, so is the
//! lifeline, and every watch reports the target as gone.
//!
//! A lifeline also carries the component's thread affinity, which the owner
//! can change after slots were connected (for instance when handing the
//! component over to a worker thread).

use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use parking_lot::RwLock;

use super::weak::{ThreadAffine, WeakHandle};

#[derive(Debug, Default)]
struct LifelineState {
    affinity: RwLock<Option<ThreadId>>,
}

/// Owned liveness token with an optional thread affinity.
#[derive(Debug, Default)]
pub struct Lifeline {
    state: Arc<LifelineState>,
}

impl Lifeline {
    /// A lifeline with no thread affinity.
    pub fn new() -> Self {
        Self::default()
    }

    /// A lifeline pinned to the calling thread.
    pub fn on_current_thread() -> Self {
        let lifeline = Self::new();
        lifeline.move_to_thread(std::thread::current().id());
        lifeline
    }

    /// Route future deliveries for watching slots to `thread`.
    pub fn move_to_thread(&self, thread: ThreadId) {
        *self.state.affinity.write() = Some(thread);
    }

    /// Drop the affinity; watching slots fall back to their connect thread.
    pub fn clear_affinity(&self) {
        *self.state.affinity.write() = None;
    }

    /// Current affinity.
    pub fn affinity(&self) -> Option<ThreadId> {
        *self.state.affinity.read()
    }

    /// A weak watch on this lifeline.
    pub fn watch(&self) -> LifelineWatch {
        LifelineWatch {
            state: Arc::downgrade(&self.state),
        }
    }
}

impl ThreadAffine for Lifeline {
    fn preferred_thread(&self) -> Option<ThreadId> {
        self.affinity()
    }
}

/// Weak side of a [`Lifeline`].
#[derive(Debug, Clone)]
pub struct LifelineWatch {
    state: Weak<LifelineState>,
}

impl WeakHandle for LifelineWatch {
    fn is_live(&self) -> bool {
        self.state.strong_count() > 0
    }

    fn preferred_thread(&self) -> Option<ThreadId> {
        self.state.upgrade().and_then(|state| *state.affinity.read())
    }
}

//! Weak receiver handles.
//!
//! A slot connected to a receiver object keeps only a weak handle to it.
//! At dispatch time the handle answers two questions: is the receiver still
//! alive, and does it currently prefer to be called on a particular thread.

use std::sync::{Arc, Weak};
use std::thread::ThreadId;

/// Liveness-checkable reference that does not keep its target alive.
pub trait WeakHandle: Send + Sync {
    /// Whether the target still exists.
    fn is_live(&self) -> bool;

    /// Thread the target wants deliveries on right now, if it has one.
    fn preferred_thread(&self) -> Option<ThreadId> {
        None
    }
}

/// Receivers that track which thread they belong to.
///
/// Implement this for objects that can move between threads. Slots connected
/// through [`Signal::connect_affine`](crate::signals::Signal::connect_affine)
/// route to the receiver's current preference instead of the thread that
/// connected them.
pub trait ThreadAffine {
    /// The thread this object currently lives on, if any.
    fn preferred_thread(&self) -> Option<ThreadId>;
}

/// Liveness-only handle over an `Arc`.
struct Tracked<R>(Weak<R>);

impl<R: Send + Sync> WeakHandle for Tracked<R> {
    fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Handle that also forwards the receiver's thread preference.
struct Affine<R>(Weak<R>);

impl<R: ThreadAffine + Send + Sync> WeakHandle for Affine<R> {
    fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }

    fn preferred_thread(&self) -> Option<ThreadId> {
        self.0.upgrade().and_then(|receiver| receiver.preferred_thread())
    }
}

/// Weak handle to `receiver` that only tracks liveness.
pub fn make_weak<R>(receiver: &Arc<R>) -> Arc<dyn WeakHandle>
where
    R: Send + Sync + 'static,
{
    Arc::new(Tracked(Arc::downgrade(receiver)))
}

/// Weak handle to `receiver` that tracks liveness and thread preference.
pub fn make_affine<R>(receiver: &Arc<R>) -> Arc<dyn WeakHandle>
where
    R: ThreadAffine + Send + Sync + 'static,
{
    Arc::new(Affine(Arc::downgrade(receiver)))
}

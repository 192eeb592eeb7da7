//! Signal Implementation
//!
//! A Signal is a typed event source. Components connect slots to it; a
//! producer emits values into it; every live slot receives each value.
//!
//! # How Emission Works
//!
//! 1. The slot list is copied under the read lock and the lock is released.
//!
//! 2. Each slot whose receiver is still alive is delivered to, in
//!    registration order: inline if it belongs to the emitting thread,
//!    posted to its own thread otherwise.
//!
//! 3. `emit` returns once every slot was invoked or queued. It never waits
//!    for posted deliveries.
//!
//! Because no lock is held while callbacks run, a slot may connect to or
//! disconnect the very signal that is calling it.
//!
//! # Thread Safety
//!
//! `Signal<A>` is `Send + Sync` and cheap to clone; all clones are the same
//! signal. `connect*` and `disconnect` may race freely with `emit` on other
//! threads. An emission sees every slot connected before its snapshot was
//! taken and none connected after.
//!
//! # Arguments
//!
//! Signals carry one value of type `A`. Use a tuple for several arguments.
//! `A` must be `Clone` because each slot gets its own copy.

use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use super::dispatch::{dispatch, Delivery};
use super::id::SignalId;
use super::registry::Registry;
use super::slot::{Callback, Slot};
use crate::context::{ExecutionContext, LoopRegistry};
use crate::handle::{make_affine, make_weak, LifelineWatch, ThreadAffine, WeakHandle};

/// State shared by all clones of a signal.
struct Shared<A> {
    id: SignalId,
    registry: Registry<A>,
    context: Arc<dyn ExecutionContext>,
}

impl<A> Shared<A>
where
    A: Clone + Send + 'static,
{
    fn emit(&self, args: A) -> Delivery {
        let snapshot = self.registry.snapshot();
        let delivery = dispatch(self.context.as_ref(), &snapshot, args);
        trace!(signal = %self.id, ?delivery, "emitted");
        delivery
    }
}

/// A thread-aware event source carrying values of type `A`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use relay_core::signals::Signal;
///
/// let clicked: Signal<i32> = Signal::new();
/// let total = Arc::new(AtomicI32::new(0));
///
/// let t = total.clone();
/// clicked.connect(move |n| {
///     t.fetch_add(n, Ordering::SeqCst);
/// });
///
/// // Same thread: runs inline.
/// clicked.emit(3);
/// assert_eq!(total.load(Ordering::SeqCst), 3);
/// ```
pub struct Signal<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Signal<A>
where
    A: Clone + Send + 'static,
{
    /// Create a signal that posts through [`LoopRegistry::global`].
    pub fn new() -> Self {
        Self::with_context(LoopRegistry::global())
    }

    /// Create a signal that posts through `context`.
    pub fn with_context(context: Arc<dyn ExecutionContext>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: SignalId::next(),
                registry: Registry::new(),
                context,
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.shared.id
    }

    /// The execution context this signal posts through.
    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.shared.context
    }

    fn push(&self, callback: Callback<A>, receiver: Option<Arc<dyn WeakHandle>>) {
        let owner = self.shared.context.current_thread();
        let mut slot = Slot::new(callback, owner);
        if let Some(receiver) = receiver {
            slot = slot.tracking(receiver);
        }
        let managed = slot.is_managed();

        let slots = self.shared.registry.append(slot);
        debug!(signal = %self.shared.id, ?owner, managed, slots, "slot connected");
    }

    /// Connect a free function or closure.
    ///
    /// The slot belongs to the calling thread: emissions from this thread
    /// run it inline, emissions from other threads post it here.
    pub fn connect<F>(&self, callback: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        self.push(Arc::new(callback), None);
    }

    /// Connect a method on an `Arc`-shared receiver.
    ///
    /// The slot holds the receiver weakly. Once the last strong reference is
    /// dropped, the slot is skipped, including deliveries already posted but
    /// not yet run.
    pub fn connect_method<R, F>(&self, receiver: &Arc<R>, method: F)
    where
        R: Send + Sync + 'static,
        F: Fn(&R, A) + Send + Sync + 'static,
    {
        let target = Arc::downgrade(receiver);
        self.push(bound_to(target, method), Some(make_weak(receiver)));
    }

    /// Like [`connect_method`](Self::connect_method), but deliveries go to
    /// whatever thread the receiver reports at emit time, falling back to
    /// the connecting thread when it reports none.
    pub fn connect_affine<R, F>(&self, receiver: &Arc<R>, method: F)
    where
        R: ThreadAffine + Send + Sync + 'static,
        F: Fn(&R, A) + Send + Sync + 'static,
    {
        let target = Arc::downgrade(receiver);
        self.push(bound_to(target, method), Some(make_affine(receiver)));
    }

    /// Connect a method on a receiver the slot takes ownership of.
    ///
    /// The receiver lives as long as the slot, so the slot is always live.
    pub fn connect_bound<R, F>(&self, receiver: R, method: F)
    where
        R: Send + Sync + 'static,
        F: Fn(&R, A) + Send + Sync + 'static,
    {
        self.push(Arc::new(move |args| method(&receiver, args)), None);
    }

    /// Connect a closure whose lifetime and thread follow a
    /// [`Lifeline`](crate::handle::Lifeline).
    pub fn connect_watched<F>(&self, watch: LifelineWatch, callback: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        let guard = watch.clone();
        let callback: Callback<A> = Arc::new(move |args| {
            if guard.is_live() {
                callback(args);
            }
        });
        self.push(callback, Some(Arc::new(watch)));
    }

    /// Forward every emission of this signal to `other`.
    ///
    /// The forwarding slot belongs to the calling thread like any other
    /// slot; `other` then applies its own delivery rules to its own slots.
    /// `other` is held weakly: once all its clones are dropped, forwarding
    /// stops. Forwarding a signal into itself recurses without end.
    pub fn connect_signal(&self, other: &Signal<A>) {
        let target: Weak<Shared<A>> = Arc::downgrade(&other.shared);
        let callback: Callback<A> = Arc::new(move |args| {
            if let Some(shared) = target.upgrade() {
                shared.emit(args);
            }
        });
        self.push(callback, Some(make_weak(&other.shared)));
    }

    /// Remove every slot.
    ///
    /// Emissions that already took their snapshot finish delivering to the
    /// old slots; deliveries already posted still run.
    pub fn disconnect(&self) {
        let removed = self.shared.registry.clear();
        debug!(signal = %self.shared.id, removed, "slots disconnected");
    }

    /// Deliver `args` to every live slot.
    pub fn emit(&self, args: A) {
        self.shared.emit(args);
    }

    /// Like [`emit`](Self::emit), reporting what happened to each slot.
    pub fn emit_counted(&self, args: A) -> Delivery {
        self.shared.emit(args)
    }

    /// Number of connected slots, live or not.
    pub fn slot_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Whether no slots are connected.
    pub fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }
}

/// Callback that upgrades `target` on every call and skips if it is gone.
fn bound_to<R, A, F>(target: Weak<R>, method: F) -> Callback<A>
where
    R: Send + Sync + 'static,
    A: 'static,
    F: Fn(&R, A) + Send + Sync + 'static,
{
    Arc::new(move |args| {
        if let Some(receiver) = target.upgrade() {
            method(&receiver, args);
        }
    })
}

impl<A> Default for Signal<A>
where
    A: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A> std::fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.shared.id)
            .field("slot_count", &self.shared.registry.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Slots
//!
//! A slot is one subscription: the callback to run plus the execution
//! context captured when it was connected. The context is the thread that
//! called `connect` and, for slots bound to a receiver object, a weak handle
//! to that object.

use std::sync::Arc;
use std::thread::ThreadId;

use crate::handle::WeakHandle;

/// Type-erased slot callback.
pub(crate) type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

/// One registered subscriber.
pub(crate) struct Slot<A> {
    callback: Callback<A>,

    /// Thread that was current when the slot was connected.
    owner_thread: ThreadId,

    /// Present only for slots bound to a tracked receiver.
    receiver: Option<Arc<dyn WeakHandle>>,
}

impl<A> Slot<A> {
    pub(crate) fn new(callback: Callback<A>, owner_thread: ThreadId) -> Self {
        Self {
            callback,
            owner_thread,
            receiver: None,
        }
    }

    pub(crate) fn tracking(mut self, receiver: Arc<dyn WeakHandle>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub(crate) fn owner_thread(&self) -> ThreadId {
        self.owner_thread
    }

    pub(crate) fn is_managed(&self) -> bool {
        self.receiver.is_some()
    }

    /// Unmanaged slots are always live.
    pub(crate) fn is_live(&self) -> bool {
        self.receiver
            .as_ref()
            .map_or(true, |receiver| receiver.is_live())
    }

    /// The receiver's current thread if it names one, else the connect thread.
    pub(crate) fn delivery_thread(&self) -> ThreadId {
        self.receiver
            .as_ref()
            .and_then(|receiver| receiver.preferred_thread())
            .unwrap_or(self.owner_thread)
    }

    pub(crate) fn invoke(&self, args: A) {
        (self.callback)(args);
    }

    pub(crate) fn callback(&self) -> Callback<A> {
        Arc::clone(&self.callback)
    }
}

impl<A> Clone for Slot<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            owner_thread: self.owner_thread,
            receiver: self.receiver.clone(),
        }
    }
}

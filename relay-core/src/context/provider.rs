//! Execution Context Provider
//!
//! The dispatcher never talks to threads directly. It asks an
//! [`ExecutionContext`] three things: who is calling, is a given thread the
//! caller, and can a task be queued onto a given thread. Anything that can
//! answer those (a run-loop registry, a GUI toolkit's event loop, a fake in a
//! test) can carry signal deliveries.

use std::thread::ThreadId;

use crate::error::PostError;

/// A unit of work posted onto another thread's queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of thread identity and cross-thread posting.
pub trait ExecutionContext: Send + Sync {
    /// Identity of the calling thread.
    fn current_thread(&self) -> ThreadId {
        std::thread::current().id()
    }

    /// Whether `thread` is the calling thread.
    fn is_current(&self, thread: ThreadId) -> bool {
        self.current_thread() == thread
    }

    /// Queue `task` for later execution on `thread`.
    ///
    /// Returns [`PostError::NotAlive`] when the thread's queue no longer
    /// exists. The task is dropped in that case.
    fn post(&self, thread: ThreadId, task: Task) -> Result<(), PostError>;
}

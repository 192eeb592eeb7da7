//! Loop Registry
//!
//! Maps each thread that has an attached [`RunLoop`](super::RunLoop) to the
//! sending side of that loop's queue. This is the default
//! [`ExecutionContext`]: posting looks up the target thread's sender and
//! pushes the task, and a thread without a live loop answers `NotAlive`.
//!
//! # Thread Safety
//!
//! The map is a `DashMap`, so lookups from emitting threads only contend on
//! one shard. Senders are cloned out of the map before use; no shard lock is
//! held while a message is sent.

use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use super::provider::{ExecutionContext, Task};
use crate::error::PostError;

/// Message understood by a run loop.
pub(crate) enum Message {
    Run(Task),
    Stop,
}

pub(crate) type LoopSender = UnboundedSender<Message>;

/// Thread-to-queue table implementing [`ExecutionContext`].
#[derive(Default)]
pub struct LoopRegistry {
    loops: DashMap<ThreadId, LoopSender>,
}

static GLOBAL: OnceLock<Arc<LoopRegistry>> = OnceLock::new();

impl LoopRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`Signal::new`](crate::signals::Signal::new).
    pub fn global() -> Arc<LoopRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(LoopRegistry::new())))
    }

    pub(crate) fn register(&self, thread: ThreadId, sender: LoopSender) {
        self.loops.insert(thread, sender);
    }

    /// Remove `thread`'s entry if it still belongs to `sender`'s channel.
    pub(crate) fn unregister(&self, thread: ThreadId, sender: &LoopSender) {
        self.loops
            .remove_if(&thread, |_, current| current.same_channel(sender));
    }

    /// Whether `thread` currently has a live run loop.
    pub fn is_attached(&self, thread: ThreadId) -> bool {
        self.loops
            .get(&thread)
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    /// Number of registered loops.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Whether no loops are registered.
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

impl ExecutionContext for LoopRegistry {
    fn post(&self, thread: ThreadId, task: Task) -> Result<(), PostError> {
        let sender = match self.loops.get(&thread) {
            Some(entry) => entry.value().clone(),
            None => return Err(PostError::NotAlive(thread)),
        };

        if sender.send(Message::Run(task)).is_err() {
            // The receiver is gone but the loop never unregistered.
            trace!(?thread, "pruning closed run loop");
            self.unregister(thread, &sender);
            return Err(PostError::NotAlive(thread));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoopRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopRegistry")
            .field("loops", &self.loops.len())
            .finish()
    }
}

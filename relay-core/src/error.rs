//! Error types.
//!
//! The error surface is deliberately small. Emission never fails from the
//! producer's point of view, so none of these reach `Signal::emit` callers;
//! they exist for the execution-context layer and for hosts that drive run
//! loops themselves.

use std::thread::ThreadId;

use thiserror::Error;

/// Failure to post a task onto another thread's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PostError {
    /// The target thread has no attached run loop, or its loop was dropped.
    #[error("no live run loop on thread {0:?}")]
    NotAlive(ThreadId),
}

/// Failure to attach a run loop to the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The calling thread already owns a run loop.
    #[error("thread {0:?} already has a run loop attached")]
    AlreadyAttached(ThreadId),
}

/// Failure to start a dedicated loop thread.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The OS refused to create the thread.
    #[error("failed to spawn loop thread: {0}")]
    Io(#[from] std::io::Error),

    /// The new thread could not attach its loop.
    #[error(transparent)]
    Attach(#[from] AttachError),

    /// The thread exited before reporting its loop handle.
    #[error("loop thread exited during startup")]
    Exited,
}

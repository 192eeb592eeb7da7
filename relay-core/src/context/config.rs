//! Run loop configuration.

use serde::{Deserialize, Serialize};

/// What happens to tasks still queued when a run loop goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Run every queued task on the owning thread before detaching.
    #[default]
    Drain,

    /// Drop queued tasks without running them.
    Discard,
}

/// Settings for a [`RunLoop`](super::RunLoop).
///
/// All fields have defaults, so a host can embed this in its own config
/// file and only spell out what it changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLoopConfig {
    /// OS thread name used by [`LoopThread::spawn`](super::LoopThread::spawn).
    pub name: Option<String>,

    /// Handling of queued tasks on shutdown.
    pub shutdown: ShutdownPolicy,
}

impl RunLoopConfig {
    /// Config with a thread name and default policy.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Replace the shutdown policy.
    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }
}

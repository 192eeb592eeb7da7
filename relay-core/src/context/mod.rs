//! Execution Contexts
//!
//! Signals deliver to a slot inline when the slot belongs to the emitting
//! thread, and post the delivery to the slot's thread otherwise. This module
//! supplies the "which thread am I on" and "queue this over there" half of
//! that decision.
//!
//! # Pieces
//!
//! - [`ExecutionContext`]: the provider interface the dispatcher depends on.
//! - [`LoopRegistry`]: the default provider, a table of per-thread queues.
//! - [`RunLoop`]: the queue a thread attaches and drains.
//! - [`LoopThread`]: a dedicated OS thread running a loop.
//!
//! Hosts that already own an event loop implement [`ExecutionContext`]
//! on top of it instead of using [`RunLoop`].

mod config;
mod provider;
mod registry;
mod run_loop;

pub use config::{RunLoopConfig, ShutdownPolicy};
pub use provider::{ExecutionContext, Task};
pub use registry::LoopRegistry;
pub use run_loop::{LoopHandle, LoopThread, RunLoop};

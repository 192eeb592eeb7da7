//! Relay Core
//!
//! Thread-aware signals and slots. A [`Signal`](signals::Signal) is a typed
//! event source; independent components connect callbacks to it, and every
//! emission reaches each live callback either synchronously (same thread) or
//! through the callback's own thread's queue (other threads).
//!
//! It implements:
//!
//! - Signals with closure, method, owned-receiver and signal-to-signal slots
//! - Snapshot-based emission that never holds a lock while callbacks run
//! - Weak receiver tracking, so destroyed objects are never called
//! - Per-thread run loops that receive cross-thread deliveries
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `signals`: signals, slots, the slot registry and the dispatcher
//! - `context`: the execution context interface and the run loop
//! - `handle`: weak receiver handles and lifelines
//! - `error`: error types for the context layer
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use relay_core::context::{LoopRegistry, RunLoop};
//! use relay_core::signals::Signal;
//!
//! let registry = Arc::new(LoopRegistry::new());
//! let mut ui = RunLoop::attach(&registry).unwrap();
//! let progress: Signal<u8> = Signal::with_context(registry);
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let s = seen.clone();
//! progress.connect(move |p| s.lock().push(p));
//!
//! // Emitted from a worker: queued for this thread.
//! let worker = progress.clone();
//! std::thread::spawn(move || worker.emit(50)).join().unwrap();
//! assert!(seen.lock().is_empty());
//!
//! ui.run_pending();
//! assert_eq!(*seen.lock(), vec![50]);
//! ```

pub mod context;
pub mod error;
pub mod handle;
pub mod signals;

pub use context::{ExecutionContext, LoopRegistry, RunLoop};
pub use error::{AttachError, PostError, SpawnError};
pub use signals::{Delivery, Signal, SignalId};

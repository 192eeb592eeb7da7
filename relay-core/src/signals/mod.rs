//! Signals and Slots
//!
//! This module implements the signal itself: the slot list, the
//! registration entry points and the emit-time dispatcher.
//!
//! # Concepts
//!
//! ## Slots
//!
//! A slot is one registered callback together with the thread that
//! registered it and, for slots bound to an object, a weak handle to that
//! object. There is no per-slot handle; `disconnect` removes all slots.
//!
//! ## Delivery
//!
//! On `emit`, each live slot is either called inline (it belongs to the
//! emitting thread) or posted to its thread's queue with its own copy of the
//! arguments. Inline slots run in registration order before `emit` returns;
//! posted slots run whenever their thread gets to them.
//!
//! ## Forwarding
//!
//! A signal can be connected to another signal. The forwarding slot is an
//! ordinary slot: it is delivered according to the thread that connected it,
//! and the target signal then delivers to its own slots by the same rules.

mod dispatch;
mod id;
mod registry;
mod signal;
mod slot;

pub use dispatch::Delivery;
pub use id::SignalId;
pub use signal::Signal;

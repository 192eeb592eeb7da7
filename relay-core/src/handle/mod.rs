//! Weak Handles
//!
//! Slots that call into an object must not keep that object alive, and must
//! not call it once it is gone. This module provides the weak handles slots
//! use for that: handles over `Arc`-shared receivers ([`make_weak`],
//! [`make_affine`]) and [`Lifeline`] tokens for components that are owned
//! directly.

mod lifeline;
mod weak;

pub use lifeline::{Lifeline, LifelineWatch};
pub use weak::{make_affine, make_weak, ThreadAffine, WeakHandle};

//! Dispatcher
//!
//! Walks a slot snapshot and delivers one emission.
//!
//! # Per-slot decision
//!
//! 1. A slot whose receiver is gone is skipped.
//! 2. The delivery thread is the receiver's preferred thread if it has one,
//!    otherwise the thread that connected the slot.
//! 3. If that is the emitting thread, the callback runs inline, right now.
//! 4. Otherwise a task owning its own copy of the arguments is posted to the
//!    delivery thread. A thread whose queue is gone is skipped.
//!
//! Nothing here reports failure to the emitter. Skipped slots only show up in
//! the returned [`Delivery`] and in trace output.

use std::thread::ThreadId;

use tracing::trace;

use super::slot::Slot;
use crate::context::ExecutionContext;
use crate::error::PostError;

/// What one emission did with each slot of its snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Slots invoked on the emitting thread.
    pub inline: usize,
    /// Slots queued onto another thread.
    pub posted: usize,
    /// Slots skipped because their receiver was destroyed.
    pub dead_receiver: usize,
    /// Slots skipped because their thread's queue was gone.
    pub dead_thread: usize,
}

impl Delivery {
    /// Slots that were invoked or queued.
    pub fn delivered(&self) -> usize {
        self.inline + self.posted
    }

    /// Slots that were skipped.
    pub fn skipped(&self) -> usize {
        self.dead_receiver + self.dead_thread
    }
}

/// Deliver `args` to every live slot in `slots`, in order.
///
/// Every slot but the last gets a clone of `args`; the last one takes the
/// caller's value.
pub(crate) fn dispatch<A>(context: &dyn ExecutionContext, slots: &[Slot<A>], args: A) -> Delivery
where
    A: Clone + Send + 'static,
{
    let mut delivery = Delivery::default();
    let Some((last, rest)) = slots.split_last() else {
        return delivery;
    };

    for slot in rest {
        if let Some(thread) = route(slot, &mut delivery) {
            deliver(context, slot, thread, args.clone(), &mut delivery);
        }
    }
    if let Some(thread) = route(last, &mut delivery) {
        deliver(context, last, thread, args, &mut delivery);
    }

    delivery
}

/// Liveness check and thread selection.
fn route<A>(slot: &Slot<A>, delivery: &mut Delivery) -> Option<ThreadId> {
    if !slot.is_live() {
        trace!(owner = ?slot.owner_thread(), "skipping slot: receiver destroyed");
        delivery.dead_receiver += 1;
        return None;
    }
    Some(slot.delivery_thread())
}

fn deliver<A>(
    context: &dyn ExecutionContext,
    slot: &Slot<A>,
    thread: ThreadId,
    args: A,
    delivery: &mut Delivery,
) where
    A: Send + 'static,
{
    if context.is_current(thread) {
        delivery.inline += 1;
        slot.invoke(args);
        return;
    }

    let callback = slot.callback();
    match context.post(thread, Box::new(move || callback(args))) {
        Ok(()) => delivery.posted += 1,
        Err(PostError::NotAlive(thread)) => {
            trace!(?thread, "skipping slot: thread has no run loop");
            delivery.dead_thread += 1;
        }
    }
}

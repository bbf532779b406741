//! Grounded on `Yield` (`examples/original_source/src/magic/coroutine/stackless/yield.h`):
//! `Yield(current) == DispatchTo(current)`, kept as its own name since it
//! documents intent (give other work a turn) rather than naming a
//! destination.

use std::sync::Arc;

use rtcx_task::Executor;

use crate::dispatch::{DispatchTo, dispatch_to};

/// Reschedules the current task onto the executor it's already running on,
/// giving other pending work on that executor a turn first.
///
/// # Panics
/// None directly, but per the source's precondition, `current` should be
/// the executor the calling task is actually running on.
pub fn yield_now(current: Arc<dyn Executor>) -> DispatchTo {
    dispatch_to(current)
}

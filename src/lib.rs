//! Facade crate tying together the whole runtime: a pooled stack allocator
//! and context-switch primitive, lock-free intrusive collections, task
//! executors (inline, manual, thread pool, strand), stackful fibers with
//! their synchronization primitives, futures/promises, and a stackless
//! task variant built on native `async`/`.await`.
//!
//! Each sub-crate keeps its own namespace here (`rtcx::fiber`,
//! `rtcx::future`, ...); the exception is the small set of free functions
//! a fiber's body calls ambiently — [`yield_now`], [`suspend`],
//! [`current_fiber_id`] — and the [`run_scheduler`] convenience, hoisted to
//! the crate root the way `examples/original_source/src/magic/fibers/api.h`'s
//! free functions live directly in the `magic` namespace rather than a
//! nested one.

pub use rtcx_collections as collections;
pub use rtcx_fiber as fiber;
pub use rtcx_fiber_sync as fiber_sync;
pub use rtcx_future as future;
pub use rtcx_stack as stack;
pub use rtcx_stackless as stackless;
pub use rtcx_task as task;

pub use rtcx_fiber::{FiberId, current_fiber_id, go, go_current, is_fiber, run_scheduler, suspend, yield_now};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn run_scheduler_drives_a_fiber_to_completion() {
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        run_scheduler(2, move || {
            flag.store(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}

//! Free functions a fiber's body calls to talk to the fiber it's running
//! in. Grounded on `magic::self::` (`examples/original_source/src/magic/fibers/api.h`,
//! `fiber.cpp`) and the top-level `Go`/`RunScheduler` entry points. The
//! source's `self::` namespace can't be named `self` in Rust, so these are
//! plain crate-root functions instead.

use std::sync::Arc;

use rtcx_task::{Executor, ThreadPool};

use crate::awaiter::YieldAwaiter;
use crate::fiber::{Fiber, FiberId};

/// Starts a fresh thread pool of `threads` workers, runs `routine` as a
/// fiber on it, and blocks until every fiber it (transitively) spawns has
/// finished. Grounded on `RunScheduler`.
pub fn run_scheduler(threads: usize, routine: impl FnOnce() + Send + 'static) {
    let pool = ThreadPool::new(threads);
    go(Arc::clone(&pool) as Arc<dyn Executor>, routine);
    pool.wait_idle();
    pool.stop();
}

/// Starts a new fiber on `executor`. Grounded on `Go(IExecutor&, Routine)`.
pub fn go(executor: Arc<dyn Executor>, routine: impl FnOnce() + Send + 'static) {
    Fiber::spawn(executor, routine);
}

/// Starts a new fiber on the current fiber's executor. Grounded on
/// `Go(Routine)`.
///
/// # Panics
/// Panics if called outside of a running fiber.
pub fn go_current(routine: impl FnOnce() + Send + 'static) {
    Fiber::spawn_current(routine);
}

/// Yields the current fiber back to its executor, to be resumed later
/// behind whatever else is already queued. Grounded on `self::Yield`.
///
/// # Panics
/// Panics if called outside of a running fiber.
pub fn yield_now() {
    let mut awaiter = YieldAwaiter;
    suspend(&mut awaiter);
}

/// Suspends the current fiber, handing `awaiter` the decision of what (if
/// anything) runs next. Grounded on `self::Suspend`.
///
/// # Panics
/// Panics if called outside of a running fiber.
pub fn suspend(awaiter: &mut dyn crate::awaiter::SuspendAwaiter) {
    Fiber::current().suspend_with(awaiter);
}

/// The id of the currently running fiber. Grounded on `self::GetFiberId`.
///
/// # Panics
/// Panics if called outside of a running fiber.
pub fn current_fiber_id() -> FiberId {
    Fiber::current_id()
}

/// Whether the calling thread is currently running inside a fiber.
/// Grounded on `self::IsFiber`.
pub fn is_fiber() -> bool {
    Fiber::is_in_fiber_context()
}

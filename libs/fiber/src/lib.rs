//! Fibers: stackful coroutines bound to an executor, with a suspension
//! protocol other primitives (mutexes, condition variables, futures) hook
//! into to park and resume a fiber without blocking its worker thread.
//!
//! Grounded on `examples/original_source/src/magic/fibers/`. [`fiber`]
//! holds the `Fiber` type itself; [`handle`] the handle an awaiter uses to
//! hand a fiber back to its executor or resume it inline; [`awaiter`] the
//! `SuspendAwaiter` protocol a fiber consults on every suspend; [`api`] the
//! free functions (`go`, `yield_now`, `suspend`, ...) a fiber's body calls.

pub mod api;
pub mod awaiter;
mod fiber;
pub mod handle;

pub use api::{current_fiber_id, go, go_current, is_fiber, run_scheduler, suspend, yield_now};
pub use awaiter::{SuspendAwaiter, YieldAwaiter, always_suspend, maybe_suspend};
pub use fiber::FiberId;
pub use handle::FiberHandle;

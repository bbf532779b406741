//! The suspension-awaiter protocol a fiber consults after every suspend.
//!
//! Grounded on `ISuspendAwaiter`/`IMaybeSuspendAwaiter`/`IAlwaysSuspendAwaiter`/
//! `YieldAwaiter` (`examples/original_source/src/magic/fibers/core/awaiter.h`).
//! The source expresses "maybe suspend" and "always suspend" as two base
//! classes a concrete awaiter inherits from, each supplying `OnCompleted`
//! in terms of a narrower method. Rust has no virtual base dispatch to
//! match that with a blanket trait impl (both bases would conflict), so
//! the two narrower shapes are instead free functions a concrete
//! `SuspendAwaiter::on_completed` body calls into.

use crate::handle::FiberHandle;

/// Consulted by a fiber immediately after it suspends, to decide what (if
/// anything) should run next on the current worker.
pub trait SuspendAwaiter {
    /// `handle` is the fiber that just suspended. Returning a valid handle
    /// means "run this fiber next, inline, without a queue round-trip"
    /// (symmetric transfer); returning [`FiberHandle::invalid`] means
    /// "nothing to run, the worker is free."
    fn on_completed(&mut self, handle: FiberHandle) -> FiberHandle;
}

/// For awaiters that unconditionally suspend the caller: run `suspend`
/// for its side effect (typically recording `handle` somewhere a later
/// notifier will find it) and always return invalid.
pub fn always_suspend(handle: FiberHandle, suspend: impl FnOnce(FiberHandle)) -> FiberHandle {
    suspend(handle);
    FiberHandle::invalid()
}

/// For awaiters that decide, at the point of suspension, whether the
/// caller needs to suspend at all. `try_resume_now` gets first refusal —
/// for a mutex this is `TryLockOrEnqueue`, which both installs the
/// waiter node on the losing path and reports whether it won the race
/// instead. If it returns `true` the handle is handed straight back (the
/// fiber keeps running, the suspend never really happened); if `false`
/// the caller stays suspended, having already been enqueued as a side
/// effect of the call.
pub fn maybe_suspend(handle: FiberHandle, try_resume_now: impl FnOnce(FiberHandle) -> bool) -> FiberHandle {
    if try_resume_now(handle.clone()) {
        handle
    } else {
        FiberHandle::invalid()
    }
}

/// Schedules the suspended fiber back onto its executor and yields the
/// worker. Grounded on `YieldAwaiter`.
#[derive(Default)]
pub struct YieldAwaiter;

impl SuspendAwaiter for YieldAwaiter {
    fn on_completed(&mut self, handle: FiberHandle) -> FiberHandle {
        handle.schedule();
        FiberHandle::invalid()
    }
}

//! `Fiber` = stackful coroutine bound to an executor.
//!
//! Grounded on `Fiber` (`examples/original_source/src/magic/fibers/core/fiber.h`,
//! `fiber.cpp`). The source is a `TaskNode` subclass, so a scheduled fiber
//! *is* the task; Rust has no inheritance, so `FiberRunner` wraps an
//! `Arc<Fiber>` and implements `RawTask` on its behalf, the same shape
//! `rtcx_task::strand::BatchRunner` uses to wrap a `Strand`'s shared state.
//! `UniqueIdGenerator` (`common/uniqueid.h`) becomes a plain `AtomicUsize`.

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rtcx_stack::Coroutine;
use rtcx_task::{Executor, RawTask, TaskNode};

use crate::awaiter::SuspendAwaiter;
use crate::handle::FiberHandle;

pub type FiberId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FiberState {
    Pending,
    Queued,
    Running,
    Suspended,
}

thread_local! {
    static CURRENT_FIBER: RefCell<Option<Arc<Fiber>>> = const { RefCell::new(None) };
}

/// A stackful coroutine bound to the executor it resumes on.
pub struct Fiber {
    coroutine: Coroutine,
    executor: Arc<dyn Executor>,
    state: Cell<FiberState>,
    id: FiberId,
    awaiter: Cell<Option<NonNull<dyn SuspendAwaiter>>>,
}

// Safety: a `Fiber` only ever runs on the single worker thread that is
// currently stepping its coroutine; ownership of that stepping transfers
// wholesale between threads via `Schedule`, never shared concurrently.
// `awaiter` is only ever touched from that same stepping thread.
unsafe impl Send for Fiber {}
unsafe impl Sync for Fiber {}

fn next_fiber_id() -> FiberId {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

impl Fiber {
    fn new(routine: impl FnOnce() + Send + 'static, executor: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new(Fiber {
            coroutine: Coroutine::new(routine),
            executor,
            state: Cell::new(FiberState::Pending),
            id: next_fiber_id(),
            awaiter: Cell::new(None),
        })
    }

    /// Starts a new fiber on `executor`. Grounded on `Fiber::Create`.
    pub fn spawn(executor: Arc<dyn Executor>, routine: impl FnOnce() + Send + 'static) {
        let fiber = Self::new(routine, executor);
        fiber.schedule();
    }

    /// Starts a new fiber on the current fiber's executor.
    ///
    /// # Panics
    /// Panics if called outside of a running fiber.
    pub fn spawn_current(routine: impl FnOnce() + Send + 'static) {
        let executor = Self::current_executor();
        Self::spawn(executor, routine);
    }

    pub(crate) fn current() -> Arc<Fiber> {
        CURRENT_FIBER.with(|cell| {
            cell.borrow()
                .clone()
                .expect("not in a fiber context")
        })
    }

    pub(crate) fn current_executor() -> Arc<dyn Executor> {
        Arc::clone(&Self::current().executor)
    }

    pub(crate) fn current_id() -> FiberId {
        Self::current().id
    }

    pub(crate) fn is_in_fiber_context() -> bool {
        CURRENT_FIBER.with(|cell| cell.borrow().is_some())
    }

    pub fn id(&self) -> FiberId {
        self.id
    }

    /// Hands the fiber to its executor for (re-)scheduling.
    pub fn schedule(self: &Arc<Self>) {
        self.state.set(FiberState::Queued);
        let runner = FiberRunner(Arc::clone(self));
        self.executor.execute(TaskNode::new(Box::new(runner)));
    }

    /// Resumes a suspended fiber by rescheduling it.
    ///
    /// # Panics
    /// Panics if the fiber is not currently suspended.
    pub fn resume(self: &Arc<Self>) {
        assert!(
            self.state.get() == FiberState::Suspended,
            "expected fiber in Suspended state"
        );
        self.schedule();
    }

    /// Suspends the running fiber, recording `awaiter` to be consulted once
    /// the coroutine yields control back here.
    pub(crate) fn suspend_with(&self, awaiter: &mut dyn SuspendAwaiter) {
        let erased: NonNull<dyn SuspendAwaiter> = NonNull::from(awaiter);
        self.awaiter.set(Some(erased));
        self.suspend();
    }

    pub(crate) fn suspend(&self) {
        self.state.set(FiberState::Suspended);
        rtcx_stack::suspend();
    }

    /// Drives the coroutine until it next suspends or completes, then
    /// consults the recorded awaiter (if any) for the next fiber to run
    /// inline on this worker — the symmetric-transfer chain that lets a
    /// `Strand` or a fast-resolving mutex avoid a queue round-trip.
    fn run_fiber(self: Arc<Self>) -> Option<Arc<Fiber>> {
        self.step();

        if self.coroutine.is_completed() {
            return None;
        }

        debug_assert_eq!(self.state.get(), FiberState::Suspended, "unexpected fiber state");

        let awaiter = self.awaiter.take();
        if let Some(mut awaiter) = awaiter {
            // Safety: the pointer was installed by `suspend_with` from a
            // `&mut dyn SuspendAwaiter` whose borrow is still alive on the
            // suspended stack frame beneath this call.
            let next = unsafe { awaiter.as_mut() }.on_completed(FiberHandle::new(Arc::clone(&self)));
            return next.into_inner();
        }

        None
    }

    fn step(self: &Arc<Self>) {
        self.state.set(FiberState::Running);

        let prev = CURRENT_FIBER.with(|cell| cell.borrow_mut().replace(Arc::clone(self)));
        self.coroutine.resume();
        CURRENT_FIBER.with(|cell| *cell.borrow_mut() = prev);
    }
}

/// Wraps an `Arc<Fiber>` so it can be submitted to an [`Executor`] as a
/// task, since `Fiber` can't literally be a `TaskNode` the way the source's
/// `Fiber : TaskNode` is. Grounded on `Fiber::Run`/`Fiber::Discard`.
struct FiberRunner(Arc<Fiber>);

impl RawTask for FiberRunner {
    fn run(self: Box<Self>) {
        let mut current = Some(self.0);
        while let Some(fiber) = current {
            current = fiber.run_fiber();
        }
    }

    fn discard(self: Box<Self>) {
        // The source's `Destroy` just frees the stack; here the coroutine
        // and its pool-allocated stack are reclaimed by `Fiber`'s (and in
        // turn `Coroutine`'s) own `Drop`, which requires the coroutine to
        // have either completed or never started. A discarded fiber that
        // already started and suspended mid-routine can't be torn down
        // safely, matching the source's assumption that discard only
        // happens to fibers that never got to run (executor shutdown
        // racing a fresh `Schedule`).
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcx_task::ManualExecutor;
    use std::sync::Mutex;

    #[test]
    fn a_fiber_runs_to_completion_on_its_executor() {
        let executor = Arc::new(ManualExecutor::new());
        let ran = Arc::new(Mutex::new(false));
        let r = Arc::clone(&ran);

        Fiber::spawn(Arc::clone(&executor) as Arc<dyn Executor>, move || {
            *r.lock().unwrap() = true;
        });

        executor.run_all();

        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn a_fiber_that_yields_resumes_on_the_next_batch() {
        let executor = Arc::new(ManualExecutor::new());
        let steps = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&steps);

        Fiber::spawn(Arc::clone(&executor) as Arc<dyn Executor>, move || {
            s.lock().unwrap().push(1);
            crate::api::yield_now();
            s.lock().unwrap().push(2);
        });

        executor.run_all();

        assert_eq!(*steps.lock().unwrap(), vec![1, 2]);
    }
}

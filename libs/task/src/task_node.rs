//! The unit of work every executor in this crate moves around.
//!
//! Grounded on `ITask`/`TaskNode` (`examples/original_source/src/magic/executors/task.h`):
//! a task is `{ run, discard }`, and ownership of a submitted task passes
//! to whichever executor holds it until it calls exactly one of those two
//! methods. `DefaultTask<Func>`
//! (`examples/original_source/src/magic/executors/detail/default_task.h`)
//! is the type-erased closure wrapper that most callers go through instead
//! of implementing the trait directly; [`spawn`] plays that role here.

use std::panic::{AssertUnwindSafe, catch_unwind};

use rtcx_collections::{Linked, Links};
use std::ptr::NonNull;

/// A unit of work an executor can run exactly once, or discard exactly
/// once if it never gets the chance to run.
pub trait RawTask: Send {
    fn run(self: Box<Self>);
    fn discard(self: Box<Self>);
}

/// An intrusive node carrying a type-erased [`RawTask`], linkable into the
/// queues every executor in this crate uses.
pub struct TaskNode {
    task: Box<dyn RawTask>,
    links: Links<TaskNode>,
}

impl TaskNode {
    pub fn new(task: Box<dyn RawTask>) -> Box<Self> {
        Box::new(Self { task, links: Links::new() })
    }

    pub fn run(self: Box<Self>) {
        self.task.run();
    }

    pub fn discard(self: Box<Self>) {
        self.task.discard();
    }
}

// SAFETY: TaskNode's only non-Send-auto field is `links`, which `rtcx_collections`
// already marks Send for any T.
unsafe impl Linked for TaskNode {
    type Handle = Box<TaskNode>;

    fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
        // SAFETY: Box::into_raw never returns null.
        unsafe { NonNull::new_unchecked(Box::into_raw(handle)) }
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        // SAFETY: forwarded from caller's invariant.
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    fn links(&self) -> &Links<Self> {
        &self.links
    }
}

struct ClosureTask<F> {
    func: Option<F>,
}

impl<F> RawTask for ClosureTask<F>
where
    F: FnOnce() + Send,
{
    fn run(mut self: Box<Self>) {
        let func = self.func.take().expect("ClosureTask::run called twice");
        if let Err(payload) = catch_unwind(AssertUnwindSafe(func)) {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            tracing::debug!(message, "a task panicked while running, discarding the panic");
        }
    }

    fn discard(self: Box<Self>) {}
}

/// Wraps `func` into a [`TaskNode`], the way `CreateTask`/`DefaultTask::Create`
/// wrap an arbitrary callable for submission to an executor.
pub fn spawn<F>(func: F) -> Box<TaskNode>
where
    F: FnOnce() + Send + 'static,
{
    TaskNode::new(Box::new(ClosureTask { func: Some(func) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn run_invokes_the_closure() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let node = spawn(move || flag.store(true, Ordering::SeqCst));
        node.run();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn discard_does_not_invoke_the_closure() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let node = spawn(move || flag.store(true, Ordering::SeqCst));
        node.discard();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn a_panicking_task_does_not_propagate() {
        let node = spawn(|| panic!("boom"));
        node.run();
    }
}

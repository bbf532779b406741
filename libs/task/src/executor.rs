//! The abstract executor capability every task-carrying component in this
//! crate (and `rtcx-fiber`) submits work to.
//!
//! Grounded on `IExecutor`/`Execute<F>` (`examples/original_source/src/magic/executors/executor.h`,
//! `execute.h`).

use crate::task_node::{TaskNode, spawn};

/// A capability that accepts [`TaskNode`]s and eventually calls exactly
/// one of `run`/`discard` on each.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Box<TaskNode>);
}

/// Wraps `func` in a task and submits it to `executor`, the way the
/// source's free `Execute(IExecutor&, F&&)` does.
pub fn execute<F>(executor: &(impl Executor + ?Sized), func: F)
where
    F: FnOnce() + Send + 'static,
{
    executor.execute(spawn(func));
}

//! A deterministic, single-threaded executor for tests.
//!
//! Grounded on `ManualExecutor` (`examples/original_source/src/magic/executors/manual.h`,
//! `manual.cpp`).

use std::cell::{Cell, RefCell};

use rtcx_collections::List;

use crate::executor::Executor;
use crate::task_node::TaskNode;

/// Queues tasks instead of running them; a test drives execution
/// explicitly via [`Self::run_all`]/[`Self::run_at_most`]/[`Self::run_once`].
#[derive(Default)]
pub struct ManualExecutor {
    tasks: RefCell<List<TaskNode>>,
    pending: Cell<usize>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs tasks until the queue is empty. Returns the number completed.
    pub fn run_all(&self) -> usize {
        let mut completed = 0;
        while self.run_next_task() {
            completed += 1;
        }
        completed
    }

    /// Runs at most `limit` tasks. Returns the number completed.
    pub fn run_at_most(&self, limit: usize) -> usize {
        let mut completed = 0;
        while completed < limit && self.run_next_task() {
            completed += 1;
        }
        completed
    }

    /// Runs a single task if one is queued.
    pub fn run_once(&self) -> bool {
        self.run_at_most(1) == 1
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending.get()
    }

    pub fn has_tasks(&self) -> bool {
        self.pending.get() > 0
    }

    fn run_next_task(&self) -> bool {
        let task = self.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                self.pending.set(self.pending.get() - 1);
                task.run();
                true
            }
            None => false,
        }
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, task: Box<TaskNode>) {
        self.tasks.borrow_mut().push_back(task);
        self.pending.set(self.pending.get() + 1);
    }
}

impl Drop for ManualExecutor {
    fn drop(&mut self) {
        assert!(
            !self.has_tasks(),
            "dropped a ManualExecutor with a non-empty task queue"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::execute;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn run_all_drains_the_queue_in_order() {
        let executor = ManualExecutor::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            execute(&executor, move || order.lock().unwrap().push(i));
        }

        let completed = executor.run_all();
        assert_eq!(completed, 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert!(!executor.has_tasks());
    }

    #[test]
    fn run_at_most_respects_the_limit() {
        let executor = ManualExecutor::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let count = Arc::clone(&count);
            execute(&executor, move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(executor.run_at_most(2), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(executor.has_tasks());
        executor.run_all();
    }

    #[test]
    #[should_panic(expected = "non-empty task queue")]
    fn dropping_with_pending_tasks_panics() {
        let executor = ManualExecutor::new();
        execute(&executor, || {});
        drop(executor);
    }
}

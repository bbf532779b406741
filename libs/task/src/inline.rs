//! The simplest executor: run the task on the calling thread, immediately.
//!
//! Grounded on `InlineExecutor`/`GetInlineExecutor` (`examples/original_source/src/magic/executors/inline.cpp`).

use std::sync::OnceLock;

use crate::executor::Executor;
use crate::task_node::TaskNode;

#[derive(Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Box<TaskNode>) {
        task.run();
    }
}

/// The process-wide inline executor instance, analogous to the source's
/// function-local `static InlineExecutor`.
pub fn inline_executor() -> &'static InlineExecutor {
    static INSTANCE: OnceLock<InlineExecutor> = OnceLock::new();
    INSTANCE.get_or_init(InlineExecutor::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::execute;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn execute_runs_synchronously() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        execute(inline_executor(), move || flag.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }
}

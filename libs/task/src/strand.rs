//! A serial executor over any base executor, without holding a worker
//! thread while idle.
//!
//! Grounded on `Strand` (`examples/original_source/src/magic/executors/strand.h`,
//! `strand.cpp`): `execute` pushes into an MPSC inbox and bumps a pending
//! counter; only the submitter that observes the counter transition from
//! zero resubmits the strand's batch-runner to the upstream executor. The
//! batch runner drains the inbox with `take_all`, runs everything in FIFO
//! order, then subtracts the completed count from the counter; if more
//! arrived while it was running, it resubmits itself. The strand's own
//! lifetime is shared with the in-flight batch task via `Arc`, matching
//! the source's note that implementations need shared ownership here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rtcx_collections::MpscQueue;

use crate::executor::Executor;
use crate::task_node::{RawTask, TaskNode};

struct Inner {
    executor: Arc<dyn Executor>,
    tasks: MpscQueue<TaskNode>,
    counter: AtomicUsize,
}

impl Inner {
    fn run_next_batch(self: &Arc<Self>) {
        let batch = TaskNode::new(Box::new(BatchRunner { inner: Arc::clone(self) }));
        self.executor.execute(batch);
    }

    /// Drains and discards every task queued so far, without resubmitting
    /// — called when the upstream executor discards the strand's own
    /// batch task, i.e. the upstream itself is shutting down.
    fn discard_batch(self: &Arc<Self>) {
        let mut discarded = 0usize;
        for task in self.tasks.take_all() {
            task.discard();
            discarded += 1;
        }
        tracing::trace!(discarded, "strand batch discarded");
        self.counter.fetch_sub(discarded, Ordering::AcqRel);
    }
}

struct BatchRunner {
    inner: Arc<Inner>,
}

impl RawTask for BatchRunner {
    fn run(self: Box<Self>) {
        let mut completed = 0usize;
        for task in self.inner.tasks.take_all() {
            task.run();
            completed += 1;
        }

        tracing::trace!(completed, "strand batch completed");
        if self.inner.counter.fetch_sub(completed, Ordering::AcqRel) > completed {
            tracing::trace!("more tasks arrived during the batch, resubmitting strand");
            self.inner.run_next_batch();
        }
    }

    fn discard(self: Box<Self>) {
        self.inner.discard_batch();
    }
}

/// A serial (single-at-a-time) executor layered on top of any base
/// executor.
pub struct Strand {
    inner: Arc<Inner>,
}

impl Strand {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                tasks: MpscQueue::new(),
                counter: AtomicUsize::new(0),
            }),
        }
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.inner.executor
    }
}

impl Executor for Strand {
    fn execute(&self, task: Box<TaskNode>) {
        self.inner.tasks.push(task);
        if self.inner.counter.fetch_add(1, Ordering::AcqRel) == 0 {
            self.inner.run_next_batch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::execute;
    use crate::manual::ManualExecutor;
    use std::sync::Mutex;

    #[test]
    fn tasks_run_in_submission_order() {
        let upstream: Arc<ManualExecutor> = Arc::new(ManualExecutor::new());
        let strand = Strand::new(upstream.clone());
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            execute(&strand, move || order.lock().unwrap().push(i));
        }

        upstream.run_all();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn only_one_batch_task_is_submitted_at_a_time() {
        let upstream: Arc<ManualExecutor> = Arc::new(ManualExecutor::new());
        let strand = Strand::new(upstream.clone());

        execute(&strand, || {});
        execute(&strand, || {});
        execute(&strand, || {});

        // A single batch task handles every task submitted before it runs.
        assert_eq!(upstream.pending_tasks(), 1);
        upstream.run_all();
    }

    #[test]
    fn tasks_submitted_during_a_batch_trigger_resubmission() {
        let upstream: Arc<ManualExecutor> = Arc::new(ManualExecutor::new());
        let strand = Arc::new(Strand::new(upstream.clone()));
        let ran = Arc::new(Mutex::new(Vec::new()));

        {
            let strand_for_reentry = Arc::clone(&strand);
            let ran = Arc::clone(&ran);
            execute(strand.as_ref(), move || {
                ran.lock().unwrap().push(0);
                // Submitted while the first batch is running: must land in
                // a freshly resubmitted batch, not be lost.
                let ran = Arc::clone(&ran);
                execute(strand_for_reentry.as_ref(), move || ran.lock().unwrap().push(1));
            });
        }

        upstream.run_all();
        upstream.run_all();
        assert_eq!(*ran.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn discarding_the_batch_task_discards_every_queued_task_without_running_it() {
        let upstream: Arc<ManualExecutor> = Arc::new(ManualExecutor::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let inner = Arc::new(Inner {
            executor: Arc::clone(&upstream) as Arc<dyn Executor>,
            tasks: MpscQueue::new(),
            counter: AtomicUsize::new(3),
        });
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            inner.tasks.push(crate::task_node::spawn(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let batch: Box<dyn RawTask> = Box::new(BatchRunner { inner: Arc::clone(&inner) });
        batch.discard();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(inner.counter.load(Ordering::SeqCst), 0);
    }
}

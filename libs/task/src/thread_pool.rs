//! A fixed pool of worker threads draining a shared blocking queue.
//!
//! Grounded on `ThreadPool` (`examples/original_source/src/magic/executors/thread_pool.h`,
//! `thread_pool.cpp`): a worker thread takes from [`BlockingQueue`] until
//! it returns `None` (the pool was stopped), running one task at a time
//! and decrementing the outstanding-work [`AtomicCounter`] after each.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::blocking_queue::BlockingQueue;
use crate::counter::AtomicCounter;
use crate::executor::Executor;
use crate::task_node::TaskNode;

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadPool>>> = const { RefCell::new(None) };
}

pub struct ThreadPool {
    counter: AtomicCounter,
    tasks: BlockingQueue<TaskNode>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    pub fn new(threads: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            counter: AtomicCounter::new(),
            tasks: BlockingQueue::new(),
            workers: std::sync::Mutex::new(Vec::with_capacity(threads)),
        });
        pool.start_worker_threads(threads);
        pool
    }

    /// The pool the calling thread is a worker of, if any.
    pub fn current() -> Option<Arc<ThreadPool>> {
        CURRENT.with(|cell| cell.borrow().clone())
    }

    pub fn wait_idle(&self) {
        self.counter.wait_zero();
    }

    /// Stops the worker threads as soon as possible; pending tasks are
    /// discarded.
    pub fn stop(&self) {
        let counter = &self.counter;
        self.tasks.shutdown(|task| {
            task.discard();
            counter.done();
        });

        let mut workers = self.workers.lock().unwrap();
        for worker in workers.drain(..) {
            worker.join().expect("thread pool worker panicked");
        }
    }

    fn start_worker_threads(self: &Arc<Self>, count: usize) {
        let mut workers = self.workers.lock().unwrap();
        for _ in 0..count {
            let pool = Arc::clone(self);
            workers.push(thread::spawn(move || {
                CURRENT.with(|cell| *cell.borrow_mut() = Some(Arc::clone(&pool)));
                pool.worker_routine();
            }));
        }
    }

    fn worker_routine(&self) {
        while let Some(task) = self.tasks.take() {
            task.run();
            self.counter.done();
        }
    }
}

impl Executor for ThreadPool {
    fn execute(&self, task: Box<TaskNode>) {
        self.counter.add(1);
        if let Err(task) = self.tasks.put(task) {
            task.discard();
            self.counter.done();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        assert!(
            self.workers.lock().unwrap().is_empty(),
            "dropped a ThreadPool without calling stop() first"
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
    fn runs_every_submitted_task() {
        let pool = ThreadPool::new(4);
        let completed = Arc::new(AtomicUsize::new(0));
        for _ in 0..1000 {
            let completed = Arc::clone(&completed);
            execute(pool.as_ref(), move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait_idle();
        assert_eq!(completed.load(Ordering::SeqCst), 1000);
        pool.stop();
    }

    #[test]
    fn current_is_set_on_worker_threads_only() {
        assert!(ThreadPool::current().is_none());

        let pool = ThreadPool::new(1);
        let (tx, rx) = std::sync::mpsc::channel();
        execute(pool.as_ref(), move || {
            tx.send(ThreadPool::current().is_some()).unwrap();
        });

        assert!(rx.recv().unwrap());
        pool.stop();
    }

    #[test]
    fn stop_discards_pending_tasks() {
        let pool = ThreadPool::new(1);
        let ran = Arc::new(AtomicUsize::new(0));

        // Saturate the single worker, then queue more tasks behind it.
        let (block_tx, block_rx) = std::sync::mpsc::channel::<()>();
        execute(pool.as_ref(), move || {
            block_rx.recv().unwrap();
        });
        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            execute(pool.as_ref(), move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.stop_from_another_thread_after_unblocking(block_tx);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    impl ThreadPool {
        fn stop_from_another_thread_after_unblocking(
            self: &Arc<Self>,
            block_tx: std::sync::mpsc::Sender<()>,
        ) {
            // Stop immediately so the queued tasks race against shutdown;
            // only then unblock the in-flight one.
            let pool = Arc::clone(self);
            let stopper = thread::spawn(move || pool.stop());
            block_tx.send(()).unwrap();
            stopper.join().unwrap();
        }
    }
}

//! Grounded on `WaitGroup`
//! (`examples/original_source/src/magic/coroutine/stackless/sync/waitgroup.h`):
//! an atomic counter plus a [`OneShotEvent`] fired when it reaches zero.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::oneshot_event::{OneShotEvent, WaitAsync};

pub struct WaitGroup {
    count: AtomicUsize,
    done: OneShotEvent,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub const fn new() -> Self {
        Self { count: AtomicUsize::new(0), done: OneShotEvent::new() }
    }

    pub fn add(&self, count: usize) {
        self.count.fetch_add(count, Ordering::AcqRel);
    }

    pub fn done(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "WaitGroup::done called more times than add");
        if prev == 1 {
            self.done.fire();
        }
    }

    pub fn wait_async(&self) -> WaitAsync<'_> {
        self.done.wait_async()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch_to;
    use crate::fire::fire_and_forget;
    use crate::task::Task;
    use rtcx_task::{Executor, ThreadPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn wait_resumes_once_every_worker_is_done() {
        let pool = ThreadPool::new(4);
        let group = Arc::new(WaitGroup::new());
        let finished = Arc::new(AtomicUsize::new(0));

        const WORKERS: usize = 20;
        group.add(WORKERS);

        for _ in 0..WORKERS {
            let group = Arc::clone(&group);
            let finished = Arc::clone(&finished);
            let executor = Arc::clone(&pool) as Arc<dyn Executor>;
            fire_and_forget(Task::new(async move {
                dispatch_to(executor).await;
                finished.fetch_add(1, Ordering::SeqCst);
                group.done();
            }));
        }

        let waiting_group = Arc::clone(&group);
        let observed = Arc::clone(&finished);
        fire_and_forget(Task::new(async move {
            waiting_group.wait_async().await;
            assert_eq!(observed.load(Ordering::SeqCst), WORKERS);
        }));

        pool.wait_idle();
        pool.stop();
        assert_eq!(finished.load(Ordering::SeqCst), WORKERS);
    }
}

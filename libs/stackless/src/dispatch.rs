//! Grounded on `DispatchAwaiter`/`DispatchTo`
//! (`examples/original_source/src/magic/coroutine/stackless/dispatch.h`):
//! reschedule the current task onto a target executor. The source's awaiter
//! is a `TaskNode` submitted to the executor, whose `Run` resumes the
//! coroutine handle directly; here, the first `poll` submits a task that
//! wakes the `Waker` instead, which has the same effect once the executor
//! gets around to running it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rtcx_task::Executor;

pub struct DispatchTo {
    executor: Arc<dyn Executor>,
    submitted: bool,
}

impl Future for DispatchTo {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.submitted {
            return Poll::Ready(());
        }
        self.submitted = true;
        let waker = cx.waker().clone();
        rtcx_task::execute(&*self.executor, move || waker.wake());
        Poll::Pending
    }
}

/// Reschedules the current task onto `target`: the next line after
/// `.await` runs as a task submitted to `target`, not inline.
pub fn dispatch_to(target: Arc<dyn Executor>) -> DispatchTo {
    DispatchTo { executor: target, submitted: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fire::fire_and_forget;
    use crate::task::Task;
    use rtcx_task::ThreadPool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_to_resumes_on_the_target_executor() {
        let pool = ThreadPool::new(2);
        let resumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resumed);
        let executor = Arc::clone(&pool) as Arc<dyn Executor>;

        fire_and_forget(Task::new(async move {
            dispatch_to(Arc::clone(&executor)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            dispatch_to(executor).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        pool.wait_idle();
        pool.stop();
        assert_eq!(resumed.load(Ordering::SeqCst), 2);
    }
}

//! Grounded on `FireAndForget`
//! (`examples/original_source/src/magic/coroutine/stackless/fire.h`): detach
//! a task and run it. The source just resumes the coroutine handle once;
//! every later resumption is driven by whichever awaiter the task suspended
//! on (dispatch to an executor, or a sync primitive's waiter list) calling
//! `resume()` again directly. A Rust future can't be resumed without a
//! driver holding it, so [`TaskCell`] plays that role: its `poll` is what
//! every `Waker` created from it ultimately calls, mirroring the source's
//! direct resume.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};

use crate::task::Task;

struct TaskCell {
    future: Mutex<Option<Pin<Box<dyn Future<Output = ()> + Send>>>>,
}

impl Wake for TaskCell {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.poll();
    }
}

impl TaskCell {
    fn poll(self: &Arc<Self>) {
        let mut slot = self.future.lock().expect("stackless task mutex poisoned");
        let Some(mut future) = slot.take() else {
            // Another thread is already driving this task (or it already
            // finished) and a spurious/duplicate wake arrived; nothing to do.
            return;
        };
        drop(slot);

        let waker = Waker::from(Arc::clone(self));
        let mut cx = Context::from_waker(&waker);
        match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => {
                *self.future.lock().expect("stackless task mutex poisoned") = Some(future);
            }
            Ok(Poll::Ready(())) => {
                tracing::trace!("stackless task completed");
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("<non-string panic payload>");
                tracing::debug!(message, "a stackless task panicked while running, discarding the panic");
            }
        }
    }
}

/// Detaches `task` and runs it until its first suspension point, on the
/// calling thread — exactly one synchronous resume, the same as the
/// source's `FireAndForget`. Every subsequent resumption happens wherever
/// the awaiter the task is suspended on decides to wake it.
pub fn fire_and_forget(task: Task<()>) {
    let cell = Arc::new(TaskCell { future: Mutex::new(Some(task.release())) });
    cell.poll();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch_to;
    use rtcx_task::{Executor, ThreadPool};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn fire_and_forget_runs_a_task_with_no_suspension_points() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        fire_and_forget(Task::new(async move {
            flag.store(true, Ordering::SeqCst);
        }));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn fire_and_forget_resumes_across_a_dispatch_point() {
        let pool = ThreadPool::new(2);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let executor = Arc::clone(&pool) as Arc<dyn Executor>;

        fire_and_forget(Task::new(async move {
            dispatch_to(executor).await;
            flag.store(true, Ordering::SeqCst);
        }));

        pool.wait_idle();
        pool.stop();
        assert!(ran.load(Ordering::SeqCst));
    }
}

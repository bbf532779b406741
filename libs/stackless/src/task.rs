//! Grounded on `magic::Task<T>` (`examples/original_source/src/magic/coroutine/stackless/task.h`):
//! a lazily-started unit of stackless work. The source wraps a compiler-provided
//! `std::coroutine_handle`; this crate has no compiler-assisted coroutine
//! machinery to wrap, so `Task<T>` wraps a boxed `Future` instead — Rust's
//! native `async`/`.await` plays the role the source's coroutine promise
//! plays there.
//!
//! The source's promise only ever records a `Status` on completion
//! (`return_void`/`set_exception`) and its `final_suspend` never actually
//! suspends, so that result is never read back by anyone — `Task` there is
//! purely fire-and-forget. This port keeps that shape: driving a `Task` to
//! completion surfaces nothing but whether it panicked, logged and
//! discarded the same way a directly spawned executor task is.
//!
//! `~Task()` calls `std::terminate()` if the coroutine was never finished;
//! the nearest Rust equivalent is a task that was constructed but never
//! handed to a driver ([`crate::fire::fire_and_forget`] or a dispatch
//! point) — dropping one of those panics instead of silently leaking the
//! unstarted work.

use std::future::Future;
use std::pin::Pin;

use futures::future::BoxFuture;

/// A unit of stackless work, started lazily. Must be driven to completion
/// (see [`crate::fire::fire_and_forget`]) before being dropped.
pub struct Task<T = ()> {
    future: Option<BoxFuture<'static, T>>,
}

impl<T> Task<T> {
    /// Wraps an async block/fn body as a task. Nothing runs until the task
    /// is driven.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self { future: Some(Box::pin(future)) }
    }

    /// Hands the inner future to a driver. Only callable once.
    pub(crate) fn release(mut self) -> Pin<Box<dyn Future<Output = T> + Send>> {
        self.future.take().expect("stackless task already released")
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if self.future.is_some() {
            panic!("stackless task dropped without being driven to completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_task_holds_its_future_until_released() {
        let task = Task::new(async { 7 });
        let mut future = task.release();
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        match future.as_mut().poll(&mut cx) {
            std::task::Poll::Ready(value) => assert_eq!(value, 7),
            std::task::Poll::Pending => panic!("an async block with no await points must be ready immediately"),
        }
    }

    #[test]
    #[should_panic(expected = "dropped without being driven")]
    fn dropping_an_undriven_task_panics() {
        let _task = Task::new(async {});
    }
}

//! Grounded on `magic::Await<T>`/`detail::FutureAwaiter<T>`
//! (`examples/original_source/src/magic/futures/await.h`,
//! `examples/original_source/src/magic/fibers/core/await.h`): block on a
//! future without blocking a whole OS thread, if the caller happens to be
//! running on one. The source has this living in `rtcx-fiber` instead
//! (`detail::Await` is reached through `fibers/core/await.h`), but that
//! would make `rtcx-fiber` depend on `rtcx-future`'s `Future<T>` while
//! `rtcx-future` already needs `rtcx-fiber`'s `is_fiber`/`suspend` for this
//! very function — a cycle Rust's crate graph can't express. Breaking it
//! here, with `rtcx-future` as the sole depender, resolves it; `rtcx-fiber`
//! itself stays ignorant of futures entirely.

use std::cell::Cell;

use rtcx_fiber::{FiberHandle, SuspendAwaiter, always_suspend, is_fiber, suspend};

use crate::error::Result;
use crate::future::Future;
use crate::get::wait_result;

struct FutureAwaiter<T> {
    future: Cell<Option<Future<T>>>,
    result: Cell<Option<Result<T>>>,
}

/// Carries a raw pointer into a `Send` closure. Sound because the pointee
/// (a `FutureAwaiter` on the awaiting fiber's stack) outlives every use of
/// it: the fiber stays suspended, its stack intact, until the very resume
/// this pointer's one write precedes.
struct AwaiterPtr<T>(*const FutureAwaiter<T>);
unsafe impl<T> Send for AwaiterPtr<T> {}

impl<T: Send + 'static> SuspendAwaiter for FutureAwaiter<T> {
    fn on_completed(&mut self, handle: FiberHandle) -> FiberHandle {
        always_suspend(handle, |handle| {
            let future = self.future.take().expect("awaiter subscribed twice");
            let ptr = AwaiterPtr(self as *const FutureAwaiter<T>);
            future.subscribe(move |result| {
                let ptr = ptr;
                // Safety: see `AwaiterPtr`'s doc comment.
                unsafe { (*ptr.0).result.set(Some(result)) };
                handle.resume();
            });
        })
    }
}

/// Waits for `future` to resolve. If called from inside a running fiber,
/// only that fiber suspends — the worker thread keeps running other work.
/// Otherwise falls back to blocking the calling thread
/// ([`crate::get::wait_result`]).
pub fn await_future<T: Send + 'static>(future: Future<T>) -> Result<T> {
    if !is_fiber() {
        return wait_result(future);
    }
    if future.is_ready() {
        return future.get_result();
    }

    let mut awaiter = FutureAwaiter {
        future: Cell::new(Some(future)),
        result: Cell::new(None),
    };
    suspend(&mut awaiter);
    awaiter.result.take().expect("fiber resumed without its future's result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::make_contract_via;
    use rtcx_fiber::go;
    use rtcx_task::{Executor, ThreadPool};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn awaiting_an_already_ready_future_does_not_suspend() {
        let pool = ThreadPool::new(1);
        let result = Arc::new(AtomicI32::new(0));

        let contract = make_contract_via(Arc::clone(&pool) as Arc<dyn Executor>);
        contract.promise.set_value(7);
        let future = contract.future;

        let observed = Arc::clone(&result);
        go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
            let value = await_future(future).expect("future resolved to an error");
            observed.store(value, Ordering::SeqCst);
        });

        pool.wait_idle();
        pool.stop();
        assert_eq!(result.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn await_future_suspends_the_fiber_until_resolved() {
        let pool = ThreadPool::new(2);
        let result = Arc::new(AtomicI32::new(0));

        let exec_for_contract = Arc::clone(&pool) as Arc<dyn Executor>;
        let contract = make_contract_via(exec_for_contract);
        let future = contract.future;
        let promise = contract.promise;

        let observed = Arc::clone(&result);
        go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
            let value = await_future(future).expect("future resolved to an error");
            observed.store(value, Ordering::SeqCst);
        });

        let setter_pool = Arc::clone(&pool) as Arc<dyn Executor>;
        go(setter_pool, move || {
            rtcx_fiber::yield_now();
            promise.set_value(42);
        });

        pool.wait_idle();
        pool.stop();
        assert_eq!(result.load(Ordering::SeqCst), 42);
    }
}

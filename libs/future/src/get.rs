//! Grounded on `futures::WaitResult`/`WaitValue`
//! (`examples/original_source/src/magic/futures/get.h`): block the calling
//! *thread* until a future resolves. The source's `BlockingGetter` parks on
//! `magic::concurrency::OneShotEvent`, a plain mutex/condvar event — not
//! the fiber-parking `rtcx_fiber_sync::OneShotEvent`, which would suspend a
//! fiber instead of blocking a thread. This crate doesn't depend on
//! `rtcx-fiber-sync` at all, so it's reimplemented here directly on
//! `std::sync::{Mutex, Condvar}`.

use std::sync::{Condvar, Mutex};

use crate::error::Result;
use crate::future::Future;

struct ThreadEvent {
    fired: Mutex<bool>,
    condvar: Condvar,
}

impl ThreadEvent {
    fn new() -> Self {
        Self { fired: Mutex::new(false), condvar: Condvar::new() }
    }

    fn wait(&self) {
        let mut fired = self.fired.lock().expect("event mutex poisoned");
        while !*fired {
            fired = self.condvar.wait(fired).expect("event mutex poisoned");
        }
    }

    fn fire(&self) {
        *self.fired.lock().expect("event mutex poisoned") = true;
        self.condvar.notify_one();
    }
}

/// Blocks the calling thread until `future` resolves, then returns its
/// result.
///
/// # Panics
/// Panics if called from inside a running fiber — blocking an entire
/// worker thread defeats fibers' point. Use `rtcx_fiber`'s `Await`-style
/// suspend instead in that context (see `crate::await_::await_future`).
pub fn wait_result<T: Send + 'static>(future: Future<T>) -> Result<T> {
    assert!(!rtcx_fiber::is_fiber(), "wait_result blocks a thread; call it outside a fiber");

    let event = std::sync::Arc::new(ThreadEvent::new());
    let result_slot = std::sync::Arc::new(Mutex::new(None));

    let waiter_event = std::sync::Arc::clone(&event);
    let waiter_slot = std::sync::Arc::clone(&result_slot);
    future.subscribe(move |result| {
        *waiter_slot.lock().expect("result mutex poisoned") = Some(result);
        waiter_event.fire();
    });

    event.wait();
    result_slot
        .lock()
        .expect("result mutex poisoned")
        .take()
        .expect("event fired without a result")
}

/// Blocks the calling thread until `future` resolves, then unwraps its
/// value, panicking if it resolved to an error.
pub fn wait_value<T: Send + 'static>(future: Future<T>) -> T {
    wait_result(future).expect("future resolved to an error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::make_contract_via;
    use rtcx_task::{Executor, ThreadPool};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn wait_value_blocks_until_a_background_thread_resolves_the_future() {
        let pool = ThreadPool::new(2);
        let (future, promise) = {
            let contract = make_contract_via(Arc::clone(&pool) as Arc<dyn Executor>);
            (contract.future, contract.promise)
        };

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            promise.set_value(99);
        });

        assert_eq!(wait_value(future), 99);
        pool.stop();
    }
}

//! The cell a `Future`/`Promise` pair hands back and forth. Grounded on
//! `detail::SharedState<T>`
//! (`examples/original_source/src/magic/futures/core/detail/shared_state.h`),
//! with its handshake expressed through `crate::rendezvous::Rendezvous`
//! rather than duplicating the CAS dance inline: the result is the
//! producer arriving, the callback is the consumer arriving, and whichever
//! side's rendezvous call reports the other already present is the side
//! that runs the callback. `result`/`callback` are plain cells, not
//! additionally locked — the rendezvous itself is what makes publishing
//! one and reading the other from a different thread sound, the same
//! lock-free handoff `rtcx-fiber-sync`'s `Mutex` and `OneShotEvent` use for
//! their own wait chains.

use std::cell::UnsafeCell;
use std::sync::{Arc, Mutex as StdMutex};

use rtcx_task::Executor;

use crate::error::Result;
use crate::rendezvous::Rendezvous;

pub(crate) type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

pub(crate) struct SharedState<T> {
    rendezvous: Rendezvous,
    // Rarely written (once, by `Via`, before the result is ever set) and
    // read once per callback invocation — a mutex is plenty; this isn't a
    // hot path the way the fiber sync primitives' wait chains are.
    executor: StdMutex<Arc<dyn Executor>>,
    result: UnsafeCell<Option<Result<T>>>,
    callback: UnsafeCell<Option<Callback<T>>>,
}

// Safety: `result`/`callback` are each written by exactly one side of the
// `rendezvous` handshake before it arrives, and read by exactly one side
// after observing the other already arrived — never concurrently.
unsafe impl<T: Send> Send for SharedState<T> {}
unsafe impl<T: Send> Sync for SharedState<T> {}

impl<T> SharedState<T> {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            rendezvous: Rendezvous::new(),
            executor: StdMutex::new(executor),
            result: UnsafeCell::new(None),
            callback: UnsafeCell::new(None),
        }
    }

    pub fn has_result(&self) -> bool {
        self.rendezvous.has_produced()
    }

    pub fn has_callback(&self) -> bool {
        self.rendezvous.has_consumed()
    }

    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.executor.lock().expect("executor mutex poisoned"))
    }

    pub fn set_executor(&self, executor: Arc<dyn Executor>) {
        *self.executor.lock().expect("executor mutex poisoned") = executor;
    }

    /// Takes the published result out. Only sound to call once
    /// [`Self::has_result`] is observed true.
    pub fn take_result(&self) -> Option<Result<T>> {
        // Safety: the result field is only written before the producer
        // side of the rendezvous runs, and callers only reach here after
        // observing that via `has_result`.
        unsafe { (*self.result.get()).take() }
    }

    pub fn set_result(&self, result: Result<T>) {
        assert!(!self.has_result(), "future result is already set");
        // Safety: published by the `rendezvous.produce()` call below.
        unsafe { *self.result.get() = Some(result) };

        if self.rendezvous.produce() {
            self.invoke_callback();
        }
    }

    pub fn set_callback(&self, callback: Callback<T>) {
        assert!(!self.has_callback(), "future callback is already set");
        // Safety: published by the `rendezvous.consume()` call below.
        unsafe { *self.callback.get() = Some(callback) };

        if self.rendezvous.consume() {
            self.invoke_callback();
        }
    }

    fn invoke_callback(&self) {
        // Safety: both sides of the rendezvous have now arrived, and
        // we're the side whose call just observed that — the only one
        // allowed to take them.
        let callback = unsafe { (*self.callback.get()).take() }.expect("callback missing at rendezvous");
        let result = self.take_result().expect("result missing at rendezvous");
        let executor = self.executor();
        rtcx_task::execute(&*executor, move || callback(result));
    }
}

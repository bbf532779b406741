//! Grounded on `Future<T>`/`Contract<T>`/`MakeContractVia`
//! (`examples/original_source/src/magic/futures/core/future.h`).
//!
//! The source's lvalue/rvalue-qualified methods (`Future<T>::Then(F) &&`)
//! enforce "consume once" through C++ reference qualifiers; here every
//! consuming method just takes `self` by value, and `Future::invalid()`'s
//! `None` state plays the role of a moved-from `Future`.
//!
//! `Then`'s two overloads (sync continuation `T -> U`, async continuation
//! `T -> Future<U>`, picked by `concepts.h`'s `SyncContinuation`/
//! `AsyncContinuation`) don't have a return-type-directed overload
//! equivalent in Rust, so they're two differently named methods here:
//! [`Future::then`] (sync, flattening nothing) and [`Future::and_then`]
//! (async, flattening the continuation's own `Future<U>`).

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rtcx_task::{Executor, InlineExecutor};

use crate::error::{Error, Result};
use crate::promise::Promise;
use crate::shared_state::SharedState;

/// A value of type `T` that will become available later, possibly on
/// another thread. Consuming methods (`then`, `recover`, `subscribe`, ...)
/// take `self` by value; after calling one, the future is spent.
#[must_use]
pub struct Future<T> {
    state: Option<Arc<SharedState<T>>>,
}

/// A matched future/promise pair sharing one [`SharedState`].
pub struct Contract<T> {
    pub future: Future<T>,
    pub promise: Promise<T>,
}

pub fn make_contract_via<T>(executor: Arc<dyn Executor>) -> Contract<T> {
    let state = Arc::new(SharedState::new(executor));
    Contract {
        future: Future { state: Some(Arc::clone(&state)) },
        promise: Promise::new(state),
    }
}

pub fn make_contract<T>() -> Contract<T> {
    make_contract_via(Arc::new(InlineExecutor) as Arc<dyn Executor>)
}

impl<T> Future<T> {
    pub fn invalid() -> Self {
        Self { state: None }
    }

    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> &Arc<SharedState<T>> {
        self.state.as_ref().expect("future has no shared state (already consumed or invalid)")
    }

    fn release(mut self) -> Arc<SharedState<T>> {
        self.state.take().expect("future has no shared state (already consumed or invalid)")
    }

    /// Non-blocking. True if the result has already been set.
    pub fn is_ready(&self) -> bool {
        self.state().has_result()
    }

    pub fn executor(&self) -> Arc<dyn Executor> {
        self.state().executor()
    }

    /// Consumes the future, returning its result. Only call once
    /// [`Self::is_ready`] is true; to block until it is, use
    /// [`crate::get::wait_result`]/[`crate::get::wait_value`].
    pub fn get_result(self) -> Result<T> {
        self.release()
            .take_result()
            .expect("future polled for a result it doesn't have yet")
    }

    /// Sets the executor any continuation subscribed after this call runs
    /// on. Usage: `future.via(executor).then(...)`.
    pub fn via(self, executor: Arc<dyn Executor>) -> Self {
        let state = self.release();
        state.set_executor(executor);
        Self { state: Some(state) }
    }

    /// Consumes the future with an asynchronous callback.
    pub fn subscribe(self, callback: impl FnOnce(Result<T>) + Send + 'static) {
        self.release().set_callback(Box::new(callback));
    }
}

impl<T: Send + 'static> Future<T> {
    /// Synchronous continuation: `T -> U`, errors pass through unchanged.
    pub fn then<U, F>(self, continuation: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let executor = self.executor();
        let Contract { future, promise } = make_contract_via(executor);
        self.subscribe(move |result| {
            promise.set(result.and_then(|value| invoke(continuation, value)));
        });
        future
    }

    /// Asynchronous continuation: `T -> Future<U>`, flattened into a
    /// single `Future<U>` instead of a `Future<Future<U>>`.
    pub fn and_then<U, F>(self, continuation: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        let executor = self.executor();
        let Contract { future, promise } = make_contract_via(executor);
        self.subscribe(move |result| match result {
            Ok(value) => match invoke(continuation, value) {
                Ok(inner) => inner.subscribe(move |inner_result| promise.set(inner_result)),
                Err(error) => promise.set(Err(error)),
            },
            Err(error) => promise.set(Err(error)),
        });
        future
    }

    /// Error handler: `Error -> Result<T>`, leaves a successful result
    /// untouched.
    pub fn recover<F>(self, handler: F) -> Future<T>
    where
        F: FnOnce(Error) -> Result<T> + Send + 'static,
    {
        let executor = self.executor();
        let Contract { future, promise } = make_contract_via(executor);
        self.subscribe(move |result| {
            let recovered = match result {
                Ok(value) => Ok(value),
                Err(error) => invoke(handler, error).and_then(std::convert::identity),
            };
            promise.set(recovered);
        });
        future
    }
}


/// Runs a continuation, catching a panic and turning it into an
/// [`Error::Panic`] instead of unwinding through the executor that called
/// it — the source's `make_result::Invoke` plays the same role, converting
/// a thrown exception into `Result<T>::Fail(CurrentException())`.
fn invoke<A, R, F>(f: F, arg: A) -> Result<R>
where
    F: FnOnce(A) -> R,
{
    catch_unwind(AssertUnwindSafe(|| f(arg))).map_err(Error::panic)
}

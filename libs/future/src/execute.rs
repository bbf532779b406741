//! Grounded on `futures::Execute` (`examples/original_source/src/magic/futures/execute.h`):
//! run a plain function on an executor, getting back a `Future` of its
//! result instead of fire-and-forget.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rtcx_task::Executor;

use crate::error::Error;
use crate::future::{Contract, Future, make_contract_via};

/// Submits `func` to `executor`, returning a future that resolves to its
/// return value — or an [`Error::Panic`] if it panics instead.
pub fn execute<T, F>(executor: Arc<dyn Executor>, func: F) -> Future<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let Contract { future, promise } = make_contract_via(Arc::clone(&executor));
    rtcx_task::execute(&*executor, move || {
        let result = catch_unwind(AssertUnwindSafe(func)).map_err(Error::panic);
        promise.set(result);
    });
    future
}

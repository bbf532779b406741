//! Grounded on `Promise<T>` (`examples/original_source/src/magic/futures/core/promise.h`).

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::shared_state::SharedState;

/// The write side of a [`crate::future::Contract`]. Consumed by whichever
/// of [`Self::set`]/[`Self::set_value`]/[`Self::set_error`] fires first —
/// a promise is only ever resolved once.
#[must_use]
pub struct Promise<T> {
    state: Arc<SharedState<T>>,
}

impl<T> Promise<T> {
    pub(crate) fn new(state: Arc<SharedState<T>>) -> Self {
        Self { state }
    }

    pub fn set(self, result: Result<T>) {
        self.state.set_result(result);
    }

    pub fn set_value(self, value: T) {
        self.set(Ok(value));
    }

    pub fn set_error(self, error: Error) {
        self.set(Err(error));
    }
}

//! A handle to a fiber, usable to schedule or resume it from an awaiter.
//!
//! Grounded on `FiberHandle` (`examples/original_source/src/magic/fibers/core/handle.h`,
//! `handle.cpp`). The source represents "no fiber" as a null raw pointer
//! and panics if `Schedule`/`Resume` is called twice on the same handle
//! (via `Release`, which swaps the pointer out for null); here that's
//! `Option<Arc<Fiber>>` and `Option::take`.

use std::sync::Arc;

use crate::fiber::Fiber;

/// Either a fiber to hand off to, or the "invalid" sentinel meaning
/// "nothing to run next."
#[derive(Clone, Default)]
pub struct FiberHandle(Option<Arc<Fiber>>);

impl FiberHandle {
    pub fn invalid() -> Self {
        Self(None)
    }

    pub(crate) fn new(fiber: Arc<Fiber>) -> Self {
        Self(Some(fiber))
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// Schedules the held fiber on its executor. Panics if this handle is
    /// invalid.
    pub fn schedule(self) {
        self.release().schedule();
    }

    /// Resumes the held fiber immediately on the calling thread. Panics if
    /// this handle is invalid.
    pub fn resume(self) {
        self.release().resume();
    }

    pub(crate) fn release(self) -> Arc<Fiber> {
        self.0.expect("invalid fiber handle")
    }

    pub(crate) fn into_inner(self) -> Option<Arc<Fiber>> {
        self.0
    }
}

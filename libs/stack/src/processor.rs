//! `Processor<T>`: the dual of [`Generator`](crate::generator::Generator) —
//! a consumer routine that suspends on demand instead of producing eagerly
//! (spec §3/§4.6, grounded on `magic::coroutine::Processor<T>`).
//!
//! The consumer routine calls the free function [`receive`], which suspends
//! until the owner calls [`Processor::send`] or [`Processor::close`]. `send`
//! resumes the processor with a value; `close` resumes it with a terminal
//! no-value that `receive` keeps returning from then on.

use crate::coroutine::{self, Coroutine};
use std::cell::Cell;
use std::ptr;
use std::thread::LocalKey;

fn current_slot<T: 'static>() -> &'static LocalKey<Cell<*mut ()>> {
    thread_local! {
        static SLOT: Cell<*mut ()> = const { Cell::new(ptr::null_mut()) };
    }
    &SLOT
}

/// A consumer coroutine that pulls values on demand via [`receive`].
pub struct Processor<T> {
    coroutine: Coroutine,
    value: Cell<Option<T>>,
    has_next: Cell<bool>,
}

impl<T: 'static> Processor<T> {
    /// Wraps `routine` (which calls [`receive`] to consume each value) as a processor.
    pub fn new(routine: impl FnOnce() + Send + 'static) -> Self {
        Self {
            coroutine: Coroutine::new(routine),
            value: Cell::new(None),
            has_next: Cell::new(false),
        }
    }

    /// Delivers `value` to the processor, resuming it until it next calls
    /// `receive` (or completes).
    ///
    /// # Pinning
    /// Like [`Coroutine`], a `Processor` must not move between calls to
    /// `send`/`close` once the first call has been made.
    pub fn send(&self, value: T) {
        self.deliver(Some(value));
    }

    /// Delivers a terminal no-value; every subsequent `receive` inside the
    /// routine observes `None`.
    pub fn close(&self) {
        self.deliver(None);
    }

    fn deliver(&self, value: Option<T>) {
        let slot_value = self as *const Self as *mut ();
        let prev = current_slot::<T>().with(|c| c.replace(slot_value));

        self.value.set(value);
        self.has_next.set(true);
        self.coroutine.resume();

        current_slot::<T>().with(|c| c.set(prev));
    }
}

/// Called from inside a processor's routine to pull the next delivered
/// value, suspending until the owner calls `send`/`close`.
///
/// # Panics
/// Panics if called outside of a running processor of matching `T`.
pub fn receive<T: 'static>() -> Option<T> {
    let ptr = current_slot::<T>().with(Cell::get);
    assert!(!ptr.is_null(), "receive() called outside of a processor context");
    // Safety: `ptr` was installed by `Processor::deliver` for the duration
    // of the `resume()` call currently executing this routine.
    let processor = unsafe { &*(ptr as *const Processor<T>) };

    while !processor.has_next.get() {
        coroutine::suspend();
    }
    processor.has_next.set(false);
    processor.value.take()
}

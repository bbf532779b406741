//! The stackful coroutine (spec §3 "Coroutine (stackful)", §4.1).
//!
//! A `Coroutine` is the bare stack-switch primitive with no executor
//! attachment: `Resume`/`Suspend`/`IsCompleted`, a captured panic that is
//! rethrown on the next `Resume` of the coroutine that raised it, and a
//! thread-local "current coroutine" so a free `suspend()` function can find
//! its way back to the right `ExecutionContext` pair even when coroutines
//! resume each other (spec §9 "thread-local state").

use crate::context::{ExecutionContext, exit_to, switch_to};
use crate::pool::{Stack, global};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

thread_local! {
    static CURRENT: Cell<*const Coroutine> = const { Cell::new(ptr::null()) };
}

struct TrampolineData {
    coroutine: *const Coroutine,
    body: Box<dyn FnOnce() + Send>,
}

/// A stackful coroutine: created → running ↔ suspended → completed.
///
/// Resuming a coroutine after it has completed is a contract violation and
/// aborts the process (spec §3 invariant), matching how the source's
/// `WHEELS_VERIFY` calls behave.
pub struct Coroutine {
    stack: Cell<Option<Stack>>,
    external: ExecutionContext,
    internal: ExecutionContext,
    // Pointer to the boxed `TrampolineData`, consumed as the `arg` of the
    // very first `switch_to` and unused afterwards.
    first_arg: Cell<usize>,
    started: Cell<bool>,
    completed: Cell<bool>,
    pending_panic: Cell<Option<Box<dyn Any + Send>>>,
}

// Safety: a `Coroutine` is only ever driven by the single thread that calls
// `resume`/owns it at a given time; ownership transfers wholesale between
// threads (e.g. when a `Fiber` moves to a different worker), never shared.
unsafe impl Send for Coroutine {}

impl Coroutine {
    /// Creates a coroutine running `body`, allocating its stack from the
    /// process-wide [`global`] pool.
    pub fn new(body: impl FnOnce() + Send + 'static) -> Self {
        Self::with_stack(global().allocate().expect("failed to allocate coroutine stack"), body)
    }

    /// Creates a coroutine running `body` on a caller-provided stack.
    pub fn with_stack(stack: Stack, body: impl FnOnce() + Send + 'static) -> Self {
        let external = ExecutionContext::new();

        let data = Box::new(TrampolineData {
            coroutine: ptr::null(),
            body: Box::new(body),
        });
        let data_ptr = Box::into_raw(data);

        // Safety: `stack.top()` is writable and aligned by construction.
        let internal = unsafe { ExecutionContext::setup(stack.top(), trampoline) };

        Self {
            stack: Cell::new(Some(stack)),
            external,
            internal,
            first_arg: Cell::new(data_ptr as usize),
            started: Cell::new(false),
            completed: Cell::new(false),
            pending_panic: Cell::new(None),
        }
    }

    /// Resumes a suspended (or not-yet-started) coroutine until it next
    /// suspends or completes.
    ///
    /// # Panics
    /// Panics if the coroutine has already completed, or rethrows whatever
    /// panic the coroutine's body raised (spec §7: "rethrown on the next
    /// resume of that coroutine by its owner").
    ///
    /// # Pinning
    /// The coroutine must not move between its first call to `resume` and
    /// its completion: the first resume teaches the trampoline this
    /// `Coroutine`'s address, and `suspend()` dereferences that address on
    /// every later resume.
    pub fn resume(&self) {
        assert!(
            !self.completed.get(),
            "attempt to resume a completed coroutine"
        );

        let arg = if self.started.replace(true) {
            0
        } else {
            // First resume: the trampoline data still needs to learn this
            // coroutine's (now final, pinned) address.
            let data_ptr = self.first_arg.get() as *mut TrampolineData;
            // Safety: `data_ptr` was leaked by `with_stack` and not yet read
            // by the trampoline (this is the first resume).
            unsafe {
                (*data_ptr).coroutine = self;
            }
            data_ptr as usize
        };

        let prev = CURRENT.with(|c| c.replace(self));
        // Safety: `internal` was set up by `ExecutionContext::setup` in
        // `with_stack` and is resumed from its last suspend point (or the
        // trampoline, on first entry); `external` is this call's own frame.
        unsafe {
            switch_to(&self.external, &self.internal, arg);
        }
        CURRENT.with(|c| c.set(prev));

        if let Some(panic) = self.pending_panic.take() {
            panic::resume_unwind(panic);
        }
    }

    /// `true` once the coroutine's body has returned or panicked.
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    /// `true` once the coroutine has been resumed at least once.
    pub fn is_started(&self) -> bool {
        self.started.get()
    }
}

unsafe extern "C" fn trampoline(arg: usize) -> ! {
    // Safety: `arg` is the pointer this coroutine's `with_stack` leaked via
    // `Box::into_raw`, delivered back by the very first `switch_to`.
    let data = unsafe { Box::from_raw(arg as *mut TrampolineData) };
    let TrampolineData { coroutine, body } = *data;
    // Safety: `coroutine` outlives the trampoline call: the coroutine cannot
    // be dropped while `resume()` (which holds a live `&self`) is on the
    // stack below this frame.
    let coro = unsafe { &*coroutine };

    let result = panic::catch_unwind(AssertUnwindSafe(body));
    if let Err(payload) = result {
        coro.pending_panic.set(Some(payload));
    }
    coro.completed.set(true);

    // Safety: `external` holds the resumer's saved state from the
    // `switch_to` that entered this trampoline.
    unsafe { exit_to(&coro.external, 0) }
}

/// Suspends the currently running coroutine, yielding control back to
/// whichever frame last called [`Coroutine::resume`] on it.
///
/// # Panics
/// Panics if called outside of a running coroutine.
pub fn suspend() {
    CURRENT.with(|c| {
        let ptr = c.get();
        assert!(!ptr.is_null(), "suspend() called outside of a coroutine");
        // Safety: `ptr` is the coroutine currently executing on this thread,
        // installed by `resume` and valid for the duration of the call.
        let coro = unsafe { &*ptr };
        unsafe {
            switch_to(&coro.internal, &coro.external, 0);
        }
    });
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        assert!(
            self.completed.get() || !self.started.get(),
            "dropped a coroutine that is still suspended mid-routine"
        );
        if let Some(stack) = self.stack.take() {
            global_or_ignore(stack);
        }
    }
}

fn global_or_ignore(stack: Stack) {
    // Stacks are always allocated from `global()` by `Coroutine::new`, but
    // `with_stack` callers may own a pool themselves; since `Stack` doesn't
    // remember its origin pool, release to the global pool, which is safe
    // for any stack of at least `MIN_STACK_SIZE` (it just won't be reused by
    // a differently-sized custom pool).
    global().release(stack);
}

#[allow(dead_code)]
fn _assert_send() {
    fn assert<T: Send>() {}
    assert::<Coroutine>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn resume_and_suspend_roundtrip() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let coro = Coroutine::new(move || {
            for _ in 0..3 {
                c.fetch_add(1, Ordering::SeqCst);
                suspend();
            }
        });

        assert!(!coro.is_completed());
        coro.resume();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        coro.resume();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        coro.resume();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(!coro.is_completed());
        coro.resume();
        assert!(coro.is_completed());
    }

    #[test]
    #[should_panic(expected = "attempt to resume a completed coroutine")]
    fn resume_after_completed_aborts() {
        let coro = Coroutine::new(|| {});
        coro.resume();
        assert!(coro.is_completed());
        coro.resume();
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn panic_is_rethrown_on_next_resume() {
        let coro = Coroutine::new(|| panic!("boom"));
        coro.resume();
    }
}

//! A single-fire event fibers can wait on. Grounded on `OneShotEvent`
//! (`examples/original_source/src/magic/fibers/sync/oneshotevent.h`).
//!
//! The waiter chain's head is encoded directly in the atomic `state` word
//! (`NoWaiters` / `Signaled` / a waiter-node address), the same
//! tagged-state trick [`crate::mutex::Mutex`] uses.

use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use rtcx_fiber::{FiberHandle, SuspendAwaiter, maybe_suspend, suspend};

const NO_WAITERS: usize = 0;
const SIGNALED: usize = 1;

struct WaitNode {
    handle: Cell<Option<FiberHandle>>,
    next: Cell<Option<NonNull<WaitNode>>>,
}

impl WaitNode {
    fn new() -> Self {
        Self {
            handle: Cell::new(None),
            next: Cell::new(None),
        }
    }
}

struct EventAwaiter<'a> {
    event: &'a OneShotEvent,
    node: WaitNode,
}

impl SuspendAwaiter for EventAwaiter<'_> {
    fn on_completed(&mut self, handle: FiberHandle) -> FiberHandle {
        maybe_suspend(handle, |handle| {
            self.node.handle.set(Some(handle));
            // Safety: `node` is pinned on this (now suspended, if not
            // already signaled) stack frame for as long as it might be
            // linked into `event`'s waiter chain.
            unsafe { self.event.try_enqueue(NonNull::from(&self.node)) }.is_err()
        })
    }
}

/// A single-fire event: every fiber that calls [`Self::wait_async`] parks
/// until [`Self::fire`] is called, after which `wait_async` never parks
/// again.
pub struct OneShotEvent {
    state: AtomicUsize,
}

impl Default for OneShotEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl OneShotEvent {
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(NO_WAITERS),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == SIGNALED
    }

    /// Parks the calling fiber until `fire` has been called, returning
    /// immediately if it already has.
    ///
    /// # Panics
    /// Panics if called outside of a running fiber, on the slow path.
    pub fn wait_async(&self) {
        if self.is_ready() {
            return;
        }
        let mut awaiter = EventAwaiter {
            event: self,
            node: WaitNode::new(),
        };
        suspend(&mut awaiter);
    }

    pub fn fire(&self) {
        let state = self.state.swap(SIGNALED, Ordering::AcqRel);
        if state == NO_WAITERS || state == SIGNALED {
            return;
        }
        // Safety: `state` is a chain of `WaitNode`s linked by
        // `try_enqueue`, each pinned on its parked fiber's stack, reversed
        // here into the order they queued up in.
        let mut current = Some(unsafe { reverse(from_state(state)) });
        while let Some(node) = current {
            // Safety: forwarded from above.
            let node = unsafe { node.as_ref() };
            current = node.next.get();
            let handle = node.handle.take().expect("parked waiter missing its handle");
            handle.schedule();
        }
    }

    /// Tries to link `node` onto the waiter chain. Returns `Ok(())` if
    /// linked, `Err(())` if the event was already signaled (and the node
    /// was left unlinked).
    ///
    /// # Safety
    /// `node` must stay valid (its owning fiber parked) for as long as it
    /// might still be linked into this event's waiter chain.
    unsafe fn try_enqueue(&self, node: NonNull<WaitNode>) -> Result<(), ()> {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state == SIGNALED {
                return Err(());
            }
            // Safety: forwarded from the caller.
            unsafe {
                node.as_ref().next.set(if state == NO_WAITERS {
                    None
                } else {
                    Some(from_state(state))
                });
            }
            if self
                .state
                .compare_exchange(state, node.as_ptr() as usize, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
        }
    }
}

fn from_state(state: usize) -> NonNull<WaitNode> {
    // Safety: `state` only ever holds `NO_WAITERS`, `SIGNALED`, or a
    // `WaitNode` address written by `try_enqueue`; callers only reach this
    // helper once they've ruled out the first two.
    unsafe { NonNull::new_unchecked(state as *mut WaitNode) }
}

/// Reverses a singly-linked chain of `WaitNode`s in place, turning the
/// LIFO order `try_enqueue`'s CAS loop builds into FIFO wakeup order.
///
/// # Safety
/// Every node in the chain starting at `head` must be live.
unsafe fn reverse(head: NonNull<WaitNode>) -> NonNull<WaitNode> {
    let mut prev = head;
    // Safety: forwarded from caller.
    let mut curr = unsafe { prev.as_ref() }.next.get();
    while let Some(node) = curr {
        // Safety: forwarded from caller.
        let next = unsafe { node.as_ref() }.next.get();
        // Safety: forwarded from caller.
        unsafe { node.as_ref() }.next.set(Some(prev));
        prev = node;
        curr = next;
    }
    // Safety: forwarded from caller.
    unsafe { head.as_ref() }.next.set(None);
    prev
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcx_fiber::go;
    use rtcx_task::{Executor, ThreadPool};
    use std::cell::UnsafeCell;
    use std::sync::Arc;

    struct Shared {
        event: OneShotEvent,
        value: UnsafeCell<usize>,
    }
    // Safety: `value` is written once, before `fire`, and only read by
    // waiters that observed `fire` having happened.
    unsafe impl Send for Shared {}
    unsafe impl Sync for Shared {}

    #[test]
    fn waiters_park_until_fired() {
        let pool = ThreadPool::new(4);
        let shared = Arc::new(Shared {
            event: OneShotEvent::new(),
            value: UnsafeCell::new(0),
        });

        const WAITERS: usize = 10;
        for _ in 0..WAITERS {
            let shared = Arc::clone(&shared);
            go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
                shared.event.wait_async();
                // Safety: `fire` happens-before every `wait_async` return.
                assert_eq!(unsafe { *shared.value.get() }, 42);
            });
        }

        let setter = Arc::clone(&shared);
        go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
            // Safety: written before `fire`, read only after it.
            unsafe { *setter.value.get() = 42 };
            setter.event.fire();
        });

        pool.wait_idle();
        pool.stop();
    }

    #[test]
    fn wait_after_fire_does_not_park() {
        let pool = ThreadPool::new(1);
        let event = Arc::new(OneShotEvent::new());
        event.fire();

        let waiter = Arc::clone(&event);
        go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
            waiter.wait_async();
        });
        pool.wait_idle();
        pool.stop();
        assert!(event.is_ready());
    }
}

//! Grounded on `Mutex` (`examples/original_source/src/magic/coroutine/stackless/sync/mutex.h`):
//! structurally identical to `rtcx_fiber_sync::Mutex` (same tagged-state
//! trick: `Unlocked` / `LockedNoWaiters` / a waiter-node address), except
//! waiter nodes hold a `Waker` instead of a `FiberHandle`, and the lock
//! acquisition itself is an ordinary `Future` rather than a
//! `SuspendAwaiter`. `scoped_lock()` returns a future that resolves to a
//! [`MutexGuard`], whose `Drop` unlocks — the source's `Locker::await_resume`
//! returning a `std::unique_lock` plays the same role.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

const UNLOCKED: usize = 0;
const LOCKED_NO_WAITERS: usize = 1;

struct WaitNode {
    waker: Cell<Option<Waker>>,
    next: Cell<Option<NonNull<WaitNode>>>,
}

impl WaitNode {
    fn new() -> Self {
        Self { waker: Cell::new(None), next: Cell::new(None) }
    }
}

/// A mutual-exclusion lock for stackless tasks. Grounded on `Mutex`.
pub struct Mutex {
    state: AtomicUsize,
    head: Cell<Option<NonNull<WaitNode>>>,
}

// Safety: `head` is only ever touched by whichever task currently holds
// the lock (i.e. is inside `unlock`), one at a time by construction.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutex {
    pub const fn new() -> Self {
        Self { state: AtomicUsize::new(UNLOCKED), head: Cell::new(None) }
    }

    pub fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    /// Returns a future resolving to a [`MutexGuard`] once the lock is
    /// held.
    pub fn scoped_lock(&self) -> ScopedLock<'_> {
        ScopedLock {
            mutex: self,
            node: WaitNode::new(),
            enqueued: false,
            _pinned: std::marker::PhantomPinned,
        }
    }

    fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED_NO_WAITERS, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Tries to acquire the lock; if it's held, links `node` onto the
    /// waiter chain instead. Returns whether the lock was acquired.
    ///
    /// # Safety
    /// `node` must stay at a stable address for as long as it might still
    /// be linked into this mutex's waiter chain — guaranteed here because
    /// it lives inside a `ScopedLock` future that's pinned for the
    /// duration of the `.await`.
    unsafe fn acquire(&self, node: NonNull<WaitNode>) -> bool {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state == UNLOCKED {
                if self.try_acquire() {
                    return true;
                }
                continue;
            }
            // Safety: forwarded from the caller.
            unsafe {
                node.as_ref().next.set(if state == LOCKED_NO_WAITERS { None } else { Some(from_state(state)) });
            }
            if self
                .state
                .compare_exchange(state, node.as_ptr() as usize, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return false;
            }
        }
    }

    fn unlock(&self) {
        if self.head.get().is_some() {
            self.take_next_owner().wake();
            return;
        }
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state == LOCKED_NO_WAITERS {
                if self.state.compare_exchange(state, UNLOCKED, Ordering::Release, Ordering::Relaxed).is_ok() {
                    return;
                }
                continue;
            }
            let waiters = self.state.swap(LOCKED_NO_WAITERS, Ordering::Acquire);
            tracing::trace!("draining contended stackless mutex waiters");
            // Safety: `waiters` is a live chain of `WaitNode`s linked by
            // `acquire`, each pinned inside its awaiting future for as long
            // as it's linked.
            self.head.set(Some(unsafe { reverse(from_state(waiters)) }));
            self.take_next_owner().wake();
            return;
        }
    }

    fn take_next_owner(&self) -> Waker {
        let head = self.head.get().expect("unlock with an empty owner chain");
        // Safety: `head` is a live node from `acquire`'s chain.
        let next = unsafe { head.as_ref() }.next.get();
        self.head.set(next);
        // Safety: same as above.
        unsafe { head.as_ref() }.waker.take().expect("waiter node missing its waker")
    }
}

fn from_state(state: usize) -> NonNull<WaitNode> {
    // Safety: `state` only ever holds `UNLOCKED`, `LOCKED_NO_WAITERS`, or a
    // `WaitNode` address written by `acquire`; callers only reach this
    // helper once they've ruled out the first two.
    unsafe { NonNull::new_unchecked(state as *mut WaitNode) }
}

/// Reverses a singly-linked chain of `WaitNode`s in place, turning the
/// LIFO order `acquire`'s CAS loop builds into FIFO wakeup order.
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

/// A future that resolves to a [`MutexGuard`] once the lock is acquired.
pub struct ScopedLock<'a> {
    mutex: &'a Mutex,
    node: WaitNode,
    enqueued: bool,
    // `node`'s address is linked into the mutex's waiter chain while
    // enqueued; this future must not be moved once that happens.
    _pinned: std::marker::PhantomPinned,
}

impl<'a> Future for ScopedLock<'a> {
    type Output = MutexGuard<'a>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: `node`'s address is only taken below, while `self` stays
        // pinned for as long as it's linked; we never move `node` itself.
        let this = unsafe { self.get_unchecked_mut() };
        if this.enqueued {
            // Woken by `Mutex::unlock`'s direct hand-off: ownership has
            // already transferred, no need to race the CAS again.
            return Poll::Ready(MutexGuard { mutex: this.mutex });
        }
        if this.mutex.try_acquire() {
            return Poll::Ready(MutexGuard { mutex: this.mutex });
        }
        this.node.waker.set(Some(cx.waker().clone()));
        this.enqueued = true;
        // Safety: see the field's own safety comment.
        let acquired = unsafe { this.mutex.acquire(NonNull::from(&this.node)) };
        if acquired {
            this.enqueued = false;
            return Poll::Ready(MutexGuard { mutex: this.mutex });
        }
        Poll::Pending
    }
}

/// RAII guard returned by [`ScopedLock`]; unlocks the mutex on drop.
#[must_use]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fire::fire_and_forget;
    use crate::task::Task;
    use rtcx_task::{Executor, ThreadPool};
    use std::cell::UnsafeCell;
    use std::sync::Arc;

    /// Deliberately non-atomic shared state: if `Mutex` fails to serialize
    /// access, the read-modify-write below loses increments.
    struct UnsyncCounter(UnsafeCell<usize>);
    // Safety: only ever mutated while `Mutex` is held.
    unsafe impl Send for UnsyncCounter {}
    unsafe impl Sync for UnsyncCounter {}

    #[test]
    fn serializes_increments_under_contention() {
        let pool = ThreadPool::new(4);
        let mutex = Arc::new(Mutex::new());
        let counter = Arc::new(UnsyncCounter(UnsafeCell::new(0)));

        const TASKS: usize = 50;
        const INCREMENTS: usize = 200;

        for _ in 0..TASKS {
            let mutex = Arc::clone(&mutex);
            let counter = Arc::clone(&counter);
            fire_and_forget(Task::new(async move {
                for _ in 0..INCREMENTS {
                    let guard = mutex.scoped_lock().await;
                    // Safety: `guard` holds the lock for the duration of
                    // this access.
                    unsafe {
                        let value = *counter.0.get();
                        *counter.0.get() = value + 1;
                    }
                    drop(guard);
                }
            }));
        }
        pool.wait_idle();
        pool.stop();

        // Safety: every task above has completed (`wait_idle` returned).
        assert_eq!(unsafe { *counter.0.get() }, TASKS * INCREMENTS);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let mutex = Mutex::new();
        assert!(mutex.try_lock());
        assert!(!mutex.try_lock());
        mutex.unlock();
        assert!(mutex.try_lock());
    }
}

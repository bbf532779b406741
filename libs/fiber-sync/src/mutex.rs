//! A lock-free fiber mutex: contended fibers park instead of spinning a
//! whole worker thread. Grounded on `LockFreeMutex`
//! (`examples/original_source/src/magic/fibers/sync/mutex.h`).
//!
//! The waiter list's head is encoded directly in the atomic `state` word
//! (`Unlocked` / `LockedNoWaiters` / a waiter-node address), the same
//! tagged-state trick as the source; `head_` (the reversed list the
//! current owner drains from) stays a plain field since only the lock
//! owner ever touches it.

use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use rtcx_fiber::{FiberHandle, SuspendAwaiter, maybe_suspend, suspend};

const UNLOCKED: usize = 0;
const LOCKED_NO_WAITERS: usize = 1;

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

struct LockAwaiter<'a> {
    mutex: &'a Mutex,
    node: WaitNode,
}

impl SuspendAwaiter for LockAwaiter<'_> {
    fn on_completed(&mut self, handle: FiberHandle) -> FiberHandle {
        maybe_suspend(handle, |handle| {
            self.node.handle.set(Some(handle));
            // Safety: `node` is pinned on this (now suspended, if not
            // acquired) stack frame for as long as it might be linked into
            // `mutex`'s waiter chain.
            unsafe { self.mutex.acquire(NonNull::from(&self.node)) }
        })
    }
}

struct UnlockAwaiter {
    next: Option<FiberHandle>,
}

impl SuspendAwaiter for UnlockAwaiter {
    fn on_completed(&mut self, handle: FiberHandle) -> FiberHandle {
        // This awaiter (and the suspended unlocker's stack it lives on) is
        // about to go back through a queue round trip; the waiter we're
        // handing the lock to instead gets run right here, inline.
        handle.schedule();
        self.next.take().expect("unlock awaiter resumed twice")
    }
}

/// A mutual-exclusion lock that parks contending fibers instead of
/// blocking a worker thread. Grounded on `LockFreeMutex`/`Mutex`.
pub struct Mutex {
    state: AtomicUsize,
    head: Cell<Option<NonNull<WaitNode>>>,
}

// Safety: `head` is only ever touched by whichever fiber currently holds
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
        Self {
            state: AtomicUsize::new(UNLOCKED),
            head: Cell::new(None),
        }
    }

    /// Acquires the lock, parking the calling fiber if it's contended.
    ///
    /// # Panics
    /// Panics if called outside of a running fiber, on the slow path.
    pub fn lock(&self) {
        if self.try_acquire() {
            return;
        }
        let mut awaiter = LockAwaiter {
            mutex: self,
            node: WaitNode::new(),
        };
        suspend(&mut awaiter);
    }

    pub fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    /// Releases the lock, handing it directly to the next waiter (if any).
    ///
    /// # Panics
    /// Panics if called outside of a running fiber, when there is a
    /// waiter to hand the lock to.
    pub fn unlock(&self) {
        if self.head.get().is_some() {
            let next = self.take_next_owner();
            self.resume_next_owner(next);
            return;
        }
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state == LOCKED_NO_WAITERS {
                if self
                    .state
                    .compare_exchange(state, UNLOCKED, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
                continue;
            }
            let waiters = self.state.swap(LOCKED_NO_WAITERS, Ordering::Acquire);
            tracing::trace!("draining contended mutex waiters");
            // Safety: `waiters` is a live chain of `WaitNode`s linked by
            // `acquire`, each pinned on its parked fiber's stack.
            self.head.set(Some(unsafe { reverse(from_state(waiters)) }));
            let next = self.take_next_owner();
            self.resume_next_owner(next);
            return;
        }
    }

    fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(
                UNLOCKED,
                LOCKED_NO_WAITERS,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Tries to acquire the lock; if it's held, links `node` onto the
    /// waiter chain instead. Returns whether the lock was acquired.
    ///
    /// # Safety
    /// `node` must stay valid (its owning fiber parked) for as long as it
    /// might still be linked into this mutex's waiter chain.
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
                node.as_ref().next.set(if state == LOCKED_NO_WAITERS {
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
                return false;
            }
        }
    }

    fn take_next_owner(&self) -> FiberHandle {
        let head = self.head.get().expect("unlock with an empty owner chain");
        // Safety: `head` is a live node from `acquire`'s chain.
        let next = unsafe { head.as_ref() }.next.get();
        self.head.set(next);
        // Safety: same as above.
        unsafe { head.as_ref() }
            .handle
            .take()
            .expect("waiter node missing its handle")
    }

    fn resume_next_owner(&self, next: FiberHandle) {
        let mut awaiter = UnlockAwaiter { next: Some(next) };
        suspend(&mut awaiter);
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

#[cfg(test)]
mod tests {
    use super::*;
    use rtcx_fiber::go;
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

        const FIBERS: usize = 50;
        const INCREMENTS: usize = 200;

        for _ in 0..FIBERS {
            let mutex = Arc::clone(&mutex);
            let counter = Arc::clone(&counter);
            go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
                for _ in 0..INCREMENTS {
                    mutex.lock();
                    // Safety: `mutex` is held for the duration of this access.
                    unsafe {
                        let value = *counter.0.get();
                        *counter.0.get() = value + 1;
                    }
                    mutex.unlock();
                }
            });
        }
        pool.wait_idle();
        pool.stop();

        // Safety: every fiber above has completed (`wait_idle` returned).
        assert_eq!(unsafe { *counter.0.get() }, FIBERS * INCREMENTS);
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

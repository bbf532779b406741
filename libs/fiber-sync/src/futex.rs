//! A fiber-blocking futex: park the calling fiber until a matching wake,
//! guarding its own short waiter list with a [`SpinLock`]. Grounded on
//! `FutexLike<T>` (`examples/original_source/src/magic/fibers/sync/detail/futex.h`),
//! the building block [`crate::condvar::CondVar`] is layered on.
//!
//! The epoch counter is `size_t` in every caller the source has, so this
//! isn't kept generic the way the C++ template is.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use rtcx_collections::{Linked, Links, List};
use rtcx_fiber::{FiberHandle, SuspendAwaiter, always_suspend, suspend};

use crate::spinlock::SpinLock;

pub type WaitKey = usize;

/// A waiter node, always stack-allocated inside [`Futex::park_if_equal`]
/// and pushed into the waiter list by raw pointer — it never moves while
/// parked, since its owning fiber is suspended, not dropped.
struct FutexAwaiter {
    futex: *const Futex,
    handle: Option<FiberHandle>,
    links: Links<FutexAwaiter>,
}

// Safety: Handle = NonNull<Self> is just an identity conversion; there is
// no ownership transfer to account for.
unsafe impl Linked for FutexAwaiter {
    type Handle = NonNull<FutexAwaiter>;

    fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
        handle
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        ptr
    }

    fn links(&self) -> &Links<Self> {
        &self.links
    }
}

impl SuspendAwaiter for FutexAwaiter {
    fn on_completed(&mut self, handle: FiberHandle) -> FiberHandle {
        always_suspend(handle, |handle| {
            self.handle = Some(handle);
            // Safety: `futex` outlives this call — it's a raw copy of the
            // `&Futex` borrow `park_if_equal` held for its whole (possibly
            // suspended) duration. Releasing only now, after recording the
            // handle, is what makes it safe for a waker to pop this node
            // the instant the lock is free.
            unsafe { &*self.futex }.waiters.raw_unlock();
        })
    }
}

/// Parks fibers on an epoch counter until someone calls `wake_one`/`wake_all`.
pub struct Futex {
    waiters: SpinLock<List<FutexAwaiter>>,
    epoch: AtomicUsize,
}

impl Default for Futex {
    fn default() -> Self {
        Self::new()
    }
}

impl Futex {
    pub fn new() -> Self {
        Self {
            waiters: SpinLock::new(List::new()),
            epoch: AtomicUsize::new(0),
        }
    }

    pub fn prepare_wait(&self) -> WaitKey {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Parks the calling fiber unless `old` is stale, i.e. a wake already
    /// happened since `prepare_wait` observed it.
    ///
    /// # Panics
    /// Panics if called outside of a running fiber.
    pub fn park_if_equal(&self, old: WaitKey) {
        // Safety: unlocked either immediately below, or by `on_completed`
        // once the parked awaiter has recorded its handle.
        let list = unsafe { self.waiters.raw_lock() };
        if self.epoch.load(Ordering::SeqCst) != old {
            // Safety: pairs with `raw_lock` above, no awaiter was pushed.
            unsafe { self.waiters.raw_unlock() };
            return;
        }

        let mut awaiter = FutexAwaiter {
            futex: self,
            handle: None,
            links: Links::new(),
        };
        // Safety: `list` is the lock-protected list, still locked; `awaiter`
        // is pinned on this stack frame for as long as it stays parked.
        unsafe { (*list).push_back(NonNull::from(&mut awaiter)) };
        suspend(&mut awaiter);
    }

    /// Wakes at most one parked fiber. Returns whether one was woken.
    pub fn wake_one(&self) -> bool {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let woken = {
            // Safety: unlocked immediately below.
            let list = unsafe { self.waiters.raw_lock() };
            // Safety: `list` is valid and locked.
            let popped = unsafe { (*list).pop_front() };
            // Safety: pairs with `raw_lock` above.
            unsafe { self.waiters.raw_unlock() };
            popped
        };
        match woken {
            Some(ptr) => {
                resume(ptr);
                true
            }
            None => false,
        }
    }

    /// Wakes every parked fiber. Returns how many were woken.
    pub fn wake_all(&self) -> usize {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let drained: Vec<NonNull<FutexAwaiter>> = {
            // Safety: unlocked immediately below.
            let list = unsafe { self.waiters.raw_lock() };
            // Safety: `list` is valid and locked.
            let drained = unsafe { std::mem::take(&mut *list).collect() };
            // Safety: pairs with `raw_lock` above.
            unsafe { self.waiters.raw_unlock() };
            drained
        };
        let count = drained.len();
        for ptr in drained {
            resume(ptr);
        }
        count
    }
}

fn resume(mut ptr: NonNull<FutexAwaiter>) {
    // Safety: a popped node's handle was recorded before it became
    // poppable (see `FutexAwaiter::on_completed`), and the node stays
    // live on its fiber's suspended stack until this resume.
    let handle = unsafe { ptr.as_mut() }
        .handle
        .take()
        .expect("parked futex waiter missing its handle");
    handle.resume();
}

//! A short, uncontended-fast critical section used to protect the waiter
//! list inside [`crate::futex::Futex`]. Grounded on `SpinLock`
//! (`examples/original_source/src/magic/concurrency/spinlock.h`).
//! Held for a handful of pointer writes only — never across a suspend —
//! so spinning beats parking a whole worker thread over it.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// Safety: `value` is only reachable through `lock`, which hands out a
// `SpinLockGuard` exactly while `locked` is held.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        // Safety: the returned guard unlocks exactly once, on drop.
        let ptr = unsafe { self.raw_lock() };
        SpinLockGuard { lock: self, ptr }
    }

    /// Locks without a guard, for callers that need to release the lock
    /// from a different stack frame than the one that acquired it (a
    /// suspended fiber unlocking from inside its resumption callback).
    ///
    /// # Safety
    /// The caller must call [`Self::raw_unlock`] exactly once before any
    /// other access to this lock.
    pub unsafe fn raw_lock(&self) -> *mut T {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
        self.value.get()
    }

    /// # Safety
    /// Must be paired with a preceding [`Self::raw_lock`] with no
    /// intervening unlock.
    pub unsafe fn raw_unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    ptr: *mut T,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: holding the guard means `locked` is held by us.
        unsafe { &*self.ptr }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: holding the guard means `locked` is held by us.
        unsafe { &mut *self.ptr }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Safety: this guard is the one live `raw_lock` for `self.lock`.
        unsafe { self.lock.raw_unlock() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn mutual_exclusion_under_contention() {
        let lock = Arc::new(SpinLock::new(0usize));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *lock.lock() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), 8000);
    }
}

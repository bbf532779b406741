//! A fiber condition variable layered on [`Futex`]. Grounded on `CondVar`
//! (`examples/original_source/src/magic/fibers/sync/condvar.h`, `condvar.cpp`).

use crate::futex::Futex;
use crate::mutex::Mutex;

/// Parks a fiber until notified, releasing `mutex` while parked and
/// reacquiring it before returning — the fiber analogue of
/// `std::sync::Condvar`, but the lock held across `wait` is always a
/// [`Mutex`] from this crate, not an arbitrary guard type.
#[derive(Default)]
pub struct CondVar {
    futex: Futex,
}

impl CondVar {
    pub fn new() -> Self {
        Self { futex: Futex::new() }
    }

    /// Releases `mutex`, parks until notified, then reacquires it.
    ///
    /// # Panics
    /// Panics if called outside of a running fiber.
    pub fn wait(&self, mutex: &Mutex) {
        let epoch = self.futex.prepare_wait();
        mutex.unlock();
        self.futex.park_if_equal(epoch);
        mutex.lock();
    }

    pub fn notify_one(&self) {
        self.futex.wake_one();
    }

    pub fn notify_all(&self) {
        self.futex.wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcx_fiber::go;
    use rtcx_task::{Executor, ThreadPool};
    use std::cell::UnsafeCell;
    use std::sync::Arc;

    struct Shared {
        mutex: Mutex,
        condvar: CondVar,
        ready: UnsafeCell<bool>,
    }
    // Safety: `ready` is only read/written while `mutex` is held.
    unsafe impl Send for Shared {}
    unsafe impl Sync for Shared {}

    #[test]
    fn wait_blocks_until_notified() {
        let pool = ThreadPool::new(2);
        let shared = Arc::new(Shared {
            mutex: Mutex::new(),
            condvar: CondVar::new(),
            ready: UnsafeCell::new(false),
        });

        let waiter = Arc::clone(&shared);
        go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
            waiter.mutex.lock();
            // Safety: held under `mutex`.
            while !unsafe { *waiter.ready.get() } {
                waiter.condvar.wait(&waiter.mutex);
            }
            waiter.mutex.unlock();
        });

        let notifier = Arc::clone(&shared);
        go(Arc::clone(&pool) as Arc<dyn Executor>, move || {
            notifier.mutex.lock();
            // Safety: held under `mutex`.
            unsafe {
                *notifier.ready.get() = true;
            }
            notifier.mutex.unlock();
            notifier.condvar.notify_one();
        });

        pool.wait_idle();
        pool.stop();

        // Safety: both fibers above have completed.
        assert!(unsafe { *shared.ready.get() });
    }
}

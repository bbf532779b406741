//! An outstanding-work counter a thread can block on until it reaches zero.
//!
//! Grounded on `AtomicCounter` (`examples/original_source/src/magic/concurrency/atomic_counter.h`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

#[derive(Default)]
pub struct AtomicCounter {
    count: AtomicUsize,
    lock: Mutex<()>,
    all_done: Condvar,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, count: usize) {
        self.count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.lock.lock().unwrap();
            self.all_done.notify_all();
        }
    }

    pub fn wait_zero(&self) {
        let mut guard = self.lock.lock().unwrap();
        while self.count.load(Ordering::Acquire) > 0 {
            guard = self.all_done.wait(guard).unwrap();
        }
        drop(guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_zero_returns_immediately_when_already_zero() {
        let counter = AtomicCounter::new();
        counter.wait_zero();
    }

    #[test]
    fn wait_zero_blocks_until_every_add_is_matched_by_done() {
        let counter = Arc::new(AtomicCounter::new());
        counter.add(3);

        let worker = {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                counter.done();
                counter.done();
                counter.done();
            })
        };

        counter.wait_zero();
        worker.join().unwrap();
    }
}

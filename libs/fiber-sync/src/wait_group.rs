//! A fiber wait group: `add`/`done` a count of in-flight work, `wait` until
//! it drops to zero. Grounded on `WaitGroup`
//! (`examples/original_source/src/magic/fibers/sync/wait_group.h`), which
//! is a thin `Add`/`Done`/`Wait` surface over an `OneShotEvent`.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::oneshot_event::OneShotEvent;

/// Counts outstanding work; `wait` parks until the count reaches zero.
///
/// # Panics
/// `done` panics if called more times than `add` accounted for — the
/// count going negative means a caller is confused about what it's
/// tracking, not a condition to recover from.
pub struct WaitGroup {
    count: AtomicUsize,
    done: OneShotEvent,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            done: OneShotEvent::new(),
        }
    }

    pub fn add(&self, count: usize) {
        self.count.fetch_add(count, Ordering::AcqRel);
    }

    pub fn done(&self) {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "WaitGroup::done called more times than add");
        if prev == 1 {
            self.done.fire();
        }
    }

    /// Parks the calling fiber until the count reaches zero.
    ///
    /// # Panics
    /// Panics if called outside of a running fiber, while the count is
    /// still above zero.
    pub fn wait(&self) {
        self.done.wait_async();
    }
}

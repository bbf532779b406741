//! A multi-producer, multi-consumer unbounded blocking intrusive queue.
//!
//! Grounded on `MPMCBlockingQueue<T>` (`examples/original_source/src/magic/concurrency/intrusive/blocking_queue.h`).
//! Unlike the lock-free structures in `rtcx-collections`, this queue
//! blocks a consumer thread when empty instead of spinning, which is
//! exactly what the thread pool's worker loop wants.

use std::sync::{Condvar, Mutex};

use rtcx_collections::{Linked, List};

struct State<T: Linked> {
    items: List<T>,
    closed: bool,
}

pub struct BlockingQueue<T: Linked> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
}

impl<T: Linked> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State { items: List::new(), closed: false }),
            not_empty: Condvar::new(),
        }
    }

    /// Enqueues `item`. Returns `false` (and hands `item` back) if the
    /// queue is already closed.
    pub fn put(&self, item: T::Handle) -> Result<(), T::Handle> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Awaits and takes the next item, or returns `None` once the queue is
    /// closed and drained.
    pub fn take(&self) -> Option<T::Handle> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Closes the queue for producers; consumers still drain whatever is
    /// already queued before observing closure.
    pub fn close(&self) {
        self.close_impl(false, |_| {});
    }

    /// Closes the queue for producers and consumers alike, running
    /// `disposer` on every item still queued.
    pub fn shutdown(&self, mut disposer: impl FnMut(T::Handle)) {
        self.close_impl(true, &mut disposer);
    }

    fn close_impl(&self, clear: bool, disposer: &mut dyn FnMut(T::Handle)) {
        let mut state = self.state.lock().unwrap();
        if clear {
            while let Some(item) = state.items.pop_front() {
                disposer(item);
            }
        }
        state.closed = true;
        self.not_empty.notify_all();
    }
}

impl<T: Linked> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: all access to the intrusive list inside `state` happens behind
// the mutex.
unsafe impl<T: Linked + Send> Send for BlockingQueue<T> {}
// SAFETY: same as above.
unsafe impl<T: Linked + Send> Sync for BlockingQueue<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcx_collections::Links;
    use std::ptr::NonNull;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Node {
        value: i32,
        links: Links<Node>,
    }

    // SAFETY: Handle is Box<Node>, into_ptr/from_ptr invert via Box::into_raw/from_raw.
    unsafe impl Linked for Node {
        type Handle = Box<Node>;

        fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
            // SAFETY: Box::into_raw never returns null.
            unsafe { NonNull::new_unchecked(Box::into_raw(handle)) }
        }

        unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
            // SAFETY: forwarded from caller's invariant.
            unsafe { Box::from_raw(ptr.as_ptr()) }
        }

        fn links(&self) -> &Links<Self> {
            &self.links
        }
    }

    fn node(value: i32) -> Box<Node> {
        Box::new(Node { value, links: Links::new() })
    }

    #[test]
    fn take_blocks_until_a_put_arrives() {
        let queue = Arc::new(BlockingQueue::<Node>::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.put(node(42)).unwrap();
            })
        };

        let taken = queue.take().unwrap();
        assert_eq!(taken.value, 42);
        producer.join().unwrap();
    }

    #[test]
    fn take_returns_none_after_close_drains_the_queue() {
        let queue = BlockingQueue::<Node>::new();
        queue.put(node(1)).unwrap();
        queue.close();

        assert_eq!(queue.take().unwrap().value, 1);
        assert!(queue.take().is_none());
    }

    #[test]
    fn put_after_close_is_rejected() {
        let queue = BlockingQueue::<Node>::new();
        queue.close();
        assert!(queue.put(node(1)).is_err());
    }

    #[test]
    fn shutdown_disposes_of_pending_items() {
        let queue = BlockingQueue::<Node>::new();
        queue.put(node(1)).unwrap();
        queue.put(node(2)).unwrap();

        let disposed = Arc::new(Mutex::new(Vec::new()));
        let disposed_clone = Arc::clone(&disposed);
        queue.shutdown(move |item| disposed_clone.lock().unwrap().push(item.value));

        assert_eq!(*disposed.lock().unwrap(), vec![1, 2]);
        assert!(queue.take().is_none());
    }
}

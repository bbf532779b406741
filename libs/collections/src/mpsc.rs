//! A multi-producer, single-consumer intrusive stack and a FIFO queue built
//! on top of it.
//!
//! Grounded on `MPSCLockFreeIntrusiveStack<T>`
//! (`lockfree_intrusive_stack.h`): only the stack's `head` needs to be
//! atomic. A node's own `next` is written once, by the thread that pushes
//! it, before that node is published through the head CAS — no other
//! thread ever touches it after that, so it stays a plain [`Cell`] instead
//! of an atomic. `Push` is a CAS loop; `ConsumeAll` is a single atomic
//! exchange of `head` to null followed by a plain-pointer walk.
//!
//! [`MpscQueue`] wraps the stack the way `MPSCLockFreeIntrusiveQueue<T>`
//! does: `ConsumeAll` hands back nodes in LIFO order (most recently pushed
//! first), and `take_all` walks that in order while pushing each node onto
//! the front of a fresh list, which flips it back to FIFO (oldest pushed
//! first).

use std::ptr;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::list::{Linked, List};

/// An intrusive stack safe for many concurrent pushers and one consumer
/// draining it.
pub struct MpscStack<T: Linked> {
    head: AtomicPtr<T>,
}

impl<T: Linked> MpscStack<T> {
    pub const fn new() -> Self {
        Self { head: AtomicPtr::new(ptr::null_mut()) }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    pub fn has_items(&self) -> bool {
        !self.is_empty()
    }

    /// Links `handle` onto the top of the stack. Safe to call from any
    /// number of threads concurrently.
    pub fn push(&self, handle: T::Handle) {
        let ptr = T::into_ptr(handle);
        // SAFETY: ptr was just produced by into_ptr, exclusively owned by
        // this call until the CAS below publishes it.
        let node = unsafe { ptr.as_ref() };
        let raw = ptr.as_ptr();

        let mut old = self.head.load(Ordering::Relaxed);
        loop {
            node.links().next.set(NonNull::new(old));
            match self.head.compare_exchange_weak(
                old,
                raw,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => old = observed,
            }
        }
    }

    /// Atomically detaches every currently-linked node and returns them as
    /// a [`List`] in LIFO order (most recently pushed first). Only safe to
    /// call from the single consumer.
    pub fn consume_all(&self) -> List<T> {
        let mut cursor = self.head.swap(ptr::null_mut(), Ordering::AcqRel);
        let mut drained = List::new();
        while let Some(ptr) = NonNull::new(cursor) {
            // SAFETY: the stack no longer references ptr after the swap
            // above, so the consumer has exclusive access to it.
            let next = unsafe { ptr.as_ref() }.links().next.get();
            // SAFETY: ptr was linked in via a prior into_ptr call in push.
            let handle = unsafe { T::from_ptr(ptr) };
            drained.push_back(handle);
            cursor = next.map_or(ptr::null_mut(), NonNull::as_ptr);
        }
        drained
    }
}

impl<T: Linked> Default for MpscStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the stack is only reachable through the atomic head; node access
// is synchronized by the push CAS / the single consuming drain.
unsafe impl<T: Linked> Send for MpscStack<T> {}
// SAFETY: same as above.
unsafe impl<T: Linked> Sync for MpscStack<T> {}

/// A multi-producer, single-consumer FIFO queue layered on [`MpscStack`].
pub struct MpscQueue<T: Linked> {
    stack: MpscStack<T>,
}

impl<T: Linked> MpscQueue<T> {
    pub const fn new() -> Self {
        Self { stack: MpscStack::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn has_items(&self) -> bool {
        self.stack.has_items()
    }

    pub fn push(&self, handle: T::Handle) {
        self.stack.push(handle);
    }

    /// Drains every currently-queued item in the order it was pushed.
    pub fn take_all(&self) -> List<T> {
        let mut fifo = List::new();
        for handle in self.stack.consume_all() {
            fifo.push_front(handle);
        }
        fifo
    }
}

impl<T: Linked> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::Links;
    use std::boxed::Box;
    use std::sync::Arc;
    use std::thread;

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
    fn consume_all_returns_lifo_order() {
        let stack: MpscStack<Node> = MpscStack::new();
        stack.push(node(1));
        stack.push(node(2));
        stack.push(node(3));

        let values: Vec<i32> = stack.consume_all().map(|n| n.value).collect();
        assert_eq!(values, vec![3, 2, 1]);
    }

    #[test]
    fn empty_stack_consume_all_is_empty() {
        let stack: MpscStack<Node> = MpscStack::new();
        assert!(stack.is_empty());
        assert!(stack.consume_all().is_empty());
    }

    #[test]
    fn queue_take_all_preserves_push_order() {
        let queue: MpscQueue<Node> = MpscQueue::new();
        queue.push(node(1));
        queue.push(node(2));
        queue.push(node(3));

        let values: Vec<i32> = queue.take_all().map(|n| n.value).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn concurrent_pushers_are_all_observed() {
        let stack = Arc::new(MpscStack::<Node>::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let stack = Arc::clone(&stack);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    stack.push(node(t * 100 + i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let values: Vec<i32> = stack.consume_all().map(|n| n.value).collect();
        assert_eq!(values.len(), 800);
    }
}

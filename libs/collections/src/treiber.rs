//! An internally-allocating, tagged-pointer Treiber stack with a
//! `ConsumeAll` drain, safe to call while pushes and pops race against it.
//!
//! Grounded on `LockFreeStack<T>`
//! (`examples/original_source/src/magic/concurrency/lockfree/stack.h`).
//! Unlike [`crate::mpsc`], this stack owns its nodes (callers hand in a
//! value, not a pre-linked node), and every node carries its own refcount
//! so a concurrent `ConsumeAll` sweep can hand a node's value to its
//! caller while a racing `try_pop` is still deciding whether it won the
//! pop.
//!
//! The accounting: `head`'s stamp counts every successful [`Self::acquire_ref`]
//! against the current top node. A node's `push_stamp` records that stamp
//! at the moment the node became head. When a pop or a sweep removes a
//! node, it knows how many references were handed out against it (the
//! difference between the stamp at removal and `push_stamp`) and deposits
//! that count into the node's `global` counter; every thread that raced
//! for (and lost) the pop subtracts its own one reference when it
//! discovers it lost. The node is freed the moment the running total
//! hits zero, which by construction happens on whichever of those
//! operations runs last, never earlier.

use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::tagged::{AtomicStampedPtr, StampedPtr};

struct Node<T> {
    value: Cell<Option<T>>,
    next: Cell<StampedPtr<Node<T>>>,
    global: AtomicI32,
    push_stamp: Cell<u16>,
}

/// A lock-free LIFO stack that owns its elements.
pub struct LockFreeStack<T> {
    head: AtomicStampedPtr<Node<T>>,
}

impl<T> LockFreeStack<T> {
    pub fn new() -> Self {
        Self { head: AtomicStampedPtr::new(StampedPtr::null()) }
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    pub fn has_items(&self) -> bool {
        !self.is_empty()
    }

    pub fn push(&self, value: T) {
        let node_ptr: *mut Node<T> = Box::into_raw(Box::new(Node {
            value: Cell::new(Some(value)),
            next: Cell::new(StampedPtr::null()),
            global: AtomicI32::new(0),
            push_stamp: Cell::new(0),
        }));
        // SAFETY: node_ptr was just allocated above and is exclusively
        // owned until it is linked in by the CAS below.
        let node = unsafe { &*node_ptr };

        let mut expected = self.head.load(Ordering::Acquire);
        loop {
            node.next.set(expected);
            let desired = StampedPtr::new(node_ptr, expected.stamp().wrapping_add(1));
            // Must be visible before the CAS below can publish `node_ptr`
            // as `head` — once that happens, a racing `acquire_ref`/
            // `consume_all` may read `push_stamp` immediately.
            node.push_stamp.set(desired.stamp());
            match self.head.compare_exchange(expected, desired, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(actual) => expected = actual,
            }
        }
    }

    /// Bumps the current top node's reference stamp, staking a claim that
    /// must later be resolved either by winning the pop in [`Self::try_pop`]
    /// or by releasing it in the losing branch there.
    fn acquire_ref(&self) -> Option<StampedPtr<Node<T>>> {
        let mut current = self.head.load(Ordering::Acquire);
        loop {
            if current.is_null() {
                return None;
            }
            let bumped = current.with_incremented_stamp();
            match self.head.compare_exchange(current, bumped, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Some(bumped),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        loop {
            let acquired = self.acquire_ref()?;
            let node_ptr = NonNull::new(acquired.ptr())
                .expect("acquire_ref only returns a reference to a non-null node");
            // SAFETY: this call's acquire_ref staked a reference to this
            // node, which keeps it alive until that reference is resolved
            // below (either here, or by adjust_global in the Err arm).
            let node = unsafe { node_ptr.as_ref() };
            let next = node.next.get();

            match self.head.compare_exchange(acquired, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    let delta = acquired.stamp().wrapping_sub(node.push_stamp.get()) as i32;
                    let value = node.value.take();
                    // SAFETY: node_ptr came from push's Box::into_raw and is
                    // freed exactly once, when the refcount below hits zero.
                    unsafe { Self::adjust_global(node_ptr, delta - 1) };
                    return value;
                }
                Err(_) => {
                    // SAFETY: same as above.
                    unsafe { Self::adjust_global(node_ptr, -1) };
                }
            }
        }
    }

    /// Atomically detaches every node and hands each value to `f`, in LIFO
    /// order (most recently pushed first). Safe to call while other
    /// threads are concurrently pushing or popping.
    pub fn consume_all<F: FnMut(T)>(&self, mut f: F) {
        let swapped = self.head.exchange(StampedPtr::null(), Ordering::AcqRel);
        let mut cursor = NonNull::new(swapped.ptr());
        let mut supersession_stamp = swapped.stamp();

        while let Some(node_ptr) = cursor {
            // SAFETY: head no longer references this node after the
            // exchange above, so no push or acquire_ref can reach it; only
            // in-flight try_pop callers that already staked a reference
            // before the exchange still hold a pointer to it, and they
            // resolve through adjust_global same as below.
            let node = unsafe { node_ptr.as_ref() };
            let next = node.next.get();
            let delta = supersession_stamp.wrapping_sub(node.push_stamp.get()) as i32;

            if let Some(value) = node.value.take() {
                f(value);
            }
            // SAFETY: node_ptr came from push's Box::into_raw and is freed
            // exactly once, when the refcount below hits zero.
            unsafe { Self::adjust_global(node_ptr, delta) };

            supersession_stamp = next.stamp();
            cursor = NonNull::new(next.ptr());
        }
    }

    /// # Safety
    /// `node_ptr` must have been allocated by [`Self::push`] and must not
    /// already have been freed.
    unsafe fn adjust_global(node_ptr: NonNull<Node<T>>, delta: i32) {
        // SAFETY: forwarded from caller.
        let node = unsafe { node_ptr.as_ref() };
        let prev = node.global.fetch_add(delta, Ordering::AcqRel);
        if prev + delta == 0 {
            // SAFETY: the running count of outstanding references hit
            // zero, which by construction happens on whichever resolution
            // runs last; no thread holds a pointer to this node anymore.
            drop(unsafe { Box::from_raw(node_ptr.as_ptr()) });
        }
    }
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        let mut cursor = NonNull::new(self.head.load(Ordering::Acquire).ptr());
        while let Some(node_ptr) = cursor {
            // SAFETY: the stack is being dropped, so no other thread can be
            // concurrently pushing, popping, or sweeping it.
            let node = unsafe { Box::from_raw(node_ptr.as_ptr()) };
            cursor = NonNull::new(node.next.get().ptr());
        }
    }
}

// SAFETY: all node access is synchronized through the atomic head, either
// by the push/pop CAS loops or by consume_all's exchange.
unsafe impl<T: Send> Send for LockFreeStack<T> {}
// SAFETY: same as above.
unsafe impl<T: Send> Sync for LockFreeStack<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn push_then_pop_is_lifo() {
        let stack = LockFreeStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);

        assert_eq!(stack.try_pop(), Some(3));
        assert_eq!(stack.try_pop(), Some(2));
        assert_eq!(stack.try_pop(), Some(1));
        assert_eq!(stack.try_pop(), None);
    }

    #[test]
    fn empty_stack_reports_empty() {
        let stack: LockFreeStack<i32> = LockFreeStack::new();
        assert!(stack.is_empty());
        assert!(stack.try_pop().is_none());
    }

    #[test]
    fn consume_all_visits_every_value_in_lifo_order() {
        let stack = LockFreeStack::new();
        stack.push(1);
        stack.push(2);
        stack.push(3);

        let mut seen = Vec::new();
        stack.consume_all(|v| seen.push(v));
        assert_eq!(seen, vec![3, 2, 1]);
        assert!(stack.is_empty());
    }

    #[test]
    fn dropping_a_nonempty_stack_frees_every_node() {
        let stack = LockFreeStack::new();
        for i in 0..100 {
            stack.push(i);
        }
        drop(stack);
    }

    #[test]
    fn concurrent_push_and_pop_preserve_every_value() {
        let stack = Arc::new(LockFreeStack::new());
        let mut pushers = Vec::new();
        for t in 0..4 {
            let stack = Arc::clone(&stack);
            pushers.push(thread::spawn(move || {
                for i in 0..500 {
                    stack.push(t * 500 + i);
                }
            }));
        }
        for p in pushers {
            p.join().unwrap();
        }

        let popped = Arc::new(Mutex::new(Vec::new()));
        let mut poppers = Vec::new();
        for _ in 0..4 {
            let stack = Arc::clone(&stack);
            let popped = Arc::clone(&popped);
            poppers.push(thread::spawn(move || {
                while let Some(v) = stack.try_pop() {
                    popped.lock().unwrap().push(v);
                }
            }));
        }
        for p in poppers {
            p.join().unwrap();
        }

        let mut popped = popped.lock().unwrap();
        popped.sort_unstable();
        let expected: Vec<i32> = (0..2000).collect();
        assert_eq!(*popped, expected);
    }
}

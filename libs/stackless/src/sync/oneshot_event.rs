//! Grounded on `OneShotEvent`
//! (`examples/original_source/src/magic/coroutine/stackless/sync/oneshotevent.h`):
//! same tagged-state chain as `rtcx_fiber_sync::OneShotEvent`
//! (`NoWaiters`/`Signaled`/a waiter-node address), except waiter nodes hold
//! a `Waker` and firing wakes them directly instead of scheduling a fiber.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

const NO_WAITERS: usize = 0;
const SIGNALED: usize = 1;

struct WaitNode {
    waker: Cell<Option<Waker>>,
    next: Cell<Option<NonNull<WaitNode>>>,
}

impl WaitNode {
    fn new() -> Self {
        Self { waker: Cell::new(None), next: Cell::new(None) }
    }
}

pub struct OneShotEvent {
    state: AtomicUsize,
}

unsafe impl Send for OneShotEvent {}
unsafe impl Sync for OneShotEvent {}

impl Default for OneShotEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl OneShotEvent {
    pub const fn new() -> Self {
        Self { state: AtomicUsize::new(NO_WAITERS) }
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == SIGNALED
    }

    pub fn wait_async(&self) -> WaitAsync<'_> {
        WaitAsync {
            event: self,
            node: WaitNode::new(),
            enqueued: false,
            _pinned: std::marker::PhantomPinned,
        }
    }

    pub fn fire(&self) {
        let state = self.state.swap(SIGNALED, Ordering::AcqRel);
        if state == NO_WAITERS || state == SIGNALED {
            return;
        }
        let mut current = Some(unsafe { reverse(from_state(state)) });
        while let Some(node) = current {
            let node = unsafe { node.as_ref() };
            current = node.next.get();
            let waker = node.waker.take().expect("parked waiter missing its waker");
            waker.wake();
        }
    }

    /// Returns `Err(())` if already signaled (caller should not suspend).
    unsafe fn try_enqueue(&self, node: NonNull<WaitNode>) -> Result<(), ()> {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if state == SIGNALED {
                return Err(());
            }
            // Safety: forwarded from the caller.
            unsafe {
                node.as_ref().next.set(if state == NO_WAITERS { None } else { Some(from_state(state)) });
            }
            if self.state.compare_exchange(state, node.as_ptr() as usize, Ordering::AcqRel, Ordering::Acquire).is_ok()
            {
                return Ok(());
            }
        }
    }
}

fn from_state(state: usize) -> NonNull<WaitNode> {
    unsafe { NonNull::new_unchecked(state as *mut WaitNode) }
}

unsafe fn reverse(head: NonNull<WaitNode>) -> NonNull<WaitNode> {
    let mut prev = head;
    let mut curr = unsafe { prev.as_ref() }.next.get();
    while let Some(node) = curr {
        let next = unsafe { node.as_ref() }.next.get();
        unsafe { node.as_ref() }.next.set(Some(prev));
        prev = node;
        curr = next;
    }
    unsafe { head.as_ref() }.next.set(None);
    prev
}

pub struct WaitAsync<'a> {
    event: &'a OneShotEvent,
    node: WaitNode,
    enqueued: bool,
    // `node`'s address is linked into the event's waiter chain while
    // enqueued; this future must not be moved once that happens.
    _pinned: std::marker::PhantomPinned,
}

impl Future for WaitAsync<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // Safety: `node`'s address is only taken below, while `self` stays
        // pinned for as long as it's linked.
        let this = unsafe { self.get_unchecked_mut() };
        if this.enqueued || this.event.is_ready() {
            return Poll::Ready(());
        }
        this.node.waker.set(Some(cx.waker().clone()));
        this.enqueued = true;
        // Safety: `node` stays at a stable address for as long as it's
        // linked, guaranteed by this future staying pinned across the
        // `.await`.
        match unsafe { this.event.try_enqueue(NonNull::from(&this.node)) } {
            Ok(()) => Poll::Pending,
            Err(()) => Poll::Ready(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch_to;
    use crate::fire::fire_and_forget;
    use crate::task::Task;
    use rtcx_task::{Executor, ThreadPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn waiters_resume_after_fire() {
        let pool = ThreadPool::new(4);
        let event = Arc::new(OneShotEvent::new());
        let resumed = Arc::new(AtomicUsize::new(0));

        const WAITERS: usize = 10;
        for _ in 0..WAITERS {
            let event = Arc::clone(&event);
            let counter = Arc::clone(&resumed);
            fire_and_forget(Task::new(async move {
                event.wait_async().await;
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let setter_event = Arc::clone(&event);
        let executor = Arc::clone(&pool) as Arc<dyn Executor>;
        fire_and_forget(Task::new(async move {
            dispatch_to(executor).await;
            setter_event.fire();
        }));

        pool.wait_idle();
        pool.stop();
        assert_eq!(resumed.load(Ordering::SeqCst), WAITERS);
    }

    #[test]
    fn wait_after_fire_does_not_suspend() {
        let pool = ThreadPool::new(1);
        let event = Arc::new(OneShotEvent::new());
        event.fire();

        let observed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&observed);
        let waiting_event = Arc::clone(&event);
        fire_and_forget(Task::new(async move {
            waiting_event.wait_async().await;
            counter.store(1, Ordering::SeqCst);
        }));

        pool.wait_idle();
        pool.stop();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }
}

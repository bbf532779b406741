//! Stackless counterparts of `rtcx_fiber_sync`'s primitives: same
//! tagged-state waiter chains, but a `Waker` is what gets resumed instead
//! of a `FiberHandle`.

mod mutex;
mod oneshot_event;
mod wait_group;

pub use mutex::{Mutex, MutexGuard, ScopedLock};
pub use oneshot_event::{OneShotEvent, WaitAsync};
pub use wait_group::WaitGroup;

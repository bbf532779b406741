//! Fiber-blocking synchronization primitives: mutex, condition variable,
//! one-shot event, and wait group, all built on [`rtcx_fiber`]'s
//! suspend/resume protocol instead of blocking an OS thread.

mod condvar;
mod futex;
mod mutex;
mod oneshot_event;
mod spinlock;
mod wait_group;

pub use condvar::CondVar;
pub use mutex::Mutex;
pub use oneshot_event::OneShotEvent;
pub use wait_group::WaitGroup;

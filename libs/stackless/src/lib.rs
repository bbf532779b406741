//! Stackless tasks driven by native `async`/`.await`, the Rust analogue of
//! `magic::coroutine::stackless` (`examples/original_source/src/magic/coroutine/stackless/`):
//! a lazily-started [`Task`], dispatch-to-executor and yield awaiters, and
//! mutex/one-shot-event/wait-group variants that resume a `Waker` directly
//! rather than scheduling a fiber.

mod dispatch;
mod fire;
pub mod sync;
mod task;
mod yield_;

pub use dispatch::{DispatchTo, dispatch_to};
pub use fire::fire_and_forget;
pub use task::Task;
pub use yield_::yield_now;

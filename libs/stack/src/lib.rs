//! Pooled fixed-size stacks and the raw machine-context-switch primitive
//! that every stackful abstraction in this workspace (`rtcx-fiber`'s
//! `Fiber`, and this crate's own [`Coroutine`], [`Generator`], [`Processor`])
//! is built on top of.
//!
//! The switch itself lives in [`arch`], wrapped by [`context`] into a typed
//! [`context::ExecutionContext`] pair; [`pool`] mmaps guard-paged stacks and
//! reuses them; [`coroutine`] ties stack + context pair + routine into the
//! `created → running ↔ suspended → completed` state machine; [`generator`]
//! and [`processor`] are small producer/consumer conveniences layered on
//! `Coroutine`.

mod arch;
pub mod context;
pub mod coroutine;
pub mod error;
pub mod generator;
pub mod pool;
pub mod processor;

pub use coroutine::{Coroutine, suspend};
pub use error::{Error, ErrorCode, Result, Status};
pub use generator::Generator;
pub use pool::{PoolMetrics, Stack, StackPool, global as global_pool};
pub use processor::Processor;

//! Lock-free and intrusive collections used to hand work between threads
//! without a mutex in the common path: a plain intrusive [`list`] for
//! single-threaded threading of nodes, a [`mpsc`] stack/queue pair for
//! many producers handing work to one consumer, a [`treiber`] stack for
//! general-purpose lock-free LIFO sharing, and the [`tagged`] pointer this
//! last one is built on.

pub mod list;
pub mod mpsc;
pub mod tagged;
pub mod treiber;

pub use list::{Linked, Links, List};
pub use mpsc::{MpscQueue, MpscStack};
pub use tagged::{AtomicStampedPtr, StampedPtr};
pub use treiber::LockFreeStack;

//! One-shot future/promise contracts with synchronous and asynchronous
//! continuations, error recovery, and a fiber-aware blocking `await`.
//!
//! Grounded on `magic::Future<T>`/`Promise<T>`
//! (`examples/original_source/src/magic/futures/`).

mod await_;
mod error;
mod execute;
mod future;
mod get;
mod promise;
pub mod rendezvous;
mod shared_state;

pub use await_::await_future;
pub use error::{Error, ErrorCode, PanicPayload, Result};
pub use execute::execute;
pub use future::{Contract, Future, make_contract, make_contract_via};
pub use get::{wait_result, wait_value};
pub use promise::Promise;
pub use rendezvous::Rendezvous;

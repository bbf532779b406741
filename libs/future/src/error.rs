//! The `Error`/`Result<T>` shape every future/promise in this crate uses.
//! Grounded on `magic::Error` (`examples/original_source/src/magic/common/result/error.h`):
//! a failure is either an explicit, stable status code or a caught
//! exception, never both. `rtcx_stack::error::Error` concretizes the same
//! source type for stack-allocation failures specifically (it also chains
//! an OS `io::Error` onto its codes); `ErrorCode`/`PanicPayload` are
//! duplicated here rather than shared, since the two crates otherwise
//! have no reason to depend on each other.

use std::any::Any;
use std::fmt;

/// A stable, crate-local status code plus a human-readable message — the
/// Rust stand-in for the source's `std::error_code`, which also pairs a
/// small integer with a category message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: i32,
    pub message: &'static str,
}

impl ErrorCode {
    pub const fn new(code: i32, message: &'static str) -> Self {
        Self { code, message }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Code(ErrorCode),
    #[error("future continuation panicked")]
    Panic(#[source] PanicPayload),
}

impl Error {
    pub fn code(code: ErrorCode) -> Self {
        Self::Code(code)
    }

    pub fn panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self::Panic(PanicPayload(payload))
    }
}

/// See `rtcx_stack::error::PanicPayload` — same rationale, duplicated.
pub struct PanicPayload(pub Box<dyn Any + Send + 'static>);

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicPayload").finish_non_exhaustive()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<panic payload>")
    }
}

impl std::error::Error for PanicPayload {}

pub type Result<T> = core::result::Result<T, Error>;

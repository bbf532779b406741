//! Typed errors for `rtcx-stack` (the crate-local instance of the
//! `Error { Code, Panic }` pattern described in the workspace's ambient
//! error-handling design; concretized from `common::Result`/`common::Error`
//! in the original source, which distinguishes OS errors, user status codes,
//! and caught exceptions).

use std::any::Any;
use std::fmt;

/// A stable, crate-local status code plus a human-readable message.
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

/// Stack allocation failed to reserve or protect memory via `mmap`/`mprotect`.
pub const STACK_ALLOCATION_FAILED: ErrorCode = ErrorCode::new(1, "stack allocation failed");

/// An error is either a stable status code (optionally chained to the OS
/// error that caused it) or a captured routine panic, never both —
/// mirroring the source's "error code XOR exception" contract.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Code(ErrorCode),
    #[error("{0}")]
    Os(ErrorCode, #[source] std::io::Error),
    #[error("coroutine routine panicked")]
    Panic(#[source] PanicPayload),
}

impl Error {
    pub fn code(code: ErrorCode) -> Self {
        Self::Code(code)
    }

    pub fn os(code: ErrorCode, source: std::io::Error) -> Self {
        Self::Os(code, source)
    }

    pub fn panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self::Panic(PanicPayload(payload))
    }
}

/// Wraps a caught panic payload so it can participate in `std::error::Error`.
///
/// The payload itself carries no useful `Display`/`source` chain — only that
/// a panic occurred is preserved, matching how a captured C++ exception is
/// opaque at this layer too.
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

/// `Result<T> = core::result::Result<T, Error>` (spec §3 "Result<T>"),
/// specialized here since this crate's only fallible path is stack
/// allocation.
pub type Result<T> = core::result::Result<T, Error>;

/// `Status` is `Result<()>`.
pub type Status = Result<()>;

//! Architecture-specific halves of the context-switch primitive.
//!
//! Each backend exposes the same three raw entry points, matching the contract
//! in spec §4.1 / §6: `init_stack` lays out a fresh stack so that the first
//! switch lands in the trampoline, `switch_to` saves the caller's callee-saved
//! registers and restores the callee's, and `exit_to` is the one-way variant
//! used from a coroutine's final frame.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use self::x86_64::*;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use self::aarch64::*;
    } else {
        compile_error!("rtcx-stack: unsupported target architecture (only x86_64 and aarch64 are implemented)");
    }
}

// Context-switch primitive for x86_64 (SysV ABI: Linux, macOS, *BSD).
//
// Heavily inspired by the stack-switching scheme in `fiber::arch::x86_64`
// (k23's `corosensei`-derived fiber crate), adapted from its asymmetric
// parent-link-on-stack model to the simple two-`ExecutionContext` model spec
// §4.1 describes, and written with stable `global_asm!` rather than the
// nightly-only `#[naked]`/`naked_asm!` the original uses, since this crate
// targets stable hosted Rust (see DESIGN.md).
//
// Layout of a freshly initialized stack, growing down from `top`:
//
//   [ trampoline address ]   <- popped by `ret` on first switch_to
//   [ rbp placeholder     ]
//   [ rbx placeholder     ]
//   [ r12 placeholder     ]
//   [ r13 placeholder     ]
//   [ r14 placeholder     ]
//   [ r15 placeholder     ]  <- initial stack pointer returned by init_stack

use core::arch::global_asm;

pub const STACK_ALIGNMENT: usize = 16;

global_asm! {
    ".pushsection .text.rtcx_switch",
    ".balign 16",
    ".global rtcx_switch",
    "rtcx_switch:",
    // Save the six callee-saved registers GCC/LLVM require across calls.
    // rbp/rbx are pushed manually (not via clobber) because we are not
    // using Rust inline asm here, just a raw symbol called via `extern "C"`.
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    // rdi = target stack pointer, rsi = &mut from_slot, rdx = arg to deliver.
    "mov [rsi], rsp",
    "mov rsp, rdi",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    // The first switch into a fresh stack returns through this `ret` into
    // `trampoline`, an `extern "C" fn(usize)`, which reads its argument
    // from rdi per the SysV ABI — rax alone only satisfies switches that
    // resume through a normal `call` return, not the trampoline's entry.
    "mov rdi, rdx",
    "mov rax, rdx",
    "ret",
    ".popsection",
}

global_asm! {
    ".pushsection .text.rtcx_exit_to",
    ".balign 16",
    ".global rtcx_exit_to",
    "rtcx_exit_to:",
    // One-way switch used from a coroutine's dying frame: no save needed.
    // rdi = target stack pointer, rsi = arg to deliver.
    "mov rsp, rdi",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    // Kept symmetric with `rtcx_switch` even though this path's target is
    // always a context resuming from a real `call`, not the trampoline.
    "mov rdi, rsi",
    "mov rax, rsi",
    "ret",
    ".popsection",
}

unsafe extern "C" {
    /// Saves the current callee-saved registers and stack pointer into
    /// `*from_slot`, then restores registers from `to_sp` and resumes there.
    /// Returns with `arg` as the value (this is what makes `switch_to`
    /// symmetric: both the resumer and the fiber observe it as a plain
    /// function return).
    pub fn rtcx_switch(to_sp: usize, from_slot: *mut usize, arg: usize) -> usize;

    /// Like `rtcx_switch` but never saves the caller's state. Used when the
    /// current stack is being permanently discarded (trampoline exit).
    pub fn rtcx_exit_to(to_sp: usize, arg: usize) -> !;
}

/// Lays out a fresh stack so that the first `rtcx_switch` into it lands in
/// `trampoline`, and returns the stack pointer to store in the coroutine's
/// `ExecutionContext`.
///
/// # Safety
/// `top` must be the high (start) address of a region of at least
/// `MIN_STACK_SIZE` writable, 16-byte-aligned bytes, and must remain valid
/// for as long as the returned pointer is used with `rtcx_switch`.
pub unsafe fn init_stack(top: *mut u8, trampoline: unsafe extern "C" fn(usize) -> !) -> *mut u8 {
    // Safety: caller guarantees `top` is writable for at least a few dozen
    // bytes below it and 16-byte aligned.
    unsafe {
        let mut sp = (top as usize) & !(STACK_ALIGNMENT - 1);

        sp -= 8;
        *(sp as *mut usize) = trampoline as usize;

        // Six zeroed placeholders for rbp, rbx, r12, r13, r14, r15. Their
        // values are never read meaningfully since the trampoline never
        // returns through this frame.
        for _ in 0..6 {
            sp -= 8;
            *(sp as *mut usize) = 0;
        }

        sp as *mut u8
    }
}

// Context-switch primitive for aarch64 (AAPCS64), mirroring the x86_64
// backend. Callee-saved registers per AAPCS64 are x19-x28, x29 (fp), x30
// (lr), sp, and d8-d15; we save the general-purpose ones and treat the FPU
// callee-saved registers as out of scope the way `fiber::arch::aarch64` does
// for its reduced "hot path only" register set (this runtime never runs
// fibers that keep live SIMD state across a suspend point, matching the
// teacher crate's stance).

use core::arch::global_asm;

pub const STACK_ALIGNMENT: usize = 16;

global_asm! {
    ".pushsection .text.rtcx_switch",
    ".balign 16",
    ".global rtcx_switch",
    "rtcx_switch:",
    "stp x19, x20, [sp, #-16]!",
    "stp x21, x22, [sp, #-16]!",
    "stp x23, x24, [sp, #-16]!",
    "stp x25, x26, [sp, #-16]!",
    "stp x27, x28, [sp, #-16]!",
    "stp x29, x30, [sp, #-16]!",
    // x0 = target sp, x1 = &mut from_slot, x2 = arg to deliver.
    "mov x9, sp",
    "str x9, [x1]",
    "mov sp, x0",
    "ldp x29, x30, [sp], #16",
    "ldp x27, x28, [sp], #16",
    "ldp x25, x26, [sp], #16",
    "ldp x23, x24, [sp], #16",
    "ldp x21, x22, [sp], #16",
    "ldp x19, x20, [sp], #16",
    "mov x0, x2",
    "ret",
    ".popsection",
}

global_asm! {
    ".pushsection .text.rtcx_exit_to",
    ".balign 16",
    ".global rtcx_exit_to",
    "rtcx_exit_to:",
    // x0 = target sp, x1 = arg to deliver.
    "mov sp, x0",
    "ldp x29, x30, [sp], #16",
    "ldp x27, x28, [sp], #16",
    "ldp x25, x26, [sp], #16",
    "ldp x23, x24, [sp], #16",
    "ldp x21, x22, [sp], #16",
    "ldp x19, x20, [sp], #16",
    "mov x0, x1",
    "ret",
    ".popsection",
}

unsafe extern "C" {
    pub fn rtcx_switch(to_sp: usize, from_slot: *mut usize, arg: usize) -> usize;
    pub fn rtcx_exit_to(to_sp: usize, arg: usize) -> !;
}

/// # Safety
/// See the x86_64 `init_stack` for the contract; `top` must additionally be
/// aligned to `STACK_ALIGNMENT` on entry.
pub unsafe fn init_stack(top: *mut u8, trampoline: unsafe extern "C" fn(usize) -> !) -> *mut u8 {
    // Safety: caller guarantees `top` is writable for at least a few dozen
    // bytes below it and 16-byte aligned.
    unsafe {
        let mut sp = (top as usize) & !(STACK_ALIGNMENT - 1);

        // The lr slot in the final (first-popped by trampoline-entry) pair is
        // what `ret` jumps to; we reuse the x29/x30 pair's slot for it.
        sp -= 16;
        *(sp as *mut usize).add(1) = trampoline as usize;
        *(sp as *mut usize) = 0;

        for _ in 0..5 {
            sp -= 16;
            *(sp as *mut usize) = 0;
            *(sp as *mut usize).add(1) = 0;
        }

        sp as *mut u8
    }
}

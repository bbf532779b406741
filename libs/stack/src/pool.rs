//! Process-wide pool of fixed-size stacks (spec §4.1, §9 "stack allocator as
//! process-wide state").
//!
//! Grounded on `fiber::stack::unix::DefaultFiberStack` (mmap + guard page +
//! mprotect), generalized from "one stack per allocation" into a
//! mutex-guarded free list that reuses released stacks, as spec.md requires.

use crate::error::{Error, Result, STACK_ALLOCATION_FAILED};
use std::io;
use std::sync::{Mutex, OnceLock};

/// Minimum size of a stack, excluding its guard page.
pub const MIN_STACK_SIZE: usize = 4096;

/// Default stack size used by [`StackPool::allocate`], overridable via the
/// `RTCX_STACK_SIZE` environment variable (read once, at first use).
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

fn configured_stack_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| {
        std::env::var("RTCX_STACK_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n >= MIN_STACK_SIZE)
            .unwrap_or(DEFAULT_STACK_SIZE)
    })
}

/// An owned, guard-paged stack region.
#[derive(Debug)]
pub struct Stack {
    base: *mut u8,
    mmap_len: usize,
    size: usize,
}

// Safety: a `Stack`'s memory is plain bytes; only one coroutine runs on it at
// a time and handoff is synchronized by the context switch itself.
unsafe impl Send for Stack {}

impl Stack {
    fn new(size: usize) -> Result<Self> {
        let size = size.max(MIN_STACK_SIZE);
        let page_size = page_size();
        let mmap_len = size
            .checked_add(page_size)
            .expect("integer overflow computing stack size")
            .div_ceil(page_size)
            * page_size
            + page_size;

        // Safety: flags/prot requested are exactly those required to reserve
        // then partially unlock a guard-paged region; checked below.
        unsafe {
            let map_flags = libc::MAP_ANONYMOUS | libc::MAP_PRIVATE;
            let base = libc::mmap(
                std::ptr::null_mut(),
                mmap_len,
                libc::PROT_NONE,
                map_flags,
                -1,
                0,
            );
            if base == libc::MAP_FAILED {
                return Err(Error::os(STACK_ALLOCATION_FAILED, io::Error::last_os_error()));
            }

            if libc::mprotect(
                base.cast::<u8>().add(page_size).cast(),
                mmap_len - page_size,
                libc::PROT_READ | libc::PROT_WRITE,
            ) != 0
            {
                let err = io::Error::last_os_error();
                libc::munmap(base, mmap_len);
                return Err(Error::os(STACK_ALLOCATION_FAILED, err));
            }

            Ok(Self {
                base: base.cast::<u8>(),
                mmap_len,
                size,
            })
        }
    }

    /// The highest (start) address of the usable, writable stack region.
    pub fn top(&self) -> *mut u8 {
        // Safety: `mmap_len` bytes starting at `base` were reserved above.
        unsafe { self.base.add(self.mmap_len) }
    }

    /// The requested usable size, excluding the guard page.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // Safety: `base`/`mmap_len` come from a successful mmap in `new`.
        unsafe {
            let ret = libc::munmap(self.base.cast(), self.mmap_len);
            debug_assert_eq!(ret, 0, "munmap of coroutine stack failed");
        }
    }
}

fn page_size() -> usize {
    // Safety: sysconf with a valid name is always sound to call.
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(n).expect("sysconf(_SC_PAGESIZE) returned a negative value")
}

/// Allocation/reuse counters exposed for diagnostics, matching spec §4.1's
/// "metrics counted" list.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolMetrics {
    pub total_allocations: u64,
    pub new_allocations: u64,
    pub reuses: u64,
    pub releases: u64,
    pub total_bytes: u64,
}

#[derive(Default)]
struct Inner {
    free: Vec<Stack>,
    metrics: PoolMetrics,
}

/// A mutex-guarded free list of released stacks of a single size class.
///
/// The crate also exposes a [`global()`] process-wide singleton pool sized by
/// [`DEFAULT_STACK_SIZE`]/`RTCX_STACK_SIZE`, matching spec §9's "lazily
/// initialized singleton" note; callers that need a non-default size
/// construct their own `StackPool`.
pub struct StackPool {
    size: usize,
    inner: Mutex<Inner>,
}

impl StackPool {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(MIN_STACK_SIZE),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Pops a cached stack or mmaps a new one of this pool's size class.
    pub fn allocate(&self) -> Result<Stack> {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.total_allocations += 1;

        if let Some(stack) = inner.free.pop() {
            inner.metrics.reuses += 1;
            tracing::trace!(size = self.size, "reused a pooled stack");
            return Ok(stack);
        }

        drop(inner);
        let stack = Stack::new(self.size)?;
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.new_allocations += 1;
        inner.metrics.total_bytes += stack.mmap_len as u64;
        tracing::debug!(size = self.size, mmap_len = stack.mmap_len, "mapped a new stack");
        Ok(stack)
    }

    /// Returns a stack to the free list for later reuse.
    pub fn release(&self, stack: Stack) {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.releases += 1;
        inner.free.push(stack);
        tracing::trace!(size = self.size, "released a stack to the pool");
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.inner.lock().unwrap().metrics
    }
}

/// The process-wide stack pool, lazily initialized on first use.
pub fn global() -> &'static StackPool {
    static POOL: OnceLock<StackPool> = OnceLock::new();
    POOL.get_or_init(|| StackPool::new(configured_stack_size()))
}

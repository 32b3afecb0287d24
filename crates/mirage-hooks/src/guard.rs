//! Per-thread recursion guards for the hooked syscall families.
//!
//! Some NT calls are implemented on top of others, so a hook can re-enter
//! itself on the same thread; the nested entry must bypass redirection and
//! go straight to the original syscall. Each family keeps one atomic word
//! holding the native id of the thread currently inside the hook
//! (0 = unlocked). Acquire is a CAS, release is a plain store, and no path
//! ever waits: if another thread already holds the word, the caller
//! proceeds unmarked rather than blocking.

use std::sync::atomic::{AtomicU64, Ordering};

const UNLOCKED: u64 = 0;

#[inline]
pub fn current_thread_id() -> u64 {
    #[cfg(windows)]
    unsafe {
        u64::from(windows_sys::Win32::System::Threading::GetCurrentThreadId())
    }
    #[cfg(not(windows))]
    unsafe {
        libc::pthread_self() as u64
    }
}

/// Recursion latch for one syscall family.
pub struct ReentrancyGuard {
    owner: AtomicU64,
}

impl ReentrancyGuard {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(UNLOCKED),
        }
    }

    /// Enter the hook. `None` means this thread is already inside the same
    /// family and the caller must defer to the original syscall.
    pub fn enter(&self) -> Option<ReentrancyToken<'_>> {
        let me = current_thread_id();
        if self.owner.load(Ordering::Relaxed) == me {
            return None;
        }
        let marked = self
            .owner
            .compare_exchange(UNLOCKED, me, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        Some(ReentrancyToken {
            guard: self,
            marked,
        })
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII release. Only the entry that actually claimed the word clears it.
pub struct ReentrancyToken<'a> {
    guard: &'a ReentrancyGuard,
    marked: bool,
}

impl Drop for ReentrancyToken<'_> {
    fn drop(&mut self) {
        if self.marked {
            self.guard.owner.store(UNLOCKED, Ordering::Release);
        }
    }
}

/// One guard per hooked family. Standard and extended directory queries
/// share a single guard because the extended form layers on the standard
/// one.
pub struct HookGuards {
    pub create: ReentrancyGuard,
    pub open: ReentrancyGuard,
    pub delete: ReentrancyGuard,
    pub query_directory: ReentrancyGuard,
    pub query_attributes: ReentrancyGuard,
    pub query_full_attributes: ReentrancyGuard,
}

impl HookGuards {
    pub const fn new() -> Self {
        Self {
            create: ReentrancyGuard::new(),
            open: ReentrancyGuard::new(),
            delete: ReentrancyGuard::new(),
            query_directory: ReentrancyGuard::new(),
            query_attributes: ReentrancyGuard::new(),
            query_full_attributes: ReentrancyGuard::new(),
        }
    }
}

impl Default for HookGuards {
    fn default() -> Self {
        Self::new()
    }
}

pub static GUARDS: HookGuards = HookGuards::new();

//! Closed-handle hand-off queue.
//!
//! The close-handle interceptor runs on thread-teardown paths where almost
//! nothing is safe: no allocation, no locks, no TLS. It only gets to write
//! a handle value into a fixed array of atomics. Ordinary hook entries
//! drain the queue on their way in and evict the matching entries from the
//! handle map. Drains are serialized by a CAS on `current_thread`; a
//! contended drain simply skips, the next hook entry will pick the work up.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::guard::current_thread_id;

pub const QUEUE_CAPACITY: usize = 64;

/// Empty-slot marker. The NULL handle is never a valid open handle.
const EMPTY: usize = 0;
const DRAIN_FREE: u64 = 0;

#[derive(Debug, Default)]
pub struct QueueStats {
    pub pushes: AtomicU64,
    pub overflows: AtomicU64,
    pub drains: AtomicU64,
}

pub struct ClosedHandleQueue {
    current_thread: AtomicU64,
    num_items: AtomicUsize,
    items: [AtomicUsize; QUEUE_CAPACITY],
    stats: QueueStats,
}

impl ClosedHandleQueue {
    pub const fn new() -> Self {
        Self {
            current_thread: AtomicU64::new(DRAIN_FREE),
            num_items: AtomicUsize::new(0),
            items: [const { AtomicUsize::new(EMPTY) }; QUEUE_CAPACITY],
            stats: QueueStats {
                pushes: AtomicU64::new(0),
                overflows: AtomicU64::new(0),
                drains: AtomicU64::new(0),
            },
        }
    }

    pub const fn capacity(&self) -> usize {
        QUEUE_CAPACITY
    }

    /// Record a closed handle. Wait-free, allocation-free; safe from the
    /// close interceptor. Returns false when the queue is full, in which
    /// case the handle-map entry stays until the process exits (harmless:
    /// handle values are not reused while the entry is stale-checked).
    pub fn push(&self, handle: usize) -> bool {
        if handle == EMPTY {
            return false;
        }
        for slot in &self.items {
            if slot
                .compare_exchange(EMPTY, handle, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.num_items.fetch_add(1, Ordering::Release);
                self.stats.pushes.fetch_add(1, Ordering::Relaxed);
                return true;
            }
        }
        self.stats.overflows.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// Drain all pending handles through `f`. At most one thread drains at
    /// a time; everyone else returns immediately.
    pub fn drain(&self, mut f: impl FnMut(usize)) {
        if self.num_items.load(Ordering::Acquire) == 0 {
            return;
        }
        let me = current_thread_id();
        if self
            .current_thread
            .compare_exchange(DRAIN_FREE, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        for slot in &self.items {
            let handle = slot.swap(EMPTY, Ordering::AcqRel);
            if handle != EMPTY {
                self.num_items.fetch_sub(1, Ordering::Release);
                f(handle);
            }
        }

        self.stats.drains.fetch_add(1, Ordering::Relaxed);
        self.current_thread.store(DRAIN_FREE, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.num_items.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.pushes.load(Ordering::Relaxed),
            self.stats.overflows.load(Ordering::Relaxed),
            self.stats.drains.load(Ordering::Relaxed),
        )
    }
}

impl Default for ClosedHandleQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub static CLOSE_QUEUE: ClosedHandleQueue = ClosedHandleQueue::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_then_drain() {
        let queue = ClosedHandleQueue::new();
        assert!(queue.push(0x1234));
        assert!(queue.push(0x5678));
        assert_eq!(queue.len(), 2);

        let mut drained = Vec::new();
        queue.drain(|h| drained.push(h));

        drained.sort_unstable();
        assert_eq!(drained, vec![0x1234, 0x5678]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_null_handle_rejected() {
        let queue = ClosedHandleQueue::new();
        assert!(!queue.push(0));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_reports_false() {
        let queue = ClosedHandleQueue::new();
        for i in 0..QUEUE_CAPACITY {
            assert!(queue.push(i + 1));
        }
        assert!(!queue.push(usize::MAX));

        let (pushes, overflows, _) = queue.stats();
        assert_eq!(pushes, QUEUE_CAPACITY as u64);
        assert_eq!(overflows, 1);
    }

    #[test]
    fn test_drain_on_empty_is_noop() {
        let queue = ClosedHandleQueue::new();
        let mut called = false;
        queue.drain(|_| called = true);
        assert!(!called);
    }

    #[test]
    fn test_concurrent_pushers() {
        use std::sync::Arc;

        let queue = Arc::new(ClosedHandleQueue::new());
        let mut handles = Vec::new();
        for t in 0..4usize {
            let q = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                for i in 0..8usize {
                    q.push(t * 100 + i + 1);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(queue.len(), 32);
        let mut drained = Vec::new();
        queue.drain(|h| drained.push(h));
        assert_eq!(drained.len(), 32);
    }
}

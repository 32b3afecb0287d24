//! Cheap atomic counters for the status surface.
//!
//! Everything here is fire-and-forget `Relaxed` arithmetic; counts may lag
//! under contention and each event costs one uncontended RMW.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Telemetry {
    pub redirect_hits: AtomicU64,
    pub redirect_misses: AtomicU64,
    pub injected_entries: AtomicU64,
    pub recursion_skips: AtomicU64,
    pub directory_fallbacks: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub redirect_hits: u64,
    pub redirect_misses: u64,
    pub injected_entries: u64,
    pub recursion_skips: u64,
    pub directory_fallbacks: u64,
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            redirect_hits: AtomicU64::new(0),
            redirect_misses: AtomicU64::new(0),
            injected_entries: AtomicU64::new(0),
            recursion_skips: AtomicU64::new(0),
            directory_fallbacks: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.redirect_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.redirect_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_injected(&self, count: u64) {
        self.injected_entries.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_recursion_skip(&self) {
        self.recursion_skips.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_directory_fallback(&self) {
        self.directory_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            redirect_hits: self.redirect_hits.load(Ordering::Relaxed),
            redirect_misses: self.redirect_misses.load(Ordering::Relaxed),
            injected_entries: self.injected_entries.load(Ordering::Relaxed),
            recursion_skips: self.recursion_skips.load(Ordering::Relaxed),
            directory_fallbacks: self.directory_fallbacks.load(Ordering::Relaxed),
        }
    }
}

pub static TELEMETRY: Telemetry = Telemetry::new();

//! Per-open-handle bookkeeping.
//!
//! A handle earns an entry when `NtCreateFile`/`NtOpenFile` succeeds on a
//! directory the lookup tree knows about. The entry carries the merger
//! state for that handle's enumeration and dies when the closed-handle
//! queue drains.

use dashmap::DashMap;

use mirage_core::{RedirectTarget, SpanDict};

use crate::close_queue::ClosedHandleQueue;

/// One overlay entry staged for injection into this handle's enumeration.
#[derive(Debug, Clone)]
pub struct InjectedItem {
    pub target: RedirectTarget,
}

impl InjectedItem {
    /// Uppercase name as it appears to the application.
    pub fn name(&self) -> &str {
        &self.target.file_name
    }

    /// On-disk location backing the injected record's metadata.
    pub fn source_path(&self) -> String {
        self.target.full_path()
    }
}

/// Enumeration merger state for one open directory handle.
#[derive(Debug)]
pub struct HandleState {
    /// Original, pre-redirection path (uppercase, no NT prefix).
    pub file_path: Box<str>,
    /// Filter pattern from the most recent enumeration call.
    pub query_file_name: Box<str>,
    /// Overlay entries staged for this enumeration; `None` until the first
    /// query populates it from the lookup tree.
    pub items: Option<Vec<InjectedItem>>,
    /// Overlay names already emitted (either natively present and reported
    /// by the underlying enumeration, or injected by us).
    pub already_injected: SpanDict<bool>,
    pub current_item: usize,
    pub num_injected_items: usize,
    pub force_restart_scan: bool,
}

impl HandleState {
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: Box::from(file_path),
            query_file_name: Box::from("*"),
            items: None,
            already_injected: SpanDict::new(),
            current_item: 0,
            num_injected_items: 0,
            force_restart_scan: false,
        }
    }

    /// Reset for a fresh pass. Used when the caller restarts the scan or
    /// changes the filter pattern.
    pub fn reset_enumeration(&mut self) {
        self.items = None;
        self.already_injected.clear();
        self.current_item = 0;
        self.num_injected_items = 0;
    }

    /// A changed filter pattern invalidates everything emitted so far and
    /// forces the underlying scan to restart too.
    pub fn apply_filter(&mut self, pattern: &str) {
        if &*self.query_file_name != pattern {
            self.query_file_name = Box::from(pattern);
            self.reset_enumeration();
            self.force_restart_scan = true;
        }
    }
}

/// Map from raw handle value to merger state. Written under the per-family
/// hook guards and the close-queue drain; read from enumeration hooks.
#[derive(Default)]
pub struct HandleRegistry {
    map: DashMap<usize, HandleState>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    pub fn register(&self, handle: usize, state: HandleState) {
        self.map.insert(handle, state);
    }

    pub fn remove(&self, handle: usize) -> bool {
        self.map.remove(&handle).is_some()
    }

    pub fn contains(&self, handle: usize) -> bool {
        self.map.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Run `f` over the state for `handle`, if any.
    pub fn with_state<R>(&self, handle: usize, f: impl FnOnce(&mut HandleState) -> R) -> Option<R> {
        self.map.get_mut(&handle).map(|mut entry| f(&mut entry))
    }

    /// Evict every handle the close interceptor queued since the last
    /// drain. Called from normal hook entries.
    pub fn drain_closed(&self, queue: &ClosedHandleQueue) {
        queue.drain(|handle| {
            self.map.remove(&handle);
        });
    }
}

//! Fire-and-forget event callbacks for the control surface.
//!
//! Callbacks run on whatever application thread triggered the hook, so they
//! are invoked without any engine guard held. There is no cancellation.

use std::sync::RwLock;

type RedirectingCallback = Box<dyn Fn(&str, &str) + Send + Sync>;
type LoadingCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub struct EventSinks {
    redirecting: RwLock<Vec<RedirectingCallback>>,
    loading: RwLock<Vec<LoadingCallback>>,
}

impl EventSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback fired on every successful redirect.
    pub fn on_redirecting(&self, callback: impl Fn(&str, &str) + Send + Sync + 'static) {
        if let Ok(mut sinks) = self.redirecting.write() {
            sinks.push(Box::new(callback));
        }
    }

    /// Register a callback fired on every intercepted load.
    pub fn on_loading(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        if let Ok(mut sinks) = self.loading.write() {
            sinks.push(Box::new(callback));
        }
    }

    pub fn has_redirecting_listeners(&self) -> bool {
        self.redirecting.read().map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub fn has_loading_listeners(&self) -> bool {
        self.loading.read().map(|s| !s.is_empty()).unwrap_or(false)
    }

    pub fn notify_redirecting(&self, old_path: &str, new_path: &str) {
        if let Ok(sinks) = self.redirecting.read() {
            for sink in sinks.iter() {
                sink(old_path, new_path);
            }
        }
    }

    pub fn notify_loading(&self, path: &str) {
        if let Ok(sinks) = self.loading.read() {
            for sink in sinks.iter() {
                sink(path);
            }
        }
    }
}

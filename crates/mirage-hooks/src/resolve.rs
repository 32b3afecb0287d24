//! Redirect decisions for the file-open hook family.
//!
//! The hook installation itself lives with the host; these functions are
//! the decision core each detour calls between its recursion-guard check
//! and the original syscall. Every worst case degrades to `Passthrough`,
//! never to an error escaping into the application.

use mirage_core::RedirectionManager;

use crate::guard::ReentrancyGuard;
use crate::handles::{HandleRegistry, HandleState};
use crate::merger::directory_has_overlay;
use crate::nt::{self, NtStatus};
use crate::telemetry::TELEMETRY;

/// What an open/create/query-attributes detour should do with a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenDisposition {
    /// No redirect applies; call the original with untouched arguments.
    Passthrough,
    /// Call the original with this path instead (NT prefix already matches
    /// the incoming form).
    Redirect(String),
}

/// Decide the disposition for a path-bearing syscall. `guard` is the
/// family's recursion latch; a nested entry is a guaranteed passthrough.
pub fn resolve_open(
    manager: &RedirectionManager,
    guard: &ReentrancyGuard,
    raw_path: &str,
) -> OpenDisposition {
    let Some(_token) = guard.enter() else {
        TELEMETRY.record_recursion_skip();
        return OpenDisposition::Passthrough;
    };

    if manager.events().has_loading_listeners() {
        manager.events().notify_loading(raw_path);
    }

    match manager.try_get_file(raw_path) {
        Some(redirected) => {
            TELEMETRY.record_hit();
            OpenDisposition::Redirect(nt::restore_prefix(raw_path, &redirected))
        }
        None => {
            TELEMETRY.record_miss();
            OpenDisposition::Passthrough
        }
    }
}

/// Directory opens that fail with "name not found" may target a directory
/// that only exists inside an overlay. Returns the redirected directory
/// path to retry with, if there is one.
pub fn resolve_directory_fallback(
    manager: &RedirectionManager,
    raw_path: &str,
    status: NtStatus,
) -> Option<String> {
    if !nt::directory_needs_fallback(status) {
        return None;
    }
    let target = manager.try_get_folder_target(raw_path)?;
    TELEMETRY.record_directory_fallback();
    Some(nt::restore_prefix(raw_path, &target))
}

/// Post-open bookkeeping: register merger state for a successfully opened
/// directory when the lookup tree has entries for it.
pub fn register_directory_handle(
    manager: &RedirectionManager,
    registry: &HandleRegistry,
    handle: usize,
    raw_path: &str,
) {
    let stripped = mirage_core::path::strip_nt_prefix(raw_path);
    if !directory_has_overlay(manager, stripped) {
        return;
    }
    mirage_core::path::with_uppercase(stripped, |upper| {
        registry.register(handle, HandleState::new(upper));
    });
    tracing::debug!(handle, path = %stripped, "tracking directory handle");
}

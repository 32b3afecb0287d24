//! Owner of the configured redirect set and the published lookup tree.
//!
//! Two modes. Build mode: a mutable [`RedirectionTree`] behind the config
//! lock, queries walk the trie. Query mode (after [`optimise`]): an
//! immutable [`LookupTree`] published through an atomic pointer, readers
//! never lock. Rebuilds compile a fresh tree off to the side and swap the
//! pointer; superseded trees are retired, not freed, so in-flight readers
//! stay valid until the manager itself drops.
//!
//! [`optimise`]: RedirectionManager::optimise

use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::Mutex;

use crate::error::RedirectError;
use crate::events::EventSinks;
use crate::folder::FolderRedirection;
use crate::lookup::LookupTree;
use crate::path;
use crate::span_dict::SpanDict;
use crate::tree::{RedirectionTree, RedirectTarget};

/// One file-level redirect, stored normalized and uppercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRedirection {
    pub old_path: String,
    pub new_path: String,
}

struct ManagerInner {
    file_redirections: Vec<FileRedirection>,
    folder_redirections: Vec<FolderRedirection>,
    /// Build-mode tree; `None` once optimised.
    tree: Option<RedirectionTree>,
    using_lookup_tree: bool,
}

pub struct RedirectionManager {
    inner: Mutex<ManagerInner>,
    /// Hot-path pointer; null while still in build mode.
    lookup: AtomicPtr<LookupTree>,
    /// Superseded lookup trees, kept alive for in-flight readers.
    retired: Mutex<Vec<Box<LookupTree>>>,
    enabled: AtomicBool,
    events: EventSinks,
}

impl RedirectionManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ManagerInner {
                file_redirections: Vec::new(),
                folder_redirections: Vec::new(),
                tree: Some(RedirectionTree::new()),
                using_lookup_tree: false,
            }),
            lookup: AtomicPtr::new(std::ptr::null_mut()),
            retired: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
            events: EventSinks::new(),
        }
    }

    pub fn events(&self) -> &EventSinks {
        &self.events
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Map `old_path` to `new_path`. In build mode this is an incremental
    /// trie insert; in query mode the lookup tree is recompiled.
    pub fn add_redirect(&self, old_path: &str, new_path: &str) -> Result<(), RedirectError> {
        let redirect = FileRedirection {
            old_path: path::normalize(old_path),
            new_path: path::normalize(new_path),
        };
        if redirect.old_path.is_empty() || !redirect.old_path.contains(path::SEPARATOR) {
            return Err(RedirectError::NotAbsolute(old_path.to_string()));
        }

        let mut inner = self.lock_inner();
        inner.file_redirections.push(redirect.clone());
        if inner.using_lookup_tree {
            self.rebuild_and_publish(&mut inner);
        } else if let Some(tree) = inner.tree.as_mut() {
            tree.add_file(&redirect.old_path, &redirect.new_path, false);
        }

        tracing::debug!(old = %redirect.old_path, new = %redirect.new_path, "added file redirect");
        Ok(())
    }

    pub fn remove_redirect(&self, old_path: &str) {
        let old_upper = path::normalize(old_path);
        let mut inner = self.lock_inner();
        inner.file_redirections.retain(|r| r.old_path != old_upper);
        self.rebuild_and_publish(&mut inner);
    }

    /// Layer `target_folder` over `source_folder`. The overlay is scanned
    /// from disk here; registration always routes through a full rebuild so
    /// file-level redirects keep their precedence.
    pub fn add_redirect_folder(
        &self,
        source_folder: &str,
        target_folder: &str,
    ) -> Result<(), RedirectError> {
        let overlay = FolderRedirection::new(source_folder, target_folder)?;

        let mut inner = self.lock_inner();
        inner.folder_redirections.push(overlay);
        self.rebuild_and_publish(&mut inner);

        tracing::info!(source = %source_folder, target = %target_folder, "added folder overlay");
        Ok(())
    }

    pub fn remove_redirect_folder(&self, source_folder: &str) {
        let source_upper = path::normalize(source_folder);
        let mut inner = self.lock_inner();
        inner
            .folder_redirections
            .retain(|f| f.source_folder != source_upper);
        self.rebuild_and_publish(&mut inner);
    }

    /// Compile the build-mode tree into the immutable lookup form and
    /// switch to query mode. Configuration after this point still works,
    /// at full-rebuild cost.
    pub fn optimise(&self) {
        let mut inner = self.lock_inner();
        if inner.using_lookup_tree {
            return;
        }
        let tree = inner.tree.take().unwrap_or_default();
        inner.using_lookup_tree = true;
        self.publish(LookupTree::new(&tree));
        tracing::info!("lookup tree published, build tree discarded");
    }

    /// Resolve a file redirect. Input may be any case and may carry the NT
    /// prefix; uppercasing happens in a stack buffer for paths up to
    /// [`path::STACK_PATH_LEN`] bytes, so a miss costs no allocation.
    pub fn resolve_file<R>(
        &self,
        raw_path: &str,
        f: impl FnOnce(Option<&RedirectTarget>) -> R,
    ) -> R {
        if !self.is_enabled() {
            return f(None);
        }
        let stripped = path::strip_nt_prefix(raw_path);
        path::with_uppercase(stripped, |upper| {
            let ptr = self.lookup.load(Ordering::Acquire);
            if !ptr.is_null() {
                // Published trees are immutable and retired rather than
                // freed, so the reference cannot dangle while `self` lives.
                let lookup = unsafe { &*ptr };
                return f(lookup.try_get_file(upper));
            }
            let inner = self.lock_inner();
            match inner.tree.as_ref() {
                Some(tree) => f(tree.try_get_file(upper)),
                None => f(None),
            }
        })
    }

    /// Resolve a folder redirect: the inner file map for the overlayed
    /// directory, used by the enumeration merger.
    pub fn resolve_folder<R>(
        &self,
        raw_path: &str,
        f: impl FnOnce(Option<&SpanDict<RedirectTarget>>) -> R,
    ) -> R {
        if !self.is_enabled() {
            return f(None);
        }
        let stripped = path::strip_nt_prefix(raw_path);
        path::with_uppercase(stripped, |upper| {
            let ptr = self.lookup.load(Ordering::Acquire);
            if !ptr.is_null() {
                let lookup = unsafe { &*ptr };
                return f(lookup.try_get_folder(upper));
            }
            let inner = self.lock_inner();
            match inner.tree.as_ref() {
                Some(tree) => f(tree.try_get_folder(upper)),
                None => f(None),
            }
        })
    }

    /// Convenience form returning the full redirected path. Allocates on a
    /// hit; fires the `redirecting` event.
    pub fn try_get_file(&self, raw_path: &str) -> Option<String> {
        let hit = self.resolve_file(raw_path, |target| target.map(RedirectTarget::full_path))?;
        if self.events.has_redirecting_listeners() {
            self.events.notify_redirecting(raw_path, &hit);
        }
        Some(hit)
    }

    /// Redirected location of a directory that may only exist inside an
    /// overlay. Walks the registered overlay list; only used on the
    /// directory-open fallback path, never on the per-syscall fast path.
    pub fn try_get_folder_target(&self, raw_path: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let upper = path::normalize(raw_path);
        let inner = self.lock_inner();
        for overlay in inner.folder_redirections.iter().rev() {
            if let Some(rest) = upper.strip_prefix(&overlay.source_folder) {
                let rest = rest.trim_start_matches(path::SEPARATOR);
                if rest.is_empty() {
                    return Some(overlay.target_folder.clone());
                }
                if overlay.subfolder_to_files.contains_key(rest) {
                    return Some(path::join(&overlay.target_folder, rest));
                }
            }
        }
        None
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, ManagerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Fresh tree from the registered lists: folder overlays in
    /// registration order, then every file redirect so files win.
    fn rebuild_and_publish(&self, inner: &mut ManagerInner) {
        let mut tree = RedirectionTree::new();
        for overlay in &inner.folder_redirections {
            tree.add_folder_overlay(&overlay.source_folder, overlay);
        }
        for redirect in &inner.file_redirections {
            tree.add_file(&redirect.old_path, &redirect.new_path, false);
        }

        if inner.using_lookup_tree {
            self.publish(LookupTree::new(&tree));
            inner.tree = None;
        } else {
            inner.tree = Some(tree);
        }
    }

    fn publish(&self, lookup: LookupTree) {
        let fresh = Box::into_raw(Box::new(lookup));
        let old = self.lookup.swap(fresh, Ordering::AcqRel);
        if !old.is_null() {
            // SAFETY: `old` came from Box::into_raw in a previous publish
            // and is reachable only through `retired` from here on.
            let boxed = unsafe { Box::from_raw(old) };
            match self.retired.lock() {
                Ok(mut retired) => retired.push(boxed),
                Err(poisoned) => poisoned.into_inner().push(boxed),
            }
        }
    }
}

impl Default for RedirectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RedirectionManager {
    fn drop(&mut self) {
        let ptr = self.lookup.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if !ptr.is_null() {
            // SAFETY: exclusive access in drop; no readers remain.
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

// SAFETY: the raw lookup pointer is only written under `publish` and every
// superseded tree stays alive in `retired`; shared access is read-only.
unsafe impl Send for RedirectionManager {}
unsafe impl Sync for RedirectionManager {}

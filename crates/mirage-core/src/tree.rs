//! Mutable build-time trie mapping path segments to redirect targets.
//!
//! The tree only exists during configuration. Once the manager optimises,
//! it is compiled into the flat [`LookupTree`](crate::lookup::LookupTree)
//! and discarded.

use std::sync::Arc;

use crate::folder::FolderRedirection;
use crate::path::{self, SEPARATOR};
use crate::pool;
use crate::span_dict::SpanDict;

/// On-disk destination of a redirect. `directory` is pool-shared: every
/// target under one overlay subfolder points at the same allocation.
#[derive(Debug, Clone)]
pub struct RedirectTarget {
    pub directory: Arc<str>,
    pub file_name: Box<str>,
    pub is_directory: bool,
}

impl RedirectTarget {
    pub fn new(directory: &str, file_name: &str, is_directory: bool) -> Self {
        Self {
            directory: pool::intern(directory),
            file_name: Box::from(file_name),
            is_directory,
        }
    }

    /// Full uppercase destination path, `DIRECTORY\NAME`.
    pub fn full_path(&self) -> String {
        path::join(&self.directory, &self.file_name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub children: SpanDict<Node>,
    pub files: SpanDict<RedirectTarget>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: SpanDict::new(),
            files: SpanDict::new(),
        }
    }
}

/// Per-segment trie over uppercase paths. `A\B\C\d.ext` lives as child
/// nodes `A`, `B`, `C` with `d.ext` in `C`'s file map.
#[derive(Debug, Clone, Default)]
pub struct RedirectionTree {
    root: Node,
}

impl RedirectionTree {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Insert one file-level redirect. Both paths must already be
    /// normalized and uppercase.
    pub fn add_file(&mut self, old_path: &str, new_path: &str, is_directory: bool) {
        let Some((old_dir, old_name)) = path::split_file_name(old_path) else {
            return;
        };
        let (new_dir, new_name) = path::split_file_name(new_path).unwrap_or(("", new_path));

        let node = self.node_at_mut(old_dir);
        node.files
            .insert(old_name, RedirectTarget::new(new_dir, new_name, is_directory));
    }

    /// Merge a scanned overlay under `source_dir`. Existing entries are
    /// overwritten: overlays are applied in registration order, so the most
    /// recent one wins, and the manager re-applies file-level redirects
    /// afterwards so those still beat every overlay.
    pub fn add_folder_overlay(&mut self, source_dir: &str, overlay: &FolderRedirection) {
        for (rel_subfolder, files) in overlay.subfolder_to_files.iter() {
            let node_path = path::join(source_dir, rel_subfolder);
            let node = self.node_at_mut(&node_path);
            for target in files {
                node.files.insert(&*target.file_name, target.clone());
            }
        }
    }

    /// Build-mode query, used before the manager optimises. Walks one
    /// segment at a time; the compiled lookup tree replaces this on the
    /// hot path.
    pub fn try_get_file(&self, path: &str) -> Option<&RedirectTarget> {
        let (dir, name) = path::split_file_name(path)?;
        self.node_at(dir)?.files.get(name)
    }

    pub fn try_get_folder(&self, path: &str) -> Option<&SpanDict<RedirectTarget>> {
        self.node_at(path).map(|n| &n.files)
    }

    fn node_at(&self, dir: &str) -> Option<&Node> {
        let mut node = &self.root;
        if dir.is_empty() {
            return Some(node);
        }
        for segment in dir.split(SEPARATOR) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn node_at_mut(&mut self, dir: &str) -> &mut Node {
        let mut node = &mut self.root;
        if dir.is_empty() {
            return node;
        }
        for segment in dir.split(SEPARATOR) {
            node = node.children.get_or_insert_with(segment, Node::new);
        }
        node
    }
}

//! Immutable query-time form of the redirection tree.
//!
//! Games keep their content under one deep directory, so the tree usually
//! degenerates into a long single-child chain before it branches. Compiling
//! collapses that chain into a single prefix string; a query is then one
//! prefix compare and two dictionary lookups. A two-step variant was
//! benchmarked and lost to this layout on cache behavior.

use crate::path::SEPARATOR;
use crate::span_dict::SpanDict;
use crate::tree::{Node, RedirectionTree, RedirectTarget};

#[derive(Debug, Default)]
pub struct LookupTree {
    /// Longest directory prefix shared by every entry, uppercase, no
    /// trailing separator. Empty when the source tree branches at the root.
    prefix: Box<str>,
    /// Outer key: subfolder relative to `prefix` (empty string for files
    /// directly inside it). Inner key: file name.
    subfolder_to_files: SpanDict<SpanDict<RedirectTarget>>,
}

impl LookupTree {
    /// Compile a fully built redirection tree.
    pub fn new(tree: &RedirectionTree) -> Self {
        let mut prefix = String::new();
        let mut node = tree.root();

        // Follow the single-child, file-free chain.
        while node.children.len() == 1 && node.files.is_empty() {
            let Some((segment, child)) = node.children.get_first() else {
                break;
            };
            prefix.push_str(segment);
            prefix.push(SEPARATOR);
            node = child;
        }
        if prefix.ends_with(SEPARATOR) {
            prefix.pop();
        }

        if node.children.is_empty() && node.files.is_empty() {
            return Self::default();
        }

        let mut subfolder_to_files = SpanDict::with_capacity(count_nodes(node));
        flatten(node, String::new(), &mut subfolder_to_files);

        tracing::debug!(
            prefix = %prefix,
            subfolders = subfolder_to_files.len(),
            "compiled lookup tree"
        );

        Self {
            prefix: prefix.into_boxed_str(),
            subfolder_to_files,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Folder lookup. `path` must already be uppercase with no NT prefix.
    /// Never allocates.
    pub fn try_get_folder(&self, path: &str) -> Option<&SpanDict<RedirectTarget>> {
        let prefix: &str = &self.prefix;
        if !path.starts_with(prefix) {
            return None;
        }
        let rest = if path.len() == prefix.len() {
            ""
        } else {
            let tail = &path[prefix.len()..];
            // Consume the separator between the prefix and the tail; a
            // mid-segment prefix match falls through to a dictionary miss.
            tail.strip_prefix(SEPARATOR).unwrap_or(tail)
        };
        self.subfolder_to_files.get(rest)
    }

    /// File lookup: folder lookup on the head, name lookup on the tail.
    /// Never allocates.
    pub fn try_get_file(&self, path: &str) -> Option<&RedirectTarget> {
        let sep = path.rfind(SEPARATOR)?;
        let folder = self.try_get_folder(&path[..sep])?;
        folder.get(&path[sep + 1..])
    }
}

fn count_nodes(node: &Node) -> usize {
    1 + node.children.values().map(count_nodes).sum::<usize>()
}

fn flatten(node: &Node, rel: String, out: &mut SpanDict<SpanDict<RedirectTarget>>) {
    let mut inner = SpanDict::with_capacity(node.files.len());
    for (name, target) in node.files.iter() {
        inner.insert(name, target.clone());
    }
    for (segment, child) in node.children.iter() {
        let child_rel = if rel.is_empty() {
            segment.to_string()
        } else {
            let mut s = String::with_capacity(rel.len() + 1 + segment.len());
            s.push_str(&rel);
            s.push(SEPARATOR);
            s.push_str(segment);
            s
        };
        flatten(child, child_rel, out);
    }
    out.insert(rel, inner);
}

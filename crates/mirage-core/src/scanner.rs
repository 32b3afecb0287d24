//! Overlay directory walker.
//!
//! Produces one group per visited directory with its immediate children,
//! so the folder-redirection builder can key everything by subfolder
//! without re-deriving parents.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::RedirectError;

/// A single child of a scanned directory.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub name: String,
    pub is_directory: bool,
}

/// Immediate children of one directory inside the overlay.
#[derive(Debug)]
pub struct DirectoryFilesGroup {
    pub directory: PathBuf,
    pub files: Vec<ScanEntry>,
}

/// Walk `root` and group entries by their containing directory. The root
/// itself is always present (possibly with an empty file list); groups come
/// out parent-before-child.
pub fn scan_overlay(root: &Path) -> Result<Vec<DirectoryFilesGroup>, RedirectError> {
    if !root.is_dir() {
        return Err(RedirectError::MissingOverlay(root.to_path_buf()));
    }

    let mut groups: Vec<DirectoryFilesGroup> = vec![DirectoryFilesGroup {
        directory: root.to_path_buf(),
        files: Vec::new(),
    }];
    let mut index: std::collections::HashMap<PathBuf, usize> = std::collections::HashMap::new();
    index.insert(root.to_path_buf(), 0);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| RedirectError::Scan {
            path: root.to_path_buf(),
            source: source.into(),
        })?;

        let name = entry.file_name().to_string_lossy().into_owned();
        let is_directory = entry.file_type().is_dir();
        let parent = match entry.path().parent() {
            Some(p) => p,
            None => continue,
        };

        // Directories are visited before their contents, so the parent
        // group always exists by the time a child shows up.
        match index.get(parent) {
            Some(&i) => groups[i].files.push(ScanEntry { name, is_directory }),
            None => {
                tracing::warn!(path = %entry.path().display(), "entry outside scanned groups");
                continue;
            }
        }

        if is_directory {
            index.insert(entry.path().to_path_buf(), groups.len());
            groups.push(DirectoryFilesGroup {
                directory: entry.path().to_path_buf(),
                files: Vec::new(),
            });
        }
    }

    Ok(groups)
}

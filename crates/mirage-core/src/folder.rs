//! One configured (source, target) overlay pair with its prebuilt file
//! groups.

use std::path::Path;

use crate::error::RedirectError;
use crate::path;
use crate::scanner;
use crate::span_dict::SpanDict;
use crate::tree::RedirectTarget;

/// A folder overlay: everything under `target_folder` is layered over
/// `source_folder`. The file groups are scanned once at registration and
/// keyed by subfolder path relative to the target (empty string for the
/// target root).
#[derive(Debug)]
pub struct FolderRedirection {
    pub source_folder: String,
    pub target_folder: String,
    pub subfolder_to_files: SpanDict<Vec<RedirectTarget>>,
}

impl FolderRedirection {
    /// Scan `target_folder` on disk and build the subfolder groups. Both
    /// paths are normalized and uppercased; targets share their directory
    /// string through the process-wide pool.
    pub fn new(source_folder: &str, target_folder: &str) -> Result<Self, RedirectError> {
        let source_upper = path::normalize(source_folder);
        let target_upper = path::normalize(target_folder);

        let groups = scanner::scan_overlay(Path::new(target_folder))?;
        let mut subfolder_to_files: SpanDict<Vec<RedirectTarget>> =
            SpanDict::with_capacity(groups.len());

        let root_len = groups
            .first()
            .map(|g| g.directory.as_os_str().len())
            .unwrap_or(0);

        for group in &groups {
            let rel = group.directory.to_string_lossy();
            let rel = if rel.len() > root_len {
                let tail = path::normalize(&rel[root_len..]);
                tail.trim_start_matches(path::SEPARATOR).to_string()
            } else {
                String::new()
            };

            let target_dir = path::join(&target_upper, &rel);
            let files = group
                .files
                .iter()
                .map(|f| {
                    RedirectTarget::new(&target_dir, &f.name.to_uppercase(), f.is_directory)
                })
                .collect();
            subfolder_to_files.insert(rel, files);
        }

        tracing::debug!(
            source = %source_upper,
            target = %target_upper,
            subfolders = subfolder_to_files.len(),
            "scanned overlay folder"
        );

        Ok(Self {
            source_folder: source_upper,
            target_folder: target_upper,
            subfolder_to_files,
        })
    }
}

impl PartialEq for FolderRedirection {
    fn eq(&self, other: &Self) -> bool {
        self.source_folder == other.source_folder && self.target_folder == other.target_folder
    }
}

impl Eq for FolderRedirection {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn overlay_with_files() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.bin"), b"b").unwrap();
        dir
    }

    #[test]
    fn test_subfolder_keys_are_relative_and_upper() {
        let dir = overlay_with_files();
        let overlay =
            FolderRedirection::new("C:\\game\\data", dir.path().to_str().unwrap()).unwrap();

        let root = overlay.subfolder_to_files.get("").unwrap();
        let names: Vec<&str> = root.iter().map(|t| &*t.file_name).collect();
        assert!(names.contains(&"A.BIN"));
        assert!(names.contains(&"SUB"));

        let sub = overlay.subfolder_to_files.get("SUB").unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(&*sub[0].file_name, "B.BIN");
        assert!(sub[0].directory.ends_with("\\SUB"));
    }

    #[test]
    fn test_source_and_target_are_normalized() {
        let dir = overlay_with_files();
        let overlay =
            FolderRedirection::new("c:/game/data/", dir.path().to_str().unwrap()).unwrap();
        assert_eq!(overlay.source_folder, "C:\\GAME\\DATA");
    }

    #[test]
    fn test_equality_is_structural_on_pair() {
        let dir = overlay_with_files();
        let target = dir.path().to_str().unwrap();
        let a = FolderRedirection::new("C:\\game\\data", target).unwrap();
        let b = FolderRedirection::new("C:\\GAME\\DATA", target).unwrap();
        let c = FolderRedirection::new("C:\\game\\other", target).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_missing_target_is_error() {
        let err = FolderRedirection::new("C:\\game\\data", "Z:\\does\\not\\exist");
        assert!(err.is_err());
    }
}

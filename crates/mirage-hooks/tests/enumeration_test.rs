//! Directory-enumeration merging, end to end against a scripted native
//! enumerator and a real overlay directory on disk.

use mirage_core::RedirectionManager;
use mirage_hooks::dir_info::{set_next_entry_offset, FileMetadata, MetadataProvider};
use mirage_hooks::merger::{merge_enumeration, EnumerationRequest, NativeEnumerator};
use mirage_hooks::nt::{NtStatus, STATUS_NO_MORE_FILES, STATUS_SUCCESS};
use mirage_hooks::wildcard::matches_pattern;
use mirage_hooks::{FileInformationClass, HandleState};

/// Stand-in for the real NtQueryDirectoryFile: serves a fixed set of base
/// entries, honoring restart, pattern, and buffer space.
struct ScriptedNative {
    class: FileInformationClass,
    entries: Vec<(&'static str, bool)>,
    cursor: usize,
}

impl ScriptedNative {
    fn new(class: FileInformationClass, entries: Vec<(&'static str, bool)>) -> Self {
        Self {
            class,
            entries,
            cursor: 0,
        }
    }
}

impl NativeEnumerator for ScriptedNative {
    fn query(
        &mut self,
        buffer: &mut [u8],
        restart_scan: bool,
        pattern: Option<&str>,
        return_single_entry: bool,
    ) -> (NtStatus, usize) {
        if restart_scan {
            self.cursor = 0;
        }
        let ops = self.class.layout().unwrap();

        let mut pos = 0usize;
        let mut last: Option<usize> = None;
        let mut wrote = 0usize;
        while self.cursor < self.entries.len() {
            let (name, is_dir) = self.entries[self.cursor];
            if let Some(p) = pattern {
                if !matches_pattern(&p.to_uppercase(), &name.to_uppercase()) {
                    self.cursor += 1;
                    continue;
                }
            }

            let units: Vec<u16> = name.encode_utf16().collect();
            let size = ops.record_size(units.len());
            if pos + size > buffer.len() {
                break;
            }
            unsafe {
                let record = buffer[pos..].as_mut_ptr();
                ops.write_record(record, &units, &FileMetadata::for_kind(is_dir));
                if let Some(prev) = last {
                    set_next_entry_offset(buffer[prev..].as_mut_ptr(), (pos - prev) as u32);
                }
            }
            last = Some(pos);
            pos += size;
            wrote += 1;
            self.cursor += 1;
            if return_single_entry {
                break;
            }
        }

        if wrote == 0 {
            return (STATUS_NO_MORE_FILES, 0);
        }
        (STATUS_SUCCESS, pos)
    }
}

/// Metadata provider that never hits the disk; injected records get
/// defaults derived from the target kind.
struct NullMetadata;

impl MetadataProvider for NullMetadata {
    fn query(&self, _path: &str) -> Option<FileMetadata> {
        None
    }
}

fn read_names(class: FileInformationClass, buffer: &[u8], bytes: usize) -> Vec<String> {
    let ops = class.layout().unwrap();
    let mut names = Vec::new();
    if bytes == 0 {
        return names;
    }
    let mut offset = 0usize;
    loop {
        let record = buffer[offset..].as_ptr();
        unsafe {
            let (ptr, units) = ops.name(record);
            let slice = std::slice::from_raw_parts(ptr, units);
            names.push(String::from_utf16_lossy(slice));
            let next = mirage_hooks::dir_info::next_entry_offset(record);
            if next == 0 {
                break;
            }
            offset += next as usize;
        }
    }
    names
}

/// Overlay on disk with `a.bin` (shadowing a base file) and `new.bin`.
fn manager_with_overlay() -> (RedirectionManager, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.bin"), b"overlay").unwrap();
    std::fs::write(dir.path().join("new.bin"), b"overlay").unwrap();

    let manager = RedirectionManager::new();
    manager
        .add_redirect_folder("C:\\game\\data", dir.path().to_str().unwrap())
        .unwrap();
    manager.optimise();
    (manager, dir)
}

const CLASS: FileInformationClass = FileInformationClass::FileDirectoryInformation;

fn request(class: FileInformationClass) -> EnumerationRequest<'static> {
    EnumerationRequest {
        class,
        restart_scan: false,
        pattern: None,
        return_single_entry: false,
    }
}

#[test]
fn test_merge_injects_overlay_entries_without_duplicates() {
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\DATA");
    let mut native = ScriptedNative::new(CLASS, vec![("a.bin", false), ("b.bin", false)]);

    let mut buffer = vec![0u8; 4096];
    let (status, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &request(CLASS),
    );

    assert_eq!(status, STATUS_SUCCESS);
    let names = read_names(CLASS, &buffer, bytes);
    // Base files first (native casing), then the injected overlay entry;
    // A.BIN appears exactly once even though both layers have it.
    assert_eq!(names, vec!["a.bin", "b.bin", "NEW.BIN"]);

    // Enumeration is exhausted afterwards.
    let (status, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &request(CLASS),
    );
    assert_eq!(status, STATUS_NO_MORE_FILES);
    assert_eq!(bytes, 0);
}

#[test]
fn test_merge_across_small_buffers() {
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\DATA");
    let mut native = ScriptedNative::new(CLASS, vec![("a.bin", false), ("b.bin", false)]);

    // Room for exactly two FileDirectoryInformation records of these name
    // lengths (64 + 10 -> 80 bytes each).
    let mut buffer = vec![0u8; 160];
    let mut collected = Vec::new();
    loop {
        let (status, bytes) = merge_enumeration(
            &mut state,
            &manager,
            &mut native,
            &NullMetadata,
            &mut buffer,
            &request(CLASS),
        );
        if status == STATUS_NO_MORE_FILES {
            break;
        }
        assert_eq!(status, STATUS_SUCCESS);
        collected.extend(read_names(CLASS, &buffer, bytes));
    }

    let mut unique = collected.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), collected.len(), "duplicate names: {collected:?}");

    let mut upper: Vec<String> = collected.iter().map(|n| n.to_uppercase()).collect();
    upper.sort();
    assert_eq!(upper, vec!["A.BIN", "B.BIN", "NEW.BIN"]);
}

#[test]
fn test_restart_scan_replays_everything() {
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\DATA");
    let mut native = ScriptedNative::new(CLASS, vec![("a.bin", false)]);

    let mut buffer = vec![0u8; 4096];
    let (_, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &request(CLASS),
    );
    let first = read_names(CLASS, &buffer, bytes);

    let restart = EnumerationRequest {
        restart_scan: true,
        ..request(CLASS)
    };
    let (status, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &restart,
    );
    assert_eq!(status, STATUS_SUCCESS);
    let second = read_names(CLASS, &buffer, bytes);
    assert_eq!(first, second);
}

#[test]
fn test_filter_change_resets_and_refilters() {
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\DATA");
    let mut native = ScriptedNative::new(CLASS, vec![("a.bin", false), ("b.txt", false)]);

    let mut buffer = vec![0u8; 4096];
    let all = EnumerationRequest {
        pattern: Some("*"),
        ..request(CLASS)
    };
    let (_, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &all,
    );
    // a.bin (deduped against the overlay copy), b.txt, injected NEW.BIN.
    assert_eq!(read_names(CLASS, &buffer, bytes).len(), 3);

    // New pattern: merger resets, the underlying scan restarts, and only
    // matching names come back from either layer.
    let filtered = EnumerationRequest {
        pattern: Some("N*.BIN"),
        ..request(CLASS)
    };
    let (status, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &filtered,
    );
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(read_names(CLASS, &buffer, bytes), vec!["NEW.BIN"]);
}

#[test]
fn test_overlay_only_directory_enumerates() {
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\DATA");
    // Base directory is empty; everything comes from the overlay.
    let mut native = ScriptedNative::new(CLASS, vec![]);

    let mut buffer = vec![0u8; 4096];
    let (status, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &request(CLASS),
    );
    assert_eq!(status, STATUS_SUCCESS);
    let mut names = read_names(CLASS, &buffer, bytes);
    names.sort();
    assert_eq!(names, vec!["A.BIN", "NEW.BIN"]);
}

#[test]
fn test_directory_without_overlay_passes_through() {
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\MUSIC");
    let mut native = ScriptedNative::new(CLASS, vec![("track.ogg", false)]);

    let mut buffer = vec![0u8; 4096];
    let (status, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &request(CLASS),
    );
    assert_eq!(status, STATUS_SUCCESS);
    assert_eq!(read_names(CLASS, &buffer, bytes), vec!["track.ogg"]);
}

#[test]
fn test_single_entry_requests_inject_one_at_a_time() {
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\DATA");
    let mut native = ScriptedNative::new(CLASS, vec![]);

    let single = EnumerationRequest {
        return_single_entry: true,
        ..request(CLASS)
    };
    let mut buffer = vec![0u8; 4096];

    let mut seen = Vec::new();
    loop {
        let (status, bytes) = merge_enumeration(
            &mut state,
            &manager,
            &mut native,
            &NullMetadata,
            &mut buffer,
            &single,
        );
        if status != STATUS_SUCCESS {
            break;
        }
        let names = read_names(CLASS, &buffer, bytes);
        assert_eq!(names.len(), 1);
        seen.extend(names);
    }

    seen.sort();
    assert_eq!(seen, vec!["A.BIN", "NEW.BIN"]);
}

#[test]
fn test_names_information_class_merges_too() {
    let class = FileInformationClass::FileNamesInformation;
    let (manager, _overlay) = manager_with_overlay();
    let mut state = HandleState::new("C:\\GAME\\DATA");
    let mut native = ScriptedNative::new(class, vec![("a.bin", false)]);

    let mut buffer = vec![0u8; 4096];
    let (status, bytes) = merge_enumeration(
        &mut state,
        &manager,
        &mut native,
        &NullMetadata,
        &mut buffer,
        &request(class),
    );
    assert_eq!(status, STATUS_SUCCESS);
    let names = read_names(class, &buffer, bytes);
    assert_eq!(names, vec!["a.bin", "NEW.BIN"]);
}

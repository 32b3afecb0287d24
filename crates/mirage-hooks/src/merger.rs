//! Directory enumeration splicing.
//!
//! When the application enumerates a directory that has an overlay, the
//! underlying syscall only knows about the base files. The merger runs the
//! real enumeration first, remembers which overlay names the filesystem
//! already reported (those files exist in both layers and must not appear
//! twice), then appends synthesized records for the remaining overlay
//! entries while buffer space lasts. Restart and filter-change semantics
//! follow the kernel's: a new pattern resets everything and forces the
//! underlying scan to restart.

use mirage_core::RedirectionManager;

use crate::dir_info::{
    align_to_record, next_entry_offset, set_next_entry_offset, FileInformationClass, FileMetadata,
    LayoutOps, MetadataProvider,
};
use crate::handles::{HandleState, InjectedItem};
use crate::nt::{
    NtStatus, STATUS_BUFFER_OVERFLOW, STATUS_NO_MORE_FILES, STATUS_NO_SUCH_FILE, STATUS_SUCCESS,
};
use crate::telemetry::TELEMETRY;
use crate::wildcard::matches_pattern;

/// Longest file name accepted for injection, in UTF-16 units. Windows caps
/// components at 255; anything longer is skipped rather than truncated.
const MAX_NAME_UNITS: usize = 255;

/// Scratch space for uppercasing native record names without allocating.
const NAME_SCRATCH_LEN: usize = 2048;

/// The underlying `NtQueryDirectoryFile[Ex]` call slot.
pub trait NativeEnumerator {
    /// Write records of the agreed class into `buffer`. Returns the status
    /// and the number of bytes produced.
    fn query(
        &mut self,
        buffer: &mut [u8],
        restart_scan: bool,
        pattern: Option<&str>,
        return_single_entry: bool,
    ) -> (NtStatus, usize);
}

/// Per-call parameters lifted from the intercepted syscall.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationRequest<'a> {
    pub class: FileInformationClass,
    pub restart_scan: bool,
    /// Filter pattern from the caller, `None` to keep the previous one.
    pub pattern: Option<&'a str>,
    pub return_single_entry: bool,
}

/// Splice overlay entries into one enumeration call for `state`'s handle.
/// Returns the final status plus total bytes in `buffer`.
pub fn merge_enumeration(
    state: &mut HandleState,
    manager: &RedirectionManager,
    native: &mut dyn NativeEnumerator,
    metadata: &dyn MetadataProvider,
    buffer: &mut [u8],
    request: &EnumerationRequest,
) -> (NtStatus, usize) {
    // Classes without a name field cannot take injected entries.
    let Some(ops) = request.class.layout() else {
        return native.query(
            buffer,
            request.restart_scan,
            request.pattern,
            request.return_single_entry,
        );
    };

    if let Some(pattern) = request.pattern {
        mirage_core::path::with_uppercase(pattern, |upper| state.apply_filter(upper));
    }

    if state.items.is_none() {
        populate_items(state, manager);
    }

    let restart = request.restart_scan || state.force_restart_scan;
    if restart {
        state.force_restart_scan = false;
        rewind(state);
    }

    let (status, native_bytes) = native.query(
        buffer,
        restart,
        request.pattern,
        request.return_single_entry,
    );

    let native_exhausted = status == STATUS_NO_MORE_FILES || status == STATUS_NO_SUCH_FILE;
    if !status.is_success() && !native_exhausted {
        // UNDERLYING_NATIVE_ERROR: hand the status back verbatim.
        return (status, 0);
    }

    // Mark overlay names the filesystem reported natively so they are not
    // injected a second time.
    let mut write_pos = 0usize;
    let mut last_record: Option<usize> = None;
    if status.is_success() && native_bytes != 0 {
        let mut offset = 0usize;
        let mut scratch = [0u8; NAME_SCRATCH_LEN];
        loop {
            let record = buffer[offset..].as_ptr();
            // SAFETY: offsets walk the chain the native call just wrote.
            let (name_ptr, units) = unsafe { ops.name(record) };
            let units = unsafe { std::slice::from_raw_parts(name_ptr, units) };
            if let Some(name) = utf16_to_upper(units, &mut scratch) {
                if let Some(seen) = state.already_injected.get_mut(name) {
                    *seen = true;
                }
            }

            last_record = Some(offset);
            let next = unsafe { next_entry_offset(record) };
            if next == 0 {
                break;
            }
            offset += next as usize;
            if offset >= native_bytes {
                break;
            }
        }
        write_pos = align_to_record(native_bytes);
    }

    if request.return_single_entry && status.is_success() && native_bytes != 0 {
        // The caller asked for exactly one record and the filesystem
        // provided it; injection waits for the next call.
        return (status, native_bytes);
    }

    let injected = inject_pending(state, metadata, &ops, buffer, &mut write_pos, last_record, request);

    if injected > 0 {
        TELEMETRY.record_injected(injected as u64);
        return (STATUS_SUCCESS, write_pos);
    }
    if status.is_success() {
        return (status, native_bytes);
    }
    if native_exhausted && pending_remaining(state) {
        // Nothing fit: even a single overlay record overflows the buffer.
        return (STATUS_BUFFER_OVERFLOW, 0);
    }
    // Both layers exhausted: the native verdict stands.
    (status, 0)
}

/// First enumeration on this handle: pull the overlay file set for the
/// directory out of the lookup tree.
fn populate_items(state: &mut HandleState, manager: &RedirectionManager) {
    let (items, names): (Vec<InjectedItem>, Vec<Box<str>>) =
        manager.resolve_folder(&state.file_path, |folder| match folder {
            Some(files) => files
                .iter()
                .map(|(name, target)| {
                    (
                        InjectedItem {
                            target: target.clone(),
                        },
                        Box::from(name),
                    )
                })
                .unzip(),
            None => (Vec::new(), Vec::new()),
        });

    for name in names {
        state.already_injected.insert(name, false);
    }
    state.items = Some(items);
    tracing::debug!(
        path = %state.file_path,
        count = state.items.as_ref().map(Vec::len).unwrap_or(0),
        "populated overlay items for enumeration"
    );
}

/// Restart semantics: every overlay entry becomes injectable again.
fn rewind(state: &mut HandleState) {
    state.current_item = 0;
    let names: Vec<Box<str>> = state.already_injected.keys().map(Box::from).collect();
    state.already_injected.clear();
    for name in names {
        state.already_injected.insert(name, false);
    }
}

fn pending_remaining(state: &HandleState) -> bool {
    let Some(items) = state.items.as_ref() else {
        return false;
    };
    items[state.current_item.min(items.len())..].iter().any(|item| {
        !matches!(state.already_injected.get(item.name()), Some(true))
            && matches_pattern(&state.query_file_name, item.name())
    })
}

/// Append overlay records after the native batch. Returns how many were
/// written; `state.current_item` parks on the first entry that did not fit.
fn inject_pending(
    state: &mut HandleState,
    metadata: &dyn MetadataProvider,
    ops: &LayoutOps,
    buffer: &mut [u8],
    write_pos: &mut usize,
    mut last_record: Option<usize>,
    request: &EnumerationRequest,
) -> usize {
    let Some(items) = state.items.take() else {
        return 0;
    };

    let mut injected = 0usize;
    let mut name_units = [0u16; MAX_NAME_UNITS];

    while state.current_item < items.len() {
        let item = &items[state.current_item];
        let name = item.name();

        if matches!(state.already_injected.get(name), Some(true))
            || !matches_pattern(&state.query_file_name, name)
        {
            state.current_item += 1;
            continue;
        }

        let mut units = 0usize;
        let mut too_long = false;
        for unit in name.encode_utf16() {
            if units == MAX_NAME_UNITS {
                too_long = true;
                break;
            }
            name_units[units] = unit;
            units += 1;
        }
        if too_long {
            state.current_item += 1;
            continue;
        }

        let size = ops.record_size(units);
        if *write_pos + size > buffer.len() {
            // BUFFER_TOO_SMALL: park here, the caller comes back.
            break;
        }

        let meta = metadata
            .query(&item.source_path())
            .unwrap_or_else(|| FileMetadata::for_kind(item.target.is_directory));

        // SAFETY: bounds checked above; record slots never overlap.
        unsafe {
            let record = buffer[*write_pos..].as_mut_ptr();
            ops.write_record(record, &name_units[..units], &meta);
            if let Some(prev) = last_record {
                set_next_entry_offset(
                    buffer[prev..].as_mut_ptr(),
                    (*write_pos - prev) as u32,
                );
            }
        }

        if let Some(seen) = state.already_injected.get_mut(name) {
            *seen = true;
        }
        last_record = Some(*write_pos);
        *write_pos += size;
        state.current_item += 1;
        state.num_injected_items += 1;
        injected += 1;

        if request.return_single_entry {
            break;
        }
    }

    state.items = Some(items);
    injected
}

/// Decode a UTF-16 record name and uppercase it into `scratch`. Returns
/// `None` when the name does not fit; callers then skip dedup marking for
/// that record, which only matters for pathological names.
fn utf16_to_upper<'b>(units: &[u16], scratch: &'b mut [u8]) -> Option<&'b str> {
    let mut len = 0usize;
    for decoded in char::decode_utf16(units.iter().copied()) {
        let ch = decoded.unwrap_or(char::REPLACEMENT_CHARACTER);
        for upper in ch.to_uppercase() {
            let needed = upper.len_utf8();
            if len + needed > scratch.len() {
                return None;
            }
            upper.encode_utf8(&mut scratch[len..]);
            len += needed;
        }
    }
    // SAFETY: built from encode_utf8 above.
    Some(unsafe { std::str::from_utf8_unchecked(&scratch[..len]) })
}

/// Consult the lookup tree for the directory behind `path` and report
/// whether an enumeration there needs merging at all. Hooks use this to
/// skip handle registration for directories without overlay entries.
pub fn directory_has_overlay(manager: &RedirectionManager, path: &str) -> bool {
    manager.resolve_folder(path, |folder| folder.is_some_and(|f| !f.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_upper_roundtrip() {
        let units: Vec<u16> = "a.Bin".encode_utf16().collect();
        let mut scratch = [0u8; 64];
        assert_eq!(utf16_to_upper(&units, &mut scratch), Some("A.BIN"));
    }

    #[test]
    fn test_utf16_upper_rejects_overflow() {
        let units: Vec<u16> = "abc".encode_utf16().collect();
        let mut scratch = [0u8; 2];
        assert_eq!(utf16_to_upper(&units, &mut scratch), None);
    }
}

//! Layout adapter for the directory-information classes served by
//! `NtQueryDirectoryFile[Ex]`.
//!
//! The kernel writes (and the merger must write) chains of variable-length
//! records whose fixed header depends on the requested
//! `FILE_INFORMATION_CLASS`. Nine of the ten classes carry a file name and
//! can take injected entries; `FileObjectIdInformation` carries no name, so
//! enumerations using it pass through untouched. Dispatch is a plain match
//! on the class value into a table of offsets; no virtual calls.
//!
//! All offsets are derived from the `repr(C)` mirrors below, never written
//! as literals.

use std::mem::offset_of;

/// Seconds between the NT epoch (1601) and the Unix epoch (1970).
const NT_EPOCH_OFFSET_SECS: u64 = 11_644_473_600;

pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;
pub const FILE_ATTRIBUTE_NORMAL: u32 = 0x0000_0080;

/// Records in an enumeration buffer start on 8-byte boundaries.
#[inline]
pub fn align_to_record(len: usize) -> usize {
    (len + 7) & !7
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileInformationClass {
    FileDirectoryInformation = 1,
    FileFullDirectoryInformation = 2,
    FileBothDirectoryInformation = 3,
    FileNamesInformation = 12,
    FileObjectIdInformation = 29,
    FileIdBothDirectoryInformation = 37,
    FileIdFullDirectoryInformation = 38,
    FileIdGlobalTxDirectoryInformation = 50,
    FileIdExtdDirectoryInformation = 60,
    FileIdExtdBothDirectoryInformation = 63,
}

impl FileInformationClass {
    pub fn from_raw(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::FileDirectoryInformation,
            2 => Self::FileFullDirectoryInformation,
            3 => Self::FileBothDirectoryInformation,
            12 => Self::FileNamesInformation,
            29 => Self::FileObjectIdInformation,
            37 => Self::FileIdBothDirectoryInformation,
            38 => Self::FileIdFullDirectoryInformation,
            50 => Self::FileIdGlobalTxDirectoryInformation,
            60 => Self::FileIdExtdDirectoryInformation,
            63 => Self::FileIdExtdBothDirectoryInformation,
            _ => return None,
        })
    }

    /// Offset table for this class, `None` when the class carries no file
    /// name and therefore cannot take injected entries.
    pub fn layout(self) -> Option<LayoutOps> {
        macro_rules! ops {
            ($ty:ty, standard: $standard:expr, attrs: $attrs:expr, id: $id:expr) => {
                LayoutOps {
                    name_offset: offset_of!($ty, file_name),
                    name_length_offset: offset_of!($ty, file_name_length),
                    attributes_offset: $attrs,
                    file_id_offset: $id,
                    standard_header: $standard,
                }
            };
        }

        Some(match self {
            Self::FileDirectoryInformation => ops!(
                FileDirectoryInformation,
                standard: true,
                attrs: Some(offset_of!(FileDirectoryInformation, file_attributes)),
                id: None
            ),
            Self::FileFullDirectoryInformation => ops!(
                FileFullDirInformation,
                standard: true,
                attrs: Some(offset_of!(FileFullDirInformation, file_attributes)),
                id: None
            ),
            Self::FileBothDirectoryInformation => ops!(
                FileBothDirInformation,
                standard: true,
                attrs: Some(offset_of!(FileBothDirInformation, file_attributes)),
                id: None
            ),
            Self::FileNamesInformation => ops!(
                FileNamesInformation,
                standard: false,
                attrs: None,
                id: None
            ),
            Self::FileObjectIdInformation => return None,
            Self::FileIdBothDirectoryInformation => ops!(
                FileIdBothDirInformation,
                standard: true,
                attrs: Some(offset_of!(FileIdBothDirInformation, file_attributes)),
                id: Some(offset_of!(FileIdBothDirInformation, file_id))
            ),
            Self::FileIdFullDirectoryInformation => ops!(
                FileIdFullDirInformation,
                standard: true,
                attrs: Some(offset_of!(FileIdFullDirInformation, file_attributes)),
                id: Some(offset_of!(FileIdFullDirInformation, file_id))
            ),
            Self::FileIdGlobalTxDirectoryInformation => ops!(
                FileIdGlobalTxDirInformation,
                standard: true,
                attrs: Some(offset_of!(FileIdGlobalTxDirInformation, file_attributes)),
                id: Some(offset_of!(FileIdGlobalTxDirInformation, file_id))
            ),
            Self::FileIdExtdDirectoryInformation => ops!(
                FileIdExtdDirInformation,
                standard: true,
                attrs: Some(offset_of!(FileIdExtdDirInformation, file_attributes)),
                id: None
            ),
            Self::FileIdExtdBothDirectoryInformation => ops!(
                FileIdExtdBothDirInformation,
                standard: true,
                attrs: Some(offset_of!(FileIdExtdBothDirInformation, file_attributes)),
                id: None
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// repr(C) mirrors. Field order matches the NT definitions; offsets are taken
// from these, so they must not be reordered.
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct FileDirectoryInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct FileFullDirInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub ea_size: u32,
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct FileBothDirInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub ea_size: u32,
    pub short_name_length: i8,
    pub short_name: [u16; 12],
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct FileNamesInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub file_name_length: u32,
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct FileIdBothDirInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub ea_size: u32,
    pub short_name_length: i8,
    pub short_name: [u16; 12],
    pub file_id: i64,
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct FileIdFullDirInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub ea_size: u32,
    pub file_id: i64,
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

#[repr(C)]
pub struct FileIdGlobalTxDirInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub file_id: i64,
    pub locking_transaction_id: Guid,
    pub tx_info_flags: u32,
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct FileIdExtdDirInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub ea_size: u32,
    pub reparse_point_tag: u32,
    pub file_id: [u8; 16],
    pub file_name: [u16; 1],
}

#[repr(C)]
pub struct FileIdExtdBothDirInformation {
    pub next_entry_offset: u32,
    pub file_index: u32,
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_name_length: u32,
    pub ea_size: u32,
    pub reparse_point_tag: u32,
    pub file_id: [u8; 16],
    pub short_name_length: i8,
    pub short_name: [u16; 12],
    pub file_name: [u16; 1],
}

// Standard-header field offsets, shared by every class except
// FileNamesInformation. Verified against each mirror in the tests below.
const STD_CREATION_TIME: usize = offset_of!(FileDirectoryInformation, creation_time);
const STD_LAST_ACCESS: usize = offset_of!(FileDirectoryInformation, last_access_time);
const STD_LAST_WRITE: usize = offset_of!(FileDirectoryInformation, last_write_time);
const STD_CHANGE_TIME: usize = offset_of!(FileDirectoryInformation, change_time);
const STD_END_OF_FILE: usize = offset_of!(FileDirectoryInformation, end_of_file);
const STD_ALLOCATION: usize = offset_of!(FileDirectoryInformation, allocation_size);

/// Metadata for a synthesized record, fetched for the overlay file through
/// the underlying syscall (or defaulted when that fetch fails).
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMetadata {
    pub creation_time: i64,
    pub last_access_time: i64,
    pub last_write_time: i64,
    pub change_time: i64,
    pub end_of_file: i64,
    pub allocation_size: i64,
    pub file_attributes: u32,
    pub file_id: i64,
}

impl FileMetadata {
    /// Minimal metadata when the backing file cannot be queried.
    pub fn for_kind(is_directory: bool) -> Self {
        Self {
            file_attributes: if is_directory {
                FILE_ATTRIBUTE_DIRECTORY
            } else {
                FILE_ATTRIBUTE_NORMAL
            },
            ..Self::default()
        }
    }

    pub fn is_directory(&self) -> bool {
        self.file_attributes & FILE_ATTRIBUTE_DIRECTORY != 0
    }
}

/// Fetches metadata for overlay files backing injected records.
pub trait MetadataProvider {
    fn query(&self, path: &str) -> Option<FileMetadata>;
}

/// Queries the real filesystem. The production provider; tests substitute
/// an in-memory map.
pub struct FsMetadataProvider;

impl MetadataProvider for FsMetadataProvider {
    fn query(&self, path: &str) -> Option<FileMetadata> {
        let meta = std::fs::metadata(path).ok()?;
        let mtime = meta.modified().map(system_time_to_filetime).unwrap_or(0);
        let atime = meta.accessed().map(system_time_to_filetime).unwrap_or(0);
        let ctime = meta.created().map(system_time_to_filetime).unwrap_or(mtime);
        Some(FileMetadata {
            creation_time: ctime,
            last_access_time: atime,
            last_write_time: mtime,
            change_time: mtime,
            end_of_file: meta.len() as i64,
            allocation_size: (meta.len() as i64 + 4095) & !4095,
            file_attributes: if meta.is_dir() {
                FILE_ATTRIBUTE_DIRECTORY
            } else {
                FILE_ATTRIBUTE_NORMAL
            },
            file_id: 0,
        })
    }
}

/// `SystemTime` to FILETIME (100 ns ticks since 1601).
pub fn system_time_to_filetime(time: std::time::SystemTime) -> i64 {
    match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(since) => {
            let secs = since.as_secs() + NT_EPOCH_OFFSET_SECS;
            (secs as i64) * 10_000_000 + i64::from(since.subsec_nanos() / 100)
        }
        Err(_) => 0,
    }
}

/// Offset table for one directory-information class. All accessors take
/// raw record pointers into the enumeration buffer.
#[derive(Debug, Clone, Copy)]
pub struct LayoutOps {
    pub name_offset: usize,
    pub name_length_offset: usize,
    pub attributes_offset: Option<usize>,
    pub file_id_offset: Option<usize>,
    pub standard_header: bool,
}

#[inline]
unsafe fn read_u32(rec: *const u8, offset: usize) -> u32 {
    (rec.add(offset) as *const u32).read_unaligned()
}

#[inline]
unsafe fn write_u32(rec: *mut u8, offset: usize, value: u32) {
    (rec.add(offset) as *mut u32).write_unaligned(value);
}

#[inline]
unsafe fn write_i64(rec: *mut u8, offset: usize, value: i64) {
    (rec.add(offset) as *mut i64).write_unaligned(value);
}

/// `NextEntryOffset` sits at offset 0 in every class.
///
/// # Safety
/// `rec` must point at a readable record header.
#[inline]
pub unsafe fn next_entry_offset(rec: *const u8) -> u32 {
    read_u32(rec, 0)
}

/// # Safety
/// `rec` must point at a writable record header.
#[inline]
pub unsafe fn set_next_entry_offset(rec: *mut u8, value: u32) {
    write_u32(rec, 0, value);
}

impl LayoutOps {
    /// Total record size for a name of `name_units` UTF-16 units, padded to
    /// the 8-byte record alignment.
    pub fn record_size(&self, name_units: usize) -> usize {
        align_to_record(self.name_offset + name_units * 2)
    }

    /// Name field of an existing record, as (pointer, UTF-16 unit count).
    ///
    /// # Safety
    /// `rec` must point at a complete record of this layout.
    pub unsafe fn name(&self, rec: *const u8) -> (*const u16, usize) {
        let bytes = read_u32(rec, self.name_length_offset) as usize;
        (rec.add(self.name_offset) as *const u16, bytes / 2)
    }

    /// # Safety
    /// `rec` must point at a complete record of this layout, and the layout
    /// must carry attributes.
    pub unsafe fn file_attributes(&self, rec: *const u8) -> u32 {
        match self.attributes_offset {
            Some(offset) => read_u32(rec, offset),
            None => 0,
        }
    }

    /// Synthesize a full record: zeroed fixed header, metadata fields,
    /// name, terminating `NextEntryOffset` of zero.
    ///
    /// # Safety
    /// `rec` must have `record_size(name.len())` writable bytes.
    pub unsafe fn write_record(&self, rec: *mut u8, name: &[u16], meta: &FileMetadata) {
        std::ptr::write_bytes(rec, 0, self.record_size(name.len()));

        if self.standard_header {
            write_i64(rec, STD_CREATION_TIME, meta.creation_time);
            write_i64(rec, STD_LAST_ACCESS, meta.last_access_time);
            write_i64(rec, STD_LAST_WRITE, meta.last_write_time);
            write_i64(rec, STD_CHANGE_TIME, meta.change_time);
            write_i64(rec, STD_END_OF_FILE, meta.end_of_file);
            write_i64(rec, STD_ALLOCATION, meta.allocation_size);
        }
        if let Some(offset) = self.attributes_offset {
            write_u32(rec, offset, meta.file_attributes);
        }
        if let Some(offset) = self.file_id_offset {
            write_i64(rec, offset, meta.file_id);
        }

        write_u32(rec, self.name_length_offset, (name.len() * 2) as u32);
        std::ptr::copy_nonoverlapping(name.as_ptr(), rec.add(self.name_offset) as *mut u16, name.len());
    }
}

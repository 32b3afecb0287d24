//! Minimal NT boundary types.
//!
//! The OS owns the real definitions; the engine only needs the handful of
//! status codes it inspects, the UNICODE_STRING shape produced by
//! OBJECT_ATTRIBUTES parsing, and the device-prefix round trip. Everything
//! is defined here so the crate builds and tests on any host.

use mirage_core::path;

/// NTSTATUS value. Negative = failure, `0x8000_xxxx` = warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtStatus(pub i32);

pub const STATUS_SUCCESS: NtStatus = NtStatus(0);
pub const STATUS_BUFFER_OVERFLOW: NtStatus = NtStatus(0x8000_0005u32 as i32);
pub const STATUS_NO_MORE_FILES: NtStatus = NtStatus(0x8000_0006u32 as i32);
pub const STATUS_NO_SUCH_FILE: NtStatus = NtStatus(0xC000_000Fu32 as i32);
pub const STATUS_OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC000_0034u32 as i32);
pub const STATUS_OBJECT_PATH_NOT_FOUND: NtStatus = NtStatus(0xC000_003Au32 as i32);

impl NtStatus {
    /// NT_SUCCESS: severity bits 00 (success) or 01 (informational).
    #[inline]
    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Severity 10: the warning band, e.g. `STATUS_NO_MORE_FILES`.
    #[inline]
    pub fn is_warning(self) -> bool {
        (self.0 as u32) >> 30 == 0b10
    }

    /// Severity 11: hard failures.
    #[inline]
    pub fn is_error(self) -> bool {
        (self.0 as u32) >> 30 == 0b11
    }
}

/// A directory handle that failed to open natively may still exist inside
/// an overlay; the hook retries those with the redirected path.
#[inline]
pub fn directory_needs_fallback(status: NtStatus) -> bool {
    status == STATUS_OBJECT_NAME_NOT_FOUND || status == STATUS_OBJECT_PATH_NOT_FOUND
}

/// Counted UTF-16 string as embedded in OBJECT_ATTRIBUTES. `length` is in
/// bytes, not characters.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UnicodeString {
    pub length: u16,
    pub maximum_length: u16,
    pub buffer: *const u16,
}

impl UnicodeString {
    /// View the counted buffer as a UTF-16 slice.
    ///
    /// # Safety
    /// `buffer` must point at `length / 2` readable u16 units.
    pub unsafe fn as_slice(&self) -> &[u16] {
        if self.buffer.is_null() || self.length == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.buffer, usize::from(self.length) / 2)
    }

    /// Decode to an owned string, lossy on unpaired surrogates.
    ///
    /// # Safety
    /// Same contract as [`Self::as_slice`].
    pub unsafe fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_slice())
    }
}

/// Reapply the `\??\` device prefix when handing a redirected path back to
/// the syscall, matching whether the original carried it.
pub fn restore_prefix(original: &str, redirected: &str) -> String {
    if original.starts_with(path::NT_PREFIX) {
        path::with_nt_prefix(redirected)
    } else {
        redirected.to_string()
    }
}

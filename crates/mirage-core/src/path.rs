//! Path canonicalization for the redirect engine.
//!
//! Everything stored in the trees is uppercase, `\`-separated, and carries
//! no NT device prefix. The boundary strips `\??\` on the way in and
//! reapplies it on the way out; the engine itself never sees it.

/// Canonical separator. Windows NT paths use the backslash; forward
/// slashes are accepted from configuration and folded here.
pub const SEPARATOR: char = '\\';

/// NT device prefix as produced by object-attribute parsing.
pub const NT_PREFIX: &str = "\\??\\";

/// Inputs up to this many bytes are uppercased into a stack buffer on the
/// query path; longer inputs spill to the heap.
pub const STACK_PATH_LEN: usize = 512;

/// Strip the NT device prefix, if present.
#[inline]
pub fn strip_nt_prefix(path: &str) -> &str {
    path.strip_prefix(NT_PREFIX).unwrap_or(path)
}

/// Reapply the NT device prefix for a path handed back to the syscall.
pub fn with_nt_prefix(path: &str) -> String {
    let mut out = String::with_capacity(NT_PREFIX.len() + path.len());
    out.push_str(NT_PREFIX);
    out.push_str(path);
    out
}

/// Canonicalize a configuration-supplied path: fold separators, strip the
/// NT prefix, uppercase with invariant folding, drop any trailing
/// separator. Allocation is fine here; this runs at configuration time.
pub fn normalize(path: &str) -> String {
    let path = strip_nt_prefix(path);
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch == '/' || ch == SEPARATOR {
            out.push(SEPARATOR);
        } else {
            for upper in ch.to_uppercase() {
                out.push(upper);
            }
        }
    }
    while out.ends_with(SEPARATOR) {
        out.pop();
    }
    out
}

/// Run `f` over an uppercased copy of `path` without touching the heap for
/// inputs that fit the stack buffer. ASCII inputs map byte-for-byte; the
/// rare non-ASCII or oversized path takes the owned fallback.
#[inline]
pub fn with_uppercase<R>(path: &str, f: impl FnOnce(&str) -> R) -> R {
    let bytes = path.as_bytes();
    if bytes.len() <= STACK_PATH_LEN && path.is_ascii() {
        let mut buf = [0u8; STACK_PATH_LEN];
        for (dst, &src) in buf.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
        // SAFETY: ASCII uppercased in place is still valid UTF-8.
        let upper = unsafe { std::str::from_utf8_unchecked(&buf[..bytes.len()]) };
        f(upper)
    } else {
        f(&path.to_uppercase())
    }
}

/// Split an uppercase path at the final separator into (directory, file
/// name). Returns `None` when the path has no separator.
#[inline]
pub fn split_file_name(path: &str) -> Option<(&str, &str)> {
    let sep = path.rfind(SEPARATOR)?;
    Some((&path[..sep], &path[sep + 1..]))
}

/// Join an uppercase directory and a relative tail, skipping the separator
/// when either side is empty.
pub fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        return rest.to_string();
    }
    if rest.is_empty() {
        return dir.to_string();
    }
    let mut out = String::with_capacity(dir.len() + 1 + rest.len());
    out.push_str(dir);
    out.push(SEPARATOR);
    out.push_str(rest);
    out
}

//! # mirage-hooks
//!
//! Syscall-boundary layer for the Mirage redirector: everything the NT
//! detours need between "the hook fired" and "call the original".
//!
//! The hook *installation* (trampolines, detour tables) belongs to the
//! host; this crate supplies the decision core and all per-handle state:
//!
//! - per-family recursion guards that turn nested hook entries into plain
//!   passthroughs ([`guard`]),
//! - the fixed-capacity closed-handle queue written from the close
//!   interceptor and drained by normal hook entries ([`close_queue`]),
//! - merger state per open directory handle ([`handles`]),
//! - the enumeration splicer and its `FILE_*_DIR_INFORMATION` layout
//!   adapter ([`merger`], [`dir_info`]),
//! - redirect dispositions for the open/create families ([`resolve`]).
//!
//! Nothing in here waits, and every failure path resolves to "call the
//! original syscall unchanged".

pub mod close_queue;
pub mod dir_info;
pub mod guard;
pub mod handles;
pub mod merger;
pub mod nt;
pub mod resolve;
pub mod telemetry;
pub mod wildcard;

pub use close_queue::{ClosedHandleQueue, CLOSE_QUEUE};
pub use dir_info::{FileInformationClass, FileMetadata, FsMetadataProvider, MetadataProvider};
pub use guard::{HookGuards, ReentrancyGuard, GUARDS};
pub use handles::{HandleRegistry, HandleState, InjectedItem};
pub use merger::{merge_enumeration, EnumerationRequest, NativeEnumerator};
pub use nt::NtStatus;
pub use resolve::{
    register_directory_handle, resolve_directory_fallback, resolve_open, OpenDisposition,
};
pub use telemetry::{Telemetry, TelemetrySnapshot, TELEMETRY};

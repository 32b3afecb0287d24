//! # mirage-core
//!
//! Path-resolution engine for the Mirage per-process file redirector.
//!
//! Given an absolute uppercase NT path, the engine decides in near-constant
//! time whether the path should be served from an overlay folder instead of
//! the base game folder. Configuration builds a per-segment trie
//! ([`RedirectionTree`]); [`RedirectionManager::optimise`] compiles it into
//! the flat, cache-friendly [`LookupTree`] consulted on every intercepted
//! syscall. The hot path is allocation-free for inputs up to
//! [`path::STACK_PATH_LEN`] bytes.
//!
//! Nothing here touches the hooked syscalls themselves; that boundary lives
//! in `mirage-hooks`.

pub mod error;
pub mod events;
pub mod folder;
pub mod lookup;
pub mod manager;
pub mod path;
pub mod pool;
pub mod scanner;
pub mod span_dict;
pub mod tree;

pub use error::RedirectError;
pub use events::EventSinks;
pub use folder::FolderRedirection;
pub use lookup::LookupTree;
pub use manager::{FileRedirection, RedirectionManager};
pub use span_dict::SpanDict;
pub use tree::{RedirectionTree, RedirectTarget};

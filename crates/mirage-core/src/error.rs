//! Error taxonomy for the engine's configuration surface.
//!
//! The query path never returns errors: a miss is a plain `None` and the
//! hook layer falls back to the original syscall.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    /// The overlay folder named in a redirect does not exist on disk.
    #[error("overlay folder does not exist: {0}")]
    MissingOverlay(PathBuf),

    /// Walking an overlay folder failed partway through.
    #[error("failed to scan overlay {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A redirect was given a relative or empty path.
    #[error("redirect path is not absolute: {0}")]
    NotAbsolute(String),
}

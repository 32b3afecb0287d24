//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - A throwaway base (game) directory
//! - Any number of overlay (mod) directories
//!
//! # Usage
//!
//! ```ignore
//! use mirage_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     let overlay = env.create_overlay("my-mod").unwrap();
//!     env.create_overlay_file("my-mod", "a.bin", b"data").unwrap();
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with a base directory and overlay directories
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// The base "game" directory
    pub base_dir: PathBuf,
    /// Root under which overlays are created
    pub overlays_dir: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let base_dir = root.join("game");
        let overlays_dir = root.join("overlays");
        std::fs::create_dir_all(&base_dir)?;
        std::fs::create_dir_all(&overlays_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            base_dir,
            overlays_dir,
            test_id,
        })
    }

    /// Create an empty overlay directory
    pub fn create_overlay(&self, name: &str) -> anyhow::Result<PathBuf> {
        let path = self.overlays_dir.join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Create a file inside an overlay, with parent directories as needed
    pub fn create_overlay_file(
        &self,
        overlay: &str,
        relative_path: &str,
        content: &[u8],
    ) -> anyhow::Result<PathBuf> {
        let path = self.overlays_dir.join(overlay).join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Create a file inside the base directory
    pub fn create_base_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.base_dir.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Environment variables describing this setup, via the same bridge
    /// production code uses.
    pub fn hook_env(&self, overlay: &str) -> Vec<(String, String)> {
        let mut cfg = crate::Config::default();
        cfg.redirector.base_folder = self.base_dir.clone();
        cfg.overlays.push(crate::OverlayConfig {
            source: self.base_dir.clone(),
            target: self.overlays_dir.join(overlay),
        });
        cfg.hook_env()
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

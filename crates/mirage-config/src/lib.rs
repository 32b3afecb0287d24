//! # mirage-config
//!
//! Configuration management for Mirage.
//!
//! Loads configuration from:
//! 1. `~/.mirage/config.toml` (global)
//! 2. `<game dir>/.mirage/config.toml` (per-game, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| {
    RwLock::new(Config::load().unwrap_or_else(|e| {
        eprintln!(
            "[mirage-config] WARNING: Failed to load config: {}. Using defaults.",
            e
        );
        Config::default()
    }))
});

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap()
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap() = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Current config schema version
pub const CONFIG_VERSION: u32 = 1;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Config schema version (for forward compatibility)
    pub config_version: u32,
    pub redirector: RedirectorConfig,
    pub overlays: Vec<OverlayConfig>,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            redirector: RedirectorConfig::default(),
            overlays: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load config from standard locations (CWD-relative game config)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_for_game(Path::new("."))
    }

    /// Load config for a specific game root directory.
    /// Resolution order: global → game → env vars.
    pub fn load_for_game(game_root: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Load global config (~/.mirage/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(&global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        // 2. Load game config (<game_root>/.mirage/config.toml)
        let game_config_path = game_root.join(".mirage/config.toml");
        if game_config_path.exists() {
            debug!("Loading game config from {:?}", game_config_path);
            let contents = std::fs::read_to_string(&game_config_path)?;
            let game_config: Config = toml::from_str(&contents)?;
            config.merge(game_config);
        }

        // 3. Apply environment variable overrides
        config.apply_env_overrides();

        // 4. Resolve base folder to absolute path if left at the default
        if config.redirector.base_folder.as_os_str() == "." {
            if let Ok(abs) = std::fs::canonicalize(game_root) {
                config.redirector.base_folder = abs;
            } else {
                config.redirector.base_folder = game_root.to_path_buf();
            }
        }

        Ok(config)
    }

    /// Global config path: ~/.mirage/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".mirage/config.toml"))
    }

    /// Merge another config (game overrides global).
    /// Non-default values from `other` replace values in `self`.
    fn merge(&mut self, other: Config) {
        let default_redirector = RedirectorConfig::default();
        if other.redirector.base_folder != default_redirector.base_folder {
            self.redirector.base_folder = other.redirector.base_folder;
        }
        if other.redirector.optimise_on_start != default_redirector.optimise_on_start {
            self.redirector.optimise_on_start = other.redirector.optimise_on_start;
        }
        if other.redirector.emit_events != default_redirector.emit_events {
            self.redirector.emit_events = other.redirector.emit_events;
        }

        if !other.overlays.is_empty() {
            self.overlays = other.overlays;
        }

        let default_logging = LoggingConfig::default();
        if other.logging.level != default_logging.level {
            self.logging.level = other.logging.level;
        }
        if other.logging.log_dir != default_logging.log_dir {
            self.logging.log_dir = other.logging.log_dir;
        }
    }

    /// Apply environment variable overrides (highest priority)
    fn apply_env_overrides(&mut self) {
        if let Ok(base) = std::env::var("MIRAGE_BASE_FOLDER") {
            self.redirector.base_folder = PathBuf::from(base);
        }
        if let Ok(optimise) = std::env::var("MIRAGE_OPTIMISE_ON_START") {
            self.redirector.optimise_on_start = optimise == "1" || optimise == "true";
        }
        if std::env::var("MIRAGE_EMIT_EVENTS").is_ok() {
            self.redirector.emit_events = true;
        }

        // MIRAGE_OVERLAYS="C:\game\data>C:\mods\a;C:\game\data>C:\mods\b"
        if let Ok(spec) = std::env::var("MIRAGE_OVERLAYS") {
            let parsed: Vec<OverlayConfig> = spec
                .split(';')
                .filter_map(|pair| {
                    let (source, target) = pair.split_once('>')?;
                    Some(OverlayConfig {
                        source: PathBuf::from(source),
                        target: PathBuf::from(target),
                    })
                })
                .collect();
            if !parsed.is_empty() {
                self.overlays = parsed;
            }
        }

        if let Ok(level) = std::env::var("MIRAGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(dir) = std::env::var("MIRAGE_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
    }

    /// Derive environment variables for the injected process.
    /// This is the SSOT → hooks bridge: TOML config → env vars.
    pub fn hook_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            (
                "MIRAGE_BASE_FOLDER".to_string(),
                self.redirector.base_folder.display().to_string(),
            ),
            (
                "MIRAGE_LOG_LEVEL".to_string(),
                self.logging.level.clone(),
            ),
        ];
        if !self.overlays.is_empty() {
            let spec = self
                .overlays
                .iter()
                .map(|o| format!("{}>{}", o.source.display(), o.target.display()))
                .collect::<Vec<_>>()
                .join(";");
            env.push(("MIRAGE_OVERLAYS".to_string(), spec));
        }
        if self.redirector.optimise_on_start {
            env.push(("MIRAGE_OPTIMISE_ON_START".to_string(), "1".to_string()));
        }
        if self.redirector.emit_events {
            env.push(("MIRAGE_EMIT_EVENTS".to_string(), "1".to_string()));
        }
        env
    }

    /// Generate TOML template for `mirage init`.
    pub fn init_toml() -> String {
        let default = Config::default();
        format!(
            r#"# Mirage redirector configuration
config_version = 1

[redirector]
base_folder = "{base_folder}"
# optimise_on_start = true
# emit_events = false

# [[overlays]]
# source = 'C:\game\data'
# target = 'C:\mods\my-mod'

[logging]
level = "{level}"
# log_dir = 'C:\mirage\logs'
"#,
            base_folder = default.redirector.base_folder.display(),
            level = default.logging.level,
        )
    }

    // ========== Convenience Accessors ==========

    /// Base (game) folder the overlays layer over
    pub fn base_folder(&self) -> &Path {
        &self.redirector.base_folder
    }

    /// Check if the engine compiles the lookup tree at attach time
    pub fn optimise_on_start(&self) -> bool {
        self.redirector.optimise_on_start
    }

    /// Directory for the rotating hook-layer log
    pub fn log_dir(&self) -> &Path {
        &self.logging.log_dir
    }
}

/// Redirector behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedirectorConfig {
    /// Game folder the overlays apply to (auto-resolved to absolute path)
    pub base_folder: PathBuf,
    /// Compile the lookup tree immediately after applying configured
    /// overlays instead of waiting for an explicit optimise call
    pub optimise_on_start: bool,
    /// Fire redirect/load event callbacks
    pub emit_events: bool,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self {
            base_folder: PathBuf::from("."),
            optimise_on_start: true,
            emit_events: false,
        }
    }
}

/// One configured overlay pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayConfig {
    /// Directory inside the game that gets overlaid
    pub source: PathBuf,
    /// Mod directory whose contents replace it
    pub target: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// error | warn | info | debug | trace
    pub level: String,
    /// Directory for log files
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: std::env::temp_dir(),
        }
    }
}

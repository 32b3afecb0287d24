//! Structured logging utilities for Mirage components.
//!
//! Provides consistent logging with component prefixes and structured
//! fields.
//!
//! # Usage
//!
//! ```ignore
//! use mirage_config::logging::*;
//!
//! log_engine_info!("Lookup tree compiled", subfolders = 42);
//! log_hooks_debug!("Redirecting open", path = "C:\\GAME\\DATA\\A.BIN");
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const ENGINE: &'static str = "ENGINE";
    pub const HOOKS: &'static str = "HOOKS";
    pub const SCAN: &'static str = "SCAN";
    pub const ENUM: &'static str = "ENUM";
    pub const CONFIG: &'static str = "CONFIG";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse the `[logging].level` config string, defaulting to `Info`.
    pub fn from_config(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }
}

// === ENGINE logging macros ===

#[macro_export]
macro_rules! log_engine_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "ENGINE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_engine_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "ENGINE", $($key = $value,)* $msg)
    };
}

// === HOOKS logging macros ===

#[macro_export]
macro_rules! log_hooks_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "HOOKS", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_hooks_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "HOOKS", $($key = $value,)* $msg)
    };
}

// === SCAN logging macros ===

#[macro_export]
macro_rules! log_scan_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "SCAN", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_scan_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "SCAN", $($key = $value,)* $msg)
    };
}

// === ENUM logging macros ===

#[macro_export]
macro_rules! log_enum_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "ENUM", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at host startup, never from a hook.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

//! Bootstrap configuration loading and config-file discovery
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The first two tiers are handled by the binary's argument parser; this module
//! owns the TOML tier and the helper that merges the tiers.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ALBUMPROC_CONFIG";

/// TOML bootstrap configuration
///
/// Every field is optional; a missing key falls through to the compiled default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Directory scanned for archives
    pub archive_dir: Option<PathBuf>,
    /// Scratch extraction area
    pub scratch_dir: Option<PathBuf>,
    /// Root that completed album directories are promoted into
    pub processed_dir: Option<PathBuf>,
    /// Directory holding the structured ledgers and the log file
    pub state_dir: Option<PathBuf>,
    pub audio_workers: Option<usize>,
    pub ocr_workers: Option<usize>,
    pub ocr_enabled: Option<bool>,
    pub ocr_lang: Option<String>,
    pub cleanup_on_failure: Option<bool>,
    pub retry_failed: Option<bool>,
    /// Lower bound for the free-space requirement, in bytes
    pub min_free_bytes: Option<u64>,
    /// Embedded PDF text shorter than this (non-whitespace chars) falls back to OCR
    pub min_text_chars: Option<usize>,
    pub transcode_timeout_secs: Option<u64>,
    pub ocr_timeout_secs: Option<u64>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (defaults to `albumproc.log` in the state directory)
    pub file: Option<PathBuf>,

    /// Rotate once the active file reaches this many bytes
    pub max_bytes: u64,

    /// Number of rotated files kept next to the active one
    pub backups: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_bytes: 5_000_000,
            backups: 3,
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Locate the config file to use, if any
///
/// An explicit path (CLI or `ALBUMPROC_CONFIG`) must exist; otherwise the
/// per-user and system locations are tried and silently skipped when absent.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(Error::Config(format!(
            "{} points to a missing file: {}",
            CONFIG_ENV_VAR,
            path.display()
        )));
    }

    let user_config = dirs::config_dir().map(|d| d.join("albumproc").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/albumproc/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    Ok(None)
}

/// Load the TOML tier, degrading to defaults when no file is found
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config_file(explicit)? {
        Some(path) => {
            tracing::debug!(config = %path.display(), "Loading TOML config");
            load_toml_config(&path)
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Merge one setting across tiers: CLI/ENV value, then TOML value, then default
pub fn resolve<T>(cli_or_env: Option<T>, toml_value: Option<T>, default: impl FnOnce() -> T) -> T {
    cli_or_env.or(toml_value).unwrap_or_else(default)
}

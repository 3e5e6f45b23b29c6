//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXCRAFT_CONFIG` (environment variable)
//! 2. `~/.config/mboxcraft/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxcraft\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::archive::DEFAULT_FALLBACK_ENCODING;
use crate::partition::{DateGranularity, UndatedPolicy};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Archive decoding.
    pub reader: ReaderConfig,
    /// MBOX wire format options.
    pub mbox: MboxConfig,
    /// Defaults for the `split` command.
    pub split: SplitConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Archive decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Single-byte encoding tried when an archive is not valid UTF-8.
    pub fallback_encoding: String,
}

/// MBOX wire format options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MboxConfig {
    /// Quote `From ` body lines on write and unquote them on read (mboxrd).
    pub escape_from_lines: bool,
}

/// Defaults for the `split` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Messages per file for count splitting.
    pub default_count: usize,
    /// Size cap per file for size splitting.
    pub default_max_bytes: u64,
    /// Bucket width for date splitting.
    pub date_granularity: DateGranularity,
    /// Handling of messages without a parsed date.
    pub undated: UndatedPolicy,
    /// Domains for domain splitting, first match wins.
    pub domains: Vec<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            fallback_encoding: DEFAULT_FALLBACK_ENCODING.to_string(),
        }
    }
}

impl Default for MboxConfig {
    fn default() -> Self {
        Self {
            escape_from_lines: true,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            default_count: 1000,
            default_max_bytes: 50 * 1024 * 1024, // 50 MB
            date_granularity: DateGranularity::Month,
            undated: UndatedPolicy::Drop,
            domains: Vec::new(),
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXCRAFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxcraft").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxcraft")
}

//! Configuration module for the derived-telemetry engine
//!
//! This module handles engine configuration:
//! - Loading and saving the TOML configuration file
//! - Locating the per-user configuration directory
//! - Validating settings before the registry is built
//!
//! # Config Location
//!
//! When no explicit path is given the configuration is read from the
//! platform-appropriate config directory under `derived-tlm`:
//! - **Linux**: `~/.config/derived-tlm/config.toml`
//! - **macOS**: `~/Library/Application Support/derived-tlm/config.toml`
//! - **Windows**: `%APPDATA%\derived-tlm\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use derived_tlm::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default(None);
//! assert_eq!(config.clean.median_window, 7);
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, TlmError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "derived-tlm";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

// ==================== Config Directory ====================

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Engine Config ====================

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Version for future migration support
    pub version: u32,
    /// Statistics aggregation
    pub stats: StatsSettings,
    /// Valve-temperature cleaning
    pub clean: CleanSettings,
    /// Fetch padding
    pub padding: PaddingSettings,
    /// Mode segmentation
    pub modes: ModeSettings,
    /// Memoizing caches
    pub cache: CacheSettings,
    /// Default output units
    pub units: UnitSettings,
    /// Query worker pool
    pub service: ServiceSettings,
    /// Logging
    pub logging: LoggingSettings,
    /// Expression-defined channels
    pub script_channels: Vec<ScriptChannel>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            stats: StatsSettings::default(),
            clean: CleanSettings::default(),
            padding: PaddingSettings::default(),
            modes: ModeSettings::default(),
            cache: CacheSettings::default(),
            units: UnitSettings::default(),
            service: ServiceSettings::default(),
            logging: LoggingSettings::default(),
            script_channels: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TlmError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            TlmError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TlmError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TlmError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TlmError::Config(format!("Failed to write config: {}", e)))
    }

    /// Check settings that would otherwise fail deep inside a computation
    pub fn validate(&self) -> Result<()> {
        let stats = &self.stats;
        if !(stats.short_dt > 0.0 && stats.daily_dt > 0.0) {
            return Err(TlmError::Config(
                "stat interval widths must be positive".to_string(),
            ));
        }
        if !(stats.min_weight > 0.0 && stats.min_weight <= stats.max_weight) {
            return Err(TlmError::Config(format!(
                "invalid weight clamp [{}, {}]",
                stats.min_weight, stats.max_weight
            )));
        }
        if self.clean.median_window > 1 && self.clean.median_window % 2 == 0 {
            return Err(TlmError::Config(format!(
                "median window must be odd, got {}",
                self.clean.median_window
            )));
        }
        if self.clean.tolerance <= 0.0 {
            return Err(TlmError::Config(
                "clean tolerance must be positive".to_string(),
            ));
        }
        if self.service.workers == 0 {
            return Err(TlmError::Config(
                "service needs at least one worker".to_string(),
            ));
        }
        for channel in &self.script_channels {
            if channel.inputs.is_empty() {
                return Err(TlmError::Config(format!(
                    "script channel '{}' has no inputs",
                    channel.name
                )));
            }
        }
        Ok(())
    }
}

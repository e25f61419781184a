//! Configuration management for the ghlines CLI.
//!
//! Configuration is loaded from `~/.config/ghlines/config.toml` (or the
//! platform equivalent) unless `--config` names another file. Resolver
//! settings can then be overridden by `GHLINES_*` environment variables and
//! finally by command line flags.

use anyhow::{Context, Result};
use ghlines_core::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Caller-side display policy, applied after the core has resolved a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Refuse to display more lines than this across one message.
    pub max_lines: u64,
    /// Refuse to display output of this many characters or more.
    pub max_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_lines: 50,
            max_chars: 2000,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub limits: LimitsConfig,
}

impl Config {
    /// Load from `explicit`, or from the default location if present.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file just means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Ok(Config::default())
                }
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Default config file location.
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ghlines").join("config.toml"))
    }
}

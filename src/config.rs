//! TOML configuration.
//!
//! A missing file yields defaults; an unreadable or malformed file is an
//! error that names the path.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::{RenderOptions, ValidateOptions};

/// Default tracing filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "odata_query=info";

/// Loaded configuration.
#[derive(Debug, Default)]
pub struct Config {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl Config {
    /// Loads `explicit`, or the default path when `None`.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        Ok(Self { path, data })
    }

    /// Parses configuration text directly.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let data = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self { path: None, data })
    }

    /// Path the configuration was (or would be) read from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Tracing filter directive.
    pub fn log_filter(&self) -> &str {
        self.data.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Rendering switches.
    pub fn render(&self) -> RenderOptions {
        self.data.render
    }

    /// Validation limits.
    pub fn validation(&self) -> ValidateOptions {
        self.data.validation
    }

    /// Schema used when a command is given none.
    pub fn default_schema(&self) -> Option<&Path> {
        self.data.schema.default_path.as_deref()
    }

    /// Writes the configuration back to its path, creating parent directories.
    pub fn persist(&self) -> Result<PathBuf, ConfigError> {
        let target = match &self.path {
            Some(path) => path.clone(),
            None => default_config_path().ok_or(ConfigError::NoConfigPath)?,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = toml::to_string_pretty(&self.data)
            .map_err(|source| ConfigError::Serialize { source })?;
        fs::write(&target, serialized).map_err(|source| ConfigError::Write {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_filter: Option<String>,
    #[serde(default)]
    render: RenderOptions,
    #[serde(default)]
    validation: ValidateOptions,
    #[serde(default)]
    schema: SchemaSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct SchemaSection {
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    default_path: Option<PathBuf>,
}

/// Configuration load or save failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// The configuration could not be serialized.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying TOML error.
        source: toml::ser::Error,
    },
    /// The file could not be written.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The parent directory could not be created.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// No platform config directory exists and no path was given.
    #[error("no config directory found; pass --config or set ODATAQ_CONFIG")]
    NoConfigPath,
}

/// `<config dir>/odataq/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("odataq").join("config.toml"))
}

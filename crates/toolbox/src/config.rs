//! Configuration management for the toolbox server.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/toolbox/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
///
/// Alias registry failures live here too: a bad alias table is a
/// configuration problem and the server must refuse to start.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("duplicate server_path '{0}'")]
    DuplicateAlias(String),

    #[error("local_path '{0}' does not exist")]
    MissingLocalPath(PathBuf),

    #[error("local_path '{0}' is outside the alias root")]
    AliasOutsideRoot(PathBuf),

    #[error("server_path '{0}' would shadow the served directory root")]
    InvalidServerPath(String),

    #[error("local_path '{0}' is neither a file nor a directory")]
    UnsupportedAliasTarget(PathBuf),

    #[error("invalid alias file {path}: {reason}")]
    InvalidAliasFile { path: PathBuf, reason: String },

    #[error("port must be greater than 0, got {0}")]
    InvalidPort(u16),

    #[error("default_lport must be greater than 0, got {0}")]
    InvalidPayloadPort(u16),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the toolbox server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP listener configuration.
    pub server: ServerConfig,

    /// Served directory and alias configuration.
    pub files: FilesConfig,

    /// Payload template configuration.
    pub payloads: PayloadConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind on.
    pub host: String,

    /// Port to bind on.
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Served directory and alias configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Root of the generic served directory tree.
    pub serve_directory: PathBuf,

    /// Base directory relative alias `local_path`s are joined onto.
    pub alias_root: PathBuf,

    /// Optional JSON alias file (`{"server": [{"server_path", "local_path"}]}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_file: Option<PathBuf>,

    /// Inline alias records.
    pub aliases: Vec<AliasConfig>,
}

/// A single alias record as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasConfig {
    /// Virtual path the alias is exposed under.
    pub server_path: String,

    /// Local path, relative to the alias root.
    pub local_path: PathBuf,
}

impl AliasConfig {
    /// Create a new alias record.
    pub fn new(server_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            server_path: server_path.into(),
            local_path: local_path.into(),
        }
    }
}

/// Payload template configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PayloadConfig {
    /// Host substituted into payloads when the request gives none.
    pub default_lhost: String,

    /// Port substituted into payloads when the request gives none.
    pub default_lport: u16,

    /// Directory of additional templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            serve_directory: PathBuf::from("."),
            alias_root: PathBuf::from("."),
            alias_file: None,
            aliases: Vec::new(),
        }
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            default_lhost: "127.0.0.1".to_string(),
            default_lport: 4444,
            template_dir: None,
        }
    }
}

/// Legacy JSON alias file layout.
#[derive(Debug, Deserialize)]
struct AliasFile {
    server: Vec<AliasConfig>,
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolbox")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - TOOLBOX_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - TOOLBOX_SERVE_DIRECTORY: Override the served directory
    /// - TOOLBOX_DEFAULT_LHOST: Override the default payload host
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("TOOLBOX_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.server.log_level = level;
            }
        }

        if let Ok(dir) = std::env::var("TOOLBOX_SERVE_DIRECTORY") {
            if !dir.is_empty() {
                tracing::info!("Overriding serve_directory from environment: {}", dir);
                self.files.serve_directory = PathBuf::from(dir);
            }
        }

        if let Ok(lhost) = std::env::var("TOOLBOX_DEFAULT_LHOST") {
            if !lhost.is_empty() {
                tracing::info!("Overriding default_lhost from environment: {}", lhost);
                self.payloads.default_lhost = lhost;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Alias records are not checked here; `AliasRegistry::load` owns that.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if self.payloads.default_lport == 0 {
            return Err(ConfigError::InvalidPayloadPort(self.payloads.default_lport));
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        Ok(())
    }

    /// Collect every alias record: the alias file's records first, then the
    /// inline ones. Duplicates are left for the registry to reject.
    pub fn alias_records(&self) -> Result<Vec<AliasConfig>, ConfigError> {
        let mut records = match &self.files.alias_file {
            Some(path) => read_alias_file(path)?,
            None => Vec::new(),
        };
        records.extend(self.files.aliases.iter().cloned());
        Ok(records)
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

fn read_alias_file(path: &Path) -> Result<Vec<AliasConfig>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAliasFile {
        path: path.to_path_buf(),
        reason,
    };

    let contents = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let file: AliasFile = serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;
    Ok(file.server)
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

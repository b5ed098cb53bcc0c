//! Configuration management for mailgate.
//!
//! This module handles loading configuration from TOML files and
//! environment variables, with sensible defaults for all settings.

use crate::core::error::{MailgateError, Result};
use crate::core::xdg::XdgDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// notmuch database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Location of the notmuch database
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// notmuch executable, looked up on PATH when not absolute
    #[serde(default = "default_notmuch_bin")]
    pub notmuch_bin: PathBuf,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Filter directives used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    PathBuf::from("/mail")
}

fn default_notmuch_bin() -> PathBuf {
    PathBuf::from("notmuch")
}

fn default_log_filter() -> String {
    "mailgate=info,tower_http=debug".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            notmuch_bin: default_notmuch_bin(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| MailgateError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load config with priority: env vars > TOML > defaults
    ///
    /// Priority order for the file:
    /// 1. `explicit` (command-line flag)
    /// 2. MAILGATE_CONFIG env var
    /// 3. XDG config file (~/.config/mailgate/config.toml)
    /// 4. ./mailgate.toml
    /// 5. Defaults
    ///
    /// Not validated: command-line overrides still apply on top, so the
    /// caller runs [`Config::validate`] once they are merged.
    pub fn load_with_xdg(xdg: &XdgDirs, explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Ok(config_path) = env::var("MAILGATE_CONFIG") {
            Self::from_file(config_path)?
        } else {
            let xdg_config = xdg.config_file();
            if xdg_config.exists() {
                Self::from_file(xdg_config)?
            } else if Path::new("mailgate.toml").exists() {
                Self::from_file("mailgate.toml")?
            } else {
                Self::default()
            }
        };

        config.merge_env();

        Ok(config)
    }

    /// Merge configuration with environment variables
    pub fn merge_env(&mut self) {
        // Database configuration
        if let Ok(path) = env::var("NOTMUCH_DATABASE") {
            if !path.is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }
        if let Ok(bin) = env::var("MAILGATE_NOTMUCH_BIN") {
            if !bin.is_empty() {
                self.database.notmuch_bin = PathBuf::from(bin);
            }
        }

        // Server configuration
        if let Ok(host) = env::var("MAILGATE_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        for var in ["PORT", "MAILGATE_PORT"] {
            if let Ok(port) = env::var(var) {
                if let Ok(p) = port.parse() {
                    self.server.port = p;
                }
            }
        }

        // Logging configuration
        if let Ok(format) = env::var("MAILGATE_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "text" => self.logging.format = LogFormat::Text,
                _ => {}
            }
        }
    }

    /// Apply command-line overrides, which beat file and environment
    pub fn merge_overrides(
        &mut self,
        host: Option<String>,
        port: Option<u16>,
        database: Option<PathBuf>,
    ) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(database) = database {
            self.database.path = database;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(MailgateError::ConfigError(
                "Server host must be non-empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(MailgateError::ConfigError(
                "Server port must be non-zero".to_string(),
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(MailgateError::ConfigError(
                "Database path must be non-empty".to_string(),
            ));
        }

        if self.database.notmuch_bin.as_os_str().is_empty() {
            return Err(MailgateError::ConfigError(
                "notmuch binary must be non-empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Log configuration
    pub fn log_config(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen: {}:{}", self.server.host, self.server.port);
        tracing::info!("  Database: {:?}", self.database.path);
        tracing::info!("  notmuch binary: {:?}", self.database.notmuch_bin);
        tracing::info!("  Log format: {:?}", self.logging.format);
    }
}

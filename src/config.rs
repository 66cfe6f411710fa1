//! Configuration loading and management.

use crate::db::DEFAULT_UTC_OFFSET_MINUTES;
use crate::identifier::offset_from_minutes;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the project config file.
pub const DEFAULT_CONFIG_PATH: &str = ".taskplan/config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),
}

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ids: IdConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".taskplan/taskplan.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    31995
}

/// Task identifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    /// Operational timezone as minutes east of UTC. Month buckets use it.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.utc_offset()?;
        Ok(config)
    }

    /// Load `.taskplan/config.yaml` if present, otherwise defaults plus
    /// environment overrides.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load(default_path);
        }

        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `TASKPLAN_*` overrides from the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("TASKPLAN_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(port) = lookup("TASKPLAN_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "TASKPLAN_PORT",
                value: port.clone(),
            })?;
        }

        if let Some(offset) = lookup("TASKPLAN_UTC_OFFSET_MINUTES") {
            self.ids.utc_offset_minutes =
                offset.parse().map_err(|_| ConfigError::InvalidEnv {
                    name: "TASKPLAN_UTC_OFFSET_MINUTES",
                    value: offset.clone(),
                })?;
            self.utc_offset()?;
        }

        Ok(())
    }

    /// The operational offset used for identifier buckets.
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        offset_from_minutes(self.ids.utc_offset_minutes)
            .ok_or(ConfigError::InvalidOffset(self.ids.utc_offset_minutes))
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

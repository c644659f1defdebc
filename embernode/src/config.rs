//! Reads and validates the single JSON configuration document into
//! a typed `Config`. No environment-name switching, no multi-file overlay:
//! that kind of layered configuration is an external collaborator's job.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

fn default_peer_port() -> u16 {
    9100
}

fn default_api_port() -> u16 {
    8080
}

fn default_events_port() -> u16 {
    8081
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub username: String,
    #[serde(default = "default_peer_port")]
    pub peer_port: u16,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_events_port")]
    pub events_port: u16,
    pub directory_url: String,
    pub directory_api_key: String,
    pub keys_path: PathBuf,
    pub store_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is invalid: {0}")]
    Invalid(String),
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
        })?;
        let config: Config =
        serde_json::from_slice(&bytes).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid("username must not be empty".into()));
        }
        if self.directory_url.trim().is_empty() {
            return Err(ConfigError::Invalid("directory_url must not be empty".into()));
        }
        if self.directory_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                    "directory_api_key must not be empty".into(),
            ));
        }
        Ok(())
    }
}

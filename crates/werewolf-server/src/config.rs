//! Server configuration.
//!
//! Read from the JSON file named by `WEREWOLF_CONFIG` when set, otherwise
//! defaults. `SERVER_ADDR` overrides the listen address either way.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use werewolf_core::MatchConfig;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid listen address '{0}'")]
    Addr(String),
}

/// Everything the server binary needs to run one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket listen endpoint
    pub listen: SocketAddr,
    pub game: MatchConfig,
    /// How long shutdown waits for the game loop
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 4000)),
            game: MatchConfig::default(),
            shutdown_grace_ms: 2_000,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::from_sources(
            std::env::var_os("WEREWOLF_CONFIG").map(PathBuf::from),
            std::env::var("SERVER_ADDR").ok(),
        )
    }

    fn from_sources(path: Option<PathBuf>, addr: Option<String>) -> Result<Self, ConfigLoadError> {
        let mut config = match path {
            Some(path) => {
                let json = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigLoadError::Io { path, source })?;
                Self::from_json(&json)?
            }
            None => Self::default(),
        };

        if let Some(addr) = addr {
            config.listen = addr.parse().map_err(|_| ConfigLoadError::Addr(addr))?;
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

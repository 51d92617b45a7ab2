//! Client configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables:
//!
//! ```toml
//! base_url = "https://tickets.example.org/api"
//! session_file = "/home/tech/.ticketdesk/session.json"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const BASE_URL_ENV: &str = "TICKETDESK_API_URL";
pub const SESSION_FILE_ENV: &str = "TICKETDESK_SESSION_FILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Where `FileSessionStore` keeps the token. `None` lets the host decide.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_file: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads `path` when given, otherwise starts from defaults; environment
    /// variables win over both.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(file) = lookup(SESSION_FILE_ENV).filter(|v| !v.is_empty()) {
            self.session_file = Some(PathBuf::from(file));
        }
        self
    }
}

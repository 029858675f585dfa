//! Server configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config file (~/.config/cloud-build/config.toml or --config)
//! 3. CLI flags
//!
//! The config file may also hold named `[profiles.<name>]` tables that
//! `ConfigStore::apply` promotes to the active configuration.

mod defaults;
mod merge;
mod store;

pub use defaults::{
    BuiltinDefaults, DEFAULT_PATH_PREFIX, DEFAULT_REGISTRY_URL, DEFAULT_REQUEST_TIMEOUT_SECONDS,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PROTO, DEFAULT_SOLUTION_SPACE,
};
pub use merge::{deep_merge, merge_layers, toml_to_json};
pub use store::{ConfigStore, PROFILES_KEY};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Effective server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `http` or `https`
    pub server_proto: String,
    /// Host name, optionally with port
    pub server_host: String,
    pub path_prefix: String,
    pub solution_space: String,
    pub registry_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            server_proto: defaults.server_proto,
            server_host: defaults.server_host,
            path_prefix: defaults.path_prefix,
            solution_space: defaults.solution_space,
            registry_url: defaults.registry_url,
            request_timeout_seconds: defaults.request_timeout_seconds,
        }
    }
}

/// Command-line layer; unset fields leave lower layers alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    pub server_proto: Option<String>,
    pub server_host: Option<String>,
    pub path_prefix: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

impl ConfigOverrides {
    /// Layer value, or `None` when no flag was given
    pub fn to_layer(&self) -> Option<Value> {
        if *self == Self::default() {
            return None;
        }
        serde_json::to_value(self).ok()
    }
}

impl ServerConfig {
    /// Resolve defaults plus the given layers, then validate.
    pub fn from_layers(layers: Vec<Value>) -> Result<Self, ConfigError> {
        let mut all = vec![BuiltinDefaults::default().to_value()];
        all.extend(layers);
        Self::from_value(merge_layers(all))
    }

    /// Read a merged value. Keys outside the schema (e.g. `profiles`) are ignored.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `{proto}://{host}`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.server_proto, self.server_host)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.server_proto.as_str(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "server_proto must be http or https, got '{}'",
                self.server_proto
            )));
        }
        if self.server_host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server_host must not be empty".to_string(),
            ));
        }
        if self.request_timeout_seconds == 0 || self.request_timeout_seconds > 86400 {
            return Err(ConfigError::Validation(
                "request_timeout_seconds must be in (0, 86400]".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Unknown configuration profile '{0}'")]
    UnknownProfile(String),

    #[error("No configuration directory (set HOME or pass --config)")]
    NoConfigDir,
}

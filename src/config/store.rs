//! Configuration file store
//!
//! The config file holds the active server settings at the top level and
//! any number of named profiles under `profiles`. `reset` and `apply`
//! rewrite the top level and keep the profiles.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::defaults::BuiltinDefaults;
use super::merge::{deep_merge, toml_to_json};
use super::{ConfigError, ServerConfig};

/// Key of the named-profile table
pub const PROFILES_KEY: &str = "profiles";

const CONFIG_DIR_NAME: &str = "cloud-build";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file location and operations
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$XDG_CONFIG_HOME/cloud-build/config.toml`, falling back to
    /// `~/.config/cloud-build/config.toml`.
    pub fn user_default() -> Result<Self, ConfigError> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .filter(|v| !v.is_empty())
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole file as JSON; an absent file is an empty document.
    fn read_document(&self) -> Result<Map<String, Value>, ConfigError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", self.path.display(), e)))?;
        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", self.path.display(), e)))?;
        match toml_to_json(toml_value) {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::Parse(format!(
                "{}: expected a table",
                self.path.display()
            ))),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), ConfigError> {
        let table = toml::Value::try_from(document)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let text =
            toml::to_string_pretty(&table).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        fs::write(&self.path, text)
            .map_err(|e| ConfigError::Io(format!("{}: {}", self.path.display(), e)))
    }

    /// Effective configuration: defaults, then the file, then `cli_overrides`.
    pub fn load(&self, cli_overrides: Option<Value>) -> Result<ServerConfig, ConfigError> {
        let mut document = self.read_document()?;
        document.remove(PROFILES_KEY);

        let mut layers = vec![Value::Object(document)];
        if let Some(cli) = cli_overrides {
            layers.push(cli);
        }
        ServerConfig::from_layers(layers)
    }

    /// Names of the profiles in the file, sorted
    pub fn profiles(&self) -> Result<Vec<String>, ConfigError> {
        let document = self.read_document()?;
        let mut names: Vec<String> = document
            .get(PROFILES_KEY)
            .and_then(Value::as_object)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    /// Restore built-in defaults as the active configuration
    pub fn reset(&self) -> Result<ServerConfig, ConfigError> {
        let config = ServerConfig::from_layers(vec![])?;
        self.save_active(&config)?;
        tracing::info!(path = %self.path.display(), "configuration reset to defaults");
        Ok(config)
    }

    /// Overlay profile `name` onto the built-in defaults and make it active
    pub fn apply(&self, name: &str) -> Result<ServerConfig, ConfigError> {
        let document = self.read_document()?;
        let profile = document
            .get(PROFILES_KEY)
            .and_then(|p| p.get(name))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        let merged = deep_merge(BuiltinDefaults::default().to_value(), profile);
        let config = ServerConfig::from_value(merged)?;
        self.save_active(&config)?;
        tracing::info!(profile = %name, path = %self.path.display(), "configuration profile applied");
        Ok(config)
    }

    /// Effective configuration rendered as TOML
    pub fn show(&self, cli_overrides: Option<Value>) -> Result<String, ConfigError> {
        self.load(cli_overrides)?.to_toml()
    }

    fn save_active(&self, config: &ServerConfig) -> Result<(), ConfigError> {
        let profiles = self.read_document()?.remove(PROFILES_KEY);

        let mut document = match serde_json::to_value(config) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(ConfigError::Serialize("expected a table".to_string())),
            Err(e) => return Err(ConfigError::Serialize(e.to_string())),
        };
        if let Some(profiles) = profiles {
            document.insert(PROFILES_KEY.to_string(), profiles);
        }
        self.write_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
server_host = "builds.example.com"

[profiles.local]
server_proto = "http"
server_host = "localhost:8080"

[profiles.staging]
server_host = "staging.example.com"
request_timeout_seconds = 1200
"#;

    fn store_with(contents: &str) -> (TempDir, ConfigStore) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, ConfigStore::new(path))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.toml"));
        assert_eq!(store.load(None).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_file_then_cli() {
        let (_dir, store) = store_with(CONFIG);
        let config = store.load(None).unwrap();
        assert_eq!(config.server_host, "builds.example.com");
        assert_eq!(config.server_proto, "https");

        let config = store
            .load(Some(json!({"server_host": "override", "server_proto": null})))
            .unwrap();
        assert_eq!(config.server_host, "override");
        assert_eq!(config.server_proto, "https");
    }

    #[test]
    fn test_profiles_listed() {
        let (_dir, store) = store_with(CONFIG);
        assert_eq!(store.profiles().unwrap(), vec!["local", "staging"]);
    }

    #[test]
    fn test_apply_profile_over_defaults() {
        let (_dir, store) = store_with(CONFIG);
        let applied = store.apply("staging").unwrap();
        assert_eq!(applied.server_host, "staging.example.com");
        assert_eq!(applied.request_timeout_seconds, 1200);

        let reloaded = store.load(None).unwrap();
        assert_eq!(reloaded, applied);
        assert_eq!(store.profiles().unwrap().len(), 2);
    }

    #[test]
    fn test_apply_unknown_profile() {
        let (_dir, store) = store_with(CONFIG);
        assert!(matches!(
            store.apply("production"),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_reset_keeps_profiles() {
        let (_dir, store) = store_with(CONFIG);
        store.apply("local").unwrap();

        let config = store.reset().unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(store.load(None).unwrap(), ServerConfig::default());
        assert_eq!(store.profiles().unwrap(), vec!["local", "staging"]);
    }

    #[test]
    fn test_show_renders_toml() {
        let (_dir, store) = store_with(CONFIG);
        let text = store.show(None).unwrap();
        assert!(text.contains("server_host = \"builds.example.com\""));
        assert!(!text.contains("profiles"));
    }

    #[test]
    fn test_malformed_file() {
        let (_dir, store) = store_with("server_host = ");
        assert!(matches!(store.load(None), Err(ConfigError::Parse(_))));
    }
}

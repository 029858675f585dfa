//! Built-in server defaults (layer 1)

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_PROTO: &str = "https";
pub const DEFAULT_SERVER_HOST: &str = "platform.telerik.com";
pub const DEFAULT_PATH_PREFIX: &str = "appbuilder";
pub const DEFAULT_SOLUTION_SPACE: &str = "Private_Build_Folder";
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org/nativescript";

/// The submit call blocks for the whole remote build
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 600;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    pub server_proto: String,
    pub server_host: String,
    pub path_prefix: String,
    /// Value of the solution-space request header
    pub solution_space: String,
    /// Framework version catalog
    pub registry_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            server_proto: DEFAULT_SERVER_PROTO.to_string(),
            server_host: DEFAULT_SERVER_HOST.to_string(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            solution_space: DEFAULT_SOLUTION_SPACE.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "server_proto": self.server_proto,
            "server_host": self.server_host,
            "path_prefix": self.path_prefix,
            "solution_space": self.solution_space,
            "registry_url": self.registry_url,
            "request_timeout_seconds": self.request_timeout_seconds,
        })
    }
}

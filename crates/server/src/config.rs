//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub linkedin: LinkedInConfig,

    #[serde(default)]
    pub x: XConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Replace platform adapters with stubs that post nowhere
    #[serde(default)]
    pub dry_run: bool,

    /// Upper bound on one platform adapter call
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_secs: u64,

    /// Age after which an IN_PROGRESS claim from a dead process may be
    /// taken over
    #[serde(default = "default_in_progress_lease")]
    pub in_progress_lease_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Env var holding the bearer token callers must present. Empty
    /// disables authentication (local development).
    #[serde(default = "default_bearer_token_env")]
    pub bearer_token_env: String,

    /// User attributed to requests that carry no x-user-id header
    #[serde(default = "default_user_id")]
    pub default_user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_linkedin_token_env")]
    pub access_token_env: String,

    /// Member URN posts are attributed to. Resolved from the token's
    /// userinfo when unset.
    #[serde(default)]
    pub author_urn: Option<String>,

    /// API base URL override (testing)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_x_token_env")]
    pub access_token_env: String,

    /// API base URL override (testing)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

// Default value functions
fn default_state_db_path() -> PathBuf {
    PathBuf::from("./state.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_adapter_timeout() -> u64 {
    30
}

fn default_in_progress_lease() -> u64 {
    120
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_bearer_token_env() -> String {
    "POSTFLIGHT_BEARER_TOKEN".to_string()
}

fn default_user_id() -> String {
    "local".to_string()
}

fn default_linkedin_token_env() -> String {
    "LINKEDIN_ACCESS_TOKEN".to_string()
}

fn default_x_token_env() -> String {
    "X_ACCESS_TOKEN".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_db_path(),
            log_level: default_log_level(),
            dry_run: false,
            adapter_timeout_secs: default_adapter_timeout(),
            in_progress_lease_secs: default_in_progress_lease(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token_env: default_bearer_token_env(),
            default_user_id: default_user_id(),
        }
    }
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token_env: default_linkedin_token_env(),
            author_urn: None,
            api_base_url: None,
        }
    }
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token_env: default_x_token_env(),
            api_base_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("POSTFLIGHT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# postflight configuration

[general]
state_db_path = "./state.sqlite"
log_level = "info"
# Replace platform adapters with stubs that post nowhere
dry_run = false
adapter_timeout_secs = 30
in_progress_lease_secs = 120

[server]
host = "127.0.0.1"
port = 8080
# Env var holding the bearer token callers must present.
# Set bearer_token_env = "" to disable authentication.
bearer_token_env = "POSTFLIGHT_BEARER_TOKEN"
default_user_id = "local"

[linkedin]
enabled = false
access_token_env = "LINKEDIN_ACCESS_TOKEN"
# author_urn = "urn:li:person:YOUR_ID"

[x]
enabled = false
access_token_env = "X_ACCESS_TOKEN"
"#
        .to_string()
    }
}

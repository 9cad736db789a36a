//! Configuration module for SharePoint Router
//!
//! Handles loading of YAML configuration files (with environment variable
//! expansion) or plain environment variables, and validates every required
//! setting before any network call is made.

use crate::checkpoint::CheckpointStrategy;
use crate::router::RouteRule;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

const PLACEHOLDER_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}";

/// Substitute `${VAR}` and `${VAR:-default}` from the process environment.
///
/// An unset variable without a default is left as written, so that
/// [`Config::validate`] can report it as a missing setting.
pub(crate) fn expand_env_vars(s: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(PLACEHOLDER_PATTERN) else {
        return s.to_string();
    };

    re.replace_all(s, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1])
            .ok()
            .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Whether a value still carries a `${VAR}` placeholder after expansion
fn has_placeholder(value: &str) -> bool {
    regex_lite::Regex::new(PLACEHOLDER_PATTERN)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

// ============================================================================
// Environment variable names
// ============================================================================

pub const ENV_TENANT_ID: &str = "TENANT_ID";
pub const ENV_CLIENT_ID: &str = "CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const ENV_SITE_HOST: &str = "SHAREPOINT_SITE_HOST";
pub const ENV_SITE_PATH: &str = "SHAREPOINT_SITE_PATH";
pub const ENV_DEFAULT_FOLDER: &str = "SHAREPOINT_DEFAULT_FOLDER";
pub const ENV_CHECKPOINT_STRATEGY: &str = "CHECKPOINT_STRATEGY";
pub const ENV_CHUNK_SIZE: &str = "UPLOAD_CHUNK_SIZE";

/// Upload session chunks must be a multiple of 320 KiB
pub const CHUNK_GRANULARITY: usize = 320 * 1024;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub checkpoint: CheckpointStrategy,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigLoader::from_env()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials.validate()?;
        self.routing.validate()?;
        self.upload.validate()?;
        Ok(())
    }
}

/// Blank values and unexpanded placeholders both count as missing.
fn require(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() || has_placeholder(value) {
        return Err(ConfigError::MissingSetting(name.to_string()));
    }
    Ok(())
}

/// Tenant credentials and site coordinates.
///
/// Immutable for the lifetime of the process.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// e.g. `contoso.sharepoint.com`
    pub site_host: String,
    /// e.g. `/sites/Operations`
    pub site_path: String,
}

impl CredentialsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(ENV_TENANT_ID, &self.tenant_id)?;
        require(ENV_CLIENT_ID, &self.client_id)?;
        require(ENV_CLIENT_SECRET, &self.client_secret)?;
        require(ENV_SITE_HOST, &self.site_host)?;
        require(ENV_SITE_PATH, &self.site_path)?;
        Ok(())
    }
}

// Manual impl so the secret never ends up in logs.
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_host", &self.site_host)
            .field("site_path", &self.site_path)
            .finish()
    }
}

/// Folder routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_folder")]
    pub default_folder: String,
    #[serde(default = "crate::router::default_rules")]
    pub rules: Vec<RouteRule>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_folder: default_folder(),
            rules: crate::router::default_rules(),
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(ENV_DEFAULT_FOLDER, &self.default_folder)?;

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.folder.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Route rule #{} has an empty folder",
                    index + 1
                )));
            }
            if !rule.keywords.iter().any(|k| !k.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "Route rule #{} ('{}') has no keywords",
                    index + 1,
                    rule.folder
                )));
            }
        }

        Ok(())
    }
}

fn default_folder() -> String {
    "Shared Documents/Uploads".to_string()
}

/// Upload protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest payload sent with a single PUT; anything bigger uses an upload session
    #[serde(default = "default_simple_upload_limit")]
    pub simple_upload_limit: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_content_timeout")]
    pub content_timeout_secs: u64,
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            simple_upload_limit: default_simple_upload_limit(),
            chunk_size: default_chunk_size(),
            metadata_timeout_secs: default_metadata_timeout(),
            content_timeout_secs: default_content_timeout(),
            chunk_timeout_secs: default_chunk_timeout(),
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size % CHUNK_GRANULARITY != 0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid chunk_size {}: must be a positive multiple of {} bytes",
                self.chunk_size, CHUNK_GRANULARITY
            )));
        }
        if self.simple_upload_limit == 0 {
            return Err(ConfigError::ValidationError(
                "simple_upload_limit must be positive".into(),
            ));
        }
        if self.metadata_timeout_secs == 0
            || self.content_timeout_secs == 0
            || self.chunk_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "Timeouts must be at least one second".into(),
            ));
        }
        Ok(())
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}

fn default_simple_upload_limit() -> usize {
    4 * 1024 * 1024 // 4MiB
}

fn default_chunk_size() -> usize {
    3_276_800 // 10 x 320KiB
}

fn default_metadata_timeout() -> u64 {
    30
}

fn default_content_timeout() -> u64 {
    60
}

fn default_chunk_timeout() -> u64 {
    120
}

/// Remote endpoint configuration.
///
/// Only overridden in tests or for sovereign clouds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_login_base")]
    pub login_base: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            login_base: default_login_base(),
            scope: default_scope(),
        }
    }
}

fn default_api_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_login_base() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_scope() -> String {
    "https://graph.microsoft.com/.default".to_string()
}

//! Configuration loader with environment variable expansion

use super::{
    expand_env_vars, Config, ConfigError, CredentialsConfig, GraphConfig, RoutingConfig,
    UploadConfig, ENV_CHECKPOINT_STRATEGY, ENV_CHUNK_SIZE, ENV_CLIENT_ID, ENV_CLIENT_SECRET,
    ENV_DEFAULT_FOLDER, ENV_SITE_HOST, ENV_SITE_PATH, ENV_TENANT_ID,
};
use crate::checkpoint::CheckpointStrategy;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from process environment variables.
    ///
    /// Credentials and site coordinates are required; folder, strategy and
    /// chunk size fall back to their defaults when unset.
    pub fn from_env() -> Result<Config, ConfigError> {
        let credentials = CredentialsConfig {
            tenant_id: required_var(ENV_TENANT_ID)?,
            client_id: required_var(ENV_CLIENT_ID)?,
            client_secret: required_var(ENV_CLIENT_SECRET)?,
            site_host: required_var(ENV_SITE_HOST)?,
            site_path: required_var(ENV_SITE_PATH)?,
        };

        let routing = Self::routing_from_env()?;

        let checkpoint = optional_var(ENV_CHECKPOINT_STRATEGY)
            .map(|value| CheckpointStrategy::from_config_value(&value))
            .unwrap_or_default();

        let mut upload = UploadConfig::default();
        if let Some(raw) = optional_var(ENV_CHUNK_SIZE) {
            upload.chunk_size = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{} must be a byte count, got '{}'",
                    ENV_CHUNK_SIZE, raw
                ))
            })?;
        }

        let config = Config {
            credentials,
            routing,
            checkpoint,
            upload,
            graph: GraphConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Routing table from the environment alone.
    ///
    /// Needs no credentials, so it works for offline routing checks.
    pub fn routing_from_env() -> Result<RoutingConfig, ConfigError> {
        let mut routing = RoutingConfig::default();
        if let Some(folder) = optional_var(ENV_DEFAULT_FOLDER) {
            routing.default_folder = folder;
        }
        routing.validate()?;
        Ok(routing)
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    optional_var(name).ok_or_else(|| ConfigError::MissingSetting(name.to_string()))
}

/// Blank values count as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

//! # Configuration Loader
//!
//! Environment-aware configuration loading. Sources are merged in priority
//! order: built-in defaults, an optional `githarvest.toml` (or the file named
//! by `GITHARVEST_CONFIG`), then `GITHARVEST_*` environment variables.

use crate::config::GitHarvestConfig;
use crate::error::{GitHarvestError, Result};
use config::{Config, Environment, File};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the loaded, validated configuration for the process
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<GitHarvestConfig>,
}

impl ConfigManager {
    /// Load configuration from defaults, optional file, and environment overrides
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("GITHARVEST_CONFIG").unwrap_or_else(|_| "githarvest".to_string());

        debug!(config_file = %config_file, "Loading configuration");

        let defaults = GitHarvestConfig::default();
        let builder = Config::builder()
            .add_source(Config::try_from(&defaults).map_err(|e| {
                GitHarvestError::ConfigurationError(format!("invalid defaults: {e}"))
            })?)
            .add_source(File::with_name(&config_file).required(false))
            .add_source(
                Environment::with_prefix("GITHARVEST")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: GitHarvestConfig = builder
            .build()
            .map_err(|e| GitHarvestError::ConfigurationError(e.to_string()))?
            .try_deserialize()
            .map_err(|e| GitHarvestError::ConfigurationError(e.to_string()))?;

        config.validate()?;

        info!(
            cache_ttl_secs = config.client.cache_ttl_secs,
            max_retries = config.client.max_retries,
            batch_size = config.batch.batch_size,
            failure_threshold = config.circuit_breaker.failure_threshold,
            "🔧 CONFIGURATION: Loaded and validated"
        );

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Build a manager around an explicit configuration (used by tests)
    pub fn from_config(config: GitHarvestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Access the loaded configuration
    pub fn config(&self) -> &GitHarvestConfig {
        &self.config
    }
}

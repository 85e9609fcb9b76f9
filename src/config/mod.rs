//! # GitHarvest Configuration System
//!
//! Typed configuration for the ingestion core. All tunables recognized by the
//! resilient client, batch executor, pipelines, and scheduler live here so
//! tests and embedding applications construct explicit, isolated instances
//! instead of reading ambient globals.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use githarvest::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let ttl = manager.config().client.cache_ttl_secs;
//! let batch = manager.config().batch.batch_size;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHarvestConfig {
    /// Upstream GitHub API settings
    pub github: GithubApiConfig,

    /// Resilient client behavior (cache, retries, quota)
    pub client: ClientConfig,

    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerSettings,

    /// Batch executor sizing
    pub batch: BatchConfig,

    /// Database connection settings
    pub database: DatabaseConfig,
}

/// Upstream GitHub API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubApiConfig {
    /// Base URL, overridable for tests and GitHub Enterprise
    pub base_url: String,
    /// Optional bearer token for authenticated requests
    pub token: Option<String>,
    /// User-Agent header value (required by the GitHub API)
    pub user_agent: String,
}

impl Default for GithubApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: None,
            user_agent: "githarvest/0.1".to_string(),
        }
    }
}

/// Resilient client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// TTL for memoized idempotent reads
    pub cache_ttl_secs: u64,
    /// Retry budget for transient upstream failures
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub base_backoff_ms: u64,
    /// Per-request network timeout
    pub request_timeout_ms: u64,
    /// Pre-emptive quota wait kicks in below this remaining-call count
    pub low_water_mark_remaining: u32,
    /// Upper bound on any quota-driven sleep
    pub max_quota_wait_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            max_retries: 3,
            base_backoff_ms: 500,
            request_timeout_ms: 10_000,
            low_water_mark_remaining: 10,
            max_quota_wait_ms: 120_000,
        }
    }
}

impl ClientConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn max_quota_wait(&self) -> Duration {
        Duration::from_millis(self.max_quota_wait_ms)
    }
}

/// Circuit breaker thresholds shared by all endpoint groups
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive transient failures before the circuit opens
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before admitting a trial
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Batch executor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Concurrent operations per chunk
    pub batch_size: usize,
    /// Pause between chunks, to stay polite toward the upstream
    pub batch_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 1_000,
        }
    }
}

impl BatchConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool: u32,
    pub checkout_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool: 10,
            checkout_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    /// Resolve the connection URL: explicit config wins, DATABASE_URL is the fallback
    pub fn database_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
    }
}

impl Default for GitHarvestConfig {
    fn default() -> Self {
        Self {
            github: GithubApiConfig::default(),
            client: ClientConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            batch: BatchConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl GitHarvestConfig {
    /// Validate invariants that would otherwise surface as confusing runtime behavior
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.batch.batch_size == 0 {
            return Err(crate::error::GitHarvestError::ConfigurationError(
                "batch.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(crate::error::GitHarvestError::ConfigurationError(
                "circuit_breaker.failure_threshold must be greater than zero".to_string(),
            ));
        }
        if self.client.request_timeout_ms == 0 {
            return Err(crate::error::GitHarvestError::ConfigurationError(
                "client.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GitHarvestConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = GitHarvestConfig::default();
        config.batch.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversions() {
        let client = ClientConfig::default();
        assert_eq!(client.cache_ttl(), Duration::from_secs(300));
        assert_eq!(client.request_timeout(), Duration::from_millis(10_000));
    }
}

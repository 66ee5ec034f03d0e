//! Exporter configuration structures.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::registry::DEFAULT_COLLECTORS;

use super::validation::{ConfigError, expand_in_place, read_yaml};

// =============================================================================
// Constants
// =============================================================================

/// Default listen address.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0:9138";

/// Default metrics endpoint path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default per-collector timeout (60 seconds).
pub const DEFAULT_COLLECTOR_TIMEOUT: Duration = Duration::from_secs(60);

/// Default RGW HTTP request timeout (55 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(55);

/// Default cache window (20 seconds).
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(20);

fn default_collectors() -> Vec<String> {
    DEFAULT_COLLECTORS.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Timeouts
// =============================================================================

/// Timeout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Budget of one collector against one realm (default: 60s).
    #[serde(with = "humantime_serde")]
    pub collector: Duration,

    /// Timeout of a single RGW HTTP request (default: 55s).
    #[serde(with = "humantime_serde")]
    pub http: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            collector: DEFAULT_COLLECTOR_TIMEOUT,
            http: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Snapshot cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Cache window (default: 20s).
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: DEFAULT_CACHE_DURATION,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log filter used when `RUST_LOG` is unset (default: "info").
    #[serde(alias = "logLevel")]
    pub log_level: String,

    /// Address the HTTP server binds to (default: "0.0.0.0:9138").
    #[serde(alias = "listenHost")]
    pub listen_host: String,

    /// Path of the metrics endpoint (default: "/metrics").
    #[serde(alias = "metricsPath")]
    pub metrics_path: String,

    /// Enabled collector names.
    pub collectors: Vec<String>,

    pub timeouts: TimeoutsConfig,

    #[serde(alias = "Cache")]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            collectors: default_collectors(),
            timeouts: TimeoutsConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config: Self = read_yaml(path.as_ref())?;
        config.expand_env();
        config.validate()?;
        Ok(config)
    }

    fn expand_env(&mut self) {
        expand_in_place(&mut self.log_level);
        expand_in_place(&mut self.listen_host);
        expand_in_place(&mut self.metrics_path);
        self.collectors.iter_mut().for_each(expand_in_place);
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if !self.metrics_path.starts_with('/') || matches!(self.metrics_path.as_str(), "/" | "/healthz") {
            return Err(ConfigError::validation(format!(
                "metrics_path must start with '/' and not be '/' or '/healthz': '{}'",
                self.metrics_path
            )));
        }

        tracing_subscriber::EnvFilter::try_new(&self.log_level).map_err(|e| {
            ConfigError::validation(format!("invalid log_level '{}': {}", self.log_level, e))
        })?;

        if self.collectors.is_empty() {
            return Err(ConfigError::validation("at least one collector must be enabled"));
        }

        if self.timeouts.collector.is_zero() {
            return Err(ConfigError::validation("timeouts.collector must be non-zero"));
        }
        if self.timeouts.http.is_zero() {
            return Err(ConfigError::validation("timeouts.http must be non-zero"));
        }

        Ok(())
    }

    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_host.parse().map_err(|_| {
            ConfigError::validation(format!("invalid listen_host: '{}'", self.listen_host))
        })
    }
}

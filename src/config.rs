//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (listen address, metrics path, log level)
//! - Enabled collectors, timeouts and the snapshot cache
//! - RGW realm endpoints and credentials

mod app;
mod realms;
mod validation;

pub use app::{AppConfig, CacheConfig, TimeoutsConfig};
pub use realms::{DEFAULT_REALM_NAME, RealmConfig, RealmsConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_CACHE_DURATION, DEFAULT_COLLECTOR_TIMEOUT, DEFAULT_HTTP_TIMEOUT, DEFAULT_LISTEN_HOST,
    DEFAULT_METRICS_PATH,
};

//! Configuration errors and parsing helpers.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content is not valid YAML for the target type.
    #[error("failed to parse YAML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Read and deserialize a YAML file.
///
/// `${VAR}` references are not touched here; callers expand the decoded
/// string values so that environment content is never parsed as YAML.
pub(crate) fn read_yaml<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a human-readable duration such as `20s`, `1m`, `5m30s` or `100ms`.
///
/// Used as the clap value parser of duration flags.
///
/// # Examples
///
/// ```
/// use rgw_realm_exporter::config::parse_duration;
///
/// assert_eq!(parse_duration("20s").unwrap().as_secs(), 20);
/// assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    match s.trim() {
        "" => Err("empty duration".to_string()),
        trimmed => humantime::parse_duration(trimmed).map_err(|e| format!("{trimmed:?}: {e}")),
    }
}

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?::-(?P<default>[^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Replace `${VAR}` and `${VAR:-default}` references with values from the
/// process environment. Unset variables without a default become empty.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| match std::env::var(&caps["name"]) {
            Ok(value) => value,
            Err(_) => caps
                .name("default")
                .map_or_else(String::new, |m| m.as_str().to_string()),
        })
        .into_owned()
}

/// Expand env references in a decoded string value, in place.
pub(crate) fn expand_in_place(value: &mut String) {
    if value.contains("${") {
        *value = expand_env_vars(value);
    }
}

//! Realm connection configuration.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigError, expand_in_place, read_yaml};

/// Name used for the realm built from command line flags.
pub const DEFAULT_REALM_NAME: &str = "default";

/// Connection settings of one RGW realm.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmConfig {
    /// Realm name, used as the `realm` label.
    pub name: String,

    /// Base URL of the RGW admin endpoint.
    pub host: String,

    #[serde(alias = "accessKey")]
    pub access_key: String,

    #[serde(alias = "secretKey")]
    pub secret_key: String,

    #[serde(default, alias = "skipTLSVerify")]
    pub skip_tls_verify: bool,
}

impl std::fmt::Debug for RealmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

impl RealmConfig {
    fn expand_env(&mut self) {
        for value in [
            &mut self.name,
            &mut self.host,
            &mut self.access_key,
            &mut self.secret_key,
        ] {
            expand_in_place(value);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("realm name cannot be empty"));
        }

        let url = url::Url::parse(&self.host).map_err(|e| {
            ConfigError::validation(format!(
                "realm '{}': invalid host '{}': {}",
                self.name, self.host, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::validation(format!(
                "realm '{}': host must use http or https: '{}'",
                self.name, self.host
            )));
        }

        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(ConfigError::validation(format!(
                "realm '{}': access_key and secret_key are required",
                self.name
            )));
        }

        Ok(())
    }
}

/// Set of realms scraped on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmsConfig {
    #[serde(default)]
    pub realms: Vec<RealmConfig>,
}

impl RealmsConfig {
    /// Load realms from a YAML file. `${VAR}` references in names, hosts and
    /// keys are expanded after parsing, so keys can come from the environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config: Self = read_yaml(path.as_ref())?;
        config.realms.iter_mut().for_each(RealmConfig::expand_env);
        config.validate()?;
        Ok(config)
    }

    /// Single realm named [`DEFAULT_REALM_NAME`].
    pub fn single(
        host: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        skip_tls_verify: bool,
    ) -> Self {
        Self {
            realms: vec![RealmConfig {
                name: DEFAULT_REALM_NAME.to_string(),
                host: host.into(),
                access_key: access_key.into(),
                secret_key: secret_key.into(),
                skip_tls_verify,
            }],
        }
    }

    /// Validate every realm and reject duplicate names.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` on the first invalid realm.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realms.is_empty() {
            return Err(ConfigError::validation("at least one realm must be configured"));
        }

        let mut seen = HashSet::new();
        for realm in &self.realms {
            realm.validate()?;
            if !seen.insert(realm.name.as_str()) {
                return Err(ConfigError::validation(format!(
                    "duplicate realm name: '{}'",
                    realm.name
                )));
            }
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.realms.iter().map(|r| r.name.as_str())
    }
}

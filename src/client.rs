//! Realm clients.
//!
//! A [`Client`] is the per-realm handle passed to collectors. Its name is
//! used only as the `realm` label; the admin API client does the actual
//! upstream work.

mod rgw;

use std::time::Duration;

pub use rgw::{BucketStats, BucketUsage, QuotaSpec, RgwAdminClient, RgwError};

use crate::config::RealmConfig;

/// Connection handle for one realm.
#[derive(Debug, Clone)]
pub struct Client {
    name: String,
    rgw: RgwAdminClient,
}

impl Client {
    pub fn new(name: impl Into<String>, rgw: RgwAdminClient) -> Self {
        Self {
            name: name.into(),
            rgw,
        }
    }

    /// Build the client for a configured realm.
    pub fn from_realm(realm: &RealmConfig, http_timeout: Duration) -> Result<Self, RgwError> {
        let rgw = RgwAdminClient::new(
            &realm.host,
            realm.access_key.clone(),
            realm.secret_key.clone(),
            http_timeout,
            realm.skip_tls_verify,
        )?;
        Ok(Self::new(realm.name.clone(), rgw))
    }

    /// Realm name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rgw(&self) -> &RgwAdminClient {
        &self.rgw
    }
}

/// Client pointing at an address nothing listens on.
#[cfg(test)]
pub(crate) fn test_client(name: &str) -> Client {
    let rgw = RgwAdminClient::new("http://127.0.0.1:9", "access", "secret", Duration::from_secs(1), false)
        .expect("valid test endpoint");
    Client::new(name, rgw)
}

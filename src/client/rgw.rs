//! Minimal RGW admin API client.
//!
//! Requests are signed with AWS signature version 2, which every RGW
//! release accepts on the admin endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, DATE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha1::Sha1;
use thiserror::Error;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// Errors returned by the RGW admin API client.
#[derive(Debug, Error)]
pub enum RgwError {
    /// Transport-level failure (connect, TLS, timeout).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// RGW answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Invalid endpoint URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request signing failed.
    #[error("failed to sign request: {0}")]
    Signature(String),
}

/// Quota settings of a user or bucket.
///
/// Limits are `-1` when unlimited.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuotaSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub check_on_raw: bool,
    #[serde(default)]
    pub max_size: Option<i64>,
    #[serde(default)]
    pub max_size_kb: Option<i64>,
    #[serde(default)]
    pub max_objects: Option<i64>,
}

impl QuotaSpec {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

/// Usage counters of one bucket category (`rgw.main`, `rgw.multimeta`, ...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BucketUsage {
    pub size: u64,
    pub size_actual: u64,
    pub size_kb: u64,
    pub num_objects: u64,
}

/// Entry of `GET /admin/bucket?stats=true`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BucketStats {
    pub bucket: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub usage: BTreeMap<String, BucketUsage>,
    #[serde(default)]
    pub bucket_quota: Option<QuotaSpec>,
}

impl BucketStats {
    /// Usage summed over every category.
    pub fn total_usage(&self) -> BucketUsage {
        self.usage
            .values()
            .fold(BucketUsage::default(), |mut acc, usage| {
                acc.size += usage.size;
                acc.size_actual += usage.size_actual;
                acc.size_kb += usage.size_kb;
                acc.num_objects += usage.num_objects;
                acc
            })
    }
}

/// Signed HTTP client for one RGW admin endpoint.
#[derive(Clone)]
pub struct RgwAdminClient {
    http: reqwest::Client,
    endpoint: Url,
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for RgwAdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgwAdminClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

impl RgwAdminClient {
    /// Build a client for `host`.
    ///
    /// No connection is made until the first request.
    pub fn new(
        host: &str,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        http_timeout: Duration,
        skip_tls_verify: bool,
    ) -> Result<Self, RgwError> {
        let endpoint = Url::parse(host)?;
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// List all user ids.
    pub async fn list_users(&self) -> Result<Vec<String>, RgwError> {
        self.get_json("/admin/metadata/user", &[]).await
    }

    /// Fetch the user-level quota of `uid`.
    pub async fn user_quota(&self, uid: &str) -> Result<QuotaSpec, RgwError> {
        self.get_json(
            "/admin/user",
            &[("quota", None), ("uid", Some(uid)), ("quota-type", Some("user"))],
        )
        .await
    }

    /// Fetch usage and quota of every bucket.
    pub async fn bucket_stats(&self) -> Result<Vec<BucketStats>, RgwError> {
        self.get_json("/admin/bucket", &[("stats", Some("true"))])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, Option<&str>)],
    ) -> Result<T, RgwError> {
        let mut url = self.endpoint.clone();
        // Admin paths are relative to any prefix on the configured host.
        let base = self.endpoint.path().trim_end_matches('/');
        url.set_path(&format!("{base}{path}"));
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                match value {
                    Some(value) => pairs.append_pair(key, value),
                    None => pairs.append_key_only(key),
                };
            }
        }

        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let signature = sign_v2(&self.secret_key, "GET", &date, url.path())?;

        tracing::trace!(url = %url, "RGW admin request");
        let response = self
            .http
            .get(url)
            .header(DATE, &date)
            .header(
                AUTHORIZATION,
                format!("AWS {}:{}", self.access_key, signature),
            )
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(RgwError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

/// AWS v2 signature over a request without body or content type.
fn sign_v2(secret_key: &str, method: &str, date: &str, resource: &str) -> Result<String, RgwError> {
    let string_to_sign = format!("{method}\n\n\n{date}\n{resource}");
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .map_err(|e| RgwError::Signature(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

//! RGW user quota collector.

use crate::client::Client;
use crate::collector::{Collector, CollectorError, SampleSink, ScrapeContext};
use crate::sample::{METRICS_NAMESPACE, Sample, build_fq_name};

use super::SUBSYSTEM;

/// Emits the quota limits of every user with an enabled user quota.
///
/// A failed quota lookup for one user does not stop the others; all
/// lookup failures are reported together once the loop is done.
#[derive(Debug, Default)]
pub struct RgwUserQuotaCollector;

impl RgwUserQuotaCollector {
    pub const NAME: &'static str = "rgw_user_quota";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Collector for RgwUserQuotaCollector {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn update(
        &self,
        ctx: &ScrapeContext,
        client: &Client,
        sink: &SampleSink,
    ) -> Result<(), CollectorError> {
        let users = client.rgw().list_users().await?;
        tracing::debug!(realm = %client.name(), users = users.len(), "Listed RGW users");

        let mut failures = Vec::new();
        for uid in &users {
            ctx.ensure_active()?;

            let quota = match client.rgw().user_quota(uid).await {
                Ok(quota) => quota,
                Err(e) => {
                    failures.push(format!("failed to get user {uid:?} quota: {e}"));
                    continue;
                }
            };

            if !quota.is_enabled() {
                continue;
            }

            let gauges = [
                ("user_quota_max_size", "RGW User Quota max size", quota.max_size),
                (
                    "user_quota_max_size_kb",
                    "RGW User Quota max size KiB",
                    quota.max_size_kb,
                ),
                (
                    "user_quota_max_objects",
                    "RGW User Quota max objects",
                    quota.max_objects,
                ),
            ];
            for (name, help, value) in gauges {
                let Some(value) = value else { continue };
                sink.send(
                    Sample::gauge(
                        build_fq_name(METRICS_NAMESPACE, SUBSYSTEM, name),
                        help,
                        value as f64,
                    )
                    .with_label("uid", uid.as_str())
                    .with_label("realm", client.name()),
                )?;
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CollectorError::Partial(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::rgw::fake;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    fn router() -> Router {
        Router::new()
            .route(
                "/admin/metadata/user",
                get(|| async { Json(vec!["alice", "bob", "carol"]) }),
            )
            .route(
                "/admin/user",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    match params.get("uid").map(String::as_str) {
                        Some("alice") => Json(serde_json::json!({
                            "enabled": true,
                            "max_size": 2048,
                            "max_size_kb": 2,
                            "max_objects": 100
                        }))
                        .into_response(),
                        Some("bob") => Json(serde_json::json!({
                            "enabled": false,
                            "max_size": -1,
                            "max_size_kb": 0,
                            "max_objects": -1
                        }))
                        .into_response(),
                        _ => (StatusCode::NOT_FOUND, "NoSuchUser").into_response(),
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_enabled_quota_emitted_and_failures_reported() {
        let client = fake::start("eu", router()).await;
        let (samples, result) = fake::run(&RgwUserQuotaCollector::new(), &client).await;

        // alice only: bob's quota is disabled, carol's lookup fails.
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.label("uid") == Some("alice")));
        assert!(samples.iter().all(|s| s.label("realm") == Some("eu")));

        let max_size = samples
            .iter()
            .find(|s| s.name() == "extended_ceph_rgw_user_quota_max_size")
            .unwrap();
        assert_eq!(max_size.value(), 2048.0);

        match result {
            Err(CollectorError::Partial(failures)) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("carol"));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_users_failure() {
        let router = Router::new().route(
            "/admin/metadata/user",
            get(|| async { (StatusCode::FORBIDDEN, "AccessDenied") }),
        );
        let client = fake::start("eu", router).await;
        let (samples, result) = fake::run(&RgwUserQuotaCollector::new(), &client).await;

        assert!(samples.is_empty());
        assert!(matches!(result, Err(CollectorError::Rgw(_))));
    }
}

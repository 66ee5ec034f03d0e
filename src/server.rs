//! Web server module.
//!
//! Serves the Prometheus scrape endpoint, a liveness probe and a small
//! landing page.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::exposition::{CONTENT_TYPE, encode_text};
use crate::orchestrator::Orchestrator;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics_path: String,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    collectors: Vec<String>,
    realms: Vec<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let metrics_path = state.metrics_path.clone();
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(landing_handler))
        .route("/healthz", get(healthz_handler))
        .route(&metrics_path, get(metrics_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

/// Landing page linking to the metrics endpoint.
async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>RGW Realm Exporter</title></head>\n<body>\n\
         <h1>RGW Realm Exporter</h1>\n<p><a href=\"{path}\">Metrics</a></p>\n</body>\n</html>\n",
        path = state.metrics_path
    ))
}

/// Liveness probe.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        collectors: state
            .orchestrator
            .collector_names()
            .map(String::from)
            .collect(),
        realms: state.orchestrator.realm_names().map(String::from).collect(),
    })
}

/// Scrape endpoint: run (or replay) one collection round and encode it.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let samples = state.orchestrator.snapshot().await;

    match encode_text(&samples) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, samples = samples.len(), "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, test_client};
    use crate::collector::{Collector, CollectorError, CollectorSet, SampleSink, ScrapeContext};
    use crate::orchestrator::OrchestratorOptions;
    use crate::sample::Sample;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    #[derive(Debug)]
    struct StaticCollector;

    #[async_trait::async_trait]
    impl Collector for StaticCollector {
        fn name(&self) -> &str {
            "static"
        }

        async fn update(
            &self,
            _ctx: &ScrapeContext,
            client: &Client,
            sink: &SampleSink,
        ) -> Result<(), CollectorError> {
            sink.send(
                Sample::gauge("static_value", "Static value.", 42.0).with_label("realm", client.name()),
            )
        }
    }

    fn create_test_state(metrics_path: &str) -> AppState {
        let collectors: CollectorSet =
            [("static".to_string(), Arc::new(StaticCollector) as Arc<dyn Collector>)]
                .into_iter()
                .collect();
        let orchestrator = Orchestrator::new(
            collectors,
            [test_client("realmA")],
            OrchestratorOptions::default(),
            CancellationToken::new(),
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
            metrics_path: metrics_path.to_string(),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = create_router(create_test_state("/metrics"));
        let (status, content_type, body) = get(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
        assert!(body.contains("static_value{realm=\"realmA\"} 42"));
        assert!(body.contains(
            "extended_ceph_scrape_collector_success{collector=\"static\",realm=\"realmA\"} 1"
        ));
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let state = create_test_state("/probe/metrics");
        let (status, _, _) = get(create_router(state.clone()), "/probe/metrics").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = get(create_router(state), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = create_router(create_test_state("/metrics"));
        let (status, _, body) = get(app, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["collectors"], serde_json::json!(["static"]));
        assert_eq!(json["realms"], serde_json::json!(["realmA"]));
    }

    #[tokio::test]
    async fn test_landing_page_links_metrics() {
        let app = create_router(create_test_state("/custom"));
        let (status, _, body) = get(app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("href=\"/custom\""));
    }
}

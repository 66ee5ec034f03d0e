//! RGW Realm Exporter Binary Entry Point
//!
//! Serves Prometheus metrics for one or more Ceph RGW realms.
//! Core functionality is provided by the `rgw_realm_exporter` library crate.

use clap::Parser;
use rgw_realm_exporter::{
    Client, Orchestrator, OrchestratorOptions,
    collector::{load_collectors, registry},
    config::{AppConfig, RealmsConfig, parse_duration},
    server::{AppState, create_router},
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// RGW Realm Exporter - Prometheus metrics for Ceph RADOS Gateway realms
#[derive(Parser, Debug)]
#[command(name = "rgw-realm-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "RGW_EXPORTER_CONFIG")]
    config: Option<String>,

    /// Path to realms file (overrides the --rgw-* flags)
    #[arg(long, env = "RGW_EXPORTER_REALMS_CONFIG")]
    realms_config: Option<String>,

    /// Listen address (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_LISTEN_HOST")]
    listen_host: Option<String>,

    /// Metrics endpoint path (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_METRICS_PATH")]
    metrics_path: Option<String>,

    /// Log level (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Comma-separated collector names (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_COLLECTORS_ENABLED", value_delimiter = ',')]
    collectors_enabled: Option<Vec<String>>,

    /// RGW admin endpoint of the single default realm
    #[arg(long, env = "RGW_EXPORTER_RGW_HOST")]
    rgw_host: Option<String>,

    /// RGW access key of the single default realm
    #[arg(long, env = "RGW_EXPORTER_RGW_ACCESS_KEY")]
    rgw_access_key: Option<String>,

    /// RGW secret key of the single default realm
    #[arg(long, env = "RGW_EXPORTER_RGW_SECRET_KEY", hide_env_values = true)]
    rgw_secret_key: Option<String>,

    /// Skip TLS verification for the single default realm
    #[arg(long, env = "RGW_EXPORTER_SKIP_TLS_VERIFY")]
    skip_tls_verify: bool,

    /// Per-collector timeout, e.g. "60s" (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_CONTEXT_TIMEOUT", value_parser = parse_duration)]
    context_timeout: Option<Duration>,

    /// RGW HTTP request timeout, e.g. "55s" (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_HTTP_TIMEOUT", value_parser = parse_duration)]
    http_timeout: Option<Duration>,

    /// Enable snapshot caching (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_CACHE_ENABLED")]
    cache_enabled: Option<bool>,

    /// Cache window, e.g. "20s" (overrides config file)
    #[arg(long, env = "RGW_EXPORTER_CACHE_DURATION", value_parser = parse_duration)]
    cache_duration: Option<Duration>,
}

impl Cli {
    /// Apply CLI/env overrides (CLI > ENV > config file).
    fn apply(&self, config: &mut AppConfig) {
        if let Some(listen_host) = &self.listen_host {
            config.listen_host = listen_host.clone();
        }
        if let Some(metrics_path) = &self.metrics_path {
            config.metrics_path = metrics_path.clone();
        }
        if let Some(log_level) = &self.log_level {
            config.log_level = log_level.clone();
        }
        if let Some(collectors) = &self.collectors_enabled {
            config.collectors = collectors
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(timeout) = self.context_timeout {
            config.timeouts.collector = timeout;
        }
        if let Some(timeout) = self.http_timeout {
            config.timeouts.http = timeout;
        }
        if let Some(enabled) = self.cache_enabled {
            config.cache.enabled = enabled;
        }
        if let Some(duration) = self.cache_duration {
            config.cache.duration = duration;
        }
    }

    fn realms(&self) -> Result<RealmsConfig, Box<dyn std::error::Error>> {
        if let Some(path) = &self.realms_config {
            return Ok(RealmsConfig::load(path)?);
        }

        let (Some(host), Some(access_key), Some(secret_key)) =
            (&self.rgw_host, &self.rgw_access_key, &self.rgw_secret_key)
        else {
            return Err(
                "either --realms-config or all of --rgw-host, --rgw-access-key and --rgw-secret-key are required"
                    .into(),
            );
        };

        let realms = RealmsConfig::single(host, access_key, secret_key, self.skip_tls_verify);
        realms.validate()?;
        Ok(realms)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "RGW Realm Exporter");
    if let Some(path) = &cli.config {
        tracing::info!(path = %path, "Loaded configuration");
    }

    let realms = cli.realms()?;
    let clients = realms
        .realms
        .iter()
        .map(|realm| Client::from_realm(realm, config.timeouts.http))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(
        realms = ?realms.names().collect::<Vec<_>>(),
        http_timeout = ?config.timeouts.http,
        "Realms configured"
    );

    // Unknown collector names are fatal
    let collectors = load_collectors(&config.collectors).inspect_err(|e| {
        tracing::error!(
            error = %e,
            available = ?registry::available(),
            "Failed to load collectors"
        );
    })?;
    for name in collectors.keys() {
        tracing::info!(collector = %name, "Collector enabled");
    }

    let root = CancellationToken::new();
    let orchestrator = Orchestrator::new(
        collectors,
        clients,
        OrchestratorOptions::from(&config),
        root.clone(),
    );
    tracing::info!(
        timeout = ?config.timeouts.collector,
        cache_enabled = config.cache.enabled,
        cache_duration = ?config.cache.duration,
        "Orchestrator ready"
    );

    // Build Axum router
    let app = create_router(AppState {
        orchestrator: Arc::new(orchestrator),
        metrics_path: config.metrics_path.clone(),
    });

    let addr = config.listen_addr()?;
    tracing::info!(
        "Listening on: http://{}{}",
        addr,
        config.metrics_path
    );
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(root))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(root: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Cancelling in-flight collection...");
    root.cancel();
}

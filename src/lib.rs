//! RGW Realm Exporter
//!
//! Prometheus exporter for Ceph RADOS Gateway realms. It can be used as a
//! library by other Rust projects, or run as a standalone binary with the
//! `rgw-realm-exporter` executable.
//!
//! # Architecture
//!
//! - **Collectors**: named units that scrape one realm and stream samples
//! - **Orchestrator**: runs every collector against every realm concurrently,
//!   with per-unit timeouts and scrape telemetry
//! - **Cache**: optional time-windowed replay of the last snapshot
//! - **Exposition**: Prometheus text encoding served over HTTP
//!
//! # Example
//!
//! ```rust,ignore
//! use rgw_realm_exporter::{Orchestrator, OrchestratorOptions, collector, config};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = config::AppConfig::load("configs/config.yaml")?;
//!     let realms = config::RealmsConfig::load("configs/realms.yaml")?;
//!     let clients = realms
//!         .realms
//!         .iter()
//!         .map(|r| rgw_realm_exporter::Client::from_realm(r, app.timeouts.http))
//!         .collect::<Result<Vec<_>, _>>()?;
//!
//!     let orchestrator = Orchestrator::new(
//!         collector::load_collectors(&app.collectors)?,
//!         clients,
//!         OrchestratorOptions::from(&app),
//!         CancellationToken::new(),
//!     );
//!     let text = rgw_realm_exporter::exposition::encode_text(&orchestrator.snapshot().await)?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod collector;
pub mod config;
pub mod exposition;
pub mod orchestrator;
pub mod sample;
pub mod server;

pub use client::{Client, RgwAdminClient, RgwError};
pub use collector::{Collector, CollectorError, SampleSink, ScrapeContext};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use sample::{MetricKind, Sample};

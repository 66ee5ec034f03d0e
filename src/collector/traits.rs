//! Core collector traits and types.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{Client, RgwError};
use crate::sample::Sample;

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// RGW admin API call failed.
    #[error("rgw api error: {0}")]
    Rgw(#[from] RgwError),

    /// Per-unit timeout elapsed.
    #[error("timeout elapsed after {0:?}")]
    Timeout(Duration),

    /// The scrape scope was cancelled (shutdown or timeout).
    #[error("collection cancelled")]
    Cancelled,

    /// Some items failed while others were collected.
    #[error("{} item(s) failed: {}", .0.len(), .0.join("; "))]
    Partial(Vec<String>),

    /// No factory is registered under this name.
    #[error("collector '{0}' not available")]
    Unknown(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// The merge channel is gone.
    #[error("sample sink closed")]
    SinkClosed,

    /// The collection task panicked.
    #[error("collector task panicked: {0}")]
    Panicked(String),
}

/// Cancellation scope handed to a collector for one unit of work.
///
/// The token is a child of the orchestrator's root token, so process
/// shutdown cancels every in-flight unit while a unit timeout cancels
/// only its own scope.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    token: CancellationToken,
    deadline: Instant,
}

impl ScrapeContext {
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the unit times out.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.remaining().is_zero()
    }

    /// Return `Err(CollectorError::Cancelled)` once the scope is done.
    ///
    /// Collectors call this between upstream requests so that long item
    /// loops stop early.
    pub fn ensure_active(&self) -> Result<(), CollectorError> {
        if self.is_cancelled() {
            Err(CollectorError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Write side of the merge channel shared by all units of a scrape.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: mpsc::UnboundedSender<Sample>,
}

impl SampleSink {
    pub fn new(tx: mpsc::UnboundedSender<Sample>) -> Self {
        Self { tx }
    }

    /// Push one sample downstream as soon as it is produced.
    pub fn send(&self, sample: Sample) -> Result<(), CollectorError> {
        self.tx.send(sample).map_err(|_| CollectorError::SinkClosed)
    }
}

/// Core collector trait.
///
/// A collector queries one subsystem of a realm and pushes the resulting
/// samples through the sink. Collectors hold no per-realm state: the same
/// instance runs concurrently against every realm client.
///
/// # Error Handling
///
/// Returning `Err` marks the unit as failed (`scrape_collector_success 0`)
/// without discarding samples already sent. Sibling units are unaffected.
#[async_trait::async_trait]
pub trait Collector: std::fmt::Debug + Send + Sync + 'static {
    /// Registry name, also used as the `collector` label.
    fn name(&self) -> &str;

    /// Perform one collection against `client`.
    async fn update(
        &self,
        ctx: &ScrapeContext,
        client: &Client,
        sink: &SampleSink,
    ) -> Result<(), CollectorError>;
}

//! Collection orchestrator.
//!
//! On each scrape every (collector, realm client) pair runs as its own
//! tokio task. Units write samples into one unbounded merge channel as they
//! produce them; a forwarding future drains that channel into the caller's
//! output and, when caching is enabled, into the snapshot buffer. Each unit
//! ends with a duration and a success sample labeled `collector` and
//! `realm`, whatever the collector returned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheGate, SnapshotCache};
use crate::client::Client;
use crate::collector::{Collector, CollectorError, CollectorSet, SampleSink, ScrapeContext};
use crate::config::AppConfig;
use crate::sample::{METRICS_NAMESPACE, Sample, build_fq_name};

/// Default per-unit timeout (60 seconds).
pub const DEFAULT_UNIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default cache window (20 seconds).
pub const DEFAULT_CACHE_WINDOW: Duration = Duration::from_secs(20);

/// Name of the per-unit duration gauge.
pub fn scrape_duration_name() -> String {
    build_fq_name(METRICS_NAMESPACE, "scrape", "collector_duration_seconds")
}

/// Name of the per-unit success gauge.
pub fn scrape_success_name() -> String {
    build_fq_name(METRICS_NAMESPACE, "scrape", "collector_success")
}

fn duration_sample(collector: &str, realm: &str, elapsed: Duration) -> Sample {
    Sample::gauge(
        scrape_duration_name(),
        "Duration of a collector scrape.",
        elapsed.as_secs_f64(),
    )
    .with_label("collector", collector)
    .with_label("realm", realm)
}

fn success_sample(collector: &str, realm: &str, success: bool) -> Sample {
    Sample::gauge(
        scrape_success_name(),
        "Whether a collector succeeded.",
        if success { 1.0 } else { 0.0 },
    )
    .with_label("collector", collector)
    .with_label("realm", realm)
}

/// Construction options of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Timeout applied to each (collector, realm) unit.
    pub timeout: Duration,
    /// Serve the previous snapshot while it is younger than `cache_window`.
    pub cache_enabled: bool,
    pub cache_window: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_UNIT_TIMEOUT,
            cache_enabled: false,
            cache_window: DEFAULT_CACHE_WINDOW,
        }
    }
}

impl OrchestratorOptions {
    /// Set the per-unit timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable caching with the given window.
    pub fn with_cache(mut self, window: Duration) -> Self {
        self.cache_enabled = true;
        self.cache_window = window;
        self
    }
}

impl From<&AppConfig> for OrchestratorOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: config.timeouts.collector,
            cache_enabled: config.cache.enabled,
            cache_window: config.cache.duration,
        }
    }
}

/// Fans collection out over the collector × realm grid and merges the
/// results into one stream.
pub struct Orchestrator {
    collectors: CollectorSet,
    clients: BTreeMap<String, Arc<Client>>,
    timeout: Duration,
    root: CancellationToken,
    cache: Option<Mutex<SnapshotCache>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("collectors", &self.collectors.keys().collect::<Vec<_>>())
            .field("realms", &self.clients.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("caching", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator.
    ///
    /// `root` is the process-wide cancellation token; cancelling it aborts
    /// every in-flight unit. Clients are keyed by realm name, a later
    /// client with the same name replaces an earlier one.
    pub fn new(
        collectors: CollectorSet,
        clients: impl IntoIterator<Item = Client>,
        options: OrchestratorOptions,
        root: CancellationToken,
    ) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.name().to_string(), Arc::new(client)))
            .collect();
        let cache = options
            .cache_enabled
            .then(|| Mutex::new(SnapshotCache::new(options.cache_window)));

        Self {
            collectors,
            clients,
            timeout: options.timeout,
            root,
            cache,
        }
    }

    pub fn collector_names(&self) -> impl Iterator<Item = &str> {
        self.collectors.keys().map(String::as_str)
    }

    pub fn realm_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Run one scrape, streaming samples into `out`.
    ///
    /// With caching enabled the cache lock is held for the whole call, so a
    /// hit replays a stable snapshot and concurrent misses never run two
    /// rounds at once.
    pub async fn collect(&self, out: &mpsc::UnboundedSender<Sample>) {
        let Some(cache) = &self.cache else {
            self.collect_round(out, None).await;
            return;
        };

        let mut cache = cache.lock().await;
        match cache.gate(Instant::now()) {
            CacheGate::Hit => {
                tracing::debug!(
                    samples = cache.samples().len(),
                    age = ?cache.last_collect().map(|at| at.elapsed()),
                    window = ?cache.window(),
                    "Using cached snapshot"
                );
                for sample in cache.samples() {
                    if out.send(sample.clone()).is_err() {
                        break;
                    }
                }
            }
            CacheGate::Miss => {
                self.collect_round(out, Some(cache.buffer_mut())).await;
                cache.complete(Instant::now());
                tracing::debug!(samples = cache.samples().len(), "Cache refreshed");
            }
        }
    }

    /// Run one scrape and return the samples in forwarding order.
    pub async fn snapshot(&self) -> Vec<Sample> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.collect(&tx).await;
        drop(tx);

        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }
        samples
    }

    async fn collect_round(
        &self,
        out: &mpsc::UnboundedSender<Sample>,
        mut buffer: Option<&mut Vec<Sample>>,
    ) {
        let (merge_tx, mut merge_rx) = mpsc::unbounded_channel::<Sample>();

        // Polled first by `join!`, so it is draining before any unit runs.
        let forward = async {
            let mut forwarded = 0usize;
            while let Some(sample) = merge_rx.recv().await {
                if let Some(buffer) = buffer.as_deref_mut() {
                    buffer.push(sample.clone());
                }
                // Keep draining even if the caller went away.
                let _ = out.send(sample);
                forwarded += 1;
            }
            tracing::debug!(forwarded, "Finished forwarding samples");
        };

        let collection = async move {
            let mut units = JoinSet::new();
            for (collector_name, collector) in &self.collectors {
                for client in self.clients.values() {
                    units.spawn(run_unit(
                        collector_name.clone(),
                        Arc::clone(collector),
                        Arc::clone(client),
                        SampleSink::new(merge_tx.clone()),
                        ScrapeContext::new(self.root.child_token(), self.timeout),
                    ));
                }
            }
            // Units own the remaining senders; the channel closes with the last one.
            drop(merge_tx);

            tracing::debug!(units = units.len(), "Waiting for collectors");
            while let Some(joined) = units.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Collection unit task failed");
                }
            }
            tracing::debug!("Finished waiting for collectors");
        };

        tokio::join!(forward, collection);
    }
}

/// Run one (collector, realm) unit and emit its telemetry.
async fn run_unit(
    collector_name: String,
    collector: Arc<dyn Collector>,
    client: Arc<Client>,
    sink: SampleSink,
    ctx: ScrapeContext,
) {
    let begin = Instant::now();
    let _cancel_on_exit = ctx.token().clone().drop_guard();

    let mut update = tokio::spawn({
        let (ctx, client, sink) = (ctx.clone(), Arc::clone(&client), sink.clone());
        async move { collector.update(&ctx, &client, &sink).await }
    });

    let result = tokio::select! {
        joined = &mut update => {
            joined.unwrap_or_else(|e| Err(CollectorError::Panicked(e.to_string())))
        }
        _ = tokio::time::sleep_until(ctx.deadline()) => {
            Err(CollectorError::Timeout(begin.elapsed()))
        }
        _ = ctx.token().cancelled() => Err(CollectorError::Cancelled),
    };

    if !update.is_finished() {
        update.abort();
        // Wait for the aborted task so it cannot send after the telemetry.
        let _ = update.await;
    }

    let elapsed = begin.elapsed();
    let realm = client.name();
    let success = match &result {
        Ok(()) => {
            tracing::debug!(
                collector = %collector_name,
                realm = %realm,
                duration_secs = elapsed.as_secs_f64(),
                "Collector succeeded"
            );
            true
        }
        Err(e) => {
            tracing::error!(
                collector = %collector_name,
                realm = %realm,
                duration_secs = elapsed.as_secs_f64(),
                error = %e,
                "Collector failed"
            );
            false
        }
    };

    for sample in [
        duration_sample(&collector_name, realm, elapsed),
        success_sample(&collector_name, realm, success),
    ] {
        if let Err(e) = sink.send(sample) {
            tracing::warn!(collector = %collector_name, realm = %realm, error = %e, "Failed to emit scrape telemetry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_client;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Emits one gauge per realm after an optional delay, or fails.
    #[derive(Debug)]
    struct FakeCollector {
        name: &'static str,
        delay: Duration,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeCollector {
        fn ok(name: &'static str) -> Self {
            Self {
                name,
                delay: Duration::ZERO,
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::ok(name)
            }
        }

        fn slow(name: &'static str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::ok(name)
            }
        }
    }

    #[async_trait::async_trait]
    impl Collector for FakeCollector {
        fn name(&self) -> &str {
            self.name
        }

        async fn update(
            &self,
            _ctx: &ScrapeContext,
            client: &Client,
            sink: &SampleSink,
        ) -> Result<(), CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(CollectorError::Config("upstream unavailable".to_string()));
            }
            sink.send(
                Sample::gauge("fake_value", "Fake value", 42.0)
                    .with_label("collector", self.name)
                    .with_label("realm", client.name()),
            )
        }
    }

    #[derive(Debug)]
    struct PanickingCollector;

    #[async_trait::async_trait]
    impl Collector for PanickingCollector {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn update(
            &self,
            _ctx: &ScrapeContext,
            _client: &Client,
            _sink: &SampleSink,
        ) -> Result<(), CollectorError> {
            panic!("collector bug");
        }
    }

    fn set(collectors: Vec<Arc<dyn Collector>>) -> CollectorSet {
        collectors
            .into_iter()
            .map(|c| (c.name().to_string(), c))
            .collect()
    }

    fn orchestrator(
        collectors: Vec<Arc<dyn Collector>>,
        realms: &[&str],
        options: OrchestratorOptions,
    ) -> Orchestrator {
        Orchestrator::new(
            set(collectors),
            realms.iter().map(|realm| test_client(realm)),
            options,
            CancellationToken::new(),
        )
    }

    fn telemetry<'a>(samples: &'a [Sample], name: &str) -> Vec<&'a Sample> {
        samples.iter().filter(|s| s.name() == name).collect()
    }

    #[tokio::test]
    async fn test_single_collector_scenario() {
        let orch = orchestrator(
            vec![Arc::new(FakeCollector::ok("fake"))],
            &["realmA"],
            OrchestratorOptions::default().with_timeout(Duration::from_secs(5)),
        );

        let samples = orch.snapshot().await;
        assert_eq!(samples.len(), 3);

        let gauge = telemetry(&samples, "fake_value")[0];
        assert_eq!(gauge.value(), 42.0);
        assert_eq!(gauge.label("realm"), Some("realmA"));

        let duration = telemetry(&samples, &scrape_duration_name())[0].value();
        assert!(duration > 0.0 && duration < 5.0);

        let success = telemetry(&samples, &scrape_success_name())[0];
        assert_eq!(success.value(), 1.0);
        assert_eq!(success.label("collector"), Some("fake"));
        assert_eq!(success.label("realm"), Some("realmA"));
    }

    #[tokio::test]
    async fn test_telemetry_per_unit() {
        let orch = orchestrator(
            vec![
                Arc::new(FakeCollector::ok("a")),
                Arc::new(FakeCollector::failing("b")),
                Arc::new(FakeCollector::ok("c")),
            ],
            &["r1", "r2"],
            OrchestratorOptions::default(),
        );

        let samples = orch.snapshot().await;
        assert_eq!(telemetry(&samples, &scrape_duration_name()).len(), 6);
        assert_eq!(telemetry(&samples, &scrape_success_name()).len(), 6);
        assert_eq!(telemetry(&samples, "fake_value").len(), 4);
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let orch = orchestrator(
            vec![
                Arc::new(FakeCollector::ok("good")),
                Arc::new(FakeCollector::failing("bad")),
            ],
            &["realmA"],
            OrchestratorOptions::default(),
        );

        let samples = orch.snapshot().await;
        let payload = telemetry(&samples, "fake_value");
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].label("collector"), Some("good"));

        let success = telemetry(&samples, &scrape_success_name());
        assert_eq!(success.len(), 2);
        for sample in success {
            let expected = if sample.label("collector") == Some("good") { 1.0 } else { 0.0 };
            assert_eq!(sample.value(), expected);
        }
        assert_eq!(telemetry(&samples, &scrape_duration_name()).len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_marks_unit_failed() {
        let orch = orchestrator(
            vec![
                Arc::new(FakeCollector::slow("slow", Duration::from_secs(2))),
                Arc::new(FakeCollector::ok("fast")),
            ],
            &["realmA"],
            OrchestratorOptions::default().with_timeout(Duration::from_millis(100)),
        );

        let started = std::time::Instant::now();
        let samples = orch.snapshot().await;
        assert!(started.elapsed() < Duration::from_secs(1));

        let payload = telemetry(&samples, "fake_value");
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].label("collector"), Some("fast"));

        let slow_success = telemetry(&samples, &scrape_success_name())
            .into_iter()
            .find(|s| s.label("collector") == Some("slow"))
            .unwrap();
        assert_eq!(slow_success.value(), 0.0);
    }

    #[tokio::test]
    async fn test_units_run_concurrently() {
        let orch = orchestrator(
            vec![
                Arc::new(FakeCollector::slow("a", Duration::from_millis(100))),
                Arc::new(FakeCollector::slow("b", Duration::from_millis(100))),
            ],
            &["r1", "r2"],
            OrchestratorOptions::default(),
        );

        let started = std::time::Instant::now();
        let samples = orch.snapshot().await;
        let elapsed = started.elapsed();

        assert_eq!(telemetry(&samples, "fake_value").len(), 4);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_telemetry_follows_unit_payload() {
        let orch = orchestrator(
            vec![Arc::new(FakeCollector::ok("a")), Arc::new(FakeCollector::ok("b"))],
            &["r1", "r2"],
            OrchestratorOptions::default(),
        );

        let samples = orch.snapshot().await;
        for payload_idx in samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.name() == "fake_value")
            .map(|(i, _)| i)
        {
            let unit = &samples[payload_idx];
            let success_idx = samples
                .iter()
                .position(|s| {
                    s.name() == scrape_success_name()
                        && s.label("collector") == unit.label("collector")
                        && s.label("realm") == unit.label("realm")
                })
                .unwrap();
            assert!(payload_idx < success_idx);
        }
    }

    #[tokio::test]
    async fn test_panicking_collector_is_contained() {
        let orch = orchestrator(
            vec![Arc::new(PanickingCollector), Arc::new(FakeCollector::ok("ok"))],
            &["realmA"],
            OrchestratorOptions::default(),
        );

        let samples = orch.snapshot().await;
        assert_eq!(telemetry(&samples, "fake_value").len(), 1);
        let panicked = telemetry(&samples, &scrape_success_name())
            .into_iter()
            .find(|s| s.label("collector") == Some("panicking"))
            .unwrap();
        assert_eq!(panicked.value(), 0.0);
    }

    #[tokio::test]
    async fn test_root_cancellation_stops_units() {
        let root = CancellationToken::new();
        let orch = Orchestrator::new(
            set(vec![Arc::new(FakeCollector::slow("slow", Duration::from_secs(30)))]),
            [test_client("realmA")],
            OrchestratorOptions::default(),
            root.clone(),
        );

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            root.cancel();
        });

        let started = std::time::Instant::now();
        let samples = orch.snapshot().await;
        canceller.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(telemetry(&samples, &scrape_success_name())[0].value(), 0.0);
        assert!(telemetry(&samples, "fake_value").is_empty());
    }

    #[tokio::test]
    async fn test_no_realms_yields_empty_round() {
        let orch = orchestrator(
            vec![Arc::new(FakeCollector::ok("a"))],
            &[],
            OrchestratorOptions::default(),
        );
        assert!(orch.snapshot().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_replays_snapshot() {
        let collector = Arc::new(FakeCollector::ok("a"));
        let calls = Arc::clone(&collector.calls);
        let orch = orchestrator(
            vec![collector],
            &["r1", "r2"],
            OrchestratorOptions::default().with_cache(Duration::from_secs(20)),
        );

        let first = orch.snapshot().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(10)).await;
        let second = orch.snapshot().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, second);

        let third = orch.snapshot().await;
        assert_eq!(first, third);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expiry_triggers_new_round() {
        let collector = Arc::new(FakeCollector::ok("a"));
        let calls = Arc::clone(&collector.calls);
        let orch = orchestrator(
            vec![collector],
            &["r1"],
            OrchestratorOptions::default().with_cache(Duration::from_secs(20)),
        );

        orch.snapshot().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(21)).await;
        let samples = orch.snapshot().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(samples.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_window_never_hits() {
        let collector = Arc::new(FakeCollector::ok("a"));
        let calls = Arc::clone(&collector.calls);
        let orch = orchestrator(
            vec![collector],
            &["r1"],
            OrchestratorOptions::default().with_cache(Duration::ZERO),
        );

        orch.snapshot().await;
        orch.snapshot().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_round_is_cached() {
        let collector = Arc::new(FakeCollector::failing("bad"));
        let calls = Arc::clone(&collector.calls);
        let orch = orchestrator(
            vec![collector],
            &["r1"],
            OrchestratorOptions::default().with_cache(Duration::from_secs(20)),
        );

        let first = orch.snapshot().await;
        let second = orch.snapshot().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(telemetry(&second, &scrape_success_name())[0].value(), 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_scrapes_share_one_round() {
        let collector = Arc::new(FakeCollector::slow("a", Duration::from_millis(50)));
        let calls = Arc::clone(&collector.calls);
        let orch = Arc::new(orchestrator(
            vec![collector],
            &["r1"],
            OrchestratorOptions::default().with_cache(Duration::from_secs(60)),
        ));

        let (a, b) = tokio::join!(orch.snapshot(), orch.snapshot());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
    }
}

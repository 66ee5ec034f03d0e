//! Metric samples produced by collectors and by the orchestrator.
//!
//! A [`Sample`] is a single observation: metric name, help text, kind,
//! label assignment and value. Samples are immutable once built and flow
//! from the producer through the merge channel into the cache and the
//! exposition layer.

use std::collections::BTreeMap;
use std::fmt;

/// Namespace prefixed to every metric this exporter emits.
pub const METRICS_NAMESPACE: &str = "extended_ceph";

/// Metric kind as understood by the text exposition format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetricKind {
    #[default]
    Gauge,
    Counter,
    Untyped,
}

impl MetricKind {
    /// Lowercase name used in `# TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Untyped => "untyped",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join namespace, subsystem and name with underscores, skipping empty parts.
///
/// ```
/// use rgw_realm_exporter::sample::build_fq_name;
///
/// assert_eq!(build_fq_name("ns", "rgw", "bucket_size"), "ns_rgw_bucket_size");
/// assert_eq!(build_fq_name("ns", "", "up"), "ns_up");
/// ```
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// A single metric observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    name: String,
    help: String,
    kind: MetricKind,
    labels: BTreeMap<String, String>,
    value: f64,
}

impl Sample {
    /// Create a gauge sample with no labels.
    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Gauge, value)
    }

    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        kind: MetricKind,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            labels: BTreeMap::new(),
            value,
        }
    }

    /// Attach a label. A label set twice keeps the last value.
    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Labels in name order.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

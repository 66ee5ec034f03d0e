//! Prometheus text exposition of a snapshot.
//!
//! Samples are grouped into metric families by name (help and type are
//! taken from the first sample of each family) and encoded with the
//! `prometheus` crate's text encoder.

use std::collections::BTreeMap;

use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType, Untyped};
use prometheus::{Encoder, TextEncoder};

use crate::sample::{MetricKind, Sample};

/// Content type of the encoded output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

fn metric_type(kind: MetricKind) -> MetricType {
    match kind {
        MetricKind::Gauge => MetricType::GAUGE,
        MetricKind::Counter => MetricType::COUNTER,
        MetricKind::Untyped => MetricType::UNTYPED,
    }
}

fn to_metric(sample: &Sample, kind: MetricKind) -> Metric {
    let mut metric = Metric::default();
    for (name, value) in sample.labels() {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }

    match kind {
        MetricKind::Gauge => {
            let mut gauge = Gauge::default();
            gauge.set_value(sample.value());
            metric.set_gauge(gauge);
        }
        MetricKind::Counter => {
            let mut counter = Counter::default();
            counter.set_value(sample.value());
            metric.set_counter(counter);
        }
        MetricKind::Untyped => {
            let mut untyped = Untyped::default();
            untyped.set_value(sample.value());
            metric.set_untyped(untyped);
        }
    }
    metric
}

/// Group samples into metric families, ordered by family name.
///
/// A sample whose kind disagrees with its family's first sample is encoded
/// with the family's kind.
pub fn to_families(samples: &[Sample]) -> Vec<MetricFamily> {
    let mut families: BTreeMap<&str, MetricFamily> = BTreeMap::new();

    for sample in samples {
        let family = families.entry(sample.name()).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(sample.name().to_string());
            family.set_help(sample.help().to_string());
            family.set_field_type(metric_type(sample.kind()));
            family
        });
        let kind = match family.get_field_type() {
            MetricType::COUNTER => MetricKind::Counter,
            MetricType::GAUGE => MetricKind::Gauge,
            _ => MetricKind::Untyped,
        };
        family.mut_metric().push(to_metric(sample, kind));
    }

    families.into_values().collect()
}

/// Encode `samples` in the Prometheus text format.
pub fn encode_text(samples: &[Sample]) -> Result<String, prometheus::Error> {
    let families = to_families(samples);
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

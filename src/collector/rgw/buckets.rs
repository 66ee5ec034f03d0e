//! RGW bucket usage collector.

use crate::client::Client;
use crate::collector::{Collector, CollectorError, SampleSink, ScrapeContext};
use crate::sample::{METRICS_NAMESPACE, Sample, build_fq_name};

use super::SUBSYSTEM;

/// Emits size and object counts of every bucket, plus quota limits for
/// buckets with an enabled bucket quota.
#[derive(Debug, Default)]
pub struct RgwBucketsCollector;

impl RgwBucketsCollector {
    pub const NAME: &'static str = "rgw_buckets";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Collector for RgwBucketsCollector {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn update(
        &self,
        ctx: &ScrapeContext,
        client: &Client,
        sink: &SampleSink,
    ) -> Result<(), CollectorError> {
        let buckets = client.rgw().bucket_stats().await?;
        ctx.ensure_active()?;

        for bucket in &buckets {
            let usage = bucket.total_usage();
            let mut gauges = vec![
                ("bucket_size", "RGW Bucket size in bytes", usage.size as f64),
                (
                    "bucket_actual_size",
                    "RGW Bucket actual size in bytes",
                    usage.size_actual as f64,
                ),
                (
                    "bucket_objects",
                    "RGW Bucket object count",
                    usage.num_objects as f64,
                ),
            ];

            if let Some(quota) = bucket.bucket_quota.as_ref().filter(|q| q.is_enabled()) {
                if let Some(max_size) = quota.max_size {
                    gauges.push((
                        "bucket_quota_max_size",
                        "RGW Bucket Quota max size",
                        max_size as f64,
                    ));
                }
                if let Some(max_objects) = quota.max_objects {
                    gauges.push((
                        "bucket_quota_max_objects",
                        "RGW Bucket Quota max objects",
                        max_objects as f64,
                    ));
                }
            }

            for (name, help, value) in gauges {
                sink.send(
                    Sample::gauge(build_fq_name(METRICS_NAMESPACE, SUBSYSTEM, name), help, value)
                        .with_label("bucket", bucket.bucket.as_str())
                        .with_label("owner", bucket.owner.as_str())
                        .with_label("realm", client.name()),
                )?;
            }
        }

        Ok(())
    }
}

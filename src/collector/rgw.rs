//! Collectors backed by the RGW admin API.
//!
//! - [`RgwUserQuotaCollector`]: per-user quota limits
//! - [`RgwBucketsCollector`]: per-bucket usage and quota

mod buckets;
mod user_quota;

pub use buckets::RgwBucketsCollector;
pub use user_quota::RgwUserQuotaCollector;

/// Metric subsystem shared by the RGW collectors.
const SUBSYSTEM: &str = "rgw";

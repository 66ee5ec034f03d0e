//! Collector registry mapping names to factories.
//!
//! Enabled collector names from the configuration are resolved once at
//! startup. An unknown name is a startup error, never a scrape-time one.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collector::rgw::{RgwBucketsCollector, RgwUserQuotaCollector};
use crate::collector::{Collector, CollectorError};

/// Zero-argument collector constructor.
pub type CollectorFactory = fn() -> Result<Box<dyn Collector>, CollectorError>;

/// Collectors enabled when the configuration names none.
pub const DEFAULT_COLLECTORS: &[&str] = &[RgwUserQuotaCollector::NAME, RgwBucketsCollector::NAME];

const FACTORIES: &[(&str, CollectorFactory)] = &[
    (RgwUserQuotaCollector::NAME, new_rgw_user_quota),
    (RgwBucketsCollector::NAME, new_rgw_buckets),
];

fn new_rgw_user_quota() -> Result<Box<dyn Collector>, CollectorError> {
    Ok(Box::new(RgwUserQuotaCollector::new()))
}

fn new_rgw_buckets() -> Result<Box<dyn Collector>, CollectorError> {
    Ok(Box::new(RgwBucketsCollector::new()))
}

/// Loaded collectors keyed by name.
pub type CollectorSet = BTreeMap<String, Arc<dyn Collector>>;

/// Names of every registered collector.
pub fn available() -> Vec<&'static str> {
    FACTORIES.iter().map(|(name, _)| *name).collect()
}

/// Look up the factory registered under `name`.
pub fn factory(name: &str) -> Option<CollectorFactory> {
    FACTORIES
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, factory)| *factory)
}

/// Instantiate the enabled collectors.
///
/// Duplicate names collapse into one instance.
///
/// # Errors
/// Returns `CollectorError::Unknown` for a name with no factory, or the
/// factory's own error if construction fails.
pub fn load_collectors<S: AsRef<str>>(names: &[S]) -> Result<CollectorSet, CollectorError> {
    load_collectors_from(names, factory)
}

/// Same as [`load_collectors`] with a caller-supplied lookup.
pub fn load_collectors_from<S, F>(names: &[S], lookup: F) -> Result<CollectorSet, CollectorError>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<CollectorFactory>,
{
    let mut collectors = CollectorSet::new();

    for name in names {
        let name = name.as_ref();
        if collectors.contains_key(name) {
            continue;
        }
        let factory = lookup(name).ok_or_else(|| CollectorError::Unknown(name.to_string()))?;
        let collector = factory()?;
        tracing::debug!(collector = %name, "Collector loaded");
        collectors.insert(name.to_string(), Arc::from(collector));
    }

    Ok(collectors)
}

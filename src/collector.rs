//! Collector Layer
//!
//! Pluggable collectors that query one subsystem of a realm and push
//! samples into the scrape's merge channel.
//!
//! # Architecture
//!
//! - [`Collector`]: Core trait for implementing collectors
//! - [`ScrapeContext`]: Timeout-bounded cancellation scope of one unit
//! - [`SampleSink`]: Write side of the merge channel
//! - [`registry`]: Name to factory mapping resolved at startup
//!
//! # Example
//!
//! ```rust,no_run
//! use rgw_realm_exporter::collector::registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let collectors = registry::load_collectors(registry::DEFAULT_COLLECTORS)?;
//! assert_eq!(collectors.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod registry;
pub mod rgw;
mod traits;

pub use registry::{CollectorFactory, CollectorSet, load_collectors};
pub use traits::{Collector, CollectorError, SampleSink, ScrapeContext};

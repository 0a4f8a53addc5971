// src/metrics/mod.rs
mod collector;

pub use collector::{MetricsCollector, MetricsRegistry};

use std::time::Duration;

use crate::target::Address;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    Encode(String),
}

/// Label values attached to every check metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLabels {
    pub target: String,
    pub port: String,
    pub check_name: String,
    pub version: String,
}

impl CheckLabels {
    pub const NAMES: [&'static str; 4] = ["target", "port", "check_name", "version"];

    pub fn new(target: &Address, check_name: &str) -> Self {
        Self {
            target: target.host.clone(),
            port: target.port_label(),
            check_name: check_name.to_string(),
            version: VERSION.to_string(),
        }
    }

    pub fn values(&self) -> [&str; 4] {
        [&self.target, &self.port, &self.check_name, &self.version]
    }
}

/// Destination for check outcomes.
///
/// Only the result pipeline writes to a sink, so implementations see one
/// writer per check even though many workers produce results concurrently.
pub trait MetricSink: Send + Sync {
    fn record(
        &self,
        labels: &CheckLabels,
        success: bool,
        duration: Duration,
    ) -> Result<(), MetricsError>;
}

// src/config/models.rs
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::Level;

use crate::target::Address;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_METRICS_PORT: u16 = 2112;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Settings as they arrive from the config file and the environment, before
/// validation. Every value is kept as a string so parsing errors can name
/// the offending input.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawSettings {
    pub target: Option<String>,
    pub interval: Option<String>,
    pub worker: Option<String>,
    pub metrics_port: Option<String>,
    pub metrics_path: Option<String>,
    pub log_level: Option<String>,
    pub log_json: Option<String>,
    pub manual_dns_host: Option<String>,
    pub run_dig: Option<String>,
    pub checks: Option<String>,
    pub check_timeout: Option<String>,
    pub check_timeouts: Option<String>,
    pub debug_duration: Option<String>,
    pub metrics_histogram_buckets: Option<String>,
    pub result_queue_size: Option<String>,
}

/// Validated, immutable process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<Address>,
    pub schedule: ScheduleConfig,
    pub workers: usize,
    pub result_queue_size: usize,
    pub checks: CheckConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Tick interval and per-item deadlines.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub interval: Duration,
    pub check_timeout: Option<Duration>,
    pub check_timeouts: HashMap<String, Duration>,
}

impl ScheduleConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            check_timeout: None,
            check_timeouts: HashMap::new(),
        }
    }

    /// Deadline for one run of the named check: an explicit per-check
    /// timeout, else the global check timeout, else the interval.
    pub fn timeout_for(&self, check_name: &str) -> Duration {
        self.check_timeouts
            .get(check_name)
            .copied()
            .or(self.check_timeout)
            .unwrap_or(self.interval)
    }

    /// Longest deadline any check can run under.
    pub fn max_timeout(&self) -> Duration {
        self.check_timeouts
            .values()
            .copied()
            .chain(self.check_timeout)
            .chain(std::iter::once(self.interval))
            .max()
            .unwrap_or(self.interval)
    }
}

/// Which checks the registry builds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckConfig {
    /// Explicit check names; `None` selects the default set.
    pub enabled: Option<Vec<String>>,
    pub manual_dns_host: Option<String>,
    pub run_dig: bool,
    pub debug_duration: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub port: u16,
    pub path: String,
    /// Histogram buckets in seconds, already filtered by the longest timeout.
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_METRICS_PORT,
            path: DEFAULT_METRICS_PATH.to_string(),
            histogram_buckets: super::parse::DEFAULT_BUCKETS.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
        }
    }
}

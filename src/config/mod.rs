// src/config/mod.rs
mod models;
mod parse;

pub use models::*;
pub use parse::{histogram_buckets, parse_bool, parse_duration, DEFAULT_BUCKETS};

use config::{Environment, File};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use crate::target::parse_targets;

pub(crate) const LIST_SEPARATOR: char = ',';
const TARGET_ENV_PREFIX: &str = "TARGET";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("env var TARGET is needed")]
    MissingTargets,

    #[error("port {port:?} of host {host:?} can not be parsed as int")]
    InvalidPort { host: String, port: String },

    #[error("{0:?} can not be parsed as duration")]
    InvalidDuration(String),

    #[error("interval must be greater than zero")]
    ZeroInterval,

    #[error("env var {name} {value:?} can not be parsed as a positive int")]
    InvalidNumber { name: &'static str, value: String },

    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    #[error("invalid check timeout entry {0:?}, expected name=duration")]
    InvalidCheckTimeout(String),

    #[error("check manual-dns requires MANUAL_DNS_HOST")]
    ManualDnsHostMissing,

    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
}

/// Read raw settings from an optional file (YAML or JSON) layered under the
/// process environment.
pub fn load_settings<P: AsRef<Path>>(path: Option<P>) -> Result<RawSettings, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path.as_ref()).required(true));
    }
    let raw = builder
        .add_source(Environment::default())
        .build()?
        .try_deserialize()?;
    Ok(raw)
}

/// Load and validate the full configuration.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    Config::from_raw(load_settings(path)?, extra_targets())
}

/// Values of every `TARGET*` environment variable other than `TARGET`
/// itself, which arrives through [`RawSettings::target`].
pub fn extra_targets() -> Vec<String> {
    let mut extra: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key.starts_with(TARGET_ENV_PREFIX) && key != TARGET_ENV_PREFIX)
        .collect();
    extra.sort();
    extra.into_iter().map(|(_, value)| value).collect()
}

impl LoggingConfig {
    /// Logging needs to be validated ahead of everything else so the rest
    /// of startup can log.
    pub fn from_raw(raw: &RawSettings) -> Result<Self, ConfigError> {
        let level = match raw.log_level.as_deref() {
            Some(l) => Level::from_str(l.trim())
                .map_err(|_| ConfigError::InvalidLogLevel(l.to_string()))?,
            None => Level::INFO,
        };
        Ok(Self {
            level,
            json: flag(raw.log_json.as_deref()),
        })
    }
}

impl Config {
    /// Validate raw settings. Any error here is fatal at startup.
    pub fn from_raw(raw: RawSettings, extra_targets: Vec<String>) -> Result<Self, ConfigError> {
        let logging = LoggingConfig::from_raw(&raw)?;

        let values: Vec<String> = raw.target.clone().into_iter().chain(extra_targets).collect();
        if values.is_empty() {
            return Err(ConfigError::MissingTargets);
        }
        let targets = parse_targets(&values)?;

        let interval = match raw.interval.as_deref() {
            Some(i) => parse_duration(i)?,
            None => DEFAULT_INTERVAL,
        };
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        let workers = optional_positive("WORKER", raw.worker.as_deref())?
            .unwrap_or(DEFAULT_WORKERS);
        let result_queue_size =
            optional_positive("RESULT_QUEUE_SIZE", raw.result_queue_size.as_deref())?
                .unwrap_or(workers * 2);

        let mut schedule = ScheduleConfig::new(interval);
        if let Some(t) = raw.check_timeout.as_deref() {
            schedule.check_timeout = Some(parse_duration(t)?);
        }
        if let Some(t) = raw.check_timeouts.as_deref() {
            schedule.check_timeouts = parse_check_timeouts(t)?;
        }

        let checks = CheckConfig {
            enabled: raw.checks.as_deref().map(split_list),
            manual_dns_host: raw
                .manual_dns_host
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
            run_dig: flag(raw.run_dig.as_deref()),
            debug_duration: flag(raw.debug_duration.as_deref()),
        };

        let metrics_port = match raw.metrics_port.as_deref() {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "METRICS_PORT",
                    value: p.to_string(),
                })?,
            None => DEFAULT_METRICS_PORT,
        };
        let metrics = MetricsConfig {
            port: metrics_port,
            path: raw
                .metrics_path
                .unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string()),
            histogram_buckets: histogram_buckets(
                raw.metrics_histogram_buckets.as_deref(),
                schedule.max_timeout(),
            ),
        };

        Ok(Self {
            targets,
            schedule,
            workers,
            result_queue_size,
            checks,
            metrics,
            logging,
        })
    }
}

fn optional_positive(name: &'static str, value: Option<&str>) -> Result<Option<usize>, ConfigError> {
    match value {
        Some(v) => match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidNumber {
                name,
                value: v.to_string(),
            }),
        },
        None => Ok(None),
    }
}

fn flag(value: Option<&str>) -> bool {
    value.and_then(parse_bool).unwrap_or(false)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_check_timeouts(value: &str) -> Result<HashMap<String, Duration>, ConfigError> {
    let mut timeouts = HashMap::new();
    for entry in split_list(value) {
        let (name, duration) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidCheckTimeout(entry.clone()))?;
        timeouts.insert(name.trim().to_string(), parse_duration(duration)?);
    }
    Ok(timeouts)
}

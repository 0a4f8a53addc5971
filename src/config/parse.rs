// src/config/parse.rs
use super::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BUCKETS: [f64; 13] = [
    0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0,
];

static DURATION_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|ms|s|m|h)")
        .expect("duration pattern is valid")
});

/// Parse a Go-style duration string such as `30s`, `1m30s` or `1.5h`.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let value = input.trim();
    let invalid = || ConfigError::InvalidDuration(input.to_string());

    if value == "0" {
        return Ok(Duration::ZERO);
    }
    if value.is_empty() {
        return Err(invalid());
    }

    let mut consumed = 0;
    let mut total = 0f64;
    for caps in DURATION_COMPONENT.captures_iter(value) {
        let whole = caps.get(0).ok_or_else(invalid)?;
        if whole.start() != consumed {
            return Err(invalid());
        }
        consumed = whole.end();

        let amount: f64 = caps[1].parse().map_err(|_| invalid())?;
        let unit_secs = match &caps[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        total += amount * unit_secs;
    }

    if consumed != value.len() {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}

/// Boolean spelling accepted by Go's `strconv.ParseBool`.
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Histogram buckets (in seconds) not exceeding `timeout`.
///
/// A custom `,`-separated list replaces the defaults; if any entry fails to
/// parse the defaults are kept and a warning is logged.
pub fn histogram_buckets(custom: Option<&str>, timeout: Duration) -> Vec<f64> {
    let buckets = match custom {
        Some(raw) => {
            let parsed: Result<Vec<f64>, _> = raw
                .split(super::LIST_SEPARATOR)
                .map(|b| b.trim().parse::<f64>())
                .collect();
            match parsed {
                Ok(buckets) => buckets,
                Err(_) => {
                    warn!(
                        env = "METRICS_HISTOGRAM_BUCKETS",
                        value = raw,
                        default = ?DEFAULT_BUCKETS,
                        "could not parse the buckets, using the default"
                    );
                    DEFAULT_BUCKETS.to_vec()
                }
            }
        }
        None => DEFAULT_BUCKETS.to_vec(),
    };

    let limit = timeout.as_secs_f64();
    buckets.into_iter().filter(|b| *b <= limit).collect()
}

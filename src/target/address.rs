// src/target/address.rs
use crate::config::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::info;

const TARGET_SEPARATOR: char = ',';

static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$\{(.*)\}$").expect("environment reference pattern is valid")
});

/// A host to check, optionally with a port.
///
/// Built once from configuration and never mutated afterwards. Checks that
/// need a port decline to run against an address without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: Option<u16>,
}

impl Address {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Port rendered as a metric label value, empty when absent.
    pub fn port_label(&self) -> String {
        self.port.map(|p| p.to_string()).unwrap_or_default()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Replace a `${NAME}` segment with the value of the environment variable
/// `NAME`. Anything else passes through unchanged. An unset variable yields
/// an empty string.
pub fn from_env(segment: &str) -> String {
    match ENV_REFERENCE.captures(segment) {
        Some(caps) => std::env::var(&caps[1]).unwrap_or_default(),
        None => segment.to_string(),
    }
}

/// Parse a single `host` or `host:port` entry.
pub fn parse_target(input: &str) -> Result<Address, ConfigError> {
    let mut parts = input.trim().split(':');
    let host = from_env(parts.next().unwrap_or_default().trim());

    let Some(raw_port) = parts.next() else {
        return Ok(Address::new(host, None));
    };

    let port = from_env(raw_port.trim());
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(Address::new(host, Some(p))),
        _ => Err(ConfigError::InvalidPort { host, port }),
    }
}

/// Parse every `,`-separated entry of every value into addresses.
pub fn parse_targets<S: AsRef<str>>(values: &[S]) -> Result<Vec<Address>, ConfigError> {
    let mut targets = Vec::new();
    for value in values {
        for entry in value.as_ref().split(TARGET_SEPARATOR) {
            if entry.trim().is_empty() {
                continue;
            }
            let target = parse_target(entry)?;
            match target.port {
                Some(port) => info!(host = %target.host, port, "Setup check"),
                None => info!(host = %target.host, "Setup check"),
            }
            targets.push(target);
        }
    }

    if targets.is_empty() {
        return Err(ConfigError::MissingTargets);
    }
    Ok(targets)
}

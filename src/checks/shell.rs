// src/checks/shell.rs
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{Check, CheckError, CheckResult, Execution, Reporter};
use crate::context::Context;
use crate::metrics::{MetricSink, MetricsError};
use crate::target::Address;

static QUERY_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";; Query time: (\d+) msec").expect("query time pattern is valid"));
static NO_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"status: NOERROR").expect("status pattern is valid"));
static RECEIVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"bytes received in (\d+[.]\d*) seconds").expect("received pattern is valid")
});

/// Run `command` through `sh -c`. The child is killed if the returned
/// future is dropped, which is how context expiry reaches it.
async fn sh(command: &str, combined: bool) -> Result<String, CheckError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CheckError::Command(e.to_string()))?;

    if !output.status.success() {
        return Err(CheckError::Command(output.status.to_string()));
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if combined {
        text.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    Ok(text)
}

/// Validate `dig` output and pull out the reported query time.
///
/// Output without `status: NOERROR` is a failure. A missing query time is
/// not: the result simply carries no duration.
pub fn parse_dig_output(output: &str) -> Result<Option<Duration>, CheckError> {
    if !NO_ERROR.is_match(output) {
        return Err(CheckError::UnexpectedOutput(output.to_string()));
    }
    let duration = QUERY_TIME
        .captures(output)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .map(Duration::from_millis);
    if duration.is_none() {
        debug!(command = "dig", "error parsing query time");
    }
    Ok(duration)
}

/// Transfer time reported by a verbose `nc`, if any.
pub fn parse_nc_output(output: &str) -> Option<Duration> {
    let duration = RECEIVED
        .captures(output)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(Duration::from_secs_f64);
    if duration.is_none() {
        debug!(command = "nc", "error parsing query time");
    }
    duration
}

pub struct DigCheck {
    reporter: Reporter,
}

impl DigCheck {
    pub const NAME: &'static str = "dig-shell";

    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self {
            reporter: Reporter::new(Self::NAME, "Dig succeeded", "Error executing dig", sink),
        }
    }
}

#[async_trait]
impl Check for DigCheck {
    fn name(&self) -> &'static str {
        self.reporter.name()
    }

    async fn run(&self, ctx: &Context, target: &Address) -> Option<CheckResult> {
        let values = vec![target.host.clone()];
        let command = format!("dig {}", target.host);

        let output = match ctx.run(sh(&command, false)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) | Err(e) => return Some(CheckResult::failed(values, e)),
        };
        debug!(command = "dig", "{}", output);

        Some(match parse_dig_output(&output) {
            Ok(duration) => CheckResult::new(values, Ok(())).with_duration(duration),
            Err(e) => CheckResult::failed(values, e),
        })
    }

    fn report(&self, execution: &Execution) -> Result<(), MetricsError> {
        self.reporter.report(execution)
    }
}

pub struct NcCheck {
    reporter: Reporter,
}

impl NcCheck {
    pub const NAME: &'static str = "nc-shell";

    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self {
            reporter: Reporter::new(Self::NAME, "Netcat succeeded", "Error executing nc", sink),
        }
    }
}

#[async_trait]
impl Check for NcCheck {
    fn name(&self) -> &'static str {
        self.reporter.name()
    }

    async fn run(&self, ctx: &Context, target: &Address) -> Option<CheckResult> {
        let port = target.port?;
        let values = vec![target.host.clone(), port.to_string()];
        let command = format!("nc -zv {} {}", target.host, port);

        let output = match ctx.run(sh(&command, true)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) | Err(e) => return Some(CheckResult::failed(values, e)),
        };
        debug!(command = "nc", "{}", output);

        Some(CheckResult::new(values, Ok(())).with_duration(parse_nc_output(&output)))
    }

    fn report(&self, execution: &Execution) -> Result<(), MetricsError> {
        self.reporter.report(execution)
    }
}

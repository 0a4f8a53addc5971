// src/checks/mod.rs
mod dns;
mod manual_dns;
mod registry;
pub(crate) mod report;
mod shell;
mod tcp;

pub use dns::DnsLookupCheck;
pub use manual_dns::{codec, ManualDnsCheck};
pub use registry::{build_checks, enabled_kinds, CheckKind};
pub use report::Reporter;
pub use shell::{parse_dig_output, parse_nc_output, DigCheck, NcCheck};
pub use tcp::TcpProbeCheck;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::metrics::MetricsError;
use crate::target::Address;
use codec::DnsError;

/// A pluggable probe.
#[async_trait]
pub trait Check: Send + Sync {
    /// Stable identifier, used as the `check_name` label.
    fn name(&self) -> &'static str;

    /// Probe `target`. `None` means the check does not apply to this target
    /// and nothing is reported. Blocking I/O must observe `ctx`.
    async fn run(&self, ctx: &Context, target: &Address) -> Option<CheckResult>;

    /// Publish a finished execution. Called only from the result pipeline.
    fn report(&self, execution: &Execution) -> Result<(), MetricsError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CheckError {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("lookup failed: {0}")]
    Resolve(String),

    #[error("no addresses found for {0}")]
    NoAddresses(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("{0}")]
    Io(String),

    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error("command failed: {0}")]
    Command(String),

    #[error("unexpected output: {0}")]
    UnexpectedOutput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CheckError {
    /// True for the sentinels produced when a context fires.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CheckError::Cancelled | CheckError::DeadlineExceeded)
    }
}

/// Outcome of one `run`.
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    /// Check-specific label values, e.g. host and port.
    pub values: Vec<String>,
    /// Set by checks that time themselves; otherwise filled in by the worker.
    pub duration: Option<Duration>,
    pub error: Option<CheckError>,
    pub timed_out: bool,
    pub worker_id: usize,
}

impl CheckResult {
    pub fn new(values: Vec<String>, outcome: Result<(), CheckError>) -> Self {
        Self {
            values,
            error: outcome.err(),
            ..Default::default()
        }
    }

    pub fn failed(values: Vec<String>, error: CheckError) -> Self {
        Self::new(values, Err(error))
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A completed work item on its way to the result pipeline.
pub struct Execution {
    pub check: Arc<dyn Check>,
    pub target: Address,
    pub result: CheckResult,
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("check", &self.check.name())
            .field("target", &self.target)
            .field("result", &self.result)
            .finish()
    }
}

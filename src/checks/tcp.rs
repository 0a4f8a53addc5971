// src/checks/tcp.rs
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpStream;

use super::{Check, CheckError, CheckResult, Execution, Reporter};
use crate::context::Context;
use crate::metrics::{MetricSink, MetricsError};
use crate::target::Address;

/// Opens a TCP connection to `host:port` and closes it again.
pub struct TcpProbeCheck {
    reporter: Reporter,
}

impl TcpProbeCheck {
    pub const NAME: &'static str = "tcp-probe";

    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self {
            reporter: Reporter::new(Self::NAME, "Probe was successful", "Error probing", sink),
        }
    }
}

#[async_trait]
impl Check for TcpProbeCheck {
    fn name(&self) -> &'static str {
        self.reporter.name()
    }

    async fn run(&self, ctx: &Context, target: &Address) -> Option<CheckResult> {
        let port = target.port?;
        let values = vec![target.host.clone(), port.to_string()];

        let outcome = match ctx.run(TcpStream::connect((target.host.as_str(), port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(CheckError::Connect(e.to_string())),
            Err(e) => Err(e),
        };
        Some(CheckResult::new(values, outcome))
    }

    fn report(&self, execution: &Execution) -> Result<(), MetricsError> {
        self.reporter.report(execution)
    }
}

// src/checks/dns.rs
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::lookup_host;
use tracing::debug;

use super::{Check, CheckError, CheckResult, Execution, Reporter};
use crate::context::Context;
use crate::metrics::{MetricSink, MetricsError};
use crate::target::Address;

/// Resolves the target host with the system resolver.
pub struct DnsLookupCheck {
    reporter: Reporter,
}

impl DnsLookupCheck {
    pub const NAME: &'static str = "dns-lookup";

    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self {
            reporter: Reporter::new(Self::NAME, "Host resolved", "Error resolving host", sink),
        }
    }
}

async fn resolve(host: &str) -> Result<Vec<IpAddr>, CheckError> {
    let addrs = lookup_host((host, 0))
        .await
        .map_err(|e| CheckError::Resolve(e.to_string()))?;
    let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
    if ips.is_empty() {
        return Err(CheckError::NoAddresses(host.to_string()));
    }
    Ok(ips)
}

#[async_trait]
impl Check for DnsLookupCheck {
    fn name(&self) -> &'static str {
        self.reporter.name()
    }

    async fn run(&self, ctx: &Context, target: &Address) -> Option<CheckResult> {
        let outcome = match ctx.run(resolve(&target.host)).await {
            Ok(Ok(ips)) => {
                debug!(host = %target.host, ?ips, "Host resolved");
                Ok(())
            }
            Ok(Err(e)) | Err(e) => Err(e),
        };
        Some(CheckResult::new(vec![target.host.clone()], outcome))
    }

    fn report(&self, execution: &Execution) -> Result<(), MetricsError> {
        self.reporter.report(execution)
    }
}

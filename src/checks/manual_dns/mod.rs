// src/checks/manual_dns/mod.rs
pub mod codec;

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{lookup_host, UdpSocket};

use super::{Check, CheckError, CheckResult, Execution, Reporter};
use crate::context::Context;
use crate::metrics::{MetricSink, MetricsError};
use crate::target::Address;
use codec::{classify, response_code, DnsQuery, MAX_UDP_MESSAGE};

const DEFAULT_DNS_PORT: u16 = 53;

/// Sends a hand-built A query for the target host to a fixed DNS server
/// over UDP and checks the response code.
pub struct ManualDnsCheck {
    reporter: Reporter,
    dns_server: String,
}

impl ManualDnsCheck {
    pub const NAME: &'static str = "manual-dns";

    pub fn new(dns_host: &str, sink: Arc<dyn MetricSink>) -> Self {
        Self {
            reporter: Reporter::new(
                Self::NAME,
                format!("Host resolved with dns server {dns_host}"),
                format!("Error resolving host with dns server {dns_host}"),
                sink,
            ),
            dns_server: with_default_port(dns_host),
        }
    }

    pub fn dns_server(&self) -> &str {
        &self.dns_server
    }

    async fn query(&self, host: &str) -> Result<(), CheckError> {
        let query = DnsQuery::manual(host).encode()?;
        let response = exchange(&self.dns_server, &query).await?;
        classify(response_code(&response)?)?;
        Ok(())
    }
}

/// `host` or `host:port`; bare IPv6 literals are bracketed.
fn with_default_port(dns_host: &str) -> String {
    let host = dns_host.trim();
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_DNS_PORT).to_string();
    }
    match host.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => host.to_string(),
        _ => format!("{host}:{DEFAULT_DNS_PORT}"),
    }
}

async fn exchange(server: &str, query: &[u8]) -> Result<Vec<u8>, CheckError> {
    let remote = lookup_host(server)
        .await
        .map_err(|e| CheckError::Connect(e.to_string()))?
        .next()
        .ok_or_else(|| CheckError::NoAddresses(server.to_string()))?;

    let local: SocketAddr = if remote.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| CheckError::Connect(e.to_string()))?;
    socket
        .connect(remote)
        .await
        .map_err(|e| CheckError::Connect(e.to_string()))?;

    socket
        .send(query)
        .await
        .map_err(|e| CheckError::Io(e.to_string()))?;

    let mut response = vec![0u8; MAX_UDP_MESSAGE];
    let read = socket
        .recv(&mut response)
        .await
        .map_err(|e| CheckError::Io(e.to_string()))?;
    response.truncate(read);
    Ok(response)
}

#[async_trait]
impl Check for ManualDnsCheck {
    fn name(&self) -> &'static str {
        self.reporter.name()
    }

    async fn run(&self, ctx: &Context, target: &Address) -> Option<CheckResult> {
        let outcome = match ctx.run(self.query(&target.host)).await {
            Ok(inner) => inner,
            Err(e) => Err(e),
        };
        Some(CheckResult::new(vec![target.host.clone()], outcome))
    }

    fn report(&self, execution: &Execution) -> Result<(), MetricsError> {
        self.reporter.report(execution)
    }
}

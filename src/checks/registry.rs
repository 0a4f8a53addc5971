// src/checks/registry.rs
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Check, DigCheck, DnsLookupCheck, ManualDnsCheck, NcCheck, TcpProbeCheck};
use crate::config::{CheckConfig, ConfigError};
use crate::metrics::MetricSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    DnsLookup,
    TcpProbe,
    ManualDns,
    DigShell,
    NcShell,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::DnsLookup,
        CheckKind::TcpProbe,
        CheckKind::ManualDns,
        CheckKind::DigShell,
        CheckKind::NcShell,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::DnsLookup => DnsLookupCheck::NAME,
            CheckKind::TcpProbe => TcpProbeCheck::NAME,
            CheckKind::ManualDns => ManualDnsCheck::NAME,
            CheckKind::DigShell => DigCheck::NAME,
            CheckKind::NcShell => NcCheck::NAME,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or(())
    }
}

/// The checks selected by `config`, in a stable order without duplicates.
pub fn enabled_kinds(config: &CheckConfig) -> Vec<CheckKind> {
    let mut kinds = Vec::new();
    match &config.enabled {
        Some(names) => {
            for name in names {
                match name.parse::<CheckKind>() {
                    Ok(kind) if !kinds.contains(&kind) => kinds.push(kind),
                    Ok(_) => {}
                    Err(()) => warn!(name = %name, "Ignoring unknown check"),
                }
            }
        }
        None => {
            kinds.push(CheckKind::DnsLookup);
            kinds.push(CheckKind::TcpProbe);
            if config.manual_dns_host.is_some() {
                kinds.push(CheckKind::ManualDns);
            }
            if config.run_dig {
                kinds.push(CheckKind::DigShell);
            }
        }
    }
    kinds
}

/// Build the immutable set of checks for the process lifetime.
pub fn build_checks(
    config: &CheckConfig,
    sink: Arc<dyn MetricSink>,
) -> Result<Vec<Arc<dyn Check>>, ConfigError> {
    let mut checks: Vec<Arc<dyn Check>> = Vec::new();
    for kind in enabled_kinds(config) {
        let check: Arc<dyn Check> = match kind {
            CheckKind::DnsLookup => Arc::new(DnsLookupCheck::new(sink.clone())),
            CheckKind::TcpProbe => Arc::new(TcpProbeCheck::new(sink.clone())),
            CheckKind::ManualDns => {
                let host = config
                    .manual_dns_host
                    .as_deref()
                    .ok_or(ConfigError::ManualDnsHostMissing)?;
                Arc::new(ManualDnsCheck::new(host, sink.clone()))
            }
            CheckKind::DigShell => Arc::new(DigCheck::new(sink.clone())),
            CheckKind::NcShell => Arc::new(NcCheck::new(sink.clone())),
        };
        checks.push(check);
    }

    info!(
        checks = ?checks.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "Enabled checks"
    );
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::report::testing::RecordingSink;

    fn names(checks: &[Arc<dyn Check>]) -> Vec<&'static str> {
        checks.iter().map(|c| c.name()).collect()
    }

    fn sink() -> Arc<dyn MetricSink> {
        Arc::new(RecordingSink::default())
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in CheckKind::ALL {
            assert_eq!(kind.name().parse::<CheckKind>(), Ok(kind));
        }
        assert!("ping".parse::<CheckKind>().is_err());
    }

    #[test]
    fn test_default_set() {
        let checks = build_checks(&CheckConfig::default(), sink()).unwrap();
        assert_eq!(names(&checks), vec!["dns-lookup", "tcp-probe"]);

        let config = CheckConfig {
            manual_dns_host: Some("10.0.0.53".into()),
            run_dig: true,
            ..Default::default()
        };
        let checks = build_checks(&config, sink()).unwrap();
        assert_eq!(
            names(&checks),
            vec!["dns-lookup", "tcp-probe", "manual-dns", "dig-shell"]
        );
    }

    #[test]
    fn test_explicit_selection_ignores_unknown_and_duplicates() {
        let config = CheckConfig {
            enabled: Some(vec![
                "nc-shell".into(),
                "bogus".into(),
                "tcp-probe".into(),
                "nc-shell".into(),
            ]),
            ..Default::default()
        };
        let checks = build_checks(&config, sink()).unwrap();
        assert_eq!(names(&checks), vec!["nc-shell", "tcp-probe"]);
    }

    #[test]
    fn test_manual_dns_requires_host() {
        let config = CheckConfig {
            enabled: Some(vec!["manual-dns".into()]),
            ..Default::default()
        };
        assert!(matches!(
            build_checks(&config, sink()),
            Err(ConfigError::ManualDnsHostMissing)
        ));
    }
}

// src/checks/report.rs
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Execution;
use crate::metrics::{CheckLabels, MetricSink, MetricsError};

/// Reporting shared by all checks: one structured log line and one sink
/// write per execution.
pub struct Reporter {
    name: &'static str,
    message_ok: String,
    message_nok: String,
    sink: Arc<dyn MetricSink>,
}

impl Reporter {
    pub fn new(
        name: &'static str,
        message_ok: impl Into<String>,
        message_nok: impl Into<String>,
        sink: Arc<dyn MetricSink>,
    ) -> Self {
        info!(name, "Setup check");
        Self {
            name,
            message_ok: message_ok.into(),
            message_nok: message_nok.into(),
            sink,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn report(&self, execution: &Execution) -> Result<(), MetricsError> {
        let target = &execution.target;
        let result = &execution.result;
        let duration = result.duration.unwrap_or_default();
        let duration_ms = duration.as_secs_f64() * 1000.0;

        match &result.error {
            Some(err) => warn!(
                name = self.name,
                target = %target.host,
                port = target.port,
                worker = result.worker_id,
                duration = duration_ms,
                timed_out = result.timed_out,
                "{} : {}",
                self.message_nok,
                err
            ),
            None => debug!(
                name = self.name,
                target = %target.host,
                port = target.port,
                worker = result.worker_id,
                duration = duration_ms,
                values = ?result.values,
                "{}",
                self.message_ok
            ),
        }

        let labels = CheckLabels::new(target, self.name);
        self.sink.record(&labels, result.is_success(), duration)
    }
}

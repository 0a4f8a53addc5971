// src/metrics/collector.rs
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

use super::{CheckLabels, MetricSink, MetricsError};
use crate::config::MetricsConfig;

const METRIC_NAME: &str = "dns_checker_check";

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry, config)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Render every registered metric in the text exposition format.
    pub fn gather(&self) -> Result<Vec<u8>, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}

/// Prometheus-backed [`MetricSink`].
pub struct MetricsCollector {
    pub success: GaugeVec,
    pub error: GaugeVec,
    pub duration_ms: GaugeVec,
    pub histogram: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry, config: &MetricsConfig) -> Result<Self, MetricsError> {
        let labels = &CheckLabels::NAMES;

        let success = GaugeVec::new(
            Opts::new(METRIC_NAME, "Result of the check 0 = error, 1 = OK"),
            labels,
        )?;
        registry.register(Box::new(success.clone()))?;

        let error = GaugeVec::new(
            Opts::new(
                format!("{METRIC_NAME}_error"),
                "Check resulted in an error; 1 = error, 0 = OK",
            ),
            labels,
        )?;
        registry.register(Box::new(error.clone()))?;

        let duration_ms = GaugeVec::new(
            Opts::new(
                format!("{METRIC_NAME}_duration"),
                format!("The duration of {METRIC_NAME} in ms"),
            ),
            labels,
        )?;
        registry.register(Box::new(duration_ms.clone()))?;

        let histogram = HistogramVec::new(
            HistogramOpts::new(
                format!("{METRIC_NAME}_histogram"),
                "The duration of checks in seconds and buckets",
            )
            .buckets(config.histogram_buckets.clone()),
            labels,
        )?;
        registry.register(Box::new(histogram.clone()))?;

        Ok(Self {
            success,
            error,
            duration_ms,
            histogram,
        })
    }
}

impl MetricSink for MetricsCollector {
    fn record(
        &self,
        labels: &CheckLabels,
        success: bool,
        duration: Duration,
    ) -> Result<(), MetricsError> {
        let values = labels.values();
        let (ok, failed) = if success { (1.0, 0.0) } else { (0.0, 1.0) };

        self.success.get_metric_with_label_values(&values)?.set(ok);
        self.error.get_metric_with_label_values(&values)?.set(failed);
        self.duration_ms
            .get_metric_with_label_values(&values)?
            .set(duration.as_secs_f64() * 1000.0);
        self.histogram
            .get_metric_with_label_values(&values)?
            .observe(duration.as_secs_f64());
        Ok(())
    }
}

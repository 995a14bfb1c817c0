//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the upload pipeline reports on.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    uploads_total: IntCounterVec,
    upload_rejections_total: IntCounterVec,
    pipeline_stage_total: IntCounterVec,
    upload_bytes_total: IntCounter,
    uploads_in_flight: IntGauge,
    checks_in_flight: IntGauge,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Packages currently being received.
    pub uploads_in_flight: i64,
    /// Packages currently being expanded or verified.
    pub checks_in_flight: i64,
    /// Total bytes persisted by accepted and rejected uploads.
    pub upload_bytes_total: u64,
    /// Uploads that completed successfully.
    pub uploads_accepted_total: u64,
    /// Uploads that were rejected with an error code.
    pub uploads_rejected_total: u64,
}

const OUTCOME_ACCEPTED: &str = "accepted";
const OUTCOME_REJECTED: &str = "rejected";

/// Series registered by [`Metrics`], in registration order.
pub const UPLOAD_COLLECTORS: [&str; 7] = [
    "http_requests_total",
    "uploads_total",
    "upload_rejections_total",
    "pipeline_stage_total",
    "upload_bytes_total",
    "uploads_in_flight",
    "checks_in_flight",
];

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::define(name, source))
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::define(name, source))
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "HTTP requests by route, status and upload code",
            &["route", "status", "upload_code"],
        )?;
        let uploads_total = counter_vec(
            "uploads_total",
            "Algorithm uploads by outcome",
            &["outcome"],
        )?;
        let upload_rejections_total = counter_vec(
            "upload_rejections_total",
            "Rejected algorithm uploads by response code",
            &["code"],
        )?;
        let pipeline_stage_total = counter_vec(
            "pipeline_stage_total",
            "Upload pipeline stages executed by status",
            &["stage", "status"],
        )?;
        let upload_bytes_total = IntCounter::with_opts(Opts::new(
            "upload_bytes_total",
            "Bytes written to the storage root",
        ))
        .map_err(|source| TelemetryError::define("upload_bytes_total", source))?;
        let uploads_in_flight = gauge("uploads_in_flight", "Packages currently being received")?;
        let checks_in_flight = gauge(
            "checks_in_flight",
            "Packages currently being expanded or verified",
        )?;

        let metrics = Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                uploads_total,
                upload_rejections_total,
                pipeline_stage_total,
                upload_bytes_total,
                uploads_in_flight,
                checks_in_flight,
            }),
        };
        metrics.register_into(&metrics.inner.registry)?;
        Ok(metrics)
    }

    /// Register every upload collector into `registry`, so an embedding
    /// process can expose them next to its own series.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Collector`] naming the first series the
    /// registry refused, typically because it is already registered.
    pub fn register_into(&self, registry: &Registry) -> Result<()> {
        let inner = &self.inner;
        let collectors: [Box<dyn prometheus::core::Collector>; UPLOAD_COLLECTORS.len()] = [
            Box::new(inner.http_requests_total.clone()),
            Box::new(inner.uploads_total.clone()),
            Box::new(inner.upload_rejections_total.clone()),
            Box::new(inner.pipeline_stage_total.clone()),
            Box::new(inner.upload_bytes_total.clone()),
            Box::new(inner.uploads_in_flight.clone()),
            Box::new(inner.checks_in_flight.clone()),
        ];
        for (name, collector) in UPLOAD_COLLECTORS.into_iter().zip(collectors) {
            registry
                .register(collector)
                .map_err(|source| TelemetryError::register(name, source))?;
        }
        Ok(())
    }

    /// Count one HTTP request; `upload_code` is the pipeline code for upload
    /// responses and `none` elsewhere.
    pub fn inc_http_request(&self, route: &str, status: u16, upload_code: &str) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string(), upload_code])
            .inc();
    }

    /// Count an accepted upload.
    pub fn inc_upload_accepted(&self) {
        self.inner
            .uploads_total
            .with_label_values(&[OUTCOME_ACCEPTED])
            .inc();
    }

    /// Count a rejected upload under its response code.
    pub fn inc_upload_rejected(&self, code: u16) {
        self.inner
            .uploads_total
            .with_label_values(&[OUTCOME_REJECTED])
            .inc();
        self.inner
            .upload_rejections_total
            .with_label_values(&[&code.to_string()])
            .inc();
    }

    /// Increment the pipeline stage counter.
    pub fn inc_pipeline_stage(&self, stage: &str, status: &str) {
        self.inner
            .pipeline_stage_total
            .with_label_values(&[stage, status])
            .inc();
    }

    /// Add received bytes to the running total.
    pub fn add_upload_bytes(&self, bytes: u64) {
        self.inner.upload_bytes_total.inc_by(bytes);
    }

    /// Set the number of packages being received.
    pub fn set_uploads_in_flight(&self, count: usize) {
        self.inner
            .uploads_in_flight
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Set the number of packages being expanded or verified.
    pub fn set_checks_in_flight(&self, count: usize) {
        self.inner
            .checks_in_flight
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Exposition { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionUtf8 { source })
    }

    /// Take a point-in-time snapshot of the upload gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_in_flight: self.inner.uploads_in_flight.get(),
            checks_in_flight: self.inner.checks_in_flight.get(),
            upload_bytes_total: self.inner.upload_bytes_total.get(),
            uploads_accepted_total: self
                .inner
                .uploads_total
                .with_label_values(&[OUTCOME_ACCEPTED])
                .get(),
            uploads_rejected_total: self
                .inner
                .uploads_total
                .with_label_values(&[OUTCOME_REJECTED])
                .get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/services/algr/upload", 400, "206");
        metrics.inc_upload_accepted();
        metrics.inc_upload_rejected(202);
        metrics.inc_upload_rejected(206);
        metrics.inc_pipeline_stage("receive", "completed");
        metrics.add_upload_bytes(1_024);
        metrics.set_uploads_in_flight(3);
        metrics.set_checks_in_flight(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_in_flight, 3);
        assert_eq!(snapshot.checks_in_flight, 1);
        assert_eq!(snapshot.upload_bytes_total, 1_024);
        assert_eq!(snapshot.uploads_accepted_total, 1);
        assert_eq!(snapshot.uploads_rejected_total, 2);

        let rendered = metrics.render()?;
        assert!(rendered.contains(
            r#"http_requests_total{route="/services/algr/upload",status="400",upload_code="206"} 1"#
        ));
        assert!(rendered.contains("uploads_total"));
        assert!(rendered.contains("upload_rejections_total{code=\"206\"} 1"));
        assert!(rendered.contains("pipeline_stage_total"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.add_upload_bytes(10);
        assert_eq!(second.snapshot().upload_bytes_total, 0);
        Ok(())
    }
}

//! Failures raised while wiring logs and upload metrics.
//!
//! Every metric failure carries the collector name, so a broken deployment
//! points straight at the offending series (`uploads_total`,
//! `checks_in_flight`, ...).

use prometheus::Error as PrometheusError;
use thiserror::Error;

use crate::init::LogFormat;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// What was being done to a collector when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStep {
    /// Building the collector from its name, help and labels.
    Define,
    /// Adding the collector to the upload registry.
    Register,
}

impl CollectorStep {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Define => "define",
            Self::Register => "register",
        }
    }
}

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global log subscriber was already installed.
    #[error("log subscriber install failed")]
    LoggingInstall {
        /// Format that was being installed.
        format: LogFormat,
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// An upload metric could not be defined or registered.
    #[error("upload metric collector failed")]
    Collector {
        /// Metric series name.
        metric: &'static str,
        /// Step that failed.
        step: CollectorStep,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The `/metrics` exposition could not be produced.
    #[error("metrics exposition failed")]
    Exposition {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The `/metrics` exposition was not valid UTF-8.
    #[error("metrics exposition not utf-8")]
    ExpositionUtf8 {
        /// Underlying UTF-8 conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) const fn define(metric: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            metric,
            step: CollectorStep::Define,
            source,
        }
    }

    pub(crate) const fn register(metric: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            metric,
            step: CollectorStep::Register,
            source,
        }
    }

    /// Metric series involved in the failure, if any.
    #[must_use]
    pub const fn metric(&self) -> Option<&'static str> {
        match self {
            Self::Collector { metric, .. } => Some(metric),
            Self::LoggingInstall { .. } | Self::Exposition { .. } | Self::ExpositionUtf8 { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Metrics, UPLOAD_COLLECTORS};
    use std::error::Error;

    #[test]
    fn invalid_upload_series_name_fails_at_define() {
        let err = prometheus::IntCounter::new("uploads total", "bad name")
            .map_err(|source| TelemetryError::define("uploads total", source));
        match err {
            Err(err @ TelemetryError::Collector { step, .. }) => {
                assert_eq!(step, CollectorStep::Define);
                assert_eq!(err.metric(), Some("uploads total"));
                assert_eq!(err.to_string(), "upload metric collector failed");
                assert!(err.source().is_some());
            }
            other => panic!("expected define failure, got {other:?}"),
        }
    }

    #[test]
    fn registering_upload_collectors_twice_names_the_first_clash() -> Result<()> {
        let metrics = Metrics::new()?;
        let registry = prometheus::Registry::new();
        metrics.register_into(&registry)?;

        match metrics.register_into(&registry) {
            Err(err @ TelemetryError::Collector { step, .. }) => {
                assert_eq!(step.as_str(), "register");
                assert_eq!(err.metric(), UPLOAD_COLLECTORS.first().copied());
            }
            other => panic!("expected register clash, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn exposition_errors_keep_their_source() -> std::result::Result<(), Box<dyn Error>> {
        let utf8 = String::from_utf8(vec![0, 159])
            .err()
            .ok_or("expected utf8 failure")?;
        let err = TelemetryError::ExpositionUtf8 { source: utf8 };
        assert_eq!(err.to_string(), "metrics exposition not utf-8");
        assert!(err.source().is_some());
        assert_eq!(err.metric(), None);
        Ok(())
    }
}

//! Wire types returned by the API.

use algrhub_config::LanguageContract;
use algrhub_intake::{AcceptedPackage, ErrorCode, ServiceStatus};
use algrhub_telemetry::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// Outcome envelope for upload requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseResponse {
    /// Whether the package was accepted.
    pub success: bool,
    /// Numeric outcome code; `0` on success.
    pub code: u16,
    /// Human readable outcome.
    pub message: String,
    /// Canonical instance folder of an accepted package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl BaseResponse {
    /// Response for an accepted package.
    #[must_use]
    pub fn accepted(package: &AcceptedPackage) -> Self {
        Self {
            success: true,
            code: ErrorCode::Success.as_u16(),
            message: ErrorCode::Success.message().to_string(),
            path: Some(package.path.display().to_string()),
        }
    }

    /// Response for a rejected upload.
    #[must_use]
    pub fn rejected(code: ErrorCode) -> Self {
        Self {
            success: false,
            code: code.as_u16(),
            message: code.message().to_string(),
            path: None,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when any component is.
    pub status: &'static str,
    /// Degraded components, sorted.
    pub degraded: Vec<String>,
    /// Current service status.
    pub service: ServiceStatus,
    /// Upload counters and in-flight gauges.
    pub metrics: MetricsSnapshot,
}

/// Body of `GET /services/algr/languages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguagesResponse {
    /// Supported languages and the files their packages must ship.
    pub languages: Vec<LanguageContract>,
}

/// RFC9457-style problem body for non-upload failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

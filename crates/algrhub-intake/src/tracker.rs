//! Shared in-flight bookkeeping and the derived service status.
//!
//! # Design
//! - Two counted sets (uploads, checks) are the only state shared between
//!   concurrent requests. Counting keeps two same-named uploads from erasing
//!   each other's entry.
//! - Entries are held by RAII guards, so failure, early return and future
//!   cancellation all release them the same way.
//! - Status is always derived from the set sizes; only the transition log
//!   keeps state, and it is updated under its own lock so a late release can
//!   never record a stale status.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use algrhub_telemetry::Metrics;
use serde::Serialize;
use tracing::{error, info};

/// Derived service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    /// No upload or check is in flight.
    #[serde(rename = "IDLE")]
    Idle,
    /// At least one upload or check is in flight.
    #[serde(rename = "RUNNING")]
    Running,
}

impl ServiceStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
        }
    }
}

/// Which in-flight set an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlightKind {
    /// Bytes are being streamed to disk; keyed by file name.
    Upload,
    /// The package is being expanded or verified; keyed by package name.
    Check,
}

impl InFlightKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Check => "check",
        }
    }
}

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerSnapshot {
    /// Derived status.
    pub status: ServiceStatus,
    /// Uploads currently streaming.
    pub uploads: usize,
    /// Packages currently being checked.
    pub checks: usize,
}

#[derive(Default)]
struct InFlightSet {
    entries: Mutex<HashMap<String, usize>>,
}

impl InFlightSet {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("in-flight set mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    fn insert(&self, key: &str) -> usize {
        let mut entries = self.lock();
        *entries.entry(key.to_string()).or_insert(0) += 1;
        entries.values().sum()
    }

    fn remove(&self, key: &str) -> usize {
        let mut entries = self.lock();
        if let Some(count) = entries.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                entries.remove(key);
            }
        }
        entries.values().sum()
    }

    fn len(&self) -> usize {
        self.lock().values().sum()
    }

    fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }
}

/// Process-wide view of in-flight uploads and checks.
///
/// Injected into the orchestrator and the HTTP layer; never global.
#[derive(Default)]
pub struct ServiceStateTracker {
    uploads: InFlightSet,
    checks: InFlightSet,
    last_logged: Mutex<bool>,
    metrics: Option<Metrics>,
}

impl ServiceStateTracker {
    /// Tracker without metrics reporting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that mirrors its set sizes into the `uploads_in_flight` and
    /// `checks_in_flight` gauges.
    #[must_use]
    pub fn with_metrics(metrics: Metrics) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::default()
        }
    }

    /// Register an entry in the given set until the returned guard drops.
    #[must_use = "the entry is released as soon as the guard is dropped"]
    pub fn begin(&self, kind: InFlightKind, key: impl Into<String>) -> InFlightGuard<'_> {
        let key = key.into();
        let size = self.set(kind).insert(&key);
        self.report_size(kind, size);
        self.refresh_status();
        InFlightGuard {
            tracker: self,
            kind,
            key,
        }
    }

    /// Register an upload keyed by file name.
    #[must_use = "the entry is released as soon as the guard is dropped"]
    pub fn begin_upload(&self, file_name: impl Into<String>) -> InFlightGuard<'_> {
        self.begin(InFlightKind::Upload, file_name)
    }

    /// Register a check keyed by package name.
    #[must_use = "the entry is released as soon as the guard is dropped"]
    pub fn begin_check(&self, package_name: impl Into<String>) -> InFlightGuard<'_> {
        self.begin(InFlightKind::Check, package_name)
    }

    /// Status derived from the current set sizes.
    #[must_use]
    pub fn current_status(&self) -> ServiceStatus {
        if self.uploads.len() > 0 || self.checks.len() > 0 {
            ServiceStatus::Running
        } else {
            ServiceStatus::Idle
        }
    }

    /// Recompute the status, logging transitions.
    pub fn refresh_status(&self) -> ServiceStatus {
        let mut last_logged = match self.last_logged.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("status mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        };
        let status = self.current_status();
        let running = status == ServiceStatus::Running;
        if *last_logged != running {
            *last_logged = running;
            info!(status = status.as_str(), "service status changed");
        }
        status
    }

    /// Number of uploads currently streaming.
    #[must_use]
    pub fn uploads_in_flight(&self) -> usize {
        self.uploads.len()
    }

    /// Number of packages currently being checked.
    #[must_use]
    pub fn checks_in_flight(&self) -> usize {
        self.checks.len()
    }

    /// Whether `key` is present in the given set.
    #[must_use]
    pub fn is_in_flight(&self, kind: InFlightKind, key: &str) -> bool {
        self.set(kind).contains(key)
    }

    /// Status plus set sizes.
    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            status: self.current_status(),
            uploads: self.uploads_in_flight(),
            checks: self.checks_in_flight(),
        }
    }

    const fn set(&self, kind: InFlightKind) -> &InFlightSet {
        match kind {
            InFlightKind::Upload => &self.uploads,
            InFlightKind::Check => &self.checks,
        }
    }

    fn report_size(&self, kind: InFlightKind, size: usize) {
        if let Some(metrics) = &self.metrics {
            match kind {
                InFlightKind::Upload => metrics.set_uploads_in_flight(size),
                InFlightKind::Check => metrics.set_checks_in_flight(size),
            }
        }
    }

    fn release(&self, kind: InFlightKind, key: &str) {
        let size = self.set(kind).remove(key);
        self.report_size(kind, size);
        self.refresh_status();
    }
}

/// Keeps one in-flight entry registered until dropped.
#[must_use = "the entry is released as soon as the guard is dropped"]
pub struct InFlightGuard<'a> {
    tracker: &'a ServiceStateTracker,
    kind: InFlightKind,
    key: String,
}

impl InFlightGuard<'_> {
    /// Key this guard registered.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for InFlightGuard<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("InFlightGuard")
            .field("kind", &self.kind.as_str())
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release(self.kind, &self.key);
    }
}

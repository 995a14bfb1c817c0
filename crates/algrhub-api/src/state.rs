//! Shared handler state and health bookkeeping.

use std::sync::{Arc, Mutex, MutexGuard};

use algrhub_intake::UploadOrchestrator;
use algrhub_telemetry::Metrics;
use tracing::{error, info, warn};

pub(crate) const COMPONENT_STORAGE: &str = "storage";

pub(crate) struct ApiState {
    pub(crate) orchestrator: Arc<UploadOrchestrator>,
    pub(crate) telemetry: Metrics,
    health_status: Mutex<Vec<String>>,
}

impl ApiState {
    pub(crate) const fn new(orchestrator: Arc<UploadOrchestrator>, telemetry: Metrics) -> Self {
        Self {
            orchestrator,
            telemetry,
            health_status: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add_degraded_component(&self, component: &str) -> bool {
        let mut guard = Self::lock_guard(&self.health_status, "health_status");
        if guard.iter().any(|entry| entry == component) {
            return false;
        }
        guard.push(component.to_string());
        guard.sort();
        drop(guard);
        warn!(component, "component degraded");
        true
    }

    pub(crate) fn remove_degraded_component(&self, component: &str) -> bool {
        let mut guard = Self::lock_guard(&self.health_status, "health_status");
        let previous = guard.len();
        guard.retain(|entry| entry != component);
        if guard.len() == previous {
            return false;
        }
        drop(guard);
        info!(component, "component recovered");
        true
    }

    pub(crate) fn current_health_degraded(&self) -> Vec<String> {
        Self::lock_guard(&self.health_status, "health_status").clone()
    }

    /// Mirror the orchestrator's storage root health into the component list.
    pub(crate) fn sync_storage_health(&self) {
        if self.orchestrator.storage_degraded() {
            self.add_degraded_component(COMPONENT_STORAGE);
        } else {
            self.remove_degraded_component(COMPONENT_STORAGE);
        }
    }

    fn lock_guard<'a, T>(mutex: &'a Mutex<T>, name: &'a str) -> MutexGuard<'a, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(mutex = name, "mutex poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

//! Test double for [`HealthReporter`] that records structured events.

use std::sync::Mutex;

use oncam_config::Config;

use crate::bootstrap::BootstrapError;
use crate::device_service::ServiceError;
use crate::discovery::CycleReport;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    DiscoveryStarting,
    DiscoveryCompleted {
        report: CycleReport,
        registry_size: usize,
    },
    DiscoveryFailed(String),
    ListenersReady(Vec<String>),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn discovery_starting(&self) {
        self.record(HealthEvent::DiscoveryStarting);
    }

    fn discovery_completed(&self, report: &CycleReport, registry_size: usize) {
        self.record(HealthEvent::DiscoveryCompleted {
            report: *report,
            registry_size,
        });
    }

    fn discovery_failed(&self, error: &ServiceError) {
        self.record(HealthEvent::DiscoveryFailed(error.to_string()));
    }

    fn listeners_ready(&self, endpoints: &[String]) {
        self.record(HealthEvent::ListenersReady(endpoints.to_vec()));
    }
}
